use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde_json::Value;

use crate::report::{RawRow, COL_ROLL_NO};

/// Canonical key for a roll-number cell. Numbers and their string
/// representations must address the same bucket, so integral values print
/// bare ("242009695") and numeric-looking strings fold to the same form.
pub fn roll_key(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_f64().map(canonical_number),
        Value::String(s) => key_from_text(s),
        _ => None,
    }
}

fn key_from_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(canonical_number(v)),
        _ => Some(trimmed.to_string()),
    }
}

fn canonical_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Lookup from canonical roll key to that student's raw rows. Input order is
/// preserved within each bucket; rolls themselves keep first-seen order so
/// listings and bulk exports are deterministic.
pub struct RollIndex {
    by_roll: HashMap<String, Vec<RawRow>>,
    order: Vec<String>,
}

impl RollIndex {
    pub fn build(rows: Vec<RawRow>) -> Self {
        let mut by_roll: HashMap<String, Vec<RawRow>> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for row in rows {
            // Rows without a usable roll cell are unreachable by search and
            // stay out of the index.
            let Some(key) = row.get(COL_ROLL_NO).and_then(roll_key) else {
                continue;
            };
            match by_roll.entry(key) {
                Entry::Occupied(mut e) => e.get_mut().push(row),
                Entry::Vacant(e) => {
                    order.push(e.key().clone());
                    e.insert(vec![row]);
                }
            }
        }

        RollIndex { by_roll, order }
    }

    /// Canonical roll keys in first-seen order.
    pub fn rolls(&self) -> &[String] {
        &self.order
    }

    pub fn student_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Rows for an already-canonical key (as returned by `rolls`).
    pub fn rows_for_key(&self, key: &str) -> Option<&[RawRow]> {
        self.by_roll.get(key).map(Vec::as_slice)
    }

    /// Rows for a user-supplied query string; applies the same
    /// canonicalisation as indexing, so "242009695" finds a numeric roll.
    pub fn rows_for_query(&self, query: &str) -> Option<&[RawRow]> {
        let key = key_from_text(query)?;
        self.rows_for_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(roll: Value, test_name: &str) -> RawRow {
        json!({ "Roll No.": roll, "Test Name": test_name })
            .as_object()
            .expect("row object")
            .clone()
    }

    #[test]
    fn numeric_and_string_rolls_share_a_bucket() {
        let index = RollIndex::build(vec![
            row(json!(242009695_i64), "ST 1"),
            row(json!("242009695"), "ST 2"),
            row(json!(242009695.0), "ST 3"),
        ]);
        assert_eq!(index.student_count(), 1);
        let rows = index.rows_for_query("242009695").expect("bucket");
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn bucket_preserves_input_order() {
        let index = RollIndex::build(vec![
            row(json!(11), "first"),
            row(json!(22), "other"),
            row(json!(11), "second"),
        ]);
        let rows = index.rows_for_query("11").expect("bucket");
        let names: Vec<_> = rows
            .iter()
            .map(|r| r.get("Test Name").and_then(|v| v.as_str()).unwrap_or(""))
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn rolls_keep_first_seen_order() {
        let index = RollIndex::build(vec![
            row(json!(33), "a"),
            row(json!(11), "b"),
            row(json!(33), "c"),
            row(json!(22), "d"),
        ]);
        assert_eq!(index.rolls(), &["33", "11", "22"]);
        assert_eq!(index.rows_for_key("33").map(|r| r.len()), Some(2));
    }

    #[test]
    fn rows_without_roll_are_not_indexed() {
        let mut no_roll = RawRow::new();
        no_roll.insert("Test Name".to_string(), json!("orphan"));
        let index = RollIndex::build(vec![no_roll, row(json!("  "), "blank")]);
        assert!(index.is_empty());
        assert_eq!(index.student_count(), 0);
    }

    #[test]
    fn query_trims_whitespace() {
        let index = RollIndex::build(vec![row(json!("A-17"), "st")]);
        assert!(index.rows_for_query("  A-17 ").is_some());
        assert!(index.rows_for_query("A-18").is_none());
    }

    #[test]
    fn empty_input_yields_empty_index() {
        let index = RollIndex::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.rows_for_query("1").is_none());
    }
}
