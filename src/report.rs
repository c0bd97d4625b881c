use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// One spreadsheet row as ingested: column name -> cell value. Blank cells
/// carry no key.
pub type RawRow = serde_json::Map<String, Value>;

pub const COL_LEARNER_NAME: &str = "Learner Name";
pub const COL_ROLL_NO: &str = "Roll No.";
pub const COL_BATCH_NAME: &str = "Batch Name";
pub const COL_CLASS: &str = "Class";
pub const COL_TEST_TYPE: &str = "Test Type";
pub const COL_TEST_NAME: &str = "Test Name";
pub const COL_TEST_DATE: &str = "Test Date";

/// Fixed subject-code set. Obtained marks live under the code column,
/// maximums under "<code>(MM)". Order here is the card display order.
pub const SUBJECTS: [(&str, &str); 8] = [
    ("P", "Physics"),
    ("C", "Chemistry"),
    ("Math", "Mathematics"),
    ("B", "Biology"),
    ("MAT", "Mental Ability"),
    ("E", "English"),
    ("SST", "Social Studies"),
    ("H", "Hindi"),
];

lazy_static! {
    // Accepts "Pre Board 2", "Pre-Board-2", "pre  board 2", ...
    static ref PRE_BOARD_RE: Regex =
        Regex::new(r"(?i)pre\s*-?\s*board\s*-?\s*(\d+)").expect("pre-board pattern");
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub roll_no: String,
    pub batch: String,
    #[serde(rename = "class")]
    pub class_name: String,
}

/// A subject cell as shown on the card: a numeric mark, a textual marker
/// carried over from the sheet (e.g. "AB"), or "-" when the column is blank.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MarkCell {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectScore {
    pub name: String,
    pub obtained: MarkCell,
    pub max: MarkCell,
}

/// Group percentage: a 2-decimal score, or the "NA" sentinel for a group
/// that has max marks on record but was not fully attempted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Percentage {
    Score(f64),
    NotAvailable,
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Percentage::Score(v) => serializer.serialize_f64(*v),
            Percentage::NotAvailable => serializer.serialize_str("NA"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestGroup {
    pub id: String,
    pub display_title: String,
    pub is_consolidated: bool,
    pub type_tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub total_obtained: f64,
    pub total_max: f64,
    pub percentage: Percentage,
    pub subjects: Vec<SubjectScore>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub date: String,
    pub raw_date: f64,
    #[serde(rename = "type")]
    pub test_type: String,
    pub test_name: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MajorExamPoint {
    #[serde(rename = "type")]
    pub test_type: String,
    pub test_name: String,
    pub date: Option<String>,
    pub raw_date: Option<f64>,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendGraphs {
    pub st_ot: Vec<HistoryPoint>,
    pub major: Vec<MajorExamPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectAverage {
    pub subject: String,
    pub percentage: f64,
}

/// Per-category subject averages. Categories with no contributing subjects
/// are omitted from the serialized object.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubjectPerformance {
    #[serde(rename = "ST/OT", skip_serializing_if = "Option::is_none")]
    pub st_ot: Option<Vec<SubjectAverage>>,
    #[serde(rename = "Part Test", skip_serializing_if = "Option::is_none")]
    pub part_test: Option<Vec<SubjectAverage>>,
    #[serde(rename = "Major Exams", skip_serializing_if = "Option::is_none")]
    pub major_exams: Option<Vec<SubjectAverage>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub profile: Profile,
    pub tests: Vec<TestGroup>,
    pub history: Vec<HistoryPoint>,
    pub graphs: TrendGraphs,
    pub subject_performance: SubjectPerformance,
}

/// Builds the full report model for one student's rows. Returns `None` only
/// for an empty row set (roll number not present in the sheet).
pub fn build_report(rows: &[RawRow]) -> Option<Report> {
    let first = rows.first()?;

    let profile = Profile {
        name: display_cell(first.get(COL_LEARNER_NAME)),
        roll_no: display_cell(first.get(COL_ROLL_NO)),
        batch: display_cell(first.get(COL_BATCH_NAME)),
        class_name: display_cell(first.get(COL_CLASS)),
    };

    let history = collect_history(rows);
    let st_ot = history
        .iter()
        .filter(|p| is_standalone_type(&p.test_type))
        .cloned()
        .collect();

    Some(Report {
        profile,
        tests: collect_test_groups(rows),
        graphs: TrendGraphs {
            st_ot,
            major: collect_major_exams(rows),
        },
        history,
        subject_performance: collect_subject_performance(rows),
    })
}

// ---- classification helpers ----

fn cell<'a>(row: &'a RawRow, key: &str) -> Option<&'a Value> {
    row.get(key).filter(|v| !v.is_null())
}

fn num_cell(row: &RawRow, key: &str) -> Option<f64> {
    cell(row, key).and_then(|v| v.as_f64())
}

/// Trimmed `Test Type`, defaulting to "Other" when the cell is missing or
/// empty. A whitespace-only cell trims to "" and stays that way.
fn test_type_label(row: &RawRow) -> String {
    match cell(row, COL_TEST_TYPE).and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => s.trim().to_string(),
        _ => "Other".to_string(),
    }
}

fn test_name_label(row: &RawRow) -> String {
    cell(row, COL_TEST_NAME)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Half-Yearly disambiguation: the test name wins over the type label, so a
/// "Re half Yearly" retest miscategorized as "half Yearly" comes out right.
fn apply_half_yearly_fix(test_type: &str, test_name: &str) -> String {
    let name_lc = test_name.to_lowercase();
    if name_lc.contains("re half yearly") || name_lc.contains("re-half yearly") {
        "Re-Half Yearly".to_string()
    } else if test_type.eq_ignore_ascii_case("half yearly") {
        "Half Yearly".to_string()
    } else {
        test_type.to_string()
    }
}

fn pre_board_label(test_name: &str) -> Option<String> {
    PRE_BOARD_RE
        .captures(test_name)
        .map(|c| format!("Pre Board {}", &c[1]))
}

/// Standalone rows (ST/OT/AT series and part tests) each form their own
/// group; everything else consolidates by type.
fn is_standalone_type(test_type: &str) -> bool {
    test_type.contains("ST")
        || test_type.contains("OT")
        || test_type.contains("AT")
        || test_type.to_lowercase().contains("part test")
}

/// Normalizes a row onto one of the major exam labels, or `None` when the
/// row is not a major exam. Numbered Pre Boards keep their number; a "pre
/// board" mention without one falls back to the bare label.
fn major_exam_label(test_type: &str, test_name: &str) -> Option<String> {
    let name_lc = test_name.to_lowercase();
    let type_lc = test_type.to_lowercase();
    if name_lc.contains("re half yearly") || name_lc.contains("re-half yearly") {
        return Some("Re-Half Yearly".to_string());
    }
    if type_lc == "half yearly" {
        return Some("Half Yearly".to_string());
    }
    if type_lc.contains("annual") {
        return Some("Annual Exam".to_string());
    }
    if type_lc.contains("pre board") || name_lc.contains("pre board") {
        return Some(pre_board_label(test_name).unwrap_or_else(|| "Pre Board".to_string()));
    }
    // A sheet can carry the canonical retest label outright, with nothing in
    // the test name to sniff.
    if test_type == "Re-Half Yearly" {
        return Some("Re-Half Yearly".to_string());
    }
    None
}

/// Category for the subject-performance view. The ST/OT check runs on the
/// raw type label, before any Half-Yearly correction.
fn performance_category(test_type: &str, test_name: &str) -> Option<&'static str> {
    if test_type.contains("ST") || test_type.contains("OT") || test_type.contains("AT") {
        Some("ST/OT")
    } else if test_type.to_lowercase().contains("part test") {
        Some("Part Test")
    } else if major_exam_label(test_type, test_name).is_some() {
        Some("Major Exams")
    } else {
        None
    }
}

/// Converts a spreadsheet day-serial (epoch 1899-12-30) to a display date
/// like "14 Jul 2024". Zero and missing serials have no date.
pub fn format_excel_date(serial: Option<f64>) -> Option<String> {
    let serial = serial?;
    if serial == 0.0 {
        return None;
    }
    let days = (serial - 25569.0).floor() as i64;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    let date = epoch.checked_add_signed(Duration::try_days(days)?)?;
    Some(format!("{} {} {}", date.day(), date.format("%b"), date.year()))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn mark_cell(value: Option<&Value>) -> MarkCell {
    match value {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) => MarkCell::Number(v),
            None => MarkCell::Text(n.to_string()),
        },
        Some(Value::String(s)) => MarkCell::Text(s.clone()),
        Some(other) => MarkCell::Text(other.to_string()),
        None => MarkCell::Text("-".to_string()),
    }
}

fn display_cell(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => format!("{}", v as i64),
            _ => n.to_string(),
        },
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Stable text fragment for a date cell inside a standalone group key.
fn date_key_fragment(row: &RawRow) -> String {
    match cell(row, COL_TEST_DATE) {
        Some(v) => display_cell(Some(v)),
        None => String::new(),
    }
}

// ---- card grouping ----

struct GroupAcc {
    id: String,
    type_tag: String,
    test_name: String,
    date_serial: Option<f64>,
    is_consolidated: bool,
    subjects: Vec<SubjectScore>,
    total_obtained: f64,
    total_max: f64,
    max_counted: usize,
    attempted: usize,
}

fn collect_test_groups(rows: &[RawRow]) -> Vec<TestGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, GroupAcc> = HashMap::new();

    for (ordinal, row) in rows.iter().enumerate() {
        let test_name = test_name_label(row);
        let mut test_type = apply_half_yearly_fix(&test_type_label(row), &test_name);
        if let Some(label) = pre_board_label(&test_name) {
            test_type = label;
        }

        let standalone = is_standalone_type(&test_type);
        let key = if standalone {
            // Same-named tests on different dates must never merge; the row
            // ordinal keeps the key unique even for exact repeats.
            format!("{}_{}_{}", test_name, date_key_fragment(row), ordinal)
        } else {
            test_type.clone()
        };

        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            GroupAcc {
                id: key,
                type_tag: test_type,
                test_name,
                date_serial: num_cell(row, COL_TEST_DATE),
                is_consolidated: !standalone,
                subjects: Vec::new(),
                total_obtained: 0.0,
                total_max: 0.0,
                max_counted: 0,
                attempted: 0,
            }
        });

        for (code, subject) in SUBJECTS {
            let obtained = cell(row, code);
            let max = cell(row, &format!("{}(MM)", code));
            if obtained.is_none() && max.is_none() {
                continue;
            }

            group.subjects.push(SubjectScore {
                name: subject.to_string(),
                obtained: mark_cell(obtained),
                max: mark_cell(max),
            });

            // Max marks count whenever recorded, attempted or not; obtained
            // only counts against a counted max.
            if let Some(mm) = max.and_then(|v| v.as_f64()).filter(|mm| *mm > 0.0) {
                group.total_max += mm;
                group.max_counted += 1;
                if let Some(m) = obtained.and_then(|v| v.as_f64()) {
                    group.total_obtained += m;
                    group.attempted += 1;
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .filter(|g| g.total_max > 0.0)
        .map(|g| {
            let complete = g.max_counted > 0 && g.attempted == g.max_counted;
            let percentage = if complete {
                Percentage::Score(round2(g.total_obtained / g.total_max * 100.0))
            } else {
                Percentage::NotAvailable
            };
            let display_title = if g.is_consolidated {
                format!("{} Examination", g.type_tag)
            } else {
                g.test_name.clone()
            };
            let date = if g.is_consolidated {
                None
            } else {
                format_excel_date(g.date_serial)
            };
            TestGroup {
                id: g.id,
                display_title,
                is_consolidated: g.is_consolidated,
                type_tag: g.type_tag,
                date,
                total_obtained: round2(g.total_obtained),
                total_max: g.total_max,
                percentage,
                subjects: g.subjects,
            }
        })
        .collect()
}

// ---- history ----

fn collect_history(rows: &[RawRow]) -> Vec<HistoryPoint> {
    let mut points: Vec<HistoryPoint> = Vec::new();

    for row in rows {
        let test_name = test_name_label(row);
        // Only the Half-Yearly correction applies here; Pre-Board renaming
        // is a card-grouping concern and never reaches the history series.
        let test_type = apply_half_yearly_fix(&test_type_label(row), &test_name);

        let mut row_obtained = 0.0;
        let mut row_max = 0.0;
        for (code, _) in SUBJECTS {
            if let Some(m) = num_cell(row, code) {
                row_obtained += m;
                if let Some(mm) = num_cell(row, &format!("{}(MM)", code)) {
                    row_max += mm;
                }
            }
        }
        if row_max == 0.0 {
            continue;
        }

        let serial = num_cell(row, COL_TEST_DATE);
        let Some(date) = format_excel_date(serial) else {
            continue;
        };

        points.push(HistoryPoint {
            date,
            raw_date: serial.unwrap_or(0.0),
            test_type,
            test_name,
            percentage: round2(row_obtained / row_max * 100.0),
        });
    }

    points.sort_by(|a, b| a.raw_date.partial_cmp(&b.raw_date).unwrap_or(Ordering::Equal));
    points
}

// ---- major exam aggregates ----

struct MajorAcc {
    label: String,
    total_obtained: f64,
    total_max: f64,
    date_serial: Option<f64>,
}

fn collect_major_exams(rows: &[RawRow]) -> Vec<MajorExamPoint> {
    let mut aggregates: Vec<MajorAcc> = Vec::new();

    for row in rows {
        let test_name = test_name_label(row);
        let test_type = test_type_label(row);
        let Some(label) = major_exam_label(&test_type, &test_name) else {
            continue;
        };

        let idx = match aggregates.iter().position(|a| a.label == label) {
            Some(i) => i,
            None => {
                aggregates.push(MajorAcc {
                    label,
                    total_obtained: 0.0,
                    total_max: 0.0,
                    date_serial: num_cell(row, COL_TEST_DATE),
                });
                aggregates.len() - 1
            }
        };
        let acc = &mut aggregates[idx];

        for (code, _) in SUBJECTS {
            if let Some(mm) = num_cell(row, &format!("{}(MM)", code)).filter(|mm| *mm > 0.0) {
                acc.total_max += mm;
                if let Some(m) = num_cell(row, code) {
                    acc.total_obtained += m;
                }
            }
        }
    }

    let mut points: Vec<MajorExamPoint> = aggregates
        .into_iter()
        .filter(|a| a.total_max > 0.0)
        .map(|a| MajorExamPoint {
            test_type: a.label.clone(),
            test_name: a.label,
            date: format_excel_date(a.date_serial),
            raw_date: a.date_serial,
            percentage: round2(a.total_obtained / a.total_max * 100.0),
        })
        .collect();

    points.sort_by(|a, b| {
        let ka = a.raw_date.unwrap_or(0.0);
        let kb = b.raw_date.unwrap_or(0.0);
        ka.partial_cmp(&kb).unwrap_or(Ordering::Equal)
    });
    points
}

// ---- subject performance ----

struct SubjectAcc {
    subject: String,
    obtained: f64,
    max: f64,
}

fn collect_subject_performance(rows: &[RawRow]) -> SubjectPerformance {
    let mut st_ot: Vec<SubjectAcc> = Vec::new();
    let mut part_test: Vec<SubjectAcc> = Vec::new();
    let mut major: Vec<SubjectAcc> = Vec::new();

    for row in rows {
        let test_name = test_name_label(row);
        let test_type = test_type_label(row);
        let bucket = match performance_category(&test_type, &test_name) {
            Some("ST/OT") => &mut st_ot,
            Some("Part Test") => &mut part_test,
            Some("Major Exams") => &mut major,
            _ => continue,
        };

        for (code, subject) in SUBJECTS {
            let Some(m) = num_cell(row, code) else {
                continue;
            };
            let Some(mm) = num_cell(row, &format!("{}(MM)", code)).filter(|mm| *mm > 0.0) else {
                continue;
            };
            match bucket.iter().position(|a| a.subject == subject) {
                Some(i) => {
                    bucket[i].obtained += m;
                    bucket[i].max += mm;
                }
                None => bucket.push(SubjectAcc {
                    subject: subject.to_string(),
                    obtained: m,
                    max: mm,
                }),
            }
        }
    }

    let averages = |bucket: Vec<SubjectAcc>| -> Option<Vec<SubjectAverage>> {
        if bucket.is_empty() {
            return None;
        }
        Some(
            bucket
                .into_iter()
                .map(|a| SubjectAverage {
                    subject: a.subject,
                    percentage: round1(a.obtained / a.max * 100.0),
                })
                .collect(),
        )
    };

    SubjectPerformance {
        st_ot: averages(st_ot),
        part_test: averages(part_test),
        major_exams: averages(major),
    }
}
