use std::path::Path;

use anyhow::{anyhow, Context};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use serde_json::Value;

use crate::report::RawRow;

#[derive(Debug)]
pub struct SheetData {
    pub sheet_name: String,
    pub rows: Vec<RawRow>,
}

/// Reads the result sheet of a workbook into raw row records. Row 0 is the
/// header row; every later row becomes a map of column name to cell value,
/// with blank cells omitted.
pub fn load_result_sheet(path: &Path, sheet: Option<&str>) -> anyhow::Result<SheetData> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;

    let sheet_name = match sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(anyhow!("sheet not found: {}", name));
            }
            name.to_string()
        }
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("workbook has no sheets"))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| anyhow!("failed to read sheet {}: {}", sheet_name, e))?;

    let mut data_rows = range.rows();
    let Some(header_cells) = data_rows.next() else {
        return Ok(SheetData {
            sheet_name,
            rows: Vec::new(),
        });
    };
    let headers: Vec<String> = header_cells
        .iter()
        .map(|c| c.as_string().unwrap_or_default().trim().to_string())
        .collect();

    let mut rows: Vec<RawRow> = Vec::new();
    for cells in data_rows {
        let mut row = RawRow::new();
        for (header, cell) in headers.iter().zip(cells.iter()) {
            if header.is_empty() {
                continue;
            }
            if let Some(value) = cell_value(cell) {
                row.insert(header.clone(), value);
            }
        }
        // Fully blank rows carry no record.
        if !row.is_empty() {
            rows.push(row);
        }
    }

    Ok(SheetData { sheet_name, rows })
}

fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::Int(i) => Some(Value::from(*i)),
        Data::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Bool(b) => Some(Value::Bool(*b)),
        // Date cells keep their raw day-serial; the report layer renders
        // display dates and sorts on the serial.
        Data::DateTime(dt) => serde_json::Number::from_f64(dt.as_f64()).map(Value::Number),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
        Data::Error(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_xlsx(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "{}-{}.xlsx",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    fn write_fixture(path: &Path) {
        let mut workbook = Workbook::new();
        let ws = workbook.add_worksheet();
        for (col, header) in ["Roll No.", "Learner Name", "Test Type", "Test Date", "P", "P(MM)"]
            .iter()
            .enumerate()
        {
            ws.write_string(0, col as u16, *header).expect("header");
        }
        ws.write_number(1, 0, 242009695.0).expect("roll");
        ws.write_string(1, 1, "Asha Verma").expect("name");
        ws.write_string(1, 2, "ST/OT").expect("type");
        ws.write_number(1, 3, 45292.0).expect("date");
        ws.write_number(1, 4, 18.0).expect("marks");
        ws.write_number(1, 5, 20.0).expect("max");
        // Second data row leaves the subject columns blank.
        ws.write_number(2, 0, 242009696.0).expect("roll 2");
        ws.write_string(2, 1, "Kiran Rao").expect("name 2");
        workbook.save(path).expect("save workbook");
    }

    #[test]
    fn reads_rows_and_omits_blank_cells() {
        let path = temp_xlsx("reportcardd-sheet");
        write_fixture(&path);

        let data = load_result_sheet(&path, None).expect("load sheet");
        assert_eq!(data.rows.len(), 2);

        let first = &data.rows[0];
        assert_eq!(first.get("Roll No.").and_then(|v| v.as_f64()), Some(242009695.0));
        assert_eq!(
            first.get("Learner Name").and_then(|v| v.as_str()),
            Some("Asha Verma")
        );
        assert_eq!(first.get("Test Date").and_then(|v| v.as_f64()), Some(45292.0));
        assert_eq!(first.get("P(MM)").and_then(|v| v.as_f64()), Some(20.0));

        let second = &data.rows[1];
        assert!(second.get("P").is_none());
        assert!(second.get("Test Type").is_none());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_named_sheet_is_an_error() {
        let path = temp_xlsx("reportcardd-sheet-missing");
        write_fixture(&path);

        let err = load_result_sheet(&path, Some("Nope")).expect_err("missing sheet");
        assert!(err.to_string().contains("sheet not found"));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let path = temp_xlsx("reportcardd-sheet-absent");
        assert!(load_result_sheet(&path, None).is_err());
    }
}
