use std::path::PathBuf;

use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, LoadedSheet, Request};
use crate::report::{RawRow, COL_LEARNER_NAME};
use crate::roster::RollIndex;
use crate::sheet;

fn handle_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing params.path");
    };
    let sheet_param = req.params.get("sheet").and_then(|v| v.as_str());

    match sheet::load_result_sheet(&path, sheet_param) {
        Ok(data) => {
            let sheet::SheetData { sheet_name, rows } = data;
            let row_count = rows.len();
            let index = RollIndex::build(rows);
            let student_count = index.student_count();
            let result = json!({
                "sheetName": sheet_name,
                "rowCount": row_count,
                "studentCount": student_count,
            });
            state.sheet = Some(LoadedSheet {
                source: Some(path),
                sheet_name: Some(sheet_name),
                row_count,
                index,
            });
            ok(&req.id, result)
        }
        Err(e) => err(&req.id, "sheet_load_failed", format!("{e:#}")),
    }
}

/// Accepts pre-ingested row records directly, for callers that do their own
/// spreadsheet parsing.
fn handle_load_rows(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("rows").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing params.rows");
    };

    let mut rows: Vec<RawRow> = Vec::with_capacity(raw.len());
    for value in raw {
        let Some(obj) = value.as_object() else {
            return err(&req.id, "bad_params", "rows must contain only objects");
        };
        rows.push(obj.clone());
    }

    let row_count = rows.len();
    let index = RollIndex::build(rows);
    let student_count = index.student_count();
    state.sheet = Some(LoadedSheet {
        source: None,
        sheet_name: None,
        row_count,
        index,
    });
    ok(
        &req.id,
        json!({ "rowCount": row_count, "studentCount": student_count }),
    )
}

fn handle_roster_list(state: &AppState, req: &Request) -> serde_json::Value {
    let Some(sheet) = state.sheet.as_ref() else {
        return err(&req.id, "no_workbook", "load a workbook first");
    };

    let students: Vec<serde_json::Value> = sheet
        .index
        .rolls()
        .iter()
        .map(|roll| {
            let rows = sheet.index.rows_for_key(roll).unwrap_or(&[]);
            let name = rows
                .first()
                .and_then(|r| r.get(COL_LEARNER_NAME))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .trim();
            json!({ "roll": roll, "name": name, "rowCount": rows.len() })
        })
        .collect();

    ok(&req.id, json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "workbook.load" => Some(handle_load(state, req)),
        "workbook.loadRows" => Some(handle_load_rows(state, req)),
        "roster.list" => Some(handle_roster_list(state, req)),
        _ => None,
    }
}
