use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report;
use crate::roster;

fn handle_build(state: &AppState, req: &Request) -> serde_json::Value {
    let Some(sheet) = state.sheet.as_ref() else {
        return err(&req.id, "no_workbook", "load a workbook first");
    };
    let Some(roll_param) = req.params.get("roll") else {
        return err(&req.id, "bad_params", "missing params.roll");
    };

    // An unknown roll number is a normal outcome, not an error.
    let rows = match roll_param {
        serde_json::Value::String(query) => sheet.index.rows_for_query(query),
        other => roster::roll_key(other).and_then(|key| sheet.index.rows_for_key(&key)),
    }
    .unwrap_or(&[]);
    match report::build_report(rows) {
        Some(rep) => match serde_json::to_value(&rep) {
            Ok(value) => ok(&req.id, json!({ "found": true, "report": value })),
            Err(e) => err(&req.id, "serialize_failed", e.to_string()),
        },
        None => ok(&req.id, json!({ "found": false })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "report.build" => Some(handle_build(state, req)),
        _ => None,
    }
}
