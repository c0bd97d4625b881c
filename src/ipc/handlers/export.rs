use std::path::PathBuf;

use serde_json::json;

use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

fn handle_bundle(state: &AppState, req: &Request) -> serde_json::Value {
    let Some(sheet) = state.sheet.as_ref() else {
        return err(&req.id, "no_workbook", "load a workbook first");
    };
    let Some(out_path) = req
        .params
        .get("outPath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing params.outPath");
    };

    match export::export_report_bundle(&sheet.index, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "studentCount": summary.student_count,
                "skippedCount": summary.skipped_count,
                "entryCount": summary.entry_count,
                "outPath": out_path.to_string_lossy(),
            }),
        ),
        Err(e) => err(&req.id, "export_failed", format!("{e:#}")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.bundle" => Some(handle_bundle(state, req)),
        _ => None,
    }
}
