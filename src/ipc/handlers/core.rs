use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &AppState, req: &Request) -> serde_json::Value {
    let sheet = state.sheet.as_ref();
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "source": sheet
                .and_then(|s| s.source.as_ref())
                .map(|p| p.to_string_lossy().to_string()),
            "sheetName": sheet.and_then(|s| s.sheet_name.clone()),
            "rowCount": sheet.map(|s| s.row_count).unwrap_or(0),
            "studentCount": sheet.map(|s| s.index.student_count()).unwrap_or(0),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        _ => None,
    }
}
