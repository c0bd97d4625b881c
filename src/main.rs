mod export;
mod ipc;
mod report;
mod roster;
mod sheet;

use std::io::{self, BufRead, Write};

fn main() {
    let mut state = ipc::AppState { sheet: None };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back; reply best-effort so the caller isn't
                // left waiting on a dead line.
                let _ = writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let body = serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string());
        let _ = writeln!(stdout, "{}", body);
        let _ = stdout.flush();
    }
}
