mod config;
mod db;
mod filters;
mod grading;
mod ipc;
mod logging;
mod reconcile;
mod records;
mod schema;
mod session;
mod source;
mod store;

use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing::{debug, error, info};

fn main() {
    let args = config::Args::parse();
    logging::init_logging(&args.log_level);

    let mut state = ipc::AppState::new(args.page_size as usize);
    if let Some(path) = args.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            // Keep serving; the client can still pick a workspace itself.
            error!(error = %format!("{e:#}"), "startup workspace could not be opened");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "resultsd ready");

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
                // No id to echo back.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
