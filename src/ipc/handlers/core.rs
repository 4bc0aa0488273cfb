use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::source;
use crate::store::Store;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Opens (or creates) the workspace store and loads its level catalog into
/// the review session.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<usize> {
    let conn = db::open_db(path)?;
    let levels: Vec<String> = source::levels_or_empty(&Store::new(&conn))
        .into_iter()
        .map(|l| l.name)
        .collect();
    let level_count = levels.len();
    state.review.set_levels(levels);
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    info!(workspace = %path.to_string_lossy(), levels = level_count, "workspace opened");
    Ok(level_count)
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(level_count) => ok(
            &req.id,
            json!({ "workspacePath": path.to_string_lossy(), "levelCount": level_count }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
