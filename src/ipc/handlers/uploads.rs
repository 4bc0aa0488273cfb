use crate::ipc::error::{err, ok};
use crate::ipc::helpers::no_workspace;
use crate::ipc::types::{AppState, Request};
use crate::session::{Notice, Severity};
use crate::source::BulkSink;
use crate::store::Store;
use serde_json::json;
use std::path::PathBuf;
use tracing::warn;

/// Hands a file to the bulk sink. The outcome is reported as a notice only;
/// the loaded results are never touched.
fn handle_uploads_bulk(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let Some(path) = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    let file_name = req
        .params
        .get("fileName")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "upload".to_string());

    let outcome = std::fs::read(&path)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| Store::new(conn).ingest(&file_name, &bytes));
    match outcome {
        Ok(receipt) => ok(
            &req.id,
            json!({
                "uploaded": true,
                "notice": Notice::new(Severity::Success, receipt.message.clone()),
                "receipt": receipt,
            }),
        ),
        Err(e) => {
            warn!(error = %format!("{e:#}"), file = %file_name, "bulk upload failed");
            ok(
                &req.id,
                json!({
                    "uploaded": false,
                    "notice": Notice::new(Severity::Error, "Bulk upload failed!"),
                }),
            )
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "uploads.bulk" => Some(handle_uploads_bulk(state, req)),
        _ => None,
    }
}
