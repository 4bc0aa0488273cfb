use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{id_value, no_workspace};
use crate::ipc::types::{AppState, Request};
use crate::session::{Notice, Severity};
use crate::source::RecordSink;
use crate::store::Store;
use serde_json::json;
use tracing::warn;

fn handle_records_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(key) = req.params.get("key").and_then(id_value) else {
        return err(&req.id, "bad_params", "missing key", None);
    };
    match state.review.student(&key) {
        Some(s) => ok(&req.id, json!({ "student": s })),
        None => err(
            &req.id,
            "not_found",
            "student not in the loaded results",
            Some(json!({ "key": key })),
        ),
    }
}

/// Reconciles a record that was already saved elsewhere.
fn handle_records_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(record) = req.params.get("record").filter(|v| v.is_object()) else {
        return err(&req.id, "bad_params", "missing/invalid record", None);
    };
    let report = state.review.apply_edit(record);
    ok(&req.id, json!({ "edit": report, "view": state.review.view() }))
}

fn handle_records_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(record) = req.params.get("record").filter(|v| v.is_object()) else {
        return err(&req.id, "bad_params", "missing/invalid record", None);
    };
    let cohort_key = state
        .review
        .cohort()
        .map(|c| c.key.clone())
        .or_else(|| state.review.selection().cohort_key());
    let Some(cohort_key) = cohort_key else {
        return err(
            &req.id,
            "invalid_selection",
            "no results loaded to edit",
            None,
        );
    };
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };

    match Store::new(conn).update_record(&cohort_key, record) {
        Ok(stored) => {
            let effective = stored.as_ref().unwrap_or(record);
            let report = state.review.apply_edit(effective);
            let notice = if report.matched {
                Notice::new(Severity::Success, "Result updated successfully")
            } else {
                Notice::new(
                    Severity::Info,
                    "Result saved; it is not part of the loaded results",
                )
            };
            ok(
                &req.id,
                json!({
                    "updated": true,
                    "edit": report,
                    "notice": notice,
                    "view": state.review.view(),
                }),
            )
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "record update rejected");
            ok(
                &req.id,
                json!({
                    "updated": false,
                    "notice": Notice::new(Severity::Error, format!("Failed to update result: {e}")),
                }),
            )
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.get" => Some(handle_records_get(state, req)),
        "records.apply" => Some(handle_records_apply(state, req)),
        "records.update" => Some(handle_records_update(state, req)),
        _ => None,
    }
}
