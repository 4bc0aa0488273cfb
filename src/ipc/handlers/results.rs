use crate::filters::GpaBand;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{cohort_key, no_workspace, optional_usize, patch_id, session_err};
use crate::ipc::types::{AppState, Request};
use crate::session::{FetchOutcome, SelectionPatch};
use crate::store::Store;
use serde_json::json;

fn parse_selection_patch(req: &Request) -> Result<SelectionPatch, serde_json::Value> {
    Ok(SelectionPatch {
        department_id: patch_id(req, "departmentId")?,
        session_id: patch_id(req, "sessionId")?,
        semester_id: patch_id(req, "semesterId")?,
    })
}

fn parse_band(req: &Request) -> Result<Option<GpaBand>, serde_json::Value> {
    let bad = |message: String| err(&req.id, "bad_params", message, None);
    match req.params.get("band") {
        None => {}
        Some(v) if v.is_null() => {}
        Some(serde_json::Value::String(s)) => {
            return GpaBand::parse(s)
                .map(Some)
                .map_err(|e| err(&req.id, &e.code, e.message, e.details));
        }
        Some(v) => {
            let min = v.get("min").and_then(|x| x.as_f64());
            let max = v.get("max").and_then(|x| x.as_f64());
            let (Some(min), Some(max)) = (min, max) else {
                return Err(bad("band must be \"min-max\" or {min, max}".to_string()));
            };
            return GpaBand::new(min, max)
                .map(Some)
                .map_err(|e| err(&req.id, &e.code, e.message, e.details));
        }
    }

    let min = req.params.get("gpaMin").and_then(|v| v.as_f64());
    let max = req.params.get("gpaMax").and_then(|v| v.as_f64());
    match (min, max) {
        (None, None) => Ok(None),
        (Some(min), Some(max)) => GpaBand::new(min, max)
            .map(Some)
            .map_err(|e| err(&req.id, &e.code, e.message, e.details)),
        _ => Err(bad("gpaMin and gpaMax must be given together".to_string())),
    }
}

fn handle_selection_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let patch = match parse_selection_patch(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let changed = state.review.select(patch);
    ok(
        &req.id,
        json!({
            "changed": changed,
            "selection": state.review.selection(),
            "generation": state.review.generation(),
            "ready": state.review.selection().cohort_key().is_some(),
        }),
    )
}

fn handle_results_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let key = match cohort_key(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(records) = req.params.get("results").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing results array", None);
    };

    match Store::new(conn).import_results(&key, records) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            format!("{e:#}"),
            Some(json!({ "table": "course_results" })),
        ),
    }
}

fn handle_results_fetch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let patch = match parse_selection_patch(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    state.review.select(patch);
    if state.review.selection().cohort_key().is_none() {
        return err(
            &req.id,
            "invalid_selection",
            "select a department, session and semester first",
            Some(json!({ "selection": state.review.selection() })),
        );
    }
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };

    let report = match state.review.fetch(&Store::new(conn)) {
        Ok(v) => v,
        Err(e) => return session_err(req, e),
    };
    ok(
        &req.id,
        json!({ "fetch": report, "view": state.review.view() }),
    )
}

fn handle_results_begin(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.review.begin_fetch() {
        Ok(ticket) => ok(
            &req.id,
            json!({
                "generation": ticket.generation,
                "departmentId": ticket.key.department_id,
                "sessionId": ticket.key.session_id,
                "semesterId": ticket.key.semester_id,
            }),
        ),
        Err(e) => session_err(req, e),
    }
}

/// Lands the result of a fetch the caller performed itself.
fn handle_results_ingest(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(generation) = req.params.get("generation").and_then(|v| v.as_u64()) else {
        return err(&req.id, "bad_params", "missing generation", None);
    };
    let outcome = match req.params.get("error") {
        Some(e) if !e.is_null() => FetchOutcome::Failed(
            e.as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| e.to_string()),
        ),
        _ => FetchOutcome::Loaded(
            req.params
                .get("results")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default(),
        ),
    };
    let report = state.review.complete_fetch(generation, outcome);
    ok(
        &req.id,
        json!({ "fetch": report, "view": state.review.view() }),
    )
}

fn handle_results_view(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!(state.review.view()))
}

fn handle_filters_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let band = match parse_band(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let level_tab = match optional_usize(req, "levelTab") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let page_size = match optional_usize(req, "pageSize") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let page = match optional_usize(req, "page") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let search = match req.params.get("search") {
        None => None,
        Some(v) if v.is_null() => Some(String::new()),
        Some(v) => match v.as_str() {
            Some(s) => Some(s.to_string()),
            None => return err(&req.id, "bad_params", "search must be a string", None),
        },
    };

    // Validate before touching state so a rejected call changes nothing.
    if page_size == Some(0) {
        return err(&req.id, "bad_params", "pageSize must be at least 1", None);
    }

    if let Some(b) = band {
        state.review.set_band(b);
    }
    if let Some(s) = search {
        state.review.set_search(s);
    }
    if let Some(t) = level_tab {
        state.review.set_level_tab(t);
    }
    if let Some(n) = page_size {
        if let Err(e) = state.review.set_page_size(n) {
            return session_err(req, e);
        }
    }
    if let Some(p) = page {
        state.review.set_page(p);
    }
    ok(&req.id, json!(state.review.view()))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "selection.set" => Some(handle_selection_set(state, req)),
        "results.import" => Some(handle_results_import(state, req)),
        "results.fetch" => Some(handle_results_fetch(state, req)),
        "results.begin" => Some(handle_results_begin(state, req)),
        "results.ingest" => Some(handle_results_ingest(state, req)),
        "results.view" => Some(handle_results_view(state, req)),
        "filters.set" => Some(handle_filters_set(state, req)),
        _ => None,
    }
}
