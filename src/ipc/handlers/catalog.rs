use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{id_value, no_workspace};
use crate::ipc::types::{AppState, Request};
use crate::source;
use crate::store::{CatalogImport, Store};
use serde_json::json;

fn handle_catalog_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let catalog: CatalogImport = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    let store = Store::new(conn);
    let counts = match store.import_catalog(&catalog) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_insert_failed", format!("{e:#}"), None),
    };
    let levels = source::levels_or_empty(&store);
    state
        .review
        .set_levels(levels.into_iter().map(|l| l.name).collect());
    ok(&req.id, json!(counts))
}

// Catalog reads degrade to empty lists; the screens still render.
fn handle_catalog_levels(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "levels": [] }));
    };
    let levels = source::levels_or_empty(&Store::new(conn));
    state
        .review
        .set_levels(levels.iter().map(|l| l.name.clone()).collect());
    ok(&req.id, json!({ "levels": levels }))
}

fn handle_catalog_schools(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "schools": [] }));
    };
    let schools = source::schools_or_empty(&Store::new(conn));
    ok(&req.id, json!({ "schools": schools }))
}

/// Department picker; `schoolId` narrows it to one faculty.
fn handle_catalog_departments(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "departments": [] }));
    };
    let school_id = req.params.get("schoolId").and_then(id_value);
    let departments = source::departments_or_empty(&Store::new(conn), school_id.as_deref());
    ok(&req.id, json!({ "departments": departments }))
}

fn handle_catalog_sessions(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "sessions": [] }));
    };
    let sessions = source::sessions_or_empty(&Store::new(conn));
    ok(&req.id, json!({ "sessions": sessions }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "catalog.import" => Some(handle_catalog_import(state, req)),
        "catalog.schools" => Some(handle_catalog_schools(state, req)),
        "catalog.departments" => Some(handle_catalog_departments(state, req)),
        "catalog.levels" => Some(handle_catalog_levels(state, req)),
        "catalog.sessions" => Some(handle_catalog_sessions(state, req)),
        _ => None,
    }
}
