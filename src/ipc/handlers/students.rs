use crate::filters::{self, contains_ci};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{id_value, no_workspace, optional_usize, required_id};
use crate::ipc::types::{AppState, Request};
use crate::session::{Notice, Severity};
use crate::store::{RosterEntry, Store, StudentProfile};
use serde_json::json;

fn text_param(req: &Request, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| req.params.get(*k).and_then(id_value))
}

/// Reads the roster form. A display name may come whole or as first and
/// last name.
fn parse_profile(req: &Request) -> StudentProfile {
    let name = text_param(req, &["name", "student_name"]).or_else(|| {
        let parts: Vec<String> = [
            text_param(req, &["firstName", "first_name"]),
            text_param(req, &["lastName", "last_name"]),
        ]
        .into_iter()
        .flatten()
        .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    });
    StudentProfile {
        matric: text_param(req, &["matric"]),
        mat_no: text_param(req, &["matNo", "mat_no"]),
        name,
        department_id: text_param(req, &["departmentId", "department_id"]),
        level: text_param(req, &["level"]),
        email: text_param(req, &["email"]),
        username: text_param(req, &["username"]),
    }
}

fn unknown_department(req: &Request, department_id: &str) -> serde_json::Value {
    err(
        &req.id,
        "not_found",
        "department not found",
        Some(json!({ "departmentId": department_id })),
    )
}

/// Roster for the students admin screen: department (and optionally level),
/// name search, paged like the results table.
fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let department_id = match required_id(req, "departmentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let level = req.params.get("level").and_then(id_value);
    let search = req
        .params
        .get("search")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_lowercase();
    let page = match optional_usize(req, "page") {
        Ok(v) => v.unwrap_or(0),
        Err(resp) => return resp,
    };
    let page_size = match optional_usize(req, "pageSize") {
        Ok(v) => v.unwrap_or(state.review.filters().page_size),
        Err(resp) => return resp,
    };
    if page_size == 0 {
        return err(&req.id, "bad_params", "pageSize must be at least 1", None);
    }

    let roster = match Store::new(conn).list_students(&department_id, level.as_deref()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    let matching: Vec<&RosterEntry> = roster
        .iter()
        .filter(|s| {
            search.is_empty()
                || s.name
                    .as_deref()
                    .map(|n| contains_ci(n, &search))
                    .unwrap_or(false)
        })
        .collect();
    let total = matching.len();
    let page = filters::effective_page(total, page, page_size);
    let students = filters::paginate(&matching, page, page_size);

    ok(
        &req.id,
        json!({
            "students": students,
            "total": total,
            "page": page,
            "pageSize": page_size,
            "pageCount": filters::page_count(total, page_size),
        }),
    )
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let profile = parse_profile(req);
    let Some(key) = profile.key().map(str::to_string) else {
        return err(&req.id, "bad_params", "matric or matNo is required", None);
    };
    let Some(department_id) = profile.department_id.clone() else {
        return err(&req.id, "bad_params", "missing departmentId", None);
    };

    let store = Store::new(conn);
    match store.department_exists(&department_id) {
        Ok(true) => {}
        Ok(false) => return unknown_department(req, &department_id),
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
    match store.roster_entry(&key) {
        Ok(None) => {}
        Ok(Some(_)) => {
            return err(
                &req.id,
                "conflict",
                "a student with this matric already exists",
                Some(json!({ "key": key })),
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }

    match store.create_student(&profile) {
        Ok(student) => ok(
            &req.id,
            json!({
                "student": student,
                "notice": Notice::new(Severity::Success, "Student added successfully"),
            }),
        ),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            format!("{e:#}"),
            Some(json!({ "table": "students" })),
        ),
    }
}

/// Saves roster fields. When the student is in the loaded results, the row
/// there picks up the new name and level too.
fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(req);
    };
    let key = match required_id(req, "key") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let changes = parse_profile(req);

    let store = Store::new(conn);
    if let Some(department_id) = changes.department_id.as_deref() {
        match store.department_exists(department_id) {
            Ok(true) => {}
            Ok(false) => return unknown_department(req, department_id),
            Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
        }
    }
    let student = match store.update_student(&key, &changes) {
        Ok(Some(v)) => v,
        Ok(None) => {
            return err(
                &req.id,
                "not_found",
                "student not found",
                Some(json!({ "key": key })),
            )
        }
        Err(e) => return err(&req.id, "db_update_failed", format!("{e:#}"), None),
    };

    let loaded = state
        .review
        .student(&key)
        .and_then(|s| serde_json::to_value(s).ok());
    let edit = loaded.map(|mut record| {
        if let Some(name) = &student.name {
            record["name"] = json!(name);
        }
        if let Some(level) = &student.level {
            record["level"] = json!(level);
        }
        state.review.apply_edit(&record)
    });

    ok(
        &req.id,
        json!({
            "student": student,
            "edit": edit,
            "notice": Notice::new(Severity::Success, "Student updated successfully"),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        _ => None,
    }
}
