use crate::ipc::error::err;
use crate::ipc::types::Request;
use crate::session::SessionError;
use crate::source::CohortKey;
use serde_json::json;

pub fn no_workspace(req: &Request) -> serde_json::Value {
    err(&req.id, "no_workspace", "select a workspace first", None)
}

pub fn session_err(req: &Request, e: SessionError) -> serde_json::Value {
    err(&req.id, &e.code, e.message, e.details)
}

/// Catalog ids arrive as strings or as numbers depending on the backend.
pub fn id_value(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn required_id(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(id_value)
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// `None` when the key is absent, `Some(None)` when it is null or blank.
pub fn patch_id(
    req: &Request,
    key: &str,
) -> Result<Option<Option<String>>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(Some(None)),
        Some(v) if v.is_string() || v.is_number() => Ok(Some(id_value(v))),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be a string, number or null", key),
            None,
        )),
    }
}

pub fn optional_usize(req: &Request, key: &str) -> Result<Option<usize>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_u64() {
            Some(n) => Ok(Some(n as usize)),
            None => Err(err(
                &req.id,
                "bad_params",
                format!("{} must be a non-negative integer", key),
                Some(json!({ "field": key, "value": v })),
            )),
        },
    }
}

pub fn cohort_key(req: &Request) -> Result<CohortKey, serde_json::Value> {
    Ok(CohortKey {
        department_id: required_id(req, "departmentId")?,
        session_id: required_id(req, "sessionId")?,
        semester_id: required_id(req, "semesterId")?,
    })
}
