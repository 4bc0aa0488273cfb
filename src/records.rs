use crate::grading;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseResult {
    pub code: String,
    pub name: String,
    pub grade: Option<String>,
    pub credit_load: f64,
}

/// Canonical student record. Built only through [`Student::from_raw`], which
/// resolves the field aliases once and stores the GPA.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Option<String>,
    pub matric: Option<String>,
    pub mat_no: Option<String>,
    pub name: Option<String>,
    pub department_name: Option<String>,
    pub level: Option<String>,
    pub courses: Vec<CourseResult>,
    pub gpa: f64,
}

const ID_KEYS: &[&str] = &["id"];
const MATRIC_KEYS: &[&str] = &["matric"];
const MAT_NO_KEYS: &[&str] = &["matNo", "mat_no"];
const NAME_KEYS: &[&str] = &["student_name", "name"];
const DEPARTMENT_KEYS: &[&str] = &["department_name", "departmentName"];
const LEVEL_KEYS: &[&str] = &["level", "Level", "level_name"];
const COURSES_KEYS: &[&str] = &["courses_info", "courses"];
const CREDIT_KEYS: &[&str] = &["credit_load", "creditLoad"];

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn credit_field(obj: &Map<String, Value>) -> f64 {
    let raw = CREDIT_KEYS
        .iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()));
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|c| c.is_finite() && *c > 0.0)
        .unwrap_or(0.0)
}

impl CourseResult {
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;
        let grade = match obj.get("grade") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };
        Some(Self {
            code: text_field(obj, &["code"]).unwrap_or_default(),
            name: text_field(obj, &["name"]).unwrap_or_default(),
            grade,
            credit_load: credit_field(obj),
        })
    }
}

impl Student {
    pub fn from_raw(raw: &Value) -> Self {
        let empty = Map::new();
        let obj = raw.as_object().unwrap_or(&empty);

        let courses: Vec<CourseResult> = COURSES_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| v.as_array()))
            .map(|arr| arr.iter().filter_map(CourseResult::from_raw).collect())
            .unwrap_or_default();
        let gpa = grading::compute_gpa(&courses);

        Self {
            id: text_field(obj, ID_KEYS),
            matric: text_field(obj, MATRIC_KEYS),
            mat_no: text_field(obj, MAT_NO_KEYS),
            name: text_field(obj, NAME_KEYS),
            department_name: text_field(obj, DEPARTMENT_KEYS),
            level: text_field(obj, LEVEL_KEYS),
            courses,
            gpa,
        }
    }

    /// Durable key used to match records across fetch and edit: id, matric, matNo.
    pub fn identity_key(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or(self.matric.as_deref())
            .or(self.mat_no.as_deref())
    }

    /// Registration number shown in the table and searched against.
    pub fn matric_or_mat_no(&self) -> Option<&str> {
        self.matric.as_deref().or(self.mat_no.as_deref())
    }
}
