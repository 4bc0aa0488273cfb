use serde::{Deserialize, Serialize};

/// The (department, session, semester) triple a cohort is fetched for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortKey {
    pub department_id: String,
    pub session_id: String,
    pub semester_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolDef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentDef {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "school_id")]
    pub school_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemesterDef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub semesters: Vec<SemesterDef>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReceipt {
    pub upload_id: String,
    pub file_name: String,
    pub sha256: String,
    pub size_bytes: usize,
    pub received_at: String,
    pub message: String,
}

/// Where result sheets come from. Records are returned as delivered, aliases
/// and all; normalization happens on the session side.
pub trait CohortSource {
    fn fetch_results(&self, key: &CohortKey) -> anyhow::Result<Vec<serde_json::Value>>;
}

pub trait CatalogSource {
    fn fetch_schools(&self) -> anyhow::Result<Vec<SchoolDef>>;
    /// All departments, or only those of one school.
    fn fetch_departments(&self, school_id: Option<&str>) -> anyhow::Result<Vec<DepartmentDef>>;
    fn fetch_levels(&self) -> anyhow::Result<Vec<LevelDef>>;
    fn fetch_sessions(&self) -> anyhow::Result<Vec<SessionDef>>;
}

/// Accepts one edited record. `Ok(Some(_))` carries the record as stored.
pub trait RecordSink {
    fn update_record(
        &self,
        key: &CohortKey,
        record: &serde_json::Value,
    ) -> anyhow::Result<Option<serde_json::Value>>;
}

pub trait BulkSink {
    fn ingest(&self, file_name: &str, payload: &[u8]) -> anyhow::Result<BulkReceipt>;
}

/// Catalog reads never fail the caller: a broken source reads as empty.
pub fn schools_or_empty(source: &dyn CatalogSource) -> Vec<SchoolDef> {
    match source.fetch_schools() {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "school catalog unavailable");
            Vec::new()
        }
    }
}

pub fn departments_or_empty(
    source: &dyn CatalogSource,
    school_id: Option<&str>,
) -> Vec<DepartmentDef> {
    match source.fetch_departments(school_id) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "department catalog unavailable");
            Vec::new()
        }
    }
}

pub fn levels_or_empty(source: &dyn CatalogSource) -> Vec<LevelDef> {
    match source.fetch_levels() {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "level catalog unavailable");
            Vec::new()
        }
    }
}

pub fn sessions_or_empty(source: &dyn CatalogSource) -> Vec<SessionDef> {
    match source.fetch_sessions() {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "session catalog unavailable");
            Vec::new()
        }
    }
}
