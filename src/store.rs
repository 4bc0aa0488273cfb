use crate::records::Student;
use crate::source::{
    BulkReceipt, BulkSink, CatalogSource, CohortKey, CohortSource, DepartmentDef, LevelDef,
    RecordSink, SchoolDef, SemesterDef, SessionDef,
};
use anyhow::{anyhow, bail, Context};
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogImport {
    #[serde(default)]
    pub schools: Vec<SchoolDef>,
    #[serde(default)]
    pub departments: Vec<DepartmentDef>,
    #[serde(default)]
    pub levels: Vec<LevelDef>,
    #[serde(default)]
    pub sessions: Vec<SessionDef>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCounts {
    pub schools: usize,
    pub departments: usize,
    pub levels: usize,
    pub sessions: usize,
    pub semesters: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub course_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub key: String,
    pub id: Option<String>,
    pub matric: Option<String>,
    pub mat_no: Option<String>,
    pub name: Option<String>,
    pub level: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub department_id: String,
    pub department_name: Option<String>,
}

/// Roster fields entered on the students page. Course results never travel
/// through here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentProfile {
    pub matric: Option<String>,
    pub mat_no: Option<String>,
    pub name: Option<String>,
    pub department_id: Option<String>,
    pub level: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

impl StudentProfile {
    /// Roster key for a new student: matric, else matNo.
    pub fn key(&self) -> Option<&str> {
        self.matric.as_deref().or(self.mat_no.as_deref())
    }
}

const ROSTER_SELECT: &str = "SELECT s.key, s.id, s.matric, s.mat_no, s.student_name, s.level,
        s.email, s.username, s.department_id, d.name
     FROM students s
     LEFT JOIN departments d ON d.id = s.department_id";

fn roster_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RosterEntry> {
    Ok(RosterEntry {
        key: r.get(0)?,
        id: r.get(1)?,
        matric: r.get(2)?,
        mat_no: r.get(3)?,
        name: r.get(4)?,
        level: r.get(5)?,
        email: r.get(6)?,
        username: r.get(7)?,
        department_id: r.get(8)?,
        department_name: r.get(9)?,
    })
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Workspace-backed implementation of the result collaborators.
pub struct Store<'a> {
    conn: &'a Connection,
}

impl<'a> Store<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn import_catalog(&self, catalog: &CatalogImport) -> anyhow::Result<CatalogCounts> {
        let tx = self.conn.unchecked_transaction()?;
        for sc in &catalog.schools {
            tx.execute(
                "INSERT INTO schools(id, name) VALUES(?, ?)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                (&sc.id, &sc.name),
            )
            .context("failed to write school")?;
        }
        for d in &catalog.departments {
            tx.execute(
                "INSERT INTO departments(id, name, school_id) VALUES(?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   school_id = COALESCE(excluded.school_id, departments.school_id)",
                (&d.id, &d.name, d.school_id.as_deref()),
            )
            .context("failed to write department")?;
        }
        for (i, l) in catalog.levels.iter().enumerate() {
            tx.execute(
                "INSERT INTO levels(id, name, sort_order) VALUES(?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   sort_order = excluded.sort_order",
                (&l.id, &l.name, i as i64),
            )
            .context("failed to write level")?;
        }
        let mut semesters = 0;
        for (i, s) in catalog.sessions.iter().enumerate() {
            tx.execute(
                "INSERT INTO sessions(id, name, sort_order) VALUES(?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   sort_order = excluded.sort_order",
                (&s.id, &s.name, i as i64),
            )
            .context("failed to write session")?;
            for (j, sem) in s.semesters.iter().enumerate() {
                tx.execute(
                    "INSERT INTO semesters(id, session_id, name, sort_order) VALUES(?, ?, ?, ?)
                     ON CONFLICT(id) DO UPDATE SET
                       session_id = excluded.session_id,
                       name = excluded.name,
                       sort_order = excluded.sort_order",
                    (&sem.id, &s.id, &sem.name, j as i64),
                )
                .context("failed to write semester")?;
                semesters += 1;
            }
        }
        tx.commit()?;
        Ok(CatalogCounts {
            schools: catalog.schools.len(),
            departments: catalog.departments.len(),
            levels: catalog.levels.len(),
            sessions: catalog.sessions.len(),
            semesters,
        })
    }

    /// Stores raw result records for one term. Students are upserted by
    /// identity key and their course rows for that term replaced; records
    /// without any key are skipped.
    pub fn import_results(
        &self,
        key: &CohortKey,
        records: &[serde_json::Value],
    ) -> anyhow::Result<ImportSummary> {
        let tx = self.conn.unchecked_transaction()?;
        let mut imported = 0;
        let mut skipped = 0;
        let mut course_rows = 0;
        for raw in records {
            let student = Student::from_raw(raw);
            let Some(identity) = student.identity_key() else {
                skipped += 1;
                continue;
            };
            course_rows += write_student(&tx, key, &student, identity)?;
            imported += 1;
        }
        tx.commit()?;
        info!(
            department = %key.department_id,
            session = %key.session_id,
            semester = %key.semester_id,
            imported,
            skipped,
            "results imported"
        );
        Ok(ImportSummary {
            imported,
            skipped,
            course_rows,
        })
    }

    pub fn list_students(
        &self,
        department_id: &str,
        level: Option<&str>,
    ) -> anyhow::Result<Vec<RosterEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ROSTER_SELECT}
             WHERE s.department_id = ?1 AND (?2 IS NULL OR s.level = ?2)
             ORDER BY COALESCE(s.matric, s.mat_no, s.key)"
        ))?;
        let rows = stmt
            .query_map((department_id, level), roster_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }

    pub fn roster_entry(&self, key: &str) -> anyhow::Result<Option<RosterEntry>> {
        let entry = self
            .conn
            .query_row(&format!("{ROSTER_SELECT} WHERE s.key = ?"), [key], roster_row)
            .optional()?;
        Ok(entry)
    }

    pub fn department_exists(&self, department_id: &str) -> anyhow::Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM departments WHERE id = ?",
                [department_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Adds a student to the roster. The caller checks the key is free and
    /// the department exists.
    pub fn create_student(&self, profile: &StudentProfile) -> anyhow::Result<RosterEntry> {
        let Some(key) = profile.key() else {
            bail!("student needs a matric or matNo");
        };
        let Some(department_id) = profile.department_id.as_deref() else {
            bail!("student needs a department");
        };
        self.conn
            .execute(
                "INSERT INTO students(
                   key, id, matric, mat_no, student_name, department_id, level,
                   email, username, updated_at
                 ) VALUES(?, NULL, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    key,
                    profile.matric.as_deref(),
                    profile.mat_no.as_deref(),
                    profile.name.as_deref(),
                    department_id,
                    profile.level.as_deref(),
                    profile.email.as_deref(),
                    profile.username.as_deref(),
                    now_rfc3339(),
                ),
            )
            .with_context(|| format!("failed to create student {key}"))?;
        info!(key, department = department_id, "student created");
        self.roster_entry(key)?
            .ok_or_else(|| anyhow!("student {key} missing after insert"))
    }

    /// Applies the fields present in `changes`; absent fields keep their
    /// stored value. `Ok(None)` when no student has `key`.
    pub fn update_student(
        &self,
        key: &str,
        changes: &StudentProfile,
    ) -> anyhow::Result<Option<RosterEntry>> {
        let n = self
            .conn
            .execute(
                "UPDATE students SET
                   matric = COALESCE(?, matric),
                   mat_no = COALESCE(?, mat_no),
                   student_name = COALESCE(?, student_name),
                   department_id = COALESCE(?, department_id),
                   level = COALESCE(?, level),
                   email = COALESCE(?, email),
                   username = COALESCE(?, username),
                   updated_at = ?
                 WHERE key = ?",
                (
                    changes.matric.as_deref(),
                    changes.mat_no.as_deref(),
                    changes.name.as_deref(),
                    changes.department_id.as_deref(),
                    changes.level.as_deref(),
                    changes.email.as_deref(),
                    changes.username.as_deref(),
                    now_rfc3339(),
                    key,
                ),
            )
            .with_context(|| format!("failed to update student {key}"))?;
        if n == 0 {
            return Ok(None);
        }
        info!(key, "student updated");
        self.roster_entry(key)
    }
}

fn write_student(
    conn: &Connection,
    key: &CohortKey,
    student: &Student,
    identity: &str,
) -> anyhow::Result<usize> {
    let department_name = student
        .department_name
        .clone()
        .unwrap_or_else(|| key.department_id.clone());
    conn.execute(
        "INSERT INTO departments(id, name) VALUES(?, ?) ON CONFLICT(id) DO NOTHING",
        (&key.department_id, &department_name),
    )
    .context("failed to ensure department")?;

    conn.execute(
        "INSERT INTO students(key, id, matric, mat_no, student_name, department_id, level, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET
           id = excluded.id,
           matric = excluded.matric,
           mat_no = excluded.mat_no,
           student_name = excluded.student_name,
           department_id = excluded.department_id,
           level = excluded.level,
           updated_at = excluded.updated_at",
        (
            identity,
            student.id.as_deref(),
            student.matric.as_deref(),
            student.mat_no.as_deref(),
            student.name.as_deref(),
            &key.department_id,
            student.level.as_deref(),
            now_rfc3339(),
        ),
    )
    .with_context(|| format!("failed to write student {identity}"))?;

    conn.execute(
        "DELETE FROM course_results
         WHERE student_key = ? AND session_id = ? AND semester_id = ?",
        (identity, &key.session_id, &key.semester_id),
    )?;
    for (i, c) in student.courses.iter().enumerate() {
        conn.execute(
            "INSERT INTO course_results(
               id, student_key, session_id, semester_id, code, name, grade, credit_load, sort_order
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                identity,
                &key.session_id,
                &key.semester_id,
                &c.code,
                &c.name,
                c.grade.as_deref(),
                c.credit_load,
                i as i64,
            ),
        )
        .with_context(|| format!("failed to write course {} for {identity}", c.code))?;
    }
    Ok(student.courses.len())
}

impl CohortSource for Store<'_> {
    fn fetch_results(&self, key: &CohortKey) -> anyhow::Result<Vec<serde_json::Value>> {
        let mut courses_stmt = self.conn.prepare(
            "SELECT c.student_key, c.code, c.name, c.grade, c.credit_load
             FROM course_results c
             JOIN students s ON s.key = c.student_key
             WHERE s.department_id = ? AND c.session_id = ? AND c.semester_id = ?
             ORDER BY c.student_key, c.sort_order",
        )?;
        let course_rows = courses_stmt
            .query_map(
                (&key.department_id, &key.session_id, &key.semester_id),
                |r| {
                    let student_key: String = r.get(0)?;
                    let code: String = r.get(1)?;
                    let name: String = r.get(2)?;
                    let grade: Option<String> = r.get(3)?;
                    let credit_load: f64 = r.get(4)?;
                    Ok((student_key, code, name, grade, credit_load))
                },
            )
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        let mut courses_by_student: HashMap<String, Vec<serde_json::Value>> = HashMap::new();
        for (student_key, code, name, grade, credit_load) in course_rows {
            courses_by_student.entry(student_key).or_default().push(json!({
                "code": code,
                "name": name,
                "grade": grade,
                "credit_load": credit_load,
            }));
        }

        let mut students_stmt = self.conn.prepare(
            "SELECT s.key, s.id, s.matric, s.mat_no, s.student_name, s.level, d.name
             FROM students s
             LEFT JOIN departments d ON d.id = s.department_id
             WHERE s.department_id = ?
             ORDER BY COALESCE(s.matric, s.mat_no, s.key)",
        )?;
        let student_rows = students_stmt
            .query_map([&key.department_id], |r| {
                let student_key: String = r.get(0)?;
                let id: Option<String> = r.get(1)?;
                let matric: Option<String> = r.get(2)?;
                let mat_no: Option<String> = r.get(3)?;
                let name: Option<String> = r.get(4)?;
                let level: Option<String> = r.get(5)?;
                let department_name: Option<String> = r.get(6)?;
                Ok((student_key, id, matric, mat_no, name, level, department_name))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

        // Shape mirrors the results endpoint the admin pages were built against.
        let mut out = Vec::new();
        for (student_key, id, matric, mat_no, name, level, department_name) in student_rows {
            let Some(courses) = courses_by_student.remove(&student_key) else {
                continue;
            };
            out.push(json!({
                "id": id,
                "matric": matric,
                "matNo": mat_no,
                "student_name": name,
                "department_name": department_name,
                "level": level,
                "courses_info": courses,
            }));
        }
        Ok(out)
    }
}

impl CatalogSource for Store<'_> {
    fn fetch_schools(&self) -> anyhow::Result<Vec<SchoolDef>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM schools ORDER BY name")?;
        let schools = stmt
            .query_map([], |r| {
                Ok(SchoolDef {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(schools)
    }

    fn fetch_departments(&self, school_id: Option<&str>) -> anyhow::Result<Vec<DepartmentDef>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, school_id FROM departments
             WHERE ?1 IS NULL OR school_id = ?1
             ORDER BY name",
        )?;
        let departments = stmt
            .query_map([school_id], |r| {
                Ok(DepartmentDef {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    school_id: r.get(2)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(departments)
    }

    fn fetch_levels(&self) -> anyhow::Result<Vec<LevelDef>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM levels ORDER BY sort_order, name")?;
        let levels = stmt
            .query_map([], |r| {
                Ok(LevelDef {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(levels)
    }

    fn fetch_sessions(&self) -> anyhow::Result<Vec<SessionDef>> {
        let mut sem_stmt = self.conn.prepare(
            "SELECT session_id, id, name FROM semesters ORDER BY session_id, sort_order",
        )?;
        let sem_rows = sem_stmt
            .query_map([], |r| {
                let session_id: String = r.get(0)?;
                Ok((
                    session_id,
                    SemesterDef {
                        id: r.get(1)?,
                        name: r.get(2)?,
                    },
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        let mut by_session: HashMap<String, Vec<SemesterDef>> = HashMap::new();
        for (session_id, sem) in sem_rows {
            by_session.entry(session_id).or_default().push(sem);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM sessions ORDER BY sort_order, name")?;
        let sessions = stmt
            .query_map([], |r| {
                let id: String = r.get(0)?;
                let name: String = r.get(1)?;
                Ok((id, name))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?
            .into_iter()
            .map(|(id, name)| SessionDef {
                semesters: by_session.remove(&id).unwrap_or_default(),
                id,
                name,
            })
            .collect();
        Ok(sessions)
    }
}

impl RecordSink for Store<'_> {
    fn update_record(
        &self,
        key: &CohortKey,
        record: &serde_json::Value,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        let student = Student::from_raw(record);
        let Some(identity) = student.identity_key() else {
            bail!("record has no id, matric or matNo");
        };
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM students WHERE key = ?", [identity], |r| {
                r.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(anyhow!("student {identity} not found"));
        }

        let tx = self.conn.unchecked_transaction()?;
        write_student(&tx, key, &student, identity)?;
        tx.commit()?;
        Ok(Some(serde_json::to_value(&student)?))
    }
}

impl BulkSink for Store<'_> {
    fn ingest(&self, file_name: &str, payload: &[u8]) -> anyhow::Result<BulkReceipt> {
        if payload.is_empty() {
            bail!("upload {file_name} is empty");
        }
        let sha256: String = Sha256::digest(payload)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let upload_id = Uuid::new_v4().to_string();
        let received_at = now_rfc3339();
        self.conn
            .execute(
                "INSERT INTO bulk_uploads(id, file_name, sha256, size_bytes, payload, received_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (
                    &upload_id,
                    file_name,
                    &sha256,
                    payload.len() as i64,
                    payload,
                    &received_at,
                ),
            )
            .context("failed to store upload")?;
        info!(%upload_id, file_name, bytes = payload.len(), "bulk upload stored");
        Ok(BulkReceipt {
            upload_id,
            file_name: file_name.to_string(),
            sha256,
            size_bytes: payload.len(),
            received_at,
            message: "Bulk upload successful!".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_conn(prefix: &str) -> Connection {
        let dir = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        db::open_db(&dir).expect("open db")
    }

    fn term() -> CohortKey {
        CohortKey {
            department_id: "csc".into(),
            session_id: "2023-2024".into(),
            semester_id: "first".into(),
        }
    }

    #[test]
    fn imported_results_come_back_in_endpoint_shape() {
        let conn = temp_conn("resultsd-store-fetch");
        let store = Store::new(&conn);
        let summary = store
            .import_results(
                &term(),
                &[
                    json!({
                        "matric": "CSC/002",
                        "student_name": "Bola",
                        "department_name": "Computer Science",
                        "level": "100",
                        "courses_info": [
                            { "code": "CSC101", "name": "Intro", "grade": "B", "credit_load": 3 }
                        ]
                    }),
                    json!({
                        "matNo": "CSC/001",
                        "name": "Ada",
                        "Level": 200,
                        "courses_info": [
                            { "code": "CSC201", "name": "Systems", "grade": "A", "credit_load": 2 },
                            { "code": "CSC202", "name": "Networks", "credit_load": 2 }
                        ]
                    }),
                    json!({ "student_name": "No key" }),
                ],
            )
            .expect("import");
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.course_rows, 3);

        let raw = store.fetch_results(&term()).expect("fetch");
        assert_eq!(raw.len(), 2);
        let first = Student::from_raw(&raw[0]);
        assert_eq!(first.mat_no.as_deref(), Some("CSC/001"));
        assert_eq!(first.level.as_deref(), Some("200"));
        assert_eq!(first.courses.len(), 2);
        assert_eq!(first.courses[1].grade, None);
        assert_eq!(first.gpa, 2.5);
        assert_eq!(raw[1]["department_name"], json!("Computer Science"));

        let other_term = CohortKey {
            semester_id: "second".into(),
            ..term()
        };
        assert!(store.fetch_results(&other_term).expect("fetch").is_empty());
    }

    #[test]
    fn catalog_round_trips_in_order() {
        let conn = temp_conn("resultsd-store-catalog");
        let store = Store::new(&conn);
        let catalog: CatalogImport = serde_json::from_value(json!({
            "departments": [{ "id": "csc", "name": "Computer Science" }],
            "levels": [{ "id": "l1", "name": "100" }, { "id": "l2", "name": "200" }],
            "sessions": [
                { "id": "s1", "name": "2023/2024", "semesters": [
                    { "id": "s1-1", "name": "First" }, { "id": "s1-2", "name": "Second" }
                ]},
                { "id": "s2", "name": "2024/2025" }
            ]
        }))
        .expect("catalog json");
        let counts = store.import_catalog(&catalog).expect("import");
        assert_eq!(counts.semesters, 2);

        let levels: Vec<String> = store
            .fetch_levels()
            .expect("levels")
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(levels, vec!["100", "200"]);
        let sessions = store.fetch_sessions().expect("sessions");
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].semesters[1].name, "Second");
        assert!(sessions[1].semesters.is_empty());
    }

    #[test]
    fn roster_create_and_partial_update() {
        let conn = temp_conn("resultsd-store-roster");
        let store = Store::new(&conn);
        let catalog: CatalogImport = serde_json::from_value(json!({
            "schools": [{ "id": "sci", "name": "Science" }, { "id": "eng", "name": "Engineering" }],
            "departments": [
                { "id": "csc", "name": "Computer Science", "schoolId": "sci" },
                { "id": "eee", "name": "Electrical", "school_id": "eng" }
            ]
        }))
        .expect("catalog json");
        store.import_catalog(&catalog).expect("import");
        assert!(store.department_exists("csc").expect("exists"));
        assert!(!store.department_exists("law").expect("exists"));
        let sci: Vec<String> = store
            .fetch_departments(Some("sci"))
            .expect("departments")
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(sci, vec!["csc"]);
        assert_eq!(store.fetch_departments(None).expect("departments").len(), 2);
        assert_eq!(store.fetch_schools().expect("schools")[0].name, "Engineering");

        let created = store
            .create_student(&StudentProfile {
                matric: Some("CSC/100".into()),
                name: Some("Ada Obi".into()),
                department_id: Some("csc".into()),
                level: Some("100".into()),
                email: Some("ada@example.edu".into()),
                ..Default::default()
            })
            .expect("create");
        assert_eq!(created.key, "CSC/100");
        assert_eq!(created.department_name.as_deref(), Some("Computer Science"));
        assert!(store
            .create_student(&StudentProfile {
                matric: Some("CSC/100".into()),
                department_id: Some("csc".into()),
                ..Default::default()
            })
            .is_err());

        let updated = store
            .update_student(
                "CSC/100",
                &StudentProfile {
                    level: Some("200".into()),
                    ..Default::default()
                },
            )
            .expect("update")
            .expect("found");
        assert_eq!(updated.level.as_deref(), Some("200"));
        assert_eq!(updated.name.as_deref(), Some("Ada Obi"));
        assert_eq!(updated.email.as_deref(), Some("ada@example.edu"));
        assert!(store
            .update_student("CSC/404", &StudentProfile::default())
            .expect("update")
            .is_none());
    }

    #[test]
    fn record_updates_require_a_known_student() {
        let conn = temp_conn("resultsd-store-update");
        let store = Store::new(&conn);
        store
            .import_results(
                &term(),
                &[json!({
                    "matric": "CSC/010",
                    "courses_info": [{ "code": "CSC101", "grade": "F", "credit_load": 3 }]
                })],
            )
            .expect("import");

        let stored = store
            .update_record(
                &term(),
                &json!({
                    "matric": "CSC/010",
                    "courses": [{ "code": "CSC101", "grade": "A", "creditLoad": 3 }]
                }),
            )
            .expect("update")
            .expect("stored record");
        assert_eq!(stored["gpa"], json!(5.0));
        let raw = store.fetch_results(&term()).expect("fetch");
        assert_eq!(raw[0]["courses_info"][0]["grade"], json!("A"));

        assert!(store
            .update_record(&term(), &json!({ "matric": "CSC/404" }))
            .is_err());
        assert!(store.update_record(&term(), &json!({})).is_err());
    }

    #[test]
    fn bulk_ingest_keeps_payload_opaque() {
        let conn = temp_conn("resultsd-store-bulk");
        let store = Store::new(&conn);
        let receipt = store.ingest("students.csv", b"abc").expect("ingest");
        assert_eq!(
            receipt.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(receipt.size_bytes, 3);
        let stored: Vec<u8> = conn
            .query_row(
                "SELECT payload FROM bulk_uploads WHERE id = ?",
                [&receipt.upload_id],
                |r| r.get(0),
            )
            .expect("payload");
        assert_eq!(stored, b"abc");
        assert!(store.ingest("empty.csv", b"").is_err());
    }
}
