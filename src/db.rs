use anyhow::Context;
use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "results.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schools(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS departments(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            school_id TEXT,
            FOREIGN KEY(school_id) REFERENCES schools(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_departments_school ON departments(school_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS levels(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS semesters(
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(session_id) REFERENCES sessions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_semesters_session ON semesters(session_id)",
        [],
    )?;

    // `key` is the identity key the engine matches on (id, matric or matNo).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            key TEXT PRIMARY KEY,
            id TEXT,
            matric TEXT,
            mat_no TEXT,
            student_name TEXT,
            department_id TEXT NOT NULL,
            level TEXT,
            email TEXT,
            username TEXT,
            updated_at TEXT,
            FOREIGN KEY(department_id) REFERENCES departments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_department ON students(department_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_results(
            id TEXT PRIMARY KEY,
            student_key TEXT NOT NULL,
            session_id TEXT NOT NULL,
            semester_id TEXT NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            grade TEXT,
            credit_load REAL NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(student_key) REFERENCES students(key)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_results_term
         ON course_results(session_id, semester_id, student_key)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bulk_uploads(
            id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            sha256 TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            payload BLOB NOT NULL,
            received_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}
