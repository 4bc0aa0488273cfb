use crate::records::{CourseResult, Student};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Marker rendered where a student has no entry for a column's course.
pub const NOT_TAKEN: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseColumn {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell<'a> {
    Taken(&'a CourseResult),
    NotTaken,
}

impl Cell<'_> {
    pub fn display(&self) -> String {
        match self {
            Cell::Taken(c) => c.grade.clone().unwrap_or_default(),
            Cell::NotTaken => NOT_TAKEN.to_string(),
        }
    }
}

/// One column per distinct course code among `students`, first name seen
/// wins, ordered by code. Codeless entries get no column.
pub fn derive_columns<'a, I>(students: I) -> Vec<CourseColumn>
where
    I: IntoIterator<Item = &'a Student>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut columns: Vec<CourseColumn> = Vec::new();
    for s in students {
        for c in &s.courses {
            if c.code.is_empty() || !seen.insert(c.code.as_str()) {
                continue;
            }
            columns.push(CourseColumn {
                code: c.code.clone(),
                name: c.name.clone(),
            });
        }
    }
    columns.sort_by(|a, b| a.code.cmp(&b.code));
    columns
}

/// Cells aligned with `columns`. A repeated code within one student is
/// resolved to its last entry.
pub fn row_cells<'a>(student: &'a Student, columns: &[CourseColumn]) -> Vec<Cell<'a>> {
    let mut by_code: HashMap<&str, &CourseResult> = HashMap::new();
    for c in &student.courses {
        by_code.insert(c.code.as_str(), c);
    }
    columns
        .iter()
        .map(|col| match by_code.get(col.code.as_str()).copied() {
            Some(c) => Cell::Taken(c),
            None => Cell::NotTaken,
        })
        .collect()
}
