use crate::filters::{self, FilterError, FilterState, GpaBand, PAGE_SIZE_OPTIONS, PRESET_BANDS};
use crate::grading;
use crate::reconcile::{reconcile, Reconciled};
use crate::records::Student;
use crate::schema::{self, CourseColumn};
use crate::source::{CohortKey, CohortSource};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct SessionError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SessionError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<FilterError> for SessionError {
    fn from(e: FilterError) -> Self {
        Self {
            code: e.code,
            message: e.message,
            details: e.details,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub department_id: Option<String>,
    pub session_id: Option<String>,
    pub semester_id: Option<String>,
}

impl Selection {
    /// Complete triple, or `None` while any part is still unselected.
    pub fn cohort_key(&self) -> Option<CohortKey> {
        Some(CohortKey {
            department_id: self.department_id.clone()?,
            session_id: self.session_id.clone()?,
            semester_id: self.semester_id.clone()?,
        })
    }
}

/// Fields present in a `selection.set` call. The outer `None` means "not
/// mentioned", `Some(None)` clears.
#[derive(Debug, Clone, Default)]
pub struct SelectionPatch {
    pub department_id: Option<Option<String>>,
    pub session_id: Option<Option<String>>,
    pub semester_id: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct Cohort {
    pub key: CohortKey,
    pub students: Vec<Student>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub key: CohortKey,
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Loaded(Vec<serde_json::Value>),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchReport {
    pub generation: u64,
    pub applied: bool,
    pub stale: bool,
    pub shown: bool,
    pub student_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditReport {
    pub matched: bool,
    pub index: Option<usize>,
    pub key: Option<String>,
    pub gpa: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BandView {
    pub min: f64,
    pub max: f64,
    pub label: String,
}

impl From<GpaBand> for BandView {
    fn from(b: GpaBand) -> Self {
        Self {
            min: grading::round2(b.min),
            max: grading::round2(b.max),
            label: b.label(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub key: Option<String>,
    pub matric: Option<String>,
    pub name: Option<String>,
    pub level: Option<String>,
    pub cells: Vec<String>,
    pub course_count: usize,
    pub total_credits: f64,
    pub gpa: f64,
    pub gpa_display: String,
}

impl ResultRow {
    fn build(student: &Student, columns: &[CourseColumn]) -> Self {
        let totals = grading::gpa_totals(&student.courses);
        Self {
            key: student.identity_key().map(str::to_string),
            matric: student.matric_or_mat_no().map(str::to_string),
            name: student.name.clone(),
            level: student.level.clone(),
            cells: schema::row_cells(student, columns)
                .iter()
                .map(schema::Cell::display)
                .collect(),
            course_count: totals.course_count,
            total_credits: totals.total_credits,
            gpa: student.gpa,
            gpa_display: grading::format_gpa(student.gpa),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    pub shown: bool,
    pub busy: bool,
    pub generation: u64,
    pub selection: Selection,
    pub department_name: Option<String>,
    pub fetched_at: Option<String>,
    pub level_tabs: Vec<String>,
    pub level_tab: usize,
    pub band: BandView,
    pub band_presets: Vec<BandView>,
    pub search: String,
    pub total_students: usize,
    pub filtered_count: usize,
    pub page: usize,
    pub requested_page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub page_size_options: Vec<usize>,
    pub columns: Vec<CourseColumn>,
    pub rows: Vec<ResultRow>,
}

/// State behind one results screen: the current cohort, what the user has
/// narrowed it to, and the fetch currently in flight.
#[derive(Debug)]
pub struct ReviewSession {
    selection: Selection,
    cohort: Option<Cohort>,
    shown: bool,
    filters: FilterState,
    catalog_levels: Vec<String>,
    generation: u64,
    in_flight: Option<FetchTicket>,
}

impl ReviewSession {
    pub fn new(page_size: usize) -> Self {
        Self {
            selection: Selection::default(),
            cohort: None,
            shown: false,
            filters: FilterState::new(page_size),
            catalog_levels: Vec::new(),
            generation: 0,
            in_flight: None,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn cohort(&self) -> Option<&Cohort> {
        self.cohort.as_ref()
    }

    pub fn busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn students(&self) -> &[Student] {
        self.cohort
            .as_ref()
            .map(|c| c.students.as_slice())
            .unwrap_or(&[])
    }

    /// Applies a selection change. Picking another session clears the
    /// semester unless one is supplied alongside it. Any change supersedes
    /// the fetch in flight.
    pub fn select(&mut self, patch: SelectionPatch) -> bool {
        let before = self.selection.clone();
        if let Some(v) = patch.department_id {
            self.selection.department_id = v;
        }
        if let Some(v) = patch.session_id {
            if v != self.selection.session_id {
                self.selection.semester_id = None;
            }
            self.selection.session_id = v;
        }
        if let Some(v) = patch.semester_id {
            self.selection.semester_id = v;
        }

        let changed = before != self.selection;
        if changed {
            self.generation += 1;
            if let Some(t) = self.in_flight.take() {
                info!(
                    superseded = t.generation,
                    generation = self.generation,
                    "selection changed; in-flight fetch will be discarded"
                );
            }
        }
        changed
    }

    pub fn begin_fetch(&mut self) -> Result<FetchTicket, SessionError> {
        let Some(key) = self.selection.cohort_key() else {
            return Err(SessionError::new(
                "invalid_selection",
                "select a department, session and semester first",
            ));
        };
        if let Some(t) = &self.in_flight {
            let mut e = SessionError::new("busy", "a results fetch is already in progress");
            e.details = Some(serde_json::json!({ "generation": t.generation }));
            return Err(e);
        }
        self.generation += 1;
        let ticket = FetchTicket {
            generation: self.generation,
            key,
        };
        info!(
            generation = ticket.generation,
            department = %ticket.key.department_id,
            session = %ticket.key.session_id,
            semester = %ticket.key.semester_id,
            "results fetch started"
        );
        self.in_flight = Some(ticket.clone());
        Ok(ticket)
    }

    /// Lands a fetch result. Anything but the outstanding ticket is stale and
    /// leaves the cohort alone.
    pub fn complete_fetch(&mut self, generation: u64, outcome: FetchOutcome) -> FetchReport {
        let ticket = match self.in_flight.take() {
            Some(t) if t.generation == generation => t,
            other => {
                self.in_flight = other;
                warn!(generation, latest = self.generation, "discarding stale results");
                return FetchReport {
                    generation,
                    applied: false,
                    stale: true,
                    shown: self.shown,
                    student_count: self.students().len(),
                    notice: None,
                };
            }
        };

        match outcome {
            FetchOutcome::Loaded(raw) => {
                let students: Vec<Student> = raw.iter().map(Student::from_raw).collect();
                let count = students.len();
                info!(generation, students = count, "results fetch applied");
                self.cohort = Some(Cohort {
                    key: ticket.key,
                    students,
                    fetched_at: Utc::now(),
                });
                self.shown = true;
                FetchReport {
                    generation,
                    applied: true,
                    stale: false,
                    shown: true,
                    student_count: count,
                    notice: None,
                }
            }
            FetchOutcome::Failed(reason) => {
                warn!(generation, %reason, "results fetch failed");
                self.cohort = None;
                self.shown = false;
                FetchReport {
                    generation,
                    applied: true,
                    stale: false,
                    shown: false,
                    student_count: 0,
                    notice: Some(Notice::new(Severity::Error, "Could not fetch results")),
                }
            }
        }
    }

    pub fn fetch(&mut self, source: &dyn CohortSource) -> Result<FetchReport, SessionError> {
        let ticket = self.begin_fetch()?;
        let outcome = match source.fetch_results(&ticket.key) {
            Ok(raw) => FetchOutcome::Loaded(raw),
            Err(e) => FetchOutcome::Failed(format!("{e:#}")),
        };
        Ok(self.complete_fetch(ticket.generation, outcome))
    }

    pub fn set_levels(&mut self, labels: Vec<String>) {
        self.catalog_levels = labels;
    }

    pub fn set_level_tab(&mut self, tab: usize) {
        self.filters.set_level_tab(tab);
    }

    pub fn set_band(&mut self, band: GpaBand) {
        self.filters.set_band(band);
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.filters.set_search(text);
    }

    pub fn set_page(&mut self, page: usize) {
        self.filters.set_page(page);
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), SessionError> {
        Ok(self.filters.set_page_size(page_size)?)
    }

    pub fn student(&self, key: &str) -> Option<&Student> {
        self.students()
            .iter()
            .find(|s| s.identity_key() == Some(key))
    }

    /// Folds an edited record back into the cohort. Unknown keys are ignored.
    pub fn apply_edit(&mut self, record: &serde_json::Value) -> EditReport {
        let edited = Student::from_raw(record);
        let key = edited.identity_key().map(str::to_string);
        let gpa = edited.gpa;
        let outcome = match self.cohort.as_mut() {
            Some(c) => reconcile(&mut c.students, edited),
            None => Reconciled::Unmatched,
        };
        match outcome {
            Reconciled::Replaced { index } => {
                info!(key = key.as_deref().unwrap_or(""), index, "edit reconciled")
            }
            Reconciled::Unmatched => {
                debug!(key = key.as_deref().unwrap_or(""), "edit matched no cohort record")
            }
        }
        EditReport {
            matched: outcome.matched(),
            index: match outcome {
                Reconciled::Replaced { index } => Some(index),
                Reconciled::Unmatched => None,
            },
            key,
            gpa,
        }
    }

    pub fn view(&self) -> ResultsView {
        let students = self.students();
        let labels = filters::level_labels(&self.catalog_levels, students);
        let filtered = filters::apply_filters(students, &labels, &self.filters);
        let filtered_count = filtered.len();
        let page_size = self.filters.page_size;
        let page = filters::effective_page(filtered_count, self.filters.page, page_size);

        let (columns, rows) = if self.shown {
            let visible = filters::paginate(&filtered, page, page_size);
            let columns = schema::derive_columns(visible.iter().copied());
            let rows = visible
                .iter()
                .map(|s| ResultRow::build(s, &columns))
                .collect();
            (columns, rows)
        } else {
            (Vec::new(), Vec::new())
        };

        ResultsView {
            shown: self.shown,
            busy: self.busy(),
            generation: self.generation,
            selection: self.selection.clone(),
            department_name: students.first().and_then(|s| s.department_name.clone()),
            fetched_at: self
                .cohort
                .as_ref()
                .map(|c| c.fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            level_tabs: labels,
            level_tab: self.filters.level_tab,
            band: self.filters.band.into(),
            band_presets: PRESET_BANDS.iter().copied().map(BandView::from).collect(),
            search: self.filters.search.clone(),
            total_students: students.len(),
            filtered_count,
            page,
            requested_page: self.filters.page,
            page_size,
            page_count: filters::page_count(filtered_count, page_size),
            page_size_options: PAGE_SIZE_OPTIONS.to_vec(),
            columns,
            rows,
        }
    }
}
