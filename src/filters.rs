use crate::grading::{round2, MAX_GRADE_POINT};
use crate::records::Student;
use serde::Serialize;
use std::collections::BTreeSet;

pub const PAGE_SIZE_OPTIONS: [usize; 3] = [10, 25, 50];

#[derive(Debug, Clone, Serialize)]
pub struct FilterError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl FilterError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Inclusive GPA range, compared at two-decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GpaBand {
    pub min: f64,
    pub max: f64,
}

pub const PRESET_BANDS: [GpaBand; 6] = [
    GpaBand::ALL,
    GpaBand { min: 4.5, max: 5.0 },
    GpaBand { min: 3.5, max: 4.49 },
    GpaBand { min: 2.5, max: 3.49 },
    GpaBand { min: 2.0, max: 2.49 },
    GpaBand { min: 0.0, max: 1.99 },
];

impl GpaBand {
    pub const ALL: GpaBand = GpaBand {
        min: 0.0,
        max: MAX_GRADE_POINT,
    };

    pub fn new(min: f64, max: f64) -> Result<Self, FilterError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(FilterError::new("bad_params", "band bounds must be numbers"));
        }
        if min < 0.0 || max > MAX_GRADE_POINT || min > max {
            return Err(
                FilterError::new("bad_params", "band must satisfy 0 <= min <= max <= 5")
                    .with_details(serde_json::json!({ "min": min, "max": max })),
            );
        }
        Ok(Self { min, max })
    }

    /// Parses the selector form `"3.50-4.49"`; `"all"` is the full scale.
    pub fn parse(raw: &str) -> Result<Self, FilterError> {
        let t = raw.trim();
        if t.eq_ignore_ascii_case("all") {
            return Ok(Self::ALL);
        }
        let Some((lo, hi)) = t.split_once('-') else {
            return Err(FilterError::new(
                "bad_params",
                "band must look like \"min-max\" or \"all\"",
            ));
        };
        let (Ok(min), Ok(max)) = (lo.trim().parse::<f64>(), hi.trim().parse::<f64>()) else {
            return Err(FilterError::new(
                "bad_params",
                format!("band bounds are not numbers: {t}"),
            ));
        };
        Self::new(min, max)
    }

    pub fn contains(&self, gpa: f64) -> bool {
        let g = round2(gpa);
        g >= round2(self.min) && g <= round2(self.max)
    }

    pub fn is_all(&self) -> bool {
        round2(self.min) == 0.0 && round2(self.max) == MAX_GRADE_POINT
    }

    pub fn label(&self) -> String {
        if self.is_all() {
            "All".to_string()
        } else {
            format!("{:.2} - {:.2}", round2(self.min), round2(self.max))
        }
    }
}

/// User-controlled narrowing of the cohort.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub level_tab: usize,
    pub band: GpaBand,
    pub search: String,
    pub page: usize,
    pub page_size: usize,
}

impl FilterState {
    pub fn new(page_size: usize) -> Self {
        Self {
            level_tab: 0,
            band: GpaBand::ALL,
            search: String::new(),
            page: 0,
            page_size: page_size.max(1),
        }
    }

    /// Switching to another level tab starts again from the first page;
    /// re-selecting the current tab keeps it.
    pub fn set_level_tab(&mut self, tab: usize) {
        if tab != self.level_tab {
            self.level_tab = tab;
            self.page = 0;
        }
    }

    /// Page indices do not carry over between page sizes.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), FilterError> {
        if page_size == 0 {
            return Err(FilterError::new("bad_params", "pageSize must be at least 1"));
        }
        self.page_size = page_size;
        self.page = 0;
        Ok(())
    }

    // Band and search changes keep the current page; the view clamps it.
    pub fn set_band(&mut self, band: GpaBand) {
        self.band = band;
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }
}

/// Tab collecting students whose record carries no level.
pub const NO_LEVEL_TAB: &str = "No level";

/// Tabs come from the level catalog; without one, from the levels present
/// in the cohort, sorted. A trailing [`NO_LEVEL_TAB`] is added whenever some
/// student has no level, so every record is reachable from some tab.
pub fn level_labels(catalog: &[String], students: &[Student]) -> Vec<String> {
    let mut labels: Vec<String> = if catalog.is_empty() {
        students
            .iter()
            .filter_map(|s| s.level.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        catalog.to_vec()
    };
    let any_levelless = students.iter().any(|s| s.level.is_none());
    // A cohort with no levels at all gets no tabs; the level stage is then off.
    if any_levelless && !labels.is_empty() && !labels.iter().any(|l| l == NO_LEVEL_TAB) {
        labels.push(NO_LEVEL_TAB.to_string());
    }
    labels
}

pub fn matches_level(student: &Student, labels: &[String], tab: usize) -> bool {
    if labels.is_empty() {
        return true;
    }
    match (labels.get(tab), student.level.as_deref()) {
        (None, _) => false,
        (Some(label), None) => label == NO_LEVEL_TAB,
        (Some(label), Some(level)) => level == label,
    }
}

pub fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

pub fn matches_search(student: &Student, needle_lower: &str) -> bool {
    if needle_lower.is_empty() {
        return true;
    }
    student
        .matric_or_mat_no()
        .map(|m| contains_ci(m, needle_lower))
        .unwrap_or(false)
        || student
            .name
            .as_deref()
            .map(|n| contains_ci(n, needle_lower))
            .unwrap_or(false)
}

/// Level tab, then GPA band, then search. Input order is preserved.
pub fn apply_filters<'a>(
    students: &'a [Student],
    labels: &[String],
    state: &FilterState,
) -> Vec<&'a Student> {
    let needle = state.search.to_lowercase();
    students
        .iter()
        .filter(|s| matches_level(s, labels, state.level_tab))
        .filter(|s| state.band.contains(s.gpa))
        .filter(|s| matches_search(s, &needle))
        .collect()
}

pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    let start = page.saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

pub fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// Last page that still has rows when the filtered count shrank under the
/// stored page; page 0 when nothing matches.
pub fn effective_page(total: usize, page: usize, page_size: usize) -> usize {
    let pages = page_count(total, page_size);
    if pages == 0 {
        0
    } else {
        page.min(pages - 1)
    }
}
