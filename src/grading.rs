use crate::records::CourseResult;

pub const MAX_GRADE_POINT: f64 = 5.0;

/// Five-point scale used across the faculty result sheets.
/// Anything outside `A..F` (missing, lower case, withheld codes) scores 0.
pub fn grade_point(grade: Option<&str>) -> f64 {
    match grade {
        Some("A") => 5.0,
        Some("B") => 4.0,
        Some("C") => 3.0,
        Some("D") => 2.0,
        Some("E") => 1.0,
        Some("F") => 0.0,
        _ => 0.0,
    }
}

/// Running sums for one student's courses. Weights are credits divided by
/// the largest credit load present, so the sums stay finite for any finite
/// input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpaTotals {
    pub total_credits: f64,
    pub course_count: usize,
    weight: f64,
    weighted_points: f64,
}

impl GpaTotals {
    pub fn gpa(&self) -> f64 {
        if self.weight > 0.0 {
            (self.weighted_points / self.weight).clamp(0.0, MAX_GRADE_POINT)
        } else {
            0.0
        }
    }
}

pub fn gpa_totals<'a, I>(courses: I) -> GpaTotals
where
    I: IntoIterator<Item = &'a CourseResult>,
{
    let courses: Vec<&CourseResult> = courses.into_iter().collect();
    let scale = courses
        .iter()
        .map(|c| c.credit_load)
        .filter(|c| c.is_finite())
        .fold(0.0, f64::max);

    let mut totals = GpaTotals::default();
    for c in courses {
        totals.course_count += 1;
        totals.total_credits = (totals.total_credits + c.credit_load).min(f64::MAX);
        if scale > 0.0 && c.credit_load.is_finite() {
            let w = c.credit_load / scale;
            totals.weight += w;
            totals.weighted_points += grade_point(c.grade.as_deref()) * w;
        }
    }
    totals
}

/// Credit-weighted GPA, unrounded. Empty or zero-credit lists give exactly 0.
pub fn compute_gpa<'a, I>(courses: I) -> f64
where
    I: IntoIterator<Item = &'a CourseResult>,
{
    gpa_totals(courses).gpa()
}

/// Half-up rounding to two decimals, the precision the result sheet shows.
/// Representation noise below a millionth of a hundredth is cleared first so
/// that 4.495 lands on 4.50 rather than 4.49.
pub fn round2(x: f64) -> f64 {
    let scaled = ((x * 100.0) * 1e6).round() / 1e6;
    (scaled + 0.5).floor() / 100.0
}

pub fn format_gpa(x: f64) -> String {
    format!("{:.2}", round2(x))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(code: &str, grade: Option<&str>, credit_load: f64) -> CourseResult {
        CourseResult {
            code: code.to_string(),
            name: String::new(),
            grade: grade.map(|g| g.to_string()),
            credit_load,
        }
    }

    #[test]
    fn scale_is_total_and_lenient() {
        assert_eq!(grade_point(Some("A")), 5.0);
        assert_eq!(grade_point(Some("C")), 3.0);
        assert_eq!(grade_point(Some("F")), 0.0);
        assert_eq!(grade_point(Some("a")), 0.0);
        assert_eq!(grade_point(Some("AB")), 0.0);
        assert_eq!(grade_point(None), 0.0);
    }

    #[test]
    fn weighted_gpa_matches_hand_computation() {
        let courses = vec![
            course("CSC101", Some("A"), 3.0),
            course("CSC102", Some("B"), 2.0),
        ];
        let gpa = compute_gpa(&courses);
        assert!((gpa - 4.6).abs() < 1e-12);
        assert_eq!(format_gpa(gpa), "4.60");
    }

    #[test]
    fn empty_and_zero_credit_lists_are_zero() {
        assert_eq!(compute_gpa(&Vec::<CourseResult>::new()), 0.0);
        let zero_credit = vec![course("GST101", Some("A"), 0.0)];
        assert_eq!(compute_gpa(&zero_credit), 0.0);
    }

    #[test]
    fn unknown_grades_still_carry_their_credits() {
        let courses = vec![
            course("MTH101", Some("A"), 2.0),
            course("MTH102", Some("I"), 2.0),
        ];
        assert_eq!(compute_gpa(&courses), 2.5);
    }

    #[test]
    fn gpa_is_independent_of_course_order() {
        let mut courses = vec![
            course("PHY101", Some("C"), 3.0),
            course("CHM101", Some("A"), 4.0),
            course("BIO101", Some("E"), 1.0),
            course("GST111", Some("B"), 2.0),
        ];
        let forward = compute_gpa(&courses);
        courses.reverse();
        assert_eq!(compute_gpa(&courses), forward);
        courses.swap(0, 2);
        assert_eq!(compute_gpa(&courses), forward);
    }

    #[test]
    fn gpa_stays_on_scale() {
        let grades = ["A", "B", "C", "D", "E", "F"];
        for (i, g) in grades.iter().enumerate() {
            for credits in [0.0, 1.0, 2.5, 6.0] {
                let courses = vec![
                    course("X1", Some(g), credits),
                    course("X2", Some(grades[(i + 3) % 6]), credits + 1.0),
                ];
                let gpa = compute_gpa(&courses);
                assert!((0.0..=MAX_GRADE_POINT).contains(&gpa), "gpa {gpa} off scale");
            }
        }
    }

    #[test]
    fn extreme_credit_loads_stay_on_scale() {
        let huge = vec![course("X1", Some("A"), 1e308)];
        assert_eq!(compute_gpa(&huge), 5.0);
        assert_eq!(format_gpa(compute_gpa(&huge)), "5.00");

        let mixed = vec![
            course("X1", Some("A"), f64::MAX),
            course("X2", Some("F"), f64::MAX),
            course("X3", Some("B"), 1e-300),
        ];
        let totals = gpa_totals(&mixed);
        assert!(totals.total_credits.is_finite());
        assert!((totals.gpa() - 2.5).abs() < 1e-9);

        let tiny = vec![course("Y1", Some("C"), 5e-324), course("Y2", Some("A"), 5e-324)];
        assert_eq!(compute_gpa(&tiny), 4.0);
    }

    #[test]
    fn round2_is_half_up() {
        assert_eq!(round2(4.495), 4.5);
        assert_eq!(round2(4.494), 4.49);
        assert_eq!(round2(4.49), 4.49);
        assert_eq!(round2(3.005), 3.01);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(5.0), 5.0);
        assert_eq!(format_gpa(2.0 / 3.0), "0.67");
    }
}
