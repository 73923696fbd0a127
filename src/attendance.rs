//! Attendance roll-ups and marking-session batches.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::model::{AttendanceMark, AttendanceStatus, Category, Student};

/// Status assumed for a roster member with no mark on a day inside a
/// reporting window.
pub const DEFAULT_MISSING_STATUS: AttendanceStatus = AttendanceStatus::Absent;

/// Status given to a roster member not explicitly selected in a session.
pub const DEFAULT_SESSION_STATUS: AttendanceStatus = AttendanceStatus::Present;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub present_count: usize,
    pub total_count: usize,
    pub percentage: u32,
}

impl AttendanceSummary {
    fn add(&mut self, status: &AttendanceStatus) {
        self.total_count += 1;
        if status.is_present() {
            self.present_count += 1;
        }
    }

    fn finish(mut self) -> Self {
        self.percentage = percent(self.present_count, self.total_count);
        self
    }
}

/// `round(part / whole * 100)`, 0 when `whole` is 0.
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

/// Groups marks by `key`; a mark whose key is `None` is left out.
pub fn summarize<'a, K, I, F>(marks: I, mut key: F) -> BTreeMap<K, AttendanceSummary>
where
    K: Ord,
    I: IntoIterator<Item = &'a AttendanceMark>,
    F: FnMut(&AttendanceMark) -> Option<K>,
{
    let mut groups: BTreeMap<K, AttendanceSummary> = BTreeMap::new();
    for mark in marks {
        let Some(k) = key(mark) else { continue };
        groups.entry(k).or_default().add(&mark.status);
    }
    groups.into_iter().map(|(k, s)| (k, s.finish())).collect()
}

pub fn summarize_by_student(marks: &[AttendanceMark]) -> BTreeMap<String, AttendanceSummary> {
    summarize(marks, |m| Some(m.student_id.clone()))
}

/// Category comes from the roster; marks for students not on it are skipped.
pub fn summarize_by_category(
    marks: &[AttendanceMark],
    roster: &[Student],
) -> BTreeMap<Category, AttendanceSummary> {
    let categories: HashMap<&str, Category> =
        roster.iter().map(|s| (s.id.as_str(), s.category)).collect();
    let mut orphaned = 0usize;
    let out = summarize(marks, |m| {
        let c = categories.get(m.student_id.as_str()).copied();
        if c.is_none() {
            orphaned += 1;
        }
        c
    });
    if orphaned > 0 {
        debug!(orphaned, "attendance marks without a roster entry were skipped");
    }
    out
}

/// Builds the upsert batch for one marking session: one row per roster member
/// in scope, `Present` unless `selections` says otherwise.
pub fn build_session(
    roster: &[Student],
    date: NaiveDate,
    selections: &HashMap<String, AttendanceStatus>,
    category: Option<Category>,
) -> Vec<AttendanceMark> {
    roster
        .iter()
        .filter(|s| category.map(|c| c == s.category).unwrap_or(true))
        .map(|s| AttendanceMark {
            student_id: s.id.clone(),
            date,
            status: selections
                .get(&s.id)
                .cloned()
                .unwrap_or(DEFAULT_SESSION_STATUS),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    pub student_id: String,
    pub name: String,
    /// One status per requested date, in the same order.
    pub statuses: Vec<AttendanceStatus>,
}

/// Dates × roster view. Cells without a stored mark read as Absent.
pub fn grid(roster: &[Student], dates: &[NaiveDate], marks: &[AttendanceMark]) -> Vec<GridRow> {
    let by_key: HashMap<(&str, NaiveDate), &AttendanceStatus> = marks
        .iter()
        .map(|m| ((m.student_id.as_str(), m.date), &m.status))
        .collect();
    roster
        .iter()
        .map(|s| GridRow {
            student_id: s.id.clone(),
            name: s.name.clone(),
            statuses: dates
                .iter()
                .map(|d| {
                    by_key
                        .get(&(s.id.as_str(), *d))
                        .map(|st| (*st).clone())
                        .unwrap_or(DEFAULT_MISSING_STATUS)
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRow {
    pub student_id: String,
    pub name: String,
    pub category: Category,
    #[serde(flatten)]
    pub summary: AttendanceSummary,
    pub defaulted_absences: usize,
}

/// Per-student roll-up over `[from, to]` where every day without a mark
/// counts as an absence. Days before a student's enrollment are not counted.
pub fn window_report(
    roster: &[Student],
    from: NaiveDate,
    to: NaiveDate,
    marks: &[AttendanceMark],
) -> Vec<WindowRow> {
    let days: Vec<NaiveDate> = from.iter_days().take_while(|d| *d <= to).collect();
    let rows = grid(roster, &days, marks);
    let recorded: std::collections::HashSet<(&str, NaiveDate)> = marks
        .iter()
        .map(|m| (m.student_id.as_str(), m.date))
        .collect();

    roster
        .iter()
        .zip(rows)
        .map(|(student, row)| {
            let mut summary = AttendanceSummary::default();
            let mut defaulted = 0usize;
            for (day, status) in days.iter().zip(row.statuses.iter()) {
                if *day < student.enrollment_date {
                    continue;
                }
                if !recorded.contains(&(student.id.as_str(), *day)) {
                    defaulted += 1;
                }
                summary.add(status);
            }
            WindowRow {
                student_id: student.id.clone(),
                name: student.name.clone(),
                category: student.category,
                summary: summary.finish(),
                defaulted_absences: defaulted,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeeStatus, Student};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).expect("date")
    }

    fn student(id: &str, category: Category) -> Student {
        Student {
            id: id.to_string(),
            name: format!("Student {}", id),
            category,
            course: "Science".to_string(),
            email: String::new(),
            phone: String::new(),
            address: None,
            enrollment_date: d(1),
            total_fee: 0.0,
            paid_fee: 0.0,
            due_amount: 0.0,
            fee_status: FeeStatus::Unpaid,
            last_payment_date: None,
            plan: None,
            active: true,
        }
    }

    fn mark(id: &str, day: u32, status: &str) -> AttendanceMark {
        AttendanceMark {
            student_id: id.to_string(),
            date: d(day),
            status: AttendanceStatus::from_label(status),
        }
    }

    #[test]
    fn present_matches_case_insensitively_and_other_labels_count_toward_total() {
        let marks = vec![
            mark("a", 1, "PRESENT"),
            mark("a", 2, "present"),
            mark("a", 3, "Late"),
            mark("a", 4, ""),
        ];
        let by_student = summarize_by_student(&marks);
        let a = by_student["a"];
        assert_eq!(a.present_count, 2);
        assert_eq!(a.total_count, 4);
        assert_eq!(a.percentage, 50);
    }

    #[test]
    fn percentages_stay_in_bounds() {
        let marks = vec![
            mark("a", 1, "Present"),
            mark("b", 1, "Absent"),
            mark("b", 2, "Present"),
            mark("b", 3, "Absent"),
        ];
        for s in summarize_by_student(&marks).values() {
            assert!(s.present_count <= s.total_count);
            assert!(s.percentage <= 100);
        }
        assert_eq!(summarize_by_student(&marks)["b"].percentage, 33);
    }

    #[test]
    fn zero_total_is_zero_percent() {
        assert_eq!(percent(0, 0), 0);
        assert!(summarize_by_student(&[]).is_empty());
    }

    #[test]
    fn category_grouping_uses_roster_and_skips_unknown_students() {
        let roster = vec![student("a", Category::School), student("b", Category::Degree)];
        let marks = vec![
            mark("a", 1, "Present"),
            mark("a", 2, "Absent"),
            mark("b", 1, "Present"),
            mark("ghost", 1, "Present"),
        ];
        let by_cat = summarize_by_category(&marks, &roster);
        assert_eq!(by_cat.len(), 2);
        assert_eq!(by_cat[&Category::School].percentage, 50);
        assert_eq!(by_cat[&Category::Degree].percentage, 100);
    }

    #[test]
    fn session_defaults_to_present_and_honours_overrides_and_category() {
        let roster = vec![
            student("a", Category::School),
            student("b", Category::School),
            student("c", Category::Diploma),
        ];
        let mut sel = HashMap::new();
        sel.insert("b".to_string(), AttendanceStatus::Absent);

        let all = build_session(&roster, d(5), &sel, None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].status, AttendanceStatus::Present);
        assert_eq!(all[1].status, AttendanceStatus::Absent);
        assert!(all.iter().all(|m| m.date == d(5)));

        let school = build_session(&roster, d(5), &sel, Some(Category::School));
        assert_eq!(school.len(), 2);
        assert!(school.iter().all(|m| m.student_id != "c"));
    }

    #[test]
    fn empty_roster_builds_empty_batch() {
        assert!(build_session(&[], d(1), &HashMap::new(), None).is_empty());
    }

    #[test]
    fn grid_and_window_default_missing_days_to_absent() {
        let roster = vec![student("a", Category::School)];
        let marks = vec![mark("a", 1, "Present"), mark("a", 3, "Present")];
        let g = grid(&roster, &[d(1), d(2), d(3)], &marks);
        assert_eq!(
            g[0].statuses,
            vec![
                AttendanceStatus::Present,
                AttendanceStatus::Absent,
                AttendanceStatus::Present
            ]
        );

        let w = window_report(&roster, d(1), d(4), &marks);
        assert_eq!(w[0].summary.total_count, 4);
        assert_eq!(w[0].summary.present_count, 2);
        assert_eq!(w[0].summary.percentage, 50);
        assert_eq!(w[0].defaulted_absences, 2);
    }

    #[test]
    fn window_skips_days_before_enrollment() {
        let mut late_joiner = student("a", Category::School);
        late_joiner.enrollment_date = d(3);
        let w = window_report(&[late_joiner], d(1), d(4), &[mark("a", 3, "Present")]);
        assert_eq!(w[0].summary.total_count, 2);
        assert_eq!(w[0].summary.percentage, 50);
    }
}
