//! Exam result statistics and result writes.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::model::{parse_date, Category, ExamResult, Student};
use crate::store::DataStore;

/// `marks / total_marks * 100`. Callers validate `total_marks > 0` first.
pub fn percentage(marks: f64, total_marks: f64) -> f64 {
    marks / total_marks * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPerformance {
    pub student_id: String,
    pub name: String,
    pub category: Category,
    pub course: String,
    pub total_exams: usize,
    pub avg_percentage: f64,
    pub highest_percentage: f64,
    pub lowest_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub students: Vec<StudentPerformance>,
    pub overall_average: f64,
    pub top_performer: Option<StudentPerformance>,
}

fn summarize_student(student: &Student, results: &[&ExamResult]) -> StudentPerformance {
    let total_exams = results.len();
    let (avg, high, low) = if total_exams == 0 {
        (0.0, 0.0, 0.0)
    } else {
        let sum: f64 = results.iter().map(|r| r.percentage).sum();
        let high = results
            .iter()
            .map(|r| r.percentage)
            .fold(f64::NEG_INFINITY, f64::max);
        let low = results
            .iter()
            .map(|r| r.percentage)
            .fold(f64::INFINITY, f64::min);
        ((sum / total_exams as f64).round(), high, low)
    };
    StudentPerformance {
        student_id: student.id.clone(),
        name: student.name.clone(),
        category: student.category,
        course: student.course.clone(),
        total_exams,
        avg_percentage: avg,
        highest_percentage: high,
        lowest_percentage: low,
    }
}

/// One entry per roster member, in roster order. Results for students not on
/// the roster do not contribute.
pub fn summarize(roster: &[Student], results: &[ExamResult]) -> PerformanceReport {
    let mut by_student: HashMap<&str, Vec<&ExamResult>> = HashMap::new();
    for r in results {
        by_student.entry(r.student_id.as_str()).or_default().push(r);
    }

    let students: Vec<StudentPerformance> = roster
        .iter()
        .map(|s| {
            let rows = by_student.get(s.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            summarize_student(s, rows)
        })
        .collect();

    let overall_average = if students.is_empty() {
        0.0
    } else {
        (students.iter().map(|s| s.avg_percentage).sum::<f64>() / students.len() as f64).round()
    };

    let mut top_performer: Option<&StudentPerformance> = None;
    for s in &students {
        // Strictly greater keeps the first student on ties.
        if top_performer.map(|t| s.avg_percentage > t.avg_percentage).unwrap_or(true) {
            top_performer = Some(s);
        }
    }
    let top_performer = top_performer.cloned();

    PerformanceReport {
        students,
        overall_average,
        top_performer,
    }
}

/// Results narrowed by category and a case-insensitive search over student
/// name, exam name and category.
pub fn filter_results<'a>(
    results: &'a [ExamResult],
    category: Option<Category>,
    search: Option<&str>,
) -> Vec<&'a ExamResult> {
    let term = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
    results
        .iter()
        .filter(|r| category.map(|c| c == r.category).unwrap_or(true))
        .filter(|r| match term.as_deref() {
            None => true,
            Some(t) => {
                r.student_name.to_lowercase().contains(t)
                    || r.exam_name.to_lowercase().contains(t)
                    || r.category.label().to_lowercase().contains(t)
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ResultInput {
    pub student_id: String,
    pub category: Option<String>,
    pub exam_name: String,
    pub date: Option<String>,
    pub marks: f64,
    pub total_marks: f64,
    /// Accepted from clients for compatibility and always ignored.
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidResult {
    pub exam_name: String,
    pub date: NaiveDate,
    pub marks: f64,
    pub total_marks: f64,
    pub percentage: f64,
    pub category: Option<Category>,
}

pub fn validate_result(input: &ResultInput) -> Result<ValidResult, ValidationError> {
    if !input.total_marks.is_finite() || input.total_marks <= 0.0 {
        return Err(ValidationError::InvalidTotalMarks);
    }
    if !input.marks.is_finite() || input.marks < 0.0 {
        return Err(ValidationError::InvalidMarks);
    }
    let exam_name = input.exam_name.trim();
    if exam_name.is_empty() {
        return Err(ValidationError::MissingField("examName"));
    }
    let date = parse_date(input.date.as_deref().unwrap_or(""))?;
    let category = match input.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(Category::parse(raw)?),
    };
    Ok(ValidResult {
        exam_name: exam_name.to_string(),
        date,
        marks: input.marks,
        total_marks: input.total_marks,
        percentage: percentage(input.marks, input.total_marks),
        category,
    })
}

fn build_result<S: DataStore>(store: &S, id: String, input: &ResultInput) -> CoreResult<ExamResult> {
    let valid = validate_result(input).inspect_err(|e| {
        debug!(student_id = %input.student_id, error = %e, "result rejected");
    })?;
    let student_id = input.student_id.trim();
    let student = store
        .student(student_id)?
        .ok_or_else(|| CoreError::unknown_student(student_id))?;
    Ok(ExamResult {
        id,
        student_id: student.id,
        student_name: student.name,
        category: valid.category.unwrap_or(student.category),
        exam_name: valid.exam_name,
        date: valid.date,
        marks: valid.marks,
        total_marks: valid.total_marks,
        percentage: valid.percentage,
    })
}

pub fn record_result<S: DataStore>(store: &mut S, input: &ResultInput) -> CoreResult<ExamResult> {
    let result = build_result(store, Uuid::new_v4().to_string(), input)?;
    store.insert_result(&result)?;
    info!(
        result_id = %result.id,
        student_id = %result.student_id,
        percentage = result.percentage,
        "exam result recorded"
    );
    Ok(result)
}

/// Replaces every field of an existing result; the id is kept.
pub fn edit_result<S: DataStore>(
    store: &mut S,
    result_id: &str,
    input: &ResultInput,
) -> CoreResult<ExamResult> {
    if store.result(result_id)?.is_none() {
        return Err(CoreError::unknown_result(result_id));
    }
    let result = build_result(store, result_id.to_string(), input)?;
    if !store.update_result(&result)? {
        return Err(CoreError::unknown_result(result_id));
    }
    info!(result_id, percentage = result.percentage, "exam result updated");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeeStatus;

    fn student(id: &str, name: &str) -> Student {
        Student {
            id: id.to_string(),
            name: name.to_string(),
            category: Category::EntranceExam,
            course: "JEE".to_string(),
            email: String::new(),
            phone: String::new(),
            address: None,
            enrollment_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
            total_fee: 0.0,
            paid_fee: 0.0,
            due_amount: 0.0,
            fee_status: FeeStatus::Unpaid,
            last_payment_date: None,
            plan: None,
            active: true,
        }
    }

    fn result(student_id: &str, pct: f64) -> ExamResult {
        ExamResult {
            id: format!("{}-{}", student_id, pct),
            student_id: student_id.to_string(),
            student_name: student_id.to_string(),
            category: Category::EntranceExam,
            exam_name: "Physics".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"),
            marks: pct,
            total_marks: 100.0,
            percentage: pct,
        }
    }

    #[test]
    fn per_student_statistics() {
        let roster = vec![student("a", "Asha"), student("b", "Bilal")];
        let results = vec![result("a", 70.0), result("a", 85.5), result("a", 91.0)];
        let report = summarize(&roster, &results);
        let a = &report.students[0];
        assert_eq!(a.total_exams, 3);
        assert_eq!(a.avg_percentage, 82.0);
        assert_eq!(a.highest_percentage, 91.0);
        assert_eq!(a.lowest_percentage, 70.0);

        let b = &report.students[1];
        assert_eq!(b.total_exams, 0);
        assert_eq!(
            (b.avg_percentage, b.highest_percentage, b.lowest_percentage),
            (0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn overall_average_and_top_performer() {
        let roster = vec![student("a", "A"), student("b", "B"), student("c", "C")];
        let results = vec![result("a", 80.0), result("b", 60.0), result("c", 100.0)];
        let report = summarize(&roster, &results);
        assert_eq!(report.overall_average, 80.0);
        assert_eq!(
            report.top_performer.map(|t| t.student_id),
            Some("c".to_string())
        );
    }

    #[test]
    fn top_performer_keeps_first_on_ties() {
        let roster = vec![student("a", "A"), student("b", "B")];
        let results = vec![result("a", 90.0), result("b", 90.0)];
        let report = summarize(&roster, &results);
        assert_eq!(
            report.top_performer.map(|t| t.student_id),
            Some("a".to_string())
        );
        assert!(summarize(&[], &results).top_performer.is_none());
    }

    #[test]
    fn percentage_is_computed_not_trusted() {
        let input = ResultInput {
            student_id: "a".to_string(),
            category: None,
            exam_name: "Chemistry".to_string(),
            date: Some("2024-03-02".to_string()),
            marks: 45.0,
            total_marks: 50.0,
            percentage: Some(12.0),
        };
        let valid = validate_result(&input).expect("valid");
        assert_eq!(valid.percentage, 90.0);
    }

    #[test]
    fn validation_rejects_bad_marks() {
        let base = ResultInput {
            student_id: "a".to_string(),
            category: None,
            exam_name: "Chemistry".to_string(),
            date: Some("2024-03-02".to_string()),
            marks: 10.0,
            total_marks: 50.0,
            percentage: None,
        };
        let zero_total = ResultInput {
            total_marks: 0.0,
            ..base.clone()
        };
        assert_eq!(
            validate_result(&zero_total),
            Err(ValidationError::InvalidTotalMarks)
        );
        let negative = ResultInput {
            marks: -1.0,
            ..base.clone()
        };
        assert_eq!(validate_result(&negative), Err(ValidationError::InvalidMarks));
        let blank = ResultInput {
            exam_name: "  ".to_string(),
            ..base
        };
        assert_eq!(
            validate_result(&blank),
            Err(ValidationError::MissingField("examName"))
        );
    }

    #[test]
    fn filter_by_category_and_search() {
        let mut other = result("b", 50.0);
        other.category = Category::School;
        other.exam_name = "Maths".to_string();
        let results = vec![result("a", 70.0), other];
        assert_eq!(filter_results(&results, Some(Category::School), None).len(), 1);
        assert_eq!(filter_results(&results, None, Some("PHYS")).len(), 1);
        assert_eq!(filter_results(&results, None, Some("  ")).len(), 2);
    }
}
