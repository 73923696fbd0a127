//! Typed rows for every entity the daemon persists.
//!
//! Rows coming back from a store are validated into these shapes at the
//! boundary; nothing downstream sees an untyped map.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(ValidationError::MissingDate);
    }
    NaiveDate::parse_from_str(t, DATE_FORMAT).map_err(|_| ValidationError::InvalidDate(t.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    School,
    #[serde(rename = "Junior College")]
    JuniorCollege,
    Diploma,
    Degree,
    #[serde(rename = "Entrance Exams")]
    EntranceExam,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::School,
        Category::JuniorCollege,
        Category::Diploma,
        Category::Degree,
        Category::EntranceExam,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::School => "School",
            Category::JuniorCollege => "Junior College",
            Category::Diploma => "Diploma",
            Category::Degree => "Degree",
            Category::EntranceExam => "Entrance Exams",
        }
    }

    /// Accepts the display label or a compact spelling, case-insensitively.
    pub fn parse(raw: &str) -> Result<Category, ValidationError> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "school" => Ok(Category::School),
            "juniorcollege" => Ok(Category::JuniorCollege),
            "diploma" => Ok(Category::Diploma),
            "degree" => Ok(Category::Degree),
            "entranceexam" | "entranceexams" => Ok(Category::EntranceExam),
            _ => Err(ValidationError::UnknownCategory(raw.trim().to_string())),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeStatus {
    Paid,
    Partial,
    Unpaid,
}

impl FeeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FeeStatus::Paid => "Paid",
            FeeStatus::Partial => "Partial",
            FeeStatus::Unpaid => "Unpaid",
        }
    }

    pub fn parse(raw: &str) -> Result<FeeStatus, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paid" => Ok(FeeStatus::Paid),
            "partial" => Ok(FeeStatus::Partial),
            "unpaid" => Ok(FeeStatus::Unpaid),
            _ => Err(ValidationError::UnknownStatus(raw.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPlan {
    pub installments: u32,
    pub installment_amt: f64,
}

impl InstallmentPlan {
    pub const MAX_INSTALLMENTS: i64 = 24;

    pub fn new(total_fee: f64, installments: i64) -> Result<InstallmentPlan, ValidationError> {
        if !(1..=Self::MAX_INSTALLMENTS).contains(&installments) {
            return Err(ValidationError::InvalidInstallments(installments));
        }
        Ok(InstallmentPlan {
            installments: installments as u32,
            installment_amt: total_fee / installments as f64,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub course: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub enrollment_date: NaiveDate,
    pub total_fee: f64,
    pub paid_fee: f64,
    pub due_amount: f64,
    pub fee_status: FeeStatus,
    pub last_payment_date: Option<NaiveDate>,
    pub plan: Option<InstallmentPlan>,
    pub active: bool,
}

/// Editable profile fields; fee snapshot fields are owned by reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentProfile {
    pub name: String,
    pub category: Category,
    pub course: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub total_fee: f64,
    pub plan: Option<InstallmentPlan>,
}

/// The cached fee snapshot written back onto a student row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeFields {
    pub paid_fee: f64,
    pub due_amount: f64,
    pub fee_status: FeeStatus,
    pub last_payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub category: Option<Category>,
    pub fee_status: Option<FeeStatus>,
    pub search: Option<String>,
    pub include_inactive: bool,
}

impl StudentFilter {
    pub fn active_only() -> Self {
        Self::default()
    }

    pub fn matches(&self, s: &Student) -> bool {
        if !self.include_inactive && !s.active {
            return false;
        }
        if self.category.map(|c| c != s.category).unwrap_or(false) {
            return false;
        }
        if self.fee_status.map(|f| f != s.fee_status).unwrap_or(false) {
            return false;
        }
        if let Some(term) = self.search.as_deref() {
            let term = term.trim().to_lowercase();
            if !term.is_empty()
                && !s.name.to_lowercase().contains(&term)
                && !s.id.to_lowercase().contains(&term)
                && !s.category.label().to_lowercase().contains(&term)
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    /// A stored label this build does not recognise; kept verbatim.
    Other(String),
}

impl AttendanceStatus {
    pub fn from_label(raw: &str) -> AttendanceStatus {
        let t = raw.trim();
        if t.eq_ignore_ascii_case("present") {
            AttendanceStatus::Present
        } else if t.eq_ignore_ascii_case("absent") {
            AttendanceStatus::Absent
        } else if t.eq_ignore_ascii_case("late") {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Other(t.to_string())
        }
    }

    /// Parses a status submitted for recording. Only the three known labels
    /// are accepted; stored rows go through [`AttendanceStatus::from_label`].
    pub fn parse(raw: &str) -> Result<AttendanceStatus, ValidationError> {
        match AttendanceStatus::from_label(raw) {
            AttendanceStatus::Other(label) => Err(ValidationError::InvalidAttendanceStatus(label)),
            known => Ok(known),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Other(s) => s.as_str(),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, AttendanceStatus::Present)
    }
}

impl Serialize for AttendanceStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for AttendanceStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(AttendanceStatus::from_label(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub student_ids: Option<Vec<String>>,
}

impl AttendanceFilter {
    pub fn matches(&self, m: &AttendanceMark) -> bool {
        if self.from.map(|d| m.date < d).unwrap_or(false) {
            return false;
        }
        if self.to.map(|d| m.date > d).unwrap_or(false) {
            return false;
        }
        match &self.student_ids {
            Some(ids) => ids.iter().any(|id| id == &m.student_id),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PaymentStatus {
    Completed,
    Pending,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }

    pub fn parse(raw: &str) -> Option<PaymentStatus> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" => Some(PaymentStatus::Completed),
            "pending" => Some(PaymentStatus::Pending),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub student_id: String,
    pub amount: f64,
    pub payment_date: NaiveDate,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub category: Category,
    pub exam_name: String,
    pub date: NaiveDate,
    pub marks: f64,
    pub total_marks: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    pub categories: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_accepts_labels_and_compact_forms() {
        assert_eq!(Category::parse("Junior College"), Ok(Category::JuniorCollege));
        assert_eq!(Category::parse("junior_college"), Ok(Category::JuniorCollege));
        assert_eq!(Category::parse("ENTRANCE EXAMS"), Ok(Category::EntranceExam));
        assert!(Category::parse("Kindergarten").is_err());
    }

    #[test]
    fn attendance_status_keeps_unknown_labels() {
        assert_eq!(AttendanceStatus::from_label(" PRESENT "), AttendanceStatus::Present);
        assert_eq!(AttendanceStatus::from_label("late"), AttendanceStatus::Late);
        let other = AttendanceStatus::from_label("Excused");
        assert_eq!(other.label(), "Excused");
        assert!(!other.is_present());
        assert_eq!(AttendanceStatus::from_label("").label(), "");
    }

    #[test]
    fn attendance_status_parse_rejects_unknown_labels() {
        assert_eq!(AttendanceStatus::parse(" absent"), Ok(AttendanceStatus::Absent));
        assert_eq!(AttendanceStatus::parse("LATE"), Ok(AttendanceStatus::Late));
        assert_eq!(
            AttendanceStatus::parse("banana"),
            Err(ValidationError::InvalidAttendanceStatus("banana".to_string()))
        );
        let err = AttendanceStatus::parse("  ").expect_err("blank label");
        assert_eq!(err.code(), "bad_params");
    }

    #[test]
    fn installment_plan_bounds() {
        let plan = InstallmentPlan::new(12000.0, 4).expect("plan");
        assert_eq!(plan.installment_amt, 3000.0);
        assert_eq!(
            InstallmentPlan::new(1000.0, 0),
            Err(ValidationError::InvalidInstallments(0))
        );
        assert_eq!(
            InstallmentPlan::new(1000.0, 25),
            Err(ValidationError::InvalidInstallments(25))
        );
    }

    #[test]
    fn parse_date_distinguishes_missing_and_malformed() {
        assert_eq!(parse_date("  "), Err(ValidationError::MissingDate));
        assert!(matches!(parse_date("12/05/2024"), Err(ValidationError::InvalidDate(_))));
        assert_eq!(
            parse_date("2024-05-12").map(format_date),
            Ok("2024-05-12".to_string())
        );
    }
}
