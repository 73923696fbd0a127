//! Enrollment and profile edits. Fee snapshot fields are never written here
//! directly; they go through `fees::reconcile_student`.

use chrono::{NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::catalog;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::fees;
use crate::model::{parse_date, Category, InstallmentPlan, Student, StudentProfile};
use crate::store::DataStore;

#[derive(Debug, Clone, Default)]
pub struct StudentInput {
    pub name: String,
    pub category: String,
    pub course: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub enrollment_date: Option<String>,
    pub total_fee: f64,
    pub installments: Option<i64>,
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let t = value.trim();
    if t.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(t.to_string())
}

pub fn validate_profile(input: &StudentInput) -> Result<StudentProfile, ValidationError> {
    let name = required(&input.name, "name")?;
    let email = required(&input.email, "email")?;
    let phone = required(&input.phone, "phone")?;
    let category = Category::parse(&input.category)?;
    let course_raw = required(&input.course, "course")?;
    let course = catalog::canonical_course(category, &course_raw).ok_or_else(|| {
        ValidationError::UnknownCourse {
            category: category.label().to_string(),
            course: course_raw.clone(),
        }
    })?;
    if !input.total_fee.is_finite() || input.total_fee < 0.0 {
        return Err(ValidationError::InvalidFee);
    }
    let plan = input
        .installments
        .map(|n| InstallmentPlan::new(input.total_fee, n))
        .transpose()?;
    Ok(StudentProfile {
        name,
        category,
        course,
        email,
        phone,
        address: input
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string),
        total_fee: input.total_fee,
        plan,
    })
}

pub fn enroll<S: DataStore>(store: &mut S, input: &StudentInput) -> CoreResult<Student> {
    let profile = validate_profile(input)?;
    let enrollment_date: NaiveDate = match input.enrollment_date.as_deref() {
        Some(raw) if !raw.trim().is_empty() => parse_date(raw)?,
        _ => Utc::now().date_naive(),
    };
    let snapshot = fees::FeeSnapshot::derive(profile.total_fee, 0.0);
    let student = Student {
        id: Uuid::new_v4().to_string(),
        name: profile.name,
        category: profile.category,
        course: profile.course,
        email: profile.email,
        phone: profile.phone,
        address: profile.address,
        enrollment_date,
        total_fee: profile.total_fee,
        paid_fee: 0.0,
        due_amount: snapshot.due_amount,
        fee_status: snapshot.status,
        last_payment_date: None,
        plan: profile.plan,
        active: true,
    };
    store.insert_student(&student)?;
    info!(student_id = %student.id, category = %student.category, "student enrolled");
    Ok(student)
}

/// Replaces the profile and re-derives the fee snapshot, since `total_fee`
/// may have moved.
pub fn update_profile<S: DataStore>(
    store: &mut S,
    student_id: &str,
    input: &StudentInput,
) -> CoreResult<Student> {
    let profile = validate_profile(input)?;
    let student = store.atomically(|tx| -> CoreResult<Student> {
        if !tx.update_student_profile(student_id, &profile)? {
            return Err(CoreError::unknown_student(student_id));
        }
        fees::reconcile_within(tx, student_id)
    })?;
    info!(student_id, "student profile updated");
    Ok(student)
}

pub fn set_active<S: DataStore>(store: &mut S, student_id: &str, active: bool) -> CoreResult<()> {
    if !store.set_student_active(student_id, active)? {
        return Err(CoreError::unknown_student(student_id));
    }
    info!(student_id, active, "student lifecycle changed");
    Ok(())
}
