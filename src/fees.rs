//! Fee reconciliation against the payment ledger.
//!
//! The ledger is the source of truth: a student's cached `paid_fee` is only
//! ever the sum of their `Completed` payments, recomputed after each write.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::model::{parse_date, FeeFields, FeeStatus, Payment, PaymentStatus, Student};
use crate::store::DataStore;

pub const DEFAULT_PAYMENT_METHOD: &str = "Cash";

/// Classification from the cached pair alone.
pub fn fee_status(total_fee: f64, paid_fee: f64) -> FeeStatus {
    if total_fee > 0.0 && paid_fee >= total_fee {
        FeeStatus::Paid
    } else if paid_fee > 0.0 && paid_fee < total_fee {
        FeeStatus::Partial
    } else {
        FeeStatus::Unpaid
    }
}

/// Outstanding amount, floored at zero.
pub fn due_amount(total_fee: f64, paid_fee: f64) -> f64 {
    (total_fee - paid_fee).max(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSnapshot {
    pub total_fee: f64,
    pub paid_fee: f64,
    pub due_amount: f64,
    pub status: FeeStatus,
    /// `paid_fee - total_fee` when positive. Kept for audit, never hidden.
    pub overpaid: f64,
}

impl FeeSnapshot {
    pub fn derive(total_fee: f64, paid_fee: f64) -> Self {
        FeeSnapshot {
            total_fee,
            paid_fee,
            due_amount: due_amount(total_fee, paid_fee),
            status: fee_status(total_fee, paid_fee),
            overpaid: (paid_fee - total_fee).max(0.0),
        }
    }

    pub fn is_overpaid(&self) -> bool {
        self.overpaid > 0.0
    }
}

/// Sum of `Completed` payments and the latest of their dates.
pub fn ledger_totals(ledger: &[Payment]) -> (f64, Option<NaiveDate>) {
    ledger
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .fold((0.0, None), |(sum, last), p| {
            let last = match last {
                Some(d) if d >= p.payment_date => Some(d),
                _ => Some(p.payment_date),
            };
            (sum + p.amount, last)
        })
}

/// Field set to persist on the student row for the given ledger.
pub fn reconcile(total_fee: f64, ledger: &[Payment]) -> FeeFields {
    let (paid_fee, last_payment_date) = ledger_totals(ledger);
    FeeFields {
        paid_fee,
        due_amount: due_amount(total_fee, paid_fee),
        fee_status: fee_status(total_fee, paid_fee),
        last_payment_date,
    }
}

#[derive(Debug, Clone)]
pub struct PaymentInput {
    pub student_id: String,
    pub amount: f64,
    pub date: Option<String>,
    pub method: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidPayment {
    pub amount: f64,
    pub date: NaiveDate,
}

pub fn validate_payment(input: &PaymentInput) -> Result<ValidPayment, ValidationError> {
    if !input.amount.is_finite() || input.amount <= 0.0 {
        return Err(ValidationError::InvalidAmount);
    }
    let date = parse_date(input.date.as_deref().unwrap_or(""))?;
    Ok(ValidPayment {
        amount: input.amount,
        date,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub payment_id: String,
    pub paid_fee: f64,
    pub due_amount: f64,
    pub status: FeeStatus,
    pub overpaid: f64,
    pub persisted: FeeFields,
}

/// Appends a payment and rewrites the student's fee snapshot from the full
/// ledger, both inside one unit of work.
pub fn record_payment<S: DataStore>(store: &mut S, input: &PaymentInput) -> CoreResult<PaymentOutcome> {
    let valid = validate_payment(input).inspect_err(|e| {
        debug!(student_id = %input.student_id, error = %e, "payment rejected");
    })?;
    let student_id = input.student_id.trim();
    if student_id.is_empty() {
        return Err(ValidationError::MissingField("studentId").into());
    }

    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        amount: valid.amount,
        payment_date: valid.date,
        payment_method: input
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_PAYMENT_METHOD)
            .to_string(),
        status: PaymentStatus::Completed,
        description: input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        created_at: Utc::now().to_rfc3339(),
    };

    let outcome = store.atomically(|tx| -> CoreResult<PaymentOutcome> {
        let student = tx
            .student(student_id)?
            .ok_or_else(|| CoreError::unknown_student(student_id))?;
        tx.insert_payment(&payment)?;
        // Re-read after the insert so concurrent payments are summed, not overwritten.
        let ledger = tx.payments_for(student_id)?;
        let fields = reconcile(student.total_fee, &ledger);
        if !tx.update_student_fees(student_id, &fields)? {
            return Err(CoreError::unknown_student(student_id));
        }
        Ok(PaymentOutcome {
            payment_id: payment.id.clone(),
            paid_fee: fields.paid_fee,
            due_amount: fields.due_amount,
            status: fields.fee_status,
            overpaid: FeeSnapshot::derive(student.total_fee, fields.paid_fee).overpaid,
            persisted: fields,
        })
    })?;

    info!(
        student_id,
        amount = valid.amount,
        paid_fee = outcome.paid_fee,
        status = outcome.status.as_str(),
        "payment recorded"
    );
    if outcome.overpaid > 0.0 {
        warn!(
            student_id,
            overpaid = outcome.overpaid,
            "payment takes the student above their total fee"
        );
    }
    Ok(outcome)
}

/// Rebuilds one student's cached fee fields from the ledger.
pub fn reconcile_student<S: DataStore>(store: &mut S, student_id: &str) -> CoreResult<Student> {
    store.atomically(|tx| reconcile_within(tx, student_id))
}

/// Reconciliation step for callers already inside `atomically`.
pub(crate) fn reconcile_within<S: DataStore>(tx: &mut S, student_id: &str) -> CoreResult<Student> {
    let mut student = tx
        .student(student_id)?
        .ok_or_else(|| CoreError::unknown_student(student_id))?;
    let ledger = tx.payments_for(student_id)?;
    let fields = reconcile(student.total_fee, &ledger);
    if !tx.update_student_fees(student_id, &fields)? {
        return Err(CoreError::unknown_student(student_id));
    }
    if fields.paid_fee > student.total_fee {
        warn!(
            student_id,
            paid_fee = fields.paid_fee,
            total_fee = student.total_fee,
            "ledger exceeds total fee"
        );
    }
    student.paid_fee = fields.paid_fee;
    student.due_amount = fields.due_amount;
    student.fee_status = fields.fee_status;
    student.last_payment_date = fields.last_payment_date;
    Ok(student)
}

/// Ledger for one student, newest first.
pub fn payment_history<S: DataStore>(store: &S, student_id: &str) -> CoreResult<Vec<Payment>> {
    if store.student(student_id)?.is_none() {
        return Err(CoreError::unknown_student(student_id));
    }
    let mut ledger = store.payments_for(student_id)?;
    ledger.sort_by(|a, b| {
        b.payment_date
            .cmp(&a.payment_date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    Ok(ledger)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRow {
    pub student_id: String,
    pub name: String,
    pub category: String,
    pub course: String,
    #[serde(flatten)]
    pub snapshot: FeeSnapshot,
    pub last_payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeOverview {
    pub rows: Vec<FeeRow>,
    pub total_fees: f64,
    pub total_collected: f64,
    pub total_pending: f64,
    pub collected_percent: u32,
    pub pending_percent: u32,
    pub overpaid_count: usize,
}

fn share(part: f64, whole: f64) -> u32 {
    if whole > 0.0 {
        ((part / whole) * 100.0).round() as u32
    } else {
        0
    }
}

/// Fee table plus totals. `status` narrows rows after the status is derived,
/// so a stale cached `fee_status` on a row does not hide it.
pub fn overview(students: &[Student], status: Option<FeeStatus>) -> FeeOverview {
    let rows: Vec<FeeRow> = students
        .iter()
        .map(|s| FeeRow {
            student_id: s.id.clone(),
            name: s.name.clone(),
            category: s.category.label().to_string(),
            course: s.course.clone(),
            snapshot: FeeSnapshot::derive(s.total_fee, s.paid_fee),
            last_payment_date: s.last_payment_date,
        })
        .filter(|r| status.map(|st| st == r.snapshot.status).unwrap_or(true))
        .collect();

    let total_fees: f64 = rows.iter().map(|r| r.snapshot.total_fee).sum();
    let total_collected: f64 = rows.iter().map(|r| r.snapshot.paid_fee).sum();
    let total_pending: f64 = rows.iter().map(|r| r.snapshot.due_amount).sum();
    let overpaid_count = rows.iter().filter(|r| r.snapshot.is_overpaid()).count();
    if overpaid_count > 0 {
        warn!(overpaid_count, "students with payments above their total fee");
    }

    FeeOverview {
        collected_percent: share(total_collected, total_fees),
        pending_percent: share(total_pending, total_fees),
        rows,
        total_fees,
        total_collected,
        total_pending,
        overpaid_count,
    }
}
