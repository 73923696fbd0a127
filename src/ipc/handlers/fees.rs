use crate::error::CoreError;
use crate::fees::{self, PaymentInput};
use crate::ipc::helpers::{
    get_f64_or_nan, get_opt_category, get_opt_str, get_required_str, respond, store_mut, to_json,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{FeeStatus, StudentFilter};
use crate::store::DataStore;
use serde_json::json;
use tracing::info;

fn handle_fees_overview(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let status = match get_opt_str(&req.params, "status").as_deref().map(str::trim) {
        None | Some("") => None,
        Some(v) if v.eq_ignore_ascii_case("all") => None,
        Some(v) => Some(FeeStatus::parse(v)?),
    };
    let filter = StudentFilter {
        category: get_opt_category(&req.params, "category")?,
        search: get_opt_str(&req.params, "search"),
        ..StudentFilter::active_only()
    };
    let store = store_mut(state)?;
    let roster = store.students(&filter).map_err(CoreError::from)?;
    to_json(&fees::overview(&roster, status))
}

fn handle_fees_record_payment(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let input = PaymentInput {
        student_id: get_required_str(&req.params, "studentId")?,
        amount: get_f64_or_nan(&req.params, "amount"),
        date: get_opt_str(&req.params, "date"),
        method: get_opt_str(&req.params, "method"),
        description: get_opt_str(&req.params, "description"),
    };
    let store = store_mut(state)?;
    let outcome = fees::record_payment(store, &input)?;
    to_json(&outcome)
}

fn handle_fees_history(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let store = store_mut(state)?;
    let ledger = fees::payment_history(&*store, &student_id)?;
    Ok(json!({
        "studentId": student_id,
        "payments": to_json(&ledger)?,
    }))
}

/// With `studentId`, rebuilds that student's snapshot; without it, every
/// student's, each in its own unit of work.
fn handle_fees_reconcile(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_opt_str(&req.params, "studentId").filter(|s| !s.trim().is_empty());
    let store = store_mut(state)?;

    if let Some(student_id) = student_id {
        let student = fees::reconcile_student(store, &student_id)?;
        return Ok(json!({ "student": to_json(&student)? }));
    }

    let roster = store
        .students(&StudentFilter {
            include_inactive: true,
            ..StudentFilter::default()
        })
        .map_err(CoreError::from)?;
    let mut changed = 0usize;
    for before in &roster {
        let after = fees::reconcile_student(&mut *store, &before.id)?;
        if after.paid_fee != before.paid_fee
            || after.fee_status != before.fee_status
            || after.last_payment_date != before.last_payment_date
        {
            changed += 1;
        }
    }
    info!(students = roster.len(), changed, "fee snapshots reconciled");
    Ok(json!({ "reconciled": roster.len(), "changed": changed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fees.overview" => Some(respond(req, handle_fees_overview(state, req))),
        "fees.recordPayment" => Some(respond(req, handle_fees_record_payment(state, req))),
        "fees.history" => Some(respond(req, handle_fees_history(state, req))),
        "fees.reconcile" => Some(respond(req, handle_fees_reconcile(state, req))),
        _ => None,
    }
}
