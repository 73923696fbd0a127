use crate::ipc::helpers::{
    get_f64_or_nan, get_opt_bool, get_opt_category, get_opt_i64, get_opt_str, get_required_str,
    respond, store_mut, to_json, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::error::CoreError;
use crate::model::{FeeStatus, StudentFilter};
use crate::store::DataStore;
use crate::students::{self, StudentInput};
use serde_json::json;

fn student_input(params: &serde_json::Value) -> Result<StudentInput, HandlerErr> {
    Ok(StudentInput {
        name: get_opt_str(params, "name").unwrap_or_default(),
        category: get_opt_str(params, "category").unwrap_or_default(),
        course: get_opt_str(params, "course").unwrap_or_default(),
        email: get_opt_str(params, "email").unwrap_or_default(),
        phone: get_opt_str(params, "phone").unwrap_or_default(),
        address: get_opt_str(params, "address"),
        enrollment_date: get_opt_str(params, "enrollmentDate"),
        total_fee: match params.get("totalFee") {
            None | Some(serde_json::Value::Null) => 0.0,
            Some(_) => get_f64_or_nan(params, "totalFee"),
        },
        installments: get_opt_i64(params, "installments")?,
    })
}

fn filter_from(params: &serde_json::Value) -> Result<StudentFilter, HandlerErr> {
    let fee_status = match get_opt_str(params, "feeStatus").as_deref().map(str::trim) {
        None | Some("") => None,
        Some(v) if v.eq_ignore_ascii_case("all") => None,
        Some(v) => Some(FeeStatus::parse(v)?),
    };
    Ok(StudentFilter {
        category: get_opt_category(params, "category")?,
        fee_status,
        search: get_opt_str(params, "search"),
        include_inactive: get_opt_bool(params, "includeInactive").unwrap_or(false),
    })
}

fn handle_students_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let filter = filter_from(&req.params)?;
    let store = store_mut(state)?;
    let rows = store.students(&filter).map_err(CoreError::from)?;
    Ok(json!({ "students": to_json(&rows)? }))
}

fn handle_students_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let store = store_mut(state)?;
    let student = store
        .student(&student_id)
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::unknown_student(&student_id))?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let input = student_input(&req.params)?;
    let store = store_mut(state)?;
    let student = students::enroll(store, &input)?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let input = student_input(&req.params)?;
    let store = store_mut(state)?;
    let student = students::update_profile(store, &student_id, &input)?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn handle_students_set_active(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let Some(active) = get_opt_bool(&req.params, "active") else {
        return Err(HandlerErr::bad_params("missing active"));
    };
    let store = store_mut(state)?;
    students::set_active(store, &student_id, active)?;
    Ok(json!({ "studentId": student_id, "active": active }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(respond(req, handle_students_list(state, req))),
        "students.get" => Some(respond(req, handle_students_get(state, req))),
        "students.create" => Some(respond(req, handle_students_create(state, req))),
        "students.update" => Some(respond(req, handle_students_update(state, req))),
        "students.setActive" => Some(respond(req, handle_students_set_active(state, req))),
        _ => None,
    }
}
