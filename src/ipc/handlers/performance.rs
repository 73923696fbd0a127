use crate::error::CoreError;
use crate::ipc::helpers::{
    get_f64_or_nan, get_opt_category, get_opt_f64, get_opt_str, get_required_str, respond,
    store_mut, to_json, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::StudentFilter;
use crate::performance::{self, ResultInput};
use crate::store::DataStore;
use serde_json::json;

fn result_input(params: &serde_json::Value) -> Result<ResultInput, HandlerErr> {
    Ok(ResultInput {
        student_id: get_required_str(params, "studentId")?,
        category: get_opt_str(params, "category"),
        exam_name: get_opt_str(params, "examName").unwrap_or_default(),
        date: get_opt_str(params, "date"),
        marks: get_f64_or_nan(params, "marks"),
        total_marks: get_f64_or_nan(params, "totalMarks"),
        percentage: get_opt_f64(params, "percentage"),
    })
}

fn handle_performance_summary(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let category = get_opt_category(&req.params, "category")?;
    let store = store_mut(state)?;
    let roster = store
        .students(&StudentFilter {
            category,
            ..StudentFilter::active_only()
        })
        .map_err(CoreError::from)?;
    let results = store.results().map_err(CoreError::from)?;
    to_json(&performance::summarize(&roster, &results))
}

fn handle_performance_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let category = get_opt_category(&req.params, "category")?;
    let search = get_opt_str(&req.params, "search");
    let store = store_mut(state)?;
    let results = store.results().map_err(CoreError::from)?;
    let rows = performance::filter_results(&results, category, search.as_deref());
    Ok(json!({ "results": to_json(&rows)? }))
}

fn handle_performance_record_result(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let input = result_input(&req.params)?;
    let store = store_mut(state)?;
    let result = performance::record_result(store, &input)?;
    Ok(json!({ "result": to_json(&result)? }))
}

fn handle_performance_edit_result(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let result_id = get_required_str(&req.params, "resultId")?;
    let input = result_input(&req.params)?;
    let store = store_mut(state)?;
    let result = performance::edit_result(store, &result_id, &input)?;
    Ok(json!({ "result": to_json(&result)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "performance.summary" => Some(respond(req, handle_performance_summary(state, req))),
        "performance.list" => Some(respond(req, handle_performance_list(state, req))),
        "performance.recordResult" => {
            Some(respond(req, handle_performance_record_result(state, req)))
        }
        "performance.editResult" => Some(respond(req, handle_performance_edit_result(state, req))),
        _ => None,
    }
}
