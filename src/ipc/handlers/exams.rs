use crate::exams::{self, ExamInput};
use crate::ipc::helpers::{get_opt_date, get_opt_str, respond, store_mut, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// `categories` may be a comma separated string or an array of labels.
fn categories_param(params: &serde_json::Value) -> Result<String, HandlerErr> {
    match params.get("categories") {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Array(items)) => {
            let mut labels = Vec::with_capacity(items.len());
            for item in items {
                let Some(s) = item.as_str() else {
                    return Err(HandlerErr::bad_params("categories must be strings"));
                };
                labels.push(s.to_string());
            }
            Ok(labels.join(","))
        }
        Some(_) => Err(HandlerErr::bad_params("categories must be a string or array")),
    }
}

fn handle_exams_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let from = get_opt_date(&req.params, "from")?;
    let store = store_mut(state)?;
    let rows = exams::list(&*store, from)?;
    Ok(json!({ "exams": to_json(&rows)? }))
}

fn handle_exams_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let input = ExamInput {
        name: get_opt_str(&req.params, "name").unwrap_or_default(),
        date: get_opt_str(&req.params, "date"),
        categories: categories_param(&req.params)?,
    };
    let store = store_mut(state)?;
    let exam = exams::schedule(store, &input)?;
    Ok(json!({ "exam": to_json(&exam)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.list" => Some(respond(req, handle_exams_list(state, req))),
        "exams.create" => Some(respond(req, handle_exams_create(state, req))),
        _ => None,
    }
}
