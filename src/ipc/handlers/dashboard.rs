use crate::dashboard;
use crate::ipc::helpers::{get_opt_date, respond, store_mut, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn handle_dashboard_overview(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let today = get_opt_date(&req.params, "today")?.unwrap_or_else(|| chrono::Local::now().date_naive());
    let store = store_mut(state)?;
    let overview = dashboard::overview(&*store, today)?;
    to_json(&overview)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.overview" => Some(respond(req, handle_dashboard_overview(state, req))),
        _ => None,
    }
}
