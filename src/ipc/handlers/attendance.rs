use crate::attendance;
use crate::error::CoreError;
use crate::ipc::helpers::{
    get_opt_category, get_opt_date, get_opt_str, get_required_date, respond, store_mut, to_json,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{format_date, AttendanceFilter, AttendanceStatus, StudentFilter};
use crate::store::DataStore;
use chrono::NaiveDate;
use serde_json::json;
use std::collections::HashMap;
use tracing::info;

/// Longest span a grid or window report may cover.
const MAX_WINDOW_DAYS: i64 = 366;

fn window_bounds(params: &serde_json::Value) -> Result<(NaiveDate, NaiveDate), HandlerErr> {
    let from = get_required_date(params, "from")?;
    let to = get_required_date(params, "to")?;
    if to < from {
        return Err(HandlerErr::bad_params("to must not be before from"));
    }
    if (to - from).num_days() >= MAX_WINDOW_DAYS {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("window may span at most {} days", MAX_WINDOW_DAYS),
            details: Some(json!({ "from": format_date(from), "to": format_date(to) })),
        });
    }
    Ok((from, to))
}

fn handle_attendance_summary(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let by = get_opt_str(&req.params, "by").unwrap_or_else(|| "category".to_string());
    let filter = AttendanceFilter {
        from: get_opt_date(&req.params, "from")?,
        to: get_opt_date(&req.params, "to")?,
        student_ids: None,
    };
    let store = store_mut(state)?;
    let marks = store.attendance(&filter).map_err(CoreError::from)?;

    let groups = match by.as_str() {
        "category" => {
            let roster = store
                .students(&StudentFilter::active_only())
                .map_err(CoreError::from)?;
            to_json(&attendance::summarize_by_category(&marks, &roster))?
        }
        "student" => to_json(&attendance::summarize_by_student(&marks))?,
        other => {
            return Err(HandlerErr::bad_params(format!(
                "by must be category or student, got {}",
                other
            )))
        }
    };
    Ok(json!({ "by": by, "groups": groups }))
}

fn parse_selections(params: &serde_json::Value) -> Result<HashMap<String, AttendanceStatus>, HandlerErr> {
    let mut out = HashMap::new();
    let Some(raw) = params.get("selections") else {
        return Ok(out);
    };
    if raw.is_null() {
        return Ok(out);
    }
    let Some(obj) = raw.as_object() else {
        return Err(HandlerErr::bad_params("selections must be an object"));
    };
    for (student_id, status) in obj {
        let Some(label) = status.as_str() else {
            return Err(HandlerErr::bad_params(format!(
                "selections.{} must be a string",
                student_id
            )));
        };
        out.insert(student_id.clone(), AttendanceStatus::parse(label)?);
    }
    Ok(out)
}

fn handle_attendance_session_save(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_date(&req.params, "date")?;
    let category = get_opt_category(&req.params, "category")?;
    let selections = parse_selections(&req.params)?;
    let store = store_mut(state)?;

    let roster = store
        .students(&StudentFilter::active_only())
        .map_err(CoreError::from)?;
    let batch = attendance::build_session(&roster, date, &selections, category);
    let saved = store.upsert_attendance(&batch).map_err(CoreError::from)?;
    info!(date = %date, saved, "attendance session saved");

    Ok(json!({
        "date": format_date(date),
        "saved": saved,
        "marks": to_json(&batch)?,
    }))
}

fn handle_attendance_grid(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (from, to) = window_bounds(&req.params)?;
    let category = get_opt_category(&req.params, "category")?;
    let store = store_mut(state)?;

    let roster = store
        .students(&StudentFilter {
            category,
            ..StudentFilter::active_only()
        })
        .map_err(CoreError::from)?;
    let marks = store
        .attendance(&AttendanceFilter {
            from: Some(from),
            to: Some(to),
            student_ids: None,
        })
        .map_err(CoreError::from)?;
    let dates: Vec<NaiveDate> = from.iter_days().take_while(|d| *d <= to).collect();
    let rows = attendance::grid(&roster, &dates, &marks);

    Ok(json!({
        "dates": dates.iter().map(|d| format_date(*d)).collect::<Vec<_>>(),
        "rows": to_json(&rows)?,
    }))
}

fn handle_attendance_window(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (from, to) = window_bounds(&req.params)?;
    let category = get_opt_category(&req.params, "category")?;
    let store = store_mut(state)?;

    let roster = store
        .students(&StudentFilter {
            category,
            ..StudentFilter::active_only()
        })
        .map_err(CoreError::from)?;
    let marks = store
        .attendance(&AttendanceFilter {
            from: Some(from),
            to: Some(to),
            student_ids: None,
        })
        .map_err(CoreError::from)?;
    let rows = attendance::window_report(&roster, from, to, &marks);

    Ok(json!({
        "from": format_date(from),
        "to": format_date(to),
        "rows": to_json(&rows)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.summary" => Some(respond(req, handle_attendance_summary(state, req))),
        "attendance.sessionSave" => Some(respond(req, handle_attendance_session_save(state, req))),
        "attendance.grid" => Some(respond(req, handle_attendance_grid(state, req))),
        "attendance.window" => Some(respond(req, handle_attendance_window(state, req))),
        _ => None,
    }
}
