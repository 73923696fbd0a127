use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::error::{CoreError, ValidationError};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{parse_date, Category};
use crate::store::SqliteStore;
use chrono::NaiveDate;

pub(crate) struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }
}

impl From<ValidationError> for HandlerErr {
    fn from(e: ValidationError) -> Self {
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details: None,
        }
    }
}

impl From<CoreError> for HandlerErr {
    fn from(e: CoreError) -> Self {
        let details = match &e {
            CoreError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            CoreError::Store(store_err) => {
                error!(error = %store_err, "store call failed");
                None
            }
            CoreError::Validation(_) => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

/// Wraps a handler body into the response envelope.
pub(crate) fn respond(req: &Request, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub(crate) fn store_mut(state: &mut AppState) -> Result<&mut SqliteStore, HandlerErr> {
    state.store.as_mut().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr {
        code: "internal",
        message: e.to_string(),
        details: None,
    })
}

pub(crate) fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub(crate) fn get_opt_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Numbers may arrive as JSON numbers or as numeric strings from form fields.
/// Anything unparseable reads as NaN so the domain validator rejects it.
pub(crate) fn get_f64_or_nan(params: &serde_json::Value, key: &str) -> f64 {
    match params.get(key) {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

pub(crate) fn get_opt_f64(params: &serde_json::Value, key: &str) -> Option<f64> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => None,
        Some(_) => Some(get_f64_or_nan(params, key)),
    }
}

pub(crate) fn get_opt_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| HandlerErr::bad_params(format!("{} must be an integer", key))),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub(crate) fn get_opt_bool(params: &serde_json::Value, key: &str) -> Option<bool> {
    params.get(key).and_then(|v| v.as_bool())
}

/// Empty or "All" means no category filter.
pub(crate) fn get_opt_category(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<Category>, HandlerErr> {
    match get_opt_str(params, key).as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => Ok(Some(Category::parse(v)?)),
    }
}

pub(crate) fn get_opt_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<NaiveDate>, HandlerErr> {
    match get_opt_str(params, key) {
        Some(raw) if !raw.trim().is_empty() => Ok(Some(parse_date(&raw)?)),
        _ => Ok(None),
    }
}

pub(crate) fn get_required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    Ok(parse_date(&get_opt_str(params, key).unwrap_or_default())?)
}
