use crate::backup;
use crate::catalog;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_opt_category, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Category;
use crate::store::SqliteStore;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Opens (creating if needed) the workspace database and makes it current.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    state.workspace = Some(path.to_path_buf());
    state.store = Some(SqliteStore::new(conn));
    info!(workspace = %path.to_string_lossy(), "workspace opened");
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            warn!(workspace = %path.to_string_lossy(), error = %e, "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

fn required_path(req: &Request, key: &str) -> Result<PathBuf, HandlerErr> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(PathBuf::from(v.trim())),
        _ => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

fn io_failed(message: String, path: &Path) -> HandlerErr {
    HandlerErr {
        code: "io_failed",
        message,
        details: Some(json!({ "path": path.to_string_lossy() })),
    }
}

fn export_backup(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let out_path = required_path(req, "outPath")?;
    let Some(workspace_path) = state.workspace.clone() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        });
    };

    let export = backup::export_workspace_bundle(&workspace_path, &out_path)
        .map_err(|e| io_failed(e.to_string(), &out_path))?;
    info!(path = %out_path.to_string_lossy(), bytes = export.db_bytes, "workspace exported");

    Ok(json!({
        "path": out_path.to_string_lossy(),
        "bundleFormat": export.bundle_format,
        "dbSha256": export.db_sha256,
        "dbBytes": export.db_bytes,
    }))
}

fn import_backup(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let in_path = required_path(req, "inPath")?;
    let Some(workspace_path) = state.workspace.clone() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        });
    };
    if !in_path.is_file() {
        return Err(HandlerErr {
            code: "not_found",
            message: "bundle file not found".to_string(),
            details: Some(json!({ "path": in_path.to_string_lossy() })),
        });
    }

    // Drop open handle before replacing file.
    state.store = None;
    let imported = backup::import_workspace_bundle(&in_path, &workspace_path);
    let reopened = open_workspace(state, &workspace_path);

    let import = imported.map_err(|e| io_failed(e.to_string(), &in_path))?;
    reopened.map_err(|e| HandlerErr {
        code: "db_open_failed",
        message: format!("{e:?}"),
        details: None,
    })?;
    info!(path = %in_path.to_string_lossy(), "workspace restored from bundle");

    Ok(json!({
        "workspacePath": workspace_path.to_string_lossy(),
        "bundleFormat": import.bundle_format,
        "dbSha256": import.db_sha256,
    }))
}

fn catalog_courses(req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let categories: Vec<Category> = match get_opt_category(&req.params, "category")? {
        Some(c) => vec![c],
        None => Category::ALL.to_vec(),
    };
    let entries: Vec<serde_json::Value> = categories
        .into_iter()
        .map(|c| {
            json!({
                "category": c.label(),
                "courses": catalog::courses(c),
            })
        })
        .collect();
    Ok(json!({ "categories": entries }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "workspace.exportBackup" => Some(respond(req, export_backup(state, req))),
        "workspace.importBackup" => Some(respond(req, import_backup(state, req))),
        "catalog.courses" => Some(respond(req, catalog_courses(req))),
        _ => None,
    }
}
