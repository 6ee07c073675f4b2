//! FFI use-case API for the host shell.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to the host via FRB.
//! - Keep local session state reachable without a running async runtime.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Session state crosses the boundary as its JSON wire form.

use log::warn;
use spr_core::db::DbResult;
use spr_core::{
    classify_error, compute_stats, core_version as core_version_inner,
    init_logging as init_logging_inner, parent_paths, ping as ping_inner, LocalStore,
    SkeletonNode, SyncData,
};
use std::path::PathBuf;
use std::sync::OnceLock;

const STATE_DB_FILE_NAME: &str = "spr_local_state.sqlite3";
static STATE_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Response envelope for local state calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateResponse {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Session state JSON, only set by a successful load hit.
    pub payload: Option<String>,
    /// Human-readable response message for diagnostics.
    pub message: String,
}

impl StateResponse {
    fn success(message: impl Into<String>, payload: Option<String>) -> Self {
        Self {
            ok: true,
            payload,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: None,
            message: message.into(),
        }
    }
}

/// Completion statistics for one skeleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonStatsResponse {
    pub ok: bool,
    pub total: u32,
    pub completed: u32,
    /// Rounded completion percentage, 0 for a skeleton without leaves.
    pub percentage: u32,
    pub message: String,
}

/// User-facing presentation of a failure message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescription {
    /// `attachment|api_quota|api_key|network|parse|unknown`.
    pub kind: String,
    pub title: String,
    pub message: String,
    pub suggestion: String,
}

/// Loads the locally saved session state for `key`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - A miss is `ok` with no payload.
#[flutter_rust_bridge::frb(sync)]
pub fn state_load(key: String) -> StateResponse {
    let key = key.trim();
    if key.is_empty() {
        return StateResponse::failure("state_load failed: key must not be empty");
    }
    let store = match open_store() {
        Ok(store) => store,
        Err(err) => return StateResponse::failure(format!("state_load failed: {err}")),
    };
    let Some(data) = store.load(key) else {
        return StateResponse::success("No saved state.", None);
    };
    match serde_json::to_string(&data) {
        Ok(payload) => StateResponse::success("State loaded.", Some(payload)),
        Err(err) => StateResponse::failure(format!("state_load failed: {err}")),
    }
}

/// Saves session state JSON for `key` after validating its shape.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Malformed JSON is rejected and nothing is written.
#[flutter_rust_bridge::frb(sync)]
pub fn state_save(key: String, state_json: String) -> StateResponse {
    let key = key.trim();
    if key.is_empty() {
        return StateResponse::failure("state_save failed: key must not be empty");
    }
    let data: SyncData = match serde_json::from_str(&state_json) {
        Ok(data) => data,
        Err(err) => return StateResponse::failure(format!("state_save failed: invalid state: {err}")),
    };
    match open_store() {
        Ok(store) => {
            store.save(key, &data);
            StateResponse::success("State saved.", None)
        }
        Err(err) => StateResponse::failure(format!("state_save failed: {err}")),
    }
}

/// Removes the locally saved session state for `key`.
#[flutter_rust_bridge::frb(sync)]
pub fn state_clear(key: String) -> StateResponse {
    match open_store() {
        Ok(store) => {
            store.clear(key.trim());
            StateResponse::success("State cleared.", None)
        }
        Err(err) => StateResponse::failure(format!("state_clear failed: {err}")),
    }
}

/// Computes completion statistics for a skeleton given as JSON.
///
/// # FFI contract
/// - Sync call, pure computation.
/// - Completed paths that do not name a leaf are ignored.
#[flutter_rust_bridge::frb(sync)]
pub fn skeleton_stats(skeleton_json: String, completed_paths: Vec<String>) -> SkeletonStatsResponse {
    match serde_json::from_str::<SkeletonNode>(&skeleton_json) {
        Ok(root) => {
            let stats = compute_stats(&root, &root.label, &completed_paths);
            SkeletonStatsResponse {
                ok: true,
                total: stats.total,
                completed: stats.completed,
                percentage: stats.percentage,
                message: String::new(),
            }
        }
        Err(err) => SkeletonStatsResponse {
            ok: false,
            total: 0,
            completed: 0,
            percentage: 0,
            message: format!("skeleton_stats failed: {err}"),
        },
    }
}

/// Every ancestor path of `path`, root first, ending with `path` itself.
#[flutter_rust_bridge::frb(sync)]
pub fn node_parent_paths(path: String) -> Vec<String> {
    parent_paths(&path)
}

/// Classifies a raw failure message for display.
#[flutter_rust_bridge::frb(sync)]
pub fn describe_error(message: String) -> ErrorDescription {
    let error = classify_error(&message);
    ErrorDescription {
        kind: error.kind.as_str().to_string(),
        title: error.title,
        message: error.message,
        suggestion: error.suggestion,
    }
}

fn resolve_state_db_path() -> PathBuf {
    STATE_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("SPR_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(STATE_DB_FILE_NAME)
        })
        .clone()
}

fn open_store() -> DbResult<LocalStore> {
    let path = resolve_state_db_path();
    LocalStore::open(&path).inspect_err(|err| {
        warn!(
            "event=ffi_store_open module=ffi status=error path={} error={err}",
            path.display()
        );
    })
}
