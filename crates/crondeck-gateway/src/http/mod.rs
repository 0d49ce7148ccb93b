pub mod health;
pub mod tasks;

use std::sync::Arc;

use axum::{http::StatusCode, Json};
use crondeck_core::error::{CrondeckError, Result};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::app::AppState;
use crate::service::TaskService;

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Map a boundary error to `{ "error": { "code", "message" } }`.
pub fn api_error(e: CrondeckError) -> ApiError {
    let status = match e {
        CrondeckError::Validation(_) => StatusCode::BAD_REQUEST,
        CrondeckError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if e.is_client_error() {
        debug!(code = e.code(), "request rejected: {e}");
    } else {
        error!(code = e.code(), "request failed: {e}");
    }
    (
        status,
        Json(json!({"error": {"code": e.code(), "message": e.to_string()}})),
    )
}

/// Run a service call that may shell out to the native scheduler on the
/// blocking pool.
pub async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T>
where
    F: FnOnce(&TaskService) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.service))
        .await
        .map_err(|e| CrondeckError::Internal(format!("blocking task failed: {e}")))?
}
