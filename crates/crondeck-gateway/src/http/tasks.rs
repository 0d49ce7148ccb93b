//! Task routes. Thin adapters over [`TaskService`](crate::service::TaskService);
//! calls that touch the native scheduler run on the blocking pool.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use crondeck_core::{
    error::CrondeckError,
    types::{ExecutionRecord, ExecutionResult, Task, TaskDefinition},
};
use crondeck_runner::LatestLog;
use serde::Deserialize;

use super::{api_error, blocking, ApiError, ApiResult};
use crate::app::AppState;
use crate::service::{MutationOutcome, Overview, SyncReport};

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// GET /tasks
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> ApiResult<BTreeMap<String, Task>> {
    state.service.list_tasks().map(Json).map_err(api_error)
}

/// GET /overview: tasks with last run info plus the raw native entries.
pub async fn overview(State(state): State<Arc<AppState>>) -> ApiResult<Overview> {
    blocking(&state, |svc| svc.overview())
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /tasks: 201 on success, 400 if the name exists or the body is invalid.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TaskDefinition>, JsonRejection>,
) -> Result<(StatusCode, Json<MutationOutcome>), ApiError> {
    let Json(def) = payload.map_err(rejected)?;
    blocking(&state, move |svc| svc.create_task(def))
        .await
        .map(|outcome| (StatusCode::CREATED, Json(outcome)))
        .map_err(api_error)
}

/// GET /tasks/{name}
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Task> {
    state.service.get_task(&name).map(Json).map_err(api_error)
}

/// PUT /tasks/{name}: full replace; the body's `name` may be omitted.
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<TaskDefinition>, JsonRejection>,
) -> ApiResult<MutationOutcome> {
    let Json(def) = payload.map_err(rejected)?;
    blocking(&state, move |svc| svc.update_task(&name, def))
        .await
        .map(Json)
        .map_err(api_error)
}

/// DELETE /tasks/{name}
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<MutationOutcome> {
    blocking(&state, move |svc| svc.delete_task(&name))
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /tasks/{name}/run: blocks until the command finishes or times out.
pub async fn run_task(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<ExecutionResult> {
    state.service.run_task(&name).await.map(Json).map_err(api_error)
}

/// GET /tasks/{name}/log
pub async fn get_log(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<LatestLog> {
    state.service.get_log(&name).await.map(Json).map_err(api_error)
}

/// GET /tasks/{name}/history?limit=N
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Vec<ExecutionRecord>> {
    let limit = params
        .limit
        .unwrap_or_else(|| state.service.default_history_limit());
    state
        .service
        .get_history(&name, limit)
        .map(Json)
        .map_err(api_error)
}

/// POST /sync: reinstall every stored task into the native scheduler.
pub async fn sync(State(state): State<Arc<AppState>>) -> ApiResult<SyncReport> {
    blocking(&state, |svc| svc.resync())
        .await
        .map(Json)
        .map_err(api_error)
}

fn rejected(rejection: JsonRejection) -> ApiError {
    api_error(CrondeckError::Validation(format!(
        "invalid request body: {}",
        rejection.body_text()
    )))
}

#[cfg(test)]
mod tests {
    use crate::app::{build_router, AppState};
    use crate::service::tests::{def, fixture, Fixture};
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router() -> (tempfile::TempDir, Router) {
        let Fixture { base, service, .. } = fixture();
        let state = Arc::new(AppState::new(Default::default(), service));
        (base, build_router(state))
    }

    async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_scheduler() {
        let (_base, router) = router();
        let (status, json) = call(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["scheduler"], "crontab");
    }

    #[tokio::test]
    async fn task_crud_over_http() {
        let (_base, router) = router();
        let body = serde_json::to_value(def("report", "echo hi")).unwrap();

        let (status, json) = call(&router, Method::POST, "/tasks", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["task"]["name"], "report");
        assert!(json.get("scheduler_warning").is_none());

        let (status, json) = call(&router, Method::POST, "/tasks", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");

        let (status, json) = call(
            &router,
            Method::PUT,
            "/tasks/report",
            Some(json!({"schedule": "@hourly", "command": "echo again"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["task"]["schedule"], "@hourly");

        let (_, json) = call(&router, Method::GET, "/tasks", None).await;
        assert_eq!(json["report"]["command"], "echo again");

        let (status, _) = call(&router, Method::DELETE, "/tasks/report", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, json) = call(&router, Method::GET, "/tasks/report", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let (_base, router) = router();
        let (status, json) = call(&router, Method::POST, "/tasks", Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn run_then_read_history_and_log() {
        let (_base, router) = router();
        let body = serde_json::to_value(def("nightly-backup", "echo backup complete")).unwrap();
        call(&router, Method::POST, "/tasks", Some(body)).await;

        let (status, json) = call(&router, Method::POST, "/tasks/nightly-backup/run", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["return_code"], 0);

        let (_, json) = call(&router, Method::GET, "/tasks/nightly-backup/history?limit=1", None).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["status"], "success");

        let (_, json) = call(&router, Method::GET, "/tasks/nightly-backup/log", None).await;
        assert_eq!(json["state"], "found");
        assert!(json["content"].as_str().unwrap().contains("backup complete"));

        let (_, json) = call(&router, Method::GET, "/overview", None).await;
        assert_eq!(json["tasks"][0]["ran_today"], true);
    }

    #[tokio::test]
    async fn unknown_task_routes_are_404() {
        let (_base, router) = router();
        for (method, uri) in [
            (Method::POST, "/tasks/ghost/run"),
            (Method::GET, "/tasks/ghost/log"),
            (Method::DELETE, "/tasks/ghost"),
        ] {
            let (status, _) = call(&router, method, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn sync_reports_installed_tasks() {
        let (_base, router) = router();
        call(&router, Method::POST, "/tasks", Some(serde_json::to_value(def("a", "true")).unwrap())).await;
        let (status, json) = call(&router, Method::POST, "/sync", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["installed"], json!(["a"]));
    }
}
