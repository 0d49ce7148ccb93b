use axum::{
    routing::{get, post},
    Router,
};
use crondeck_core::config::CrondeckConfig;
use std::sync::Arc;

use crate::http::{health, tasks};
use crate::service::TaskService;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: CrondeckConfig,
    pub service: TaskService,
}

impl AppState {
    pub fn new(config: CrondeckConfig, service: TaskService) -> Self {
        Self { config, service }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/overview", get(tasks::overview))
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/{name}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/{name}/run", post(tasks::run_task))
        .route("/tasks/{name}/log", get(tasks::get_log))
        .route("/tasks/{name}/history", get(tasks::get_history))
        .route("/sync", post(tasks::sync))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
