//! REST API

pub mod dashboard;
pub mod error;

use crate::AppState;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

/// 组装 axum 应用
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route("/api/group/{group_name}", get(dashboard::get_group))
        .with_state(state)
}

/// 存活探针
async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}
