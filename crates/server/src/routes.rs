use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{any, get},
    Json, Router,
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use common::types::Health;
use service::items::ItemHandler;

use crate::observability;

pub mod items;

/// Shared router state; the handler itself is stateless.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ItemHandler>,
}

impl AppState {
    pub fn new(handler: ItemHandler) -> Self {
        Self { handler: Arc::new(handler) }
    }
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics() -> (StatusCode, String) {
    observability::encode_metrics()
}

/// Build the full application router: items resource, health and metrics.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/items", any(items::collection))
        .route("/items/", any(items::single_without_id))
        .route("/items/:id", any(items::single))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，包含方法和路径等，日志级别为 INFO
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                // 响应返回时打点，包含状态码与耗时
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                // 失败（5xx 等）时以 ERROR 记录
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
