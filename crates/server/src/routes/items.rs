use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::Method,
    response::{IntoResponse, Response},
};
use service::items::{ItemRequest, ItemResponse};

use crate::observability;
use crate::routes::AppState;

/// 请求体为空视为未提供；原始字节交给 handler 做 JSON 解析
fn raw_body(body: Bytes) -> Option<Vec<u8>> {
    if body.is_empty() {
        None
    } else {
        Some(body.to_vec())
    }
}

/// `/items`: list (GET) and create (POST); any other verb reaches the handler too.
pub async fn collection(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    let req = ItemRequest::collection(method.as_str(), None).with_raw_body(raw_body(body));
    dispatch(&state, method, req).await
}

/// `/items/:id`: get, update and delete a single item.
pub async fn single(
    State(state): State<AppState>,
    method: Method,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let req = ItemRequest::item(method.as_str(), id, None).with_raw_body(raw_body(body));
    dispatch(&state, method, req).await
}

/// `/items/`: single-item endpoint with an empty id segment.
pub async fn single_without_id(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    let req = ItemRequest::item(method.as_str(), "", None).with_raw_body(raw_body(body));
    dispatch(&state, method, req).await
}

async fn dispatch(state: &AppState, method: Method, req: ItemRequest) -> Response {
    // CORS 预检不属于业务操作
    if method == Method::OPTIONS {
        return ItemResponse::preflight().into_response();
    }
    let started = Instant::now();
    let res = state.handler.handle(req).await;
    observability::record(&method, res.status, started.elapsed().as_secs_f64());
    res.into_response()
}
