//! Items resource: normalized request/response descriptors and the handler.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

use crate::errors::ItemError;

pub mod handler;

pub use crate::storage::Item;
pub use handler::ItemHandler;

/// Set once by the handler when an item is created.
pub const CREATED_AT: &str = "createdAt";
/// Set by the handler on every successful update.
pub const UPDATED_AT: &str = "updatedAt";

const ALLOW_HEADERS: &str = "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token";
const ALLOW_METHODS: &str = "OPTIONS,GET,POST,PUT,DELETE";

/// Which endpoint the request was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// `/items`
    Collection,
    /// `/items/{id}`
    Item,
}

/// Normalized inbound request.
#[derive(Debug, Clone)]
pub struct ItemRequest {
    pub method: String,
    pub id: Option<String>,
    /// Raw request body; decoded as JSON by the handler.
    pub body: Option<Vec<u8>>,
    pub resource: Resource,
}

impl ItemRequest {
    pub fn collection(method: impl Into<String>, body: Option<String>) -> Self {
        Self { method: method.into(), id: None, body: body.map(String::into_bytes), resource: Resource::Collection }
    }

    pub fn item(method: impl Into<String>, id: impl Into<String>, body: Option<String>) -> Self {
        Self {
            method: method.into(),
            id: Some(id.into()),
            body: body.map(String::into_bytes),
            resource: Resource::Item,
        }
    }

    /// Attach an undecoded body as received off the wire.
    pub fn with_raw_body(mut self, body: Option<Vec<u8>>) -> Self {
        self.body = body;
        self
    }

    /// Path identifier; an empty segment counts as absent.
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Normalized outbound response: status, JSON body and the fixed CORS headers.
#[derive(Debug, Clone)]
pub struct ItemResponse {
    pub status: StatusCode,
    pub body: Value,
    pub headers: HeaderMap,
}

impl ItemResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body, headers: default_headers() }
    }

    pub fn ok(body: Value) -> Self { Self::new(StatusCode::OK, body) }

    pub fn from_error(err: &ItemError) -> Self {
        Self::new(err.status(), json!({ "error": err.to_string() }))
    }

    /// Answer to a CORS preflight; not a business operation.
    pub fn preflight() -> Self { Self::ok(json!({})) }
}

/// `Content-Type` plus headers allowing cross-origin calls from any origin.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers
}

impl IntoResponse for ItemResponse {
    fn into_response(self) -> Response {
        let bytes = match serde_json::to_vec(&self.body) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode response body");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        let mut res = Response::new(Body::from(bytes));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}
