use axum::http::StatusCode;
use thiserror::Error;

use crate::storage::StoreError;

/// Everything that can go wrong while handling one item request.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Item not found")]
    NotFound,
    #[error("Missing item ID")]
    MissingIdentifier,
    #[error("Unsupported method: \"{0}\"")]
    UnsupportedMethod(String),
    /// Key collision on create. Not something the caller can fix, so it is
    /// reported as a server error.
    #[error("Item already exists")]
    AlreadyExists,
    #[error("Failed to list items")]
    ListFailed(String),
    #[error("{0}")]
    Validation(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ItemError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MissingIdentifier => StatusCode::BAD_REQUEST,
            Self::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            // 解析失败与存储故障同样按 500 处理，消息原样回显
            Self::AlreadyExists
            | Self::ListFailed(_)
            | Self::Validation(_)
            | Self::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

    /// `ConditionFailed` on a create means the key is taken.
    pub fn on_create(e: StoreError) -> Self {
        match e {
            StoreError::ConditionFailed => Self::AlreadyExists,
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }

    /// `ConditionFailed` on update/delete means the key is absent.
    pub fn on_existing(e: StoreError) -> Self {
        match e {
            StoreError::ConditionFailed => Self::NotFound,
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}

impl From<serde_json::Error> for ItemError {
    fn from(e: serde_json::Error) -> Self {
        Self::Validation(format!("invalid JSON body: {e}"))
    }
}
