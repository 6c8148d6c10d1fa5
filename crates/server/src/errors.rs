use service::storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("store initialization failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
