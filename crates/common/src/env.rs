//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::path::Path;

use tracing::{info, warn};

/// Ensure the data directory exists, creating it if missing.
pub async fn ensure_data_dir(data_dir: &str) -> anyhow::Result<()> {
    if data_dir.trim().is_empty() {
        return Err(anyhow::anyhow!("data directory must not be empty"));
    }
    match tokio::fs::metadata(data_dir).await {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => return Err(anyhow::anyhow!("{data_dir} exists but is not a directory")),
        Err(_) => warn!(%data_dir, "data directory not found; creating it"),
    }
    tokio::fs::create_dir_all(Path::new(data_dir))
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {data_dir}: {e}"))?;
    info!(%data_dir, "data directory created");
    Ok(())
}
