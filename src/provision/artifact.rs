//! Artifact Publisher
//!
//! Uploads the packaged code bundle to its bucket/key. Always overwrites:
//! publishing is idempotent-replace, not idempotent-skip.

use super::{ProvisionError, StorageService};
use std::path::Path;

pub async fn publish<S: StorageService + Sync>(
    storage: &S,
    artifact_path: &Path,
    bucket: &str,
    object_key: &str,
    region: &str,
) -> Result<(), ProvisionError> {
    let bytes = tokio::fs::read(artifact_path)
        .await
        .map_err(|source| ProvisionError::Io {
            path: artifact_path.display().to_string(),
            source,
        })?;
    let size = bytes.len();

    storage.put_object(bucket, object_key, bytes, region).await?;
    tracing::info!(
        "uploaded {} ({} bytes) to {}/{}",
        artifact_path.display(),
        size,
        bucket,
        object_key
    );

    Ok(())
}
