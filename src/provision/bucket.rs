//! Bucket Provisioner
//!
//! Ensures the artifact bucket exists in the target region. The check and
//! the create are not transactional: two concurrent runs against the same
//! entry can race, which is an accepted limitation.

use super::{BucketOutcome, ProvisionError, StorageService, DEFAULT_REGION};

pub async fn ensure_bucket<S: StorageService + Sync>(
    storage: &S,
    name: &str,
    region: &str,
) -> Result<BucketOutcome, ProvisionError> {
    if storage.bucket_exists(name, region).await? {
        tracing::info!("bucket {} already exists, skipping", name);
        return Ok(BucketOutcome::Skipped);
    }

    // The default region requires the region-default creation call
    let constraint = (region != DEFAULT_REGION).then_some(region);
    storage.create_bucket(name, constraint).await?;
    tracing::info!("created bucket {} in {}", name, region);

    Ok(BucketOutcome::Created)
}
