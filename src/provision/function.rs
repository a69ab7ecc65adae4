//! Function Provisioner
//!
//! Two disjoint lifecycle paths: `create` issues the full configuration for
//! a function that does not exist yet, `update_code` replaces only the code
//! artifact reference of one that does. Neither performs an existence check;
//! the orchestrator owns the install/update distinction.

use super::retry::with_propagation_retry;
use super::{ComputeService, FunctionOutcome, FunctionSpec, ProvisionError};
use crate::config::StageEntry;

/// Create the function with its full configuration. Retries through IAM
/// propagation lag on the execution role. Returns the provider's tagged
/// outcome; the caller decides what "already exists" means.
pub async fn create<C: ComputeService + Sync>(
    compute: &C,
    entry: &StageEntry,
    role_arn: &str,
) -> Result<FunctionOutcome, ProvisionError> {
    let spec = FunctionSpec::from_entry(entry, role_arn);

    let outcome = with_propagation_retry(&format!("function {}", entry.function_name), || {
        compute.create_function(&spec)
    })
    .await?;

    if outcome == FunctionOutcome::Created {
        tracing::info!(
            "created function {} in {} ({} MB, {}s timeout)",
            entry.function_name,
            entry.region,
            entry.memory_size,
            entry.timeout
        );
    }

    Ok(outcome)
}

/// Point an existing function at the freshly published artifact
pub async fn update_code<C: ComputeService + Sync>(
    compute: &C,
    function_name: &str,
    bucket: &str,
    object_key: &str,
    region: &str,
) -> Result<(), ProvisionError> {
    compute
        .update_function_code(function_name, bucket, object_key, region)
        .await?;
    tracing::info!(
        "updated code of function {} to {}/{}",
        function_name,
        bucket,
        object_key
    );
    Ok(())
}
