//! Deployment Orchestrator
//!
//! Sequences the provisioners per stage entry, strictly in configuration
//! order. `install` runs the full chain (role, bucket, artifact, function,
//! optional gateway); `update` republishes the artifact and swaps the code
//! reference only. The first fatal error halts the remaining entries; no
//! state is persisted across runs, so re-running after a failure is safe.

use super::{
    artifact, bucket, function, gateway, role, ComputeService, FunctionOutcome, GatewayService,
    IdentityService, ProvisionError, StorageService, LAMBDA_PRINCIPAL,
};
use crate::config::StageEntry;
use std::path::Path;

pub struct Deployer<S, I, C, G> {
    pub storage: S,
    pub identity: I,
    pub compute: C,
    pub gateway: G,
}

impl<S, I, C, G> Deployer<S, I, C, G>
where
    S: StorageService + Sync,
    I: IdentityService + Sync,
    C: ComputeService + Sync,
    G: GatewayService + Sync,
{
    /// Full provisioning of every entry: role, bucket, artifact, function,
    /// and the optional HTTP front-end
    pub async fn install(
        &self,
        stage: &str,
        entries: &[StageEntry],
        artifact_path: &Path,
    ) -> Result<(), ProvisionError> {
        for entry in entries {
            entry.validate()?;
            tracing::info!(
                "installing {} to {} [stage {}]",
                entry.function_name,
                entry.region,
                stage
            );

            let role_arn = role::ensure_role_and_policy(
                &self.identity,
                &entry.role_name(),
                &entry.policy_name(),
                LAMBDA_PRINCIPAL,
                &entry.policy_statements,
            )
            .await?;

            bucket::ensure_bucket(&self.storage, &entry.bucket, &entry.region).await?;

            artifact::publish(
                &self.storage,
                artifact_path,
                &entry.bucket,
                &entry.object_key,
                &entry.region,
            )
            .await?;

            match function::create(&self.compute, entry, &role_arn).await? {
                FunctionOutcome::Created => {}
                FunctionOutcome::AlreadyExists => {
                    // Keeps a re-run of install safe: the artifact was just
                    // republished, so point the existing function at it
                    // instead of failing
                    tracing::warn!(
                        "function {} already exists, updating its code instead",
                        entry.function_name
                    );
                    function::update_code(
                        &self.compute,
                        &entry.function_name,
                        &entry.bucket,
                        &entry.object_key,
                        &entry.region,
                    )
                    .await?;
                }
            }

            if let Some(gw) = &entry.api_gateway {
                let url = gateway::wire(
                    &self.identity,
                    &self.gateway,
                    &gw.name,
                    &entry.region,
                    &entry.function_name,
                )
                .await?;
                tracing::info!("api {} deployed at {}", gw.name, url);
            }

            tracing::info!("installed {}", entry.function_name);
        }

        Ok(())
    }

    /// Code-only refresh of every entry: publish the artifact, swap the
    /// function's code reference, leave configuration untouched
    pub async fn update(
        &self,
        stage: &str,
        entries: &[StageEntry],
        artifact_path: &Path,
    ) -> Result<(), ProvisionError> {
        for entry in entries {
            entry.validate()?;
            tracing::info!(
                "updating {} in {} [stage {}]",
                entry.function_name,
                entry.region,
                stage
            );

            artifact::publish(
                &self.storage,
                artifact_path,
                &entry.bucket,
                &entry.object_key,
                &entry.region,
            )
            .await?;

            function::update_code(
                &self.compute,
                &entry.function_name,
                &entry.bucket,
                &entry.object_key,
                &entry.region,
            )
            .await?;
        }

        Ok(())
    }
}
