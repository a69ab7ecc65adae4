//! Role Provisioner
//!
//! Ensures an execution/trust role and its attached access policy exist.
//! The policy document is always the baseline log-access statements followed
//! by the caller's statements, in order. An already-existing role is fetched
//! and reused; its live policy is NOT reconciled against the supplied
//! statements, which is logged as a warning (policy drift goes unrepaired).

use super::{IdentityService, ProvisionError, Role, RoleOutcome};
use crate::config::{Effect, PolicyStatement};
use serde_json::{json, Value};

const POLICY_VERSION: &str = "2012-10-17";

/// Baseline grant every execution role gets: create log groups/streams and
/// write log events, on all log resources
pub fn baseline_log_statement() -> PolicyStatement {
    PolicyStatement {
        effect: Effect::Allow,
        action: vec![
            "logs:CreateLogGroup".to_string(),
            "logs:CreateLogStream".to_string(),
            "logs:PutLogEvents".to_string(),
        ],
        resource: vec!["arn:aws:logs:*:*:*".to_string()],
        principal: None,
    }
}

/// Full policy document: baseline first, then caller statements in order
pub fn compose_policy_document(statements: &[PolicyStatement]) -> Value {
    let mut all = vec![baseline_log_statement()];
    all.extend_from_slice(statements);

    json!({
        "Version": POLICY_VERSION,
        "Statement": all,
    })
}

/// Trust document allowing one service principal to assume the role
pub fn trust_document(trust_principal: &str) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Service": trust_principal},
            "Action": "sts:AssumeRole",
        }],
    })
}

/// Ensure the role and its policy exist; returns the role ARN
pub async fn ensure_role_and_policy<I: IdentityService + Sync>(
    identity: &I,
    role_name: &str,
    policy_name: &str,
    trust_principal: &str,
    statements: &[PolicyStatement],
) -> Result<String, ProvisionError> {
    let trust = trust_document(trust_principal);

    match identity.create_role(role_name, &trust).await? {
        RoleOutcome::Created(Role { arn, .. }) => {
            tracing::info!("created role {}", role_name);

            let document = compose_policy_document(statements);
            let policy_arn = identity.create_policy(policy_name, &document).await?;
            tracing::info!("created policy {}", policy_name);

            identity.attach_role_policy(role_name, &policy_arn).await?;
            tracing::info!("attached policy {} to role {}", policy_name, role_name);

            Ok(arn)
        }
        RoleOutcome::AlreadyExists => {
            tracing::warn!(
                "role {} already exists; reusing it as-is, supplied policy statements \
                 are not reconciled against the live policy",
                role_name
            );
            let role = identity.get_role(role_name).await?;
            Ok(role.arn)
        }
    }
}
