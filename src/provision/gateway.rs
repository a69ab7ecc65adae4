//! Gateway Wirer
//!
//! Provisions the HTTP front-end for a function: REST API, catch-all proxy
//! resource under the root path, unauthenticated ANY method, an invocation
//! role trusted by the gateway service, the backend integration, and a stage
//! deployment. Each step is fatal on failure; there is no partial-failure
//! recovery. Every call in the chain targets the entry's region, including
//! the deployment.

use super::retry::with_propagation_retry;
use super::{role, GatewayService, IdentityService, ProvisionError, APIGATEWAY_PRINCIPAL};
use crate::config::{Effect, PolicyStatement};

/// Fixed stage label for the deployment and the invocation URL
pub const DEPLOYMENT_STAGE: &str = "api";

/// Greedy path segment matching any sub-path
const PROXY_PATH_PART: &str = "{proxy+}";

pub async fn wire<I, G>(
    identity: &I,
    gateway: &G,
    api_name: &str,
    region: &str,
    function_name: &str,
) -> Result<String, ProvisionError>
where
    I: IdentityService + Sync,
    G: GatewayService + Sync,
{
    let api_id = gateway.create_rest_api(api_name, region).await?;
    tracing::info!("created rest api {} ({})", api_name, api_id);

    let resources = gateway.list_resources(&api_id, region).await?;
    let root = resources
        .iter()
        .find(|r| r.path == "/")
        .ok_or_else(|| ProvisionError::Remote {
            resource: api_id.clone(),
            code: None,
            message: "rest api has no root resource".to_string(),
        })?;

    let proxy_id = gateway
        .create_resource(&api_id, &root.id, PROXY_PATH_PART, region)
        .await?;
    gateway.put_method(&api_id, &proxy_id, region).await?;
    tracing::info!("created proxy resource and ANY method on api {}", api_name);

    // The account id comes out of the caller's own ARN
    let caller_arn = identity.caller_identity().await?;
    let account = account_from_arn(&caller_arn)?;
    let function_arn = format!("arn:aws:lambda:{region}:{account}:function:{function_name}");

    let invoke_statement = PolicyStatement {
        effect: Effect::Allow,
        action: vec!["lambda:InvokeFunction".to_string()],
        resource: vec![function_arn.clone()],
        principal: None,
    };
    let invoke_role_arn = role::ensure_role_and_policy(
        identity,
        &format!("{api_name}-invoke"),
        &format!("{api_name}-invoke-policy"),
        APIGATEWAY_PRINCIPAL,
        &[invoke_statement],
    )
    .await?;

    let integration_uri = format!(
        "arn:aws:apigateway:{region}:lambda:path/2015-03-31/functions/{function_arn}/invocations"
    );
    with_propagation_retry(&format!("integration for api {api_name}"), || {
        gateway.put_integration(&api_id, &proxy_id, &integration_uri, &invoke_role_arn, region)
    })
    .await?;
    tracing::info!("created integration targeting {}", function_name);

    gateway
        .create_deployment(&api_id, DEPLOYMENT_STAGE, region)
        .await?;

    Ok(format!(
        "https://{api_id}.execute-api.{region}.amazonaws.com/{DEPLOYMENT_STAGE}"
    ))
}

/// Account id is the fifth colon-separated ARN field,
/// e.g. `arn:aws:iam::123456789012:user/deployer`
fn account_from_arn(arn: &str) -> Result<String, ProvisionError> {
    let account = arn.split(':').nth(4).unwrap_or_default();
    if account.is_empty() || !account.chars().all(|c| c.is_ascii_digit()) {
        return Err(ProvisionError::Remote {
            resource: arn.to_string(),
            code: None,
            message: "caller identity ARN has no account id".to_string(),
        });
    }
    Ok(account.to_string())
}
