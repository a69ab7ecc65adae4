//! IAM and STS identity client
//!
//! Both are global query APIs: form-encoded actions POSTed to a single
//! endpoint, answered as JSON thanks to the `Accept` header. Role creation
//! maps the `EntityAlreadyExists` code onto a tagged outcome rather than an
//! error, so the provisioner's skip-vs-fatal branch stays explicit.

use super::client::{AwsClient, GLOBAL_SIGNING_REGION};
use super::remote_error;
use crate::provision::{IdentityService, ProvisionError, Role, RoleOutcome};
use async_trait::async_trait;
use serde_json::Value;

const IAM_VERSION: &str = "2010-05-08";
const STS_VERSION: &str = "2011-06-15";

#[derive(Clone)]
pub struct IamClient {
    aws: AwsClient,
}

impl IamClient {
    pub fn new(aws: AwsClient) -> Self {
        Self { aws }
    }

    async fn iam_action(
        &self,
        params: &[(&str, &str)],
    ) -> Result<Value, super::http::ApiFailure> {
        self.aws
            .http
            .post_form(
                &self.aws.iam_base(),
                params,
                &self.aws.credentials,
                "iam",
                GLOBAL_SIGNING_REGION,
            )
            .await
    }
}

/// Dig a string out of the query API's nested `{Action}Response.{Action}Result` shape
fn result_field<'a>(response: &'a Value, action: &str, path: &[&str]) -> Option<&'a str> {
    let mut current = response
        .get(format!("{action}Response"))?
        .get(format!("{action}Result"))?;
    for part in path {
        current = current.get(part)?;
    }
    current.as_str()
}

fn missing_field(resource: &str, action: &str) -> ProvisionError {
    ProvisionError::Remote {
        resource: resource.to_string(),
        code: None,
        message: format!("{action} response had no ARN field"),
    }
}

#[async_trait]
impl IdentityService for IamClient {
    async fn create_role(
        &self,
        name: &str,
        trust_document: &Value,
    ) -> Result<RoleOutcome, ProvisionError> {
        let trust = trust_document.to_string();
        let result = self
            .iam_action(&[
                ("Action", "CreateRole"),
                ("Version", IAM_VERSION),
                ("RoleName", name),
                ("AssumeRolePolicyDocument", &trust),
            ])
            .await;

        match result {
            Ok(response) => {
                let arn = result_field(&response, "CreateRole", &["Role", "Arn"])
                    .ok_or_else(|| missing_field(name, "CreateRole"))?;
                Ok(RoleOutcome::Created(Role {
                    name: name.to_string(),
                    arn: arn.to_string(),
                }))
            }
            Err(failure) if failure.code() == Some("EntityAlreadyExists") => {
                Ok(RoleOutcome::AlreadyExists)
            }
            Err(failure) => Err(remote_error(name, failure)),
        }
    }

    async fn get_role(&self, name: &str) -> Result<Role, ProvisionError> {
        let response = self
            .iam_action(&[
                ("Action", "GetRole"),
                ("Version", IAM_VERSION),
                ("RoleName", name),
            ])
            .await
            .map_err(|e| remote_error(name, e))?;

        let arn = result_field(&response, "GetRole", &["Role", "Arn"])
            .ok_or_else(|| missing_field(name, "GetRole"))?;
        Ok(Role {
            name: name.to_string(),
            arn: arn.to_string(),
        })
    }

    async fn create_policy(&self, name: &str, document: &Value) -> Result<String, ProvisionError> {
        let doc = document.to_string();
        let response = self
            .iam_action(&[
                ("Action", "CreatePolicy"),
                ("Version", IAM_VERSION),
                ("PolicyName", name),
                ("PolicyDocument", &doc),
            ])
            .await
            .map_err(|e| remote_error(name, e))?;

        let arn = result_field(&response, "CreatePolicy", &["Policy", "Arn"])
            .ok_or_else(|| missing_field(name, "CreatePolicy"))?;
        Ok(arn.to_string())
    }

    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProvisionError> {
        self.iam_action(&[
            ("Action", "AttachRolePolicy"),
            ("Version", IAM_VERSION),
            ("RoleName", role_name),
            ("PolicyArn", policy_arn),
        ])
        .await
        .map(|_| ())
        .map_err(|e| remote_error(role_name, e))
    }

    async fn caller_identity(&self) -> Result<String, ProvisionError> {
        let response = self
            .aws
            .http
            .post_form(
                &self.aws.sts_base(),
                &[("Action", "GetCallerIdentity"), ("Version", STS_VERSION)],
                &self.aws.credentials,
                "sts",
                GLOBAL_SIGNING_REGION,
            )
            .await
            .map_err(|e| remote_error("caller identity", e))?;

        let arn = result_field(&response, "GetCallerIdentity", &["Arn"])
            .ok_or_else(|| missing_field("caller identity", "GetCallerIdentity"))?;
        Ok(arn.to_string())
    }
}
