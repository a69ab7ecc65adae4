//! Lambda compute client
//!
//! REST API against the regional endpoint. Two failure codes get special
//! treatment: `ResourceConflictException` becomes the `AlreadyExists`
//! outcome, and the "role cannot be assumed" parameter error becomes
//! `NotYetPropagated` so callers can retry through IAM propagation lag.

use super::client::AwsClient;
use super::http::ApiFailure;
use super::remote_error;
use crate::provision::{ComputeService, FunctionOutcome, FunctionSpec, ProvisionError};
use async_trait::async_trait;
use serde_json::json;

const SERVICE: &str = "lambda";
const API_VERSION: &str = "2015-03-31";

#[derive(Clone)]
pub struct LambdaClient {
    aws: AwsClient,
}

impl LambdaClient {
    pub fn new(aws: AwsClient) -> Self {
        Self { aws }
    }

    fn functions_url(&self, region: &str) -> String {
        format!("{}/{}/functions", self.aws.lambda_base(region), API_VERSION)
    }
}

/// A parameter error about the execution role not being assumable means IAM
/// has not propagated the fresh role yet
fn is_propagation_failure(failure: &ApiFailure) -> bool {
    failure.code() == Some("InvalidParameterValueException")
        && failure.message().to_lowercase().contains("assume")
}

#[async_trait]
impl ComputeService for LambdaClient {
    async fn create_function(&self, spec: &FunctionSpec) -> Result<FunctionOutcome, ProvisionError> {
        let body = json!({
            "FunctionName": spec.function_name,
            "Handler": spec.handler,
            "Runtime": spec.runtime,
            "MemorySize": spec.memory_size,
            "Timeout": spec.timeout,
            "Role": spec.role_arn,
            "Code": {
                "S3Bucket": spec.bucket,
                "S3Key": spec.object_key,
            },
            "Environment": {
                "Variables": spec.environment,
            },
        });

        let result = self
            .aws
            .http
            .post_json(
                &self.functions_url(&spec.region),
                &body,
                &self.aws.credentials,
                SERVICE,
                &spec.region,
            )
            .await;

        match result {
            Ok(_) => Ok(FunctionOutcome::Created),
            Err(failure) if failure.code() == Some("ResourceConflictException") => {
                Ok(FunctionOutcome::AlreadyExists)
            }
            Err(failure) if is_propagation_failure(&failure) => {
                Err(ProvisionError::NotYetPropagated {
                    resource: format!("role for function {}", spec.function_name),
                    message: failure.message(),
                })
            }
            Err(failure) => Err(remote_error(&spec.function_name, failure)),
        }
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        bucket: &str,
        key: &str,
        region: &str,
    ) -> Result<(), ProvisionError> {
        // Code fields only; configuration is deliberately untouched
        let body = json!({
            "S3Bucket": bucket,
            "S3Key": key,
        });
        let url = format!("{}/{}/code", self.functions_url(region), function_name);

        self.aws
            .http
            .put_json(&url, &body, &self.aws.credentials, SERVICE, region)
            .await
            .map(|_| ())
            .map_err(|e| remote_error(function_name, e))
    }
}
