//! AWS Client
//!
//! Shared handle combining credentials, the signing HTTP client, and the
//! per-service endpoint builders. Constructed once at process start and
//! passed by reference to every service client; tests swap the endpoints
//! for a mock server with [`AwsClient::with_endpoint`].

use super::auth::AwsCredentials;
use super::http::AwsHttpClient;
use anyhow::Result;

/// Region used to sign calls against the global IAM/STS endpoints
pub const GLOBAL_SIGNING_REGION: &str = "us-east-1";

#[derive(Clone)]
pub struct AwsClient {
    pub credentials: AwsCredentials,
    pub http: AwsHttpClient,
    endpoint: Option<String>,
}

impl AwsClient {
    pub fn new(credentials: AwsCredentials) -> Result<Self> {
        Ok(Self {
            credentials,
            http: AwsHttpClient::new()?,
            endpoint: None,
        })
    }

    /// Route every service at a fixed base URL instead of the real AWS
    /// hosts. Signing still happens; mock servers ignore it.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        self
    }

    fn base(&self, host: String) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{host}"),
        }
    }

    /// S3 regional endpoint, path-style addressing
    pub fn s3_base(&self, region: &str) -> String {
        self.base(format!("s3.{region}.amazonaws.com"))
    }

    /// IAM global query-API endpoint
    pub fn iam_base(&self) -> String {
        self.base("iam.amazonaws.com".to_string())
    }

    /// STS global query-API endpoint
    pub fn sts_base(&self) -> String {
        self.base("sts.amazonaws.com".to_string())
    }

    /// Lambda regional REST endpoint
    pub fn lambda_base(&self, region: &str) -> String {
        self.base(format!("lambda.{region}.amazonaws.com"))
    }

    /// API Gateway regional REST endpoint
    pub fn apigateway_base(&self, region: &str) -> String {
        self.base(format!("apigateway.{region}.amazonaws.com"))
    }
}
