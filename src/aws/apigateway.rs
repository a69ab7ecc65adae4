//! API Gateway client
//!
//! REST API against the regional endpoint. The method/integration wire
//! details (ANY method, greedy `proxy` path parameter, AWS_PROXY type,
//! POST-to-backend, pass-through on unmapped content types) are fixed here;
//! the gateway wirer only sequences the chain and supplies identifiers.

use super::client::AwsClient;
use super::http::ApiFailure;
use super::remote_error;
use crate::provision::{GatewayResource, GatewayService, ProvisionError};
use async_trait::async_trait;
use serde_json::{json, Value};

const SERVICE: &str = "apigateway";

#[derive(Clone)]
pub struct ApiGatewayClient {
    aws: AwsClient,
}

impl ApiGatewayClient {
    pub fn new(aws: AwsClient) -> Self {
        Self { aws }
    }

    fn url(&self, region: &str, path: &str) -> String {
        format!("{}/{}", self.aws.apigateway_base(region), path)
    }
}

/// Resource listings come back either as a plain `item` array or wrapped in
/// a HAL `_embedded` envelope (where a single entry is an object, not an array)
fn parse_resources(response: &Value) -> Vec<GatewayResource> {
    let items = response
        .get("item")
        .or_else(|| response.get("_embedded").and_then(|e| e.get("item")));

    let as_resource = |item: &Value| -> Option<GatewayResource> {
        Some(GatewayResource {
            id: item.get("id")?.as_str()?.to_string(),
            path: item.get("path")?.as_str()?.to_string(),
        })
    };

    match items {
        Some(Value::Array(items)) => items.iter().filter_map(as_resource).collect(),
        Some(single @ Value::Object(_)) => as_resource(single).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// An integration rejected for an unusable role is IAM propagation lag
fn is_propagation_failure(failure: &ApiFailure) -> bool {
    failure.code() == Some("BadRequestException") && {
        let message = failure.message().to_lowercase();
        message.contains("role") && (message.contains("invalid") || message.contains("assume"))
    }
}

#[async_trait]
impl GatewayService for ApiGatewayClient {
    async fn create_rest_api(&self, name: &str, region: &str) -> Result<String, ProvisionError> {
        let response = self
            .aws
            .http
            .post_json(
                &self.url(region, "restapis"),
                &json!({"name": name}),
                &self.aws.credentials,
                SERVICE,
                region,
            )
            .await
            .map_err(|e| remote_error(name, e))?;

        response
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| ProvisionError::Remote {
                resource: name.to_string(),
                code: None,
                message: "rest api creation returned no id".to_string(),
            })
    }

    async fn list_resources(
        &self,
        api_id: &str,
        region: &str,
    ) -> Result<Vec<GatewayResource>, ProvisionError> {
        let response = self
            .aws
            .http
            .get_json(
                &self.url(region, &format!("restapis/{api_id}/resources")),
                &self.aws.credentials,
                SERVICE,
                region,
            )
            .await
            .map_err(|e| remote_error(api_id, e))?;

        Ok(parse_resources(&response))
    }

    async fn create_resource(
        &self,
        api_id: &str,
        parent_id: &str,
        path_part: &str,
        region: &str,
    ) -> Result<String, ProvisionError> {
        let response = self
            .aws
            .http
            .post_json(
                &self.url(region, &format!("restapis/{api_id}/resources/{parent_id}")),
                &json!({"pathPart": path_part}),
                &self.aws.credentials,
                SERVICE,
                region,
            )
            .await
            .map_err(|e| remote_error(api_id, e))?;

        response
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| ProvisionError::Remote {
                resource: api_id.to_string(),
                code: None,
                message: "resource creation returned no id".to_string(),
            })
    }

    async fn put_method(
        &self,
        api_id: &str,
        resource_id: &str,
        region: &str,
    ) -> Result<(), ProvisionError> {
        let body = json!({
            "authorizationType": "NONE",
            "requestParameters": {
                "method.request.path.proxy": true,
            },
        });
        let url = self.url(
            region,
            &format!("restapis/{api_id}/resources/{resource_id}/methods/ANY"),
        );

        self.aws
            .http
            .put_json(&url, &body, &self.aws.credentials, SERVICE, region)
            .await
            .map(|_| ())
            .map_err(|e| remote_error(api_id, e))
    }

    async fn put_integration(
        &self,
        api_id: &str,
        resource_id: &str,
        integration_uri: &str,
        credentials_arn: &str,
        region: &str,
    ) -> Result<(), ProvisionError> {
        let body = json!({
            "type": "AWS_PROXY",
            "httpMethod": "POST",
            "uri": integration_uri,
            "credentials": credentials_arn,
            "passthroughBehavior": "WHEN_NO_MATCH",
            "cacheKeyParameters": ["method.request.path.proxy"],
            "cacheNamespace": "proxy",
            "requestParameters": {
                "integration.request.path.proxy": "method.request.path.proxy",
            },
        });
        let url = self.url(
            region,
            &format!("restapis/{api_id}/resources/{resource_id}/methods/ANY/integration"),
        );

        let result = self
            .aws
            .http
            .put_json(&url, &body, &self.aws.credentials, SERVICE, region)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(failure) if is_propagation_failure(&failure) => {
                Err(ProvisionError::NotYetPropagated {
                    resource: format!("invocation role for api {api_id}"),
                    message: failure.message(),
                })
            }
            Err(failure) => Err(remote_error(api_id, failure)),
        }
    }

    async fn create_deployment(
        &self,
        api_id: &str,
        stage: &str,
        region: &str,
    ) -> Result<(), ProvisionError> {
        self.aws
            .http
            .post_json(
                &self.url(region, &format!("restapis/{api_id}/deployments")),
                &json!({"stageName": stage}),
                &self.aws.credentials,
                SERVICE,
                region,
            )
            .await
            .map(|_| ())
            .map_err(|e| remote_error(api_id, e))
    }
}
