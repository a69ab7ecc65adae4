//! HTTP utilities for AWS REST API calls
//!
//! Wraps reqwest with SigV4 signing and maps non-success responses into a
//! typed failure carrying the provider's error code, so callers can branch
//! on "already exists" and propagation conditions without string-matching
//! raw bodies.

use super::auth::AwsCredentials;
use super::sign::sign_request;
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// A failed API call: either transport or a provider error response
#[derive(Debug, Error)]
pub enum ApiFailure {
    #[error("request transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service returned {status}{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

impl ApiFailure {
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiFailure::Api { code, .. } => code.as_deref(),
            ApiFailure::Transport(_) => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiFailure::Api { message, .. } => message.clone(),
            ApiFailure::Transport(e) => e.to_string(),
        }
    }
}

/// Sanitize response body for logging: truncate and strip non-printable bytes
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..MAX_LOG_BODY_LENGTH],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for signed AWS API calls
#[derive(Clone)]
pub struct AwsHttpClient {
    client: Client,
}

impl AwsHttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("skylift/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// GET expecting a JSON body
    pub async fn get_json(
        &self,
        url: &str,
        credentials: &AwsCredentials,
        service: &str,
        region: &str,
    ) -> Result<Value, ApiFailure> {
        self.send_json(Method::GET, url, Vec::new(), None, credentials, service, region)
            .await
    }

    /// POST with a JSON body
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
        credentials: &AwsCredentials,
        service: &str,
        region: &str,
    ) -> Result<Value, ApiFailure> {
        let payload = serde_json::to_vec(body).unwrap_or_default();
        self.send_json(
            Method::POST,
            url,
            payload,
            Some("application/json"),
            credentials,
            service,
            region,
        )
        .await
    }

    /// PUT with a JSON body
    pub async fn put_json(
        &self,
        url: &str,
        body: &Value,
        credentials: &AwsCredentials,
        service: &str,
        region: &str,
    ) -> Result<Value, ApiFailure> {
        let payload = serde_json::to_vec(body).unwrap_or_default();
        self.send_json(
            Method::PUT,
            url,
            payload,
            Some("application/json"),
            credentials,
            service,
            region,
        )
        .await
    }

    /// POST a form-encoded query-API action, asking for a JSON response.
    /// Used by the IAM and STS query APIs.
    pub async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
        credentials: &AwsCredentials,
        service: &str,
        region: &str,
    ) -> Result<Value, ApiFailure> {
        let payload = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
            .into_bytes();
        self.send_json(
            Method::POST,
            url,
            payload,
            Some("application/x-www-form-urlencoded"),
            credentials,
            service,
            region,
        )
        .await
    }

    /// PUT raw bytes (object uploads, bucket creation XML)
    pub async fn put_raw(
        &self,
        url: &str,
        payload: Vec<u8>,
        content_type: &str,
        credentials: &AwsCredentials,
        service: &str,
        region: &str,
    ) -> Result<(), ApiFailure> {
        self.send_json(
            Method::PUT,
            url,
            payload,
            Some(content_type),
            credentials,
            service,
            region,
        )
        .await
        .map(|_| ())
    }

    /// HEAD, returning the raw status code for existence probes
    pub async fn head(
        &self,
        url: &str,
        credentials: &AwsCredentials,
        service: &str,
        region: &str,
    ) -> Result<StatusCode, ApiFailure> {
        let parsed = parse_url(url)?;
        let signed = sign_request("HEAD", &parsed, b"", service, region, credentials, Utc::now())
            .map_err(signing_error)?;

        tracing::debug!("HEAD {}", url);

        let mut request = self
            .client
            .head(url)
            .header("authorization", &signed.authorization)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256);
        if let Some(token) = &signed.security_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request.send().await?;
        Ok(response.status())
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_json(
        &self,
        method: Method,
        url: &str,
        payload: Vec<u8>,
        content_type: Option<&str>,
        credentials: &AwsCredentials,
        service: &str,
        region: &str,
    ) -> Result<Value, ApiFailure> {
        let parsed = parse_url(url)?;
        let signed = sign_request(
            method.as_str(),
            &parsed,
            &payload,
            service,
            region,
            credentials,
            Utc::now(),
        )
        .map_err(signing_error)?;

        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .header("authorization", &signed.authorization)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .header("accept", "application/json");
        if let Some(token) = &signed.security_token {
            request = request.header("x-amz-security-token", token);
        }
        if let Some(ct) = content_type {
            request = request.header("content-type", ct);
        }
        if !payload.is_empty() {
            request = request.body(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let (code, message) = extract_error(&body);
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ApiFailure::Api {
                status: status.as_u16(),
                code,
                message: message.unwrap_or_else(|| format!("request failed with {status}")),
            });
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            // Some S3 success responses are XML or empty-ish; callers that
            // reach here only need success/failure
            Err(_) => Ok(Value::Null),
        }
    }
}

fn signing_error(e: hmac::digest::InvalidLength) -> ApiFailure {
    ApiFailure::Api {
        status: 0,
        code: None,
        message: format!("failed to sign request: {e}"),
    }
}

fn parse_url(url: &str) -> Result<Url, ApiFailure> {
    Url::parse(url).map_err(|e| ApiFailure::Api {
        status: 0,
        code: None,
        message: format!("invalid url {url}: {e}"),
    })
}

/// Pull the provider error code and message out of a failure body.
/// Handles the three shapes this crate sees: query-API JSON
/// (`{"Error":{"Code":...}}`), REST JSON (`{"__type":...,"message":...}`,
/// possibly namespaced), and S3 XML (`<Code>...</Code>`).
fn extract_error(body: &str) -> (Option<String>, Option<String>) {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(error) = value.get("Error") {
            let code = error.get("Code").and_then(|v| v.as_str()).map(String::from);
            let message = error
                .get("Message")
                .and_then(|v| v.as_str())
                .map(String::from);
            return (code, message);
        }
        let code = value
            .get("__type")
            .and_then(|v| v.as_str())
            .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
            .or_else(|| value.get("code").and_then(|v| v.as_str()).map(String::from));
        let message = value
            .get("message")
            .or_else(|| value.get("Message"))
            .and_then(|v| v.as_str())
            .map(String::from);
        return (code, message);
    }

    // S3-style XML error body
    let code = xml_tag(body, "Code");
    let message = xml_tag(body, "Message");
    (code, message)
}

fn xml_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].to_string())
}
