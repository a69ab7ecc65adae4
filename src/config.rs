//! Deployment Configuration
//!
//! Loads and validates the declarative stage file: a mapping from stage name
//! to an ordered list of [`StageEntry`] values, one per function per region.
//! Validation happens at load time so a malformed entry fails fast with a
//! configuration error instead of a deep remote-call failure.

use crate::provision::ProvisionError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Lambda memory limits in MB
const MIN_MEMORY_MB: u32 = 128;
const MAX_MEMORY_MB: u32 = 10240;

/// Lambda timeout limit in seconds
const MAX_TIMEOUT_SECS: u32 = 900;

/// Deployment stage file: `stages: {name: [entry, ...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    pub stages: BTreeMap<String, Vec<StageEntry>>,
}

impl DeployConfig {
    /// Load and parse the stage file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read stage file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse stage file {}", path.display()))
    }

    /// Entries for one stage, in configuration order
    pub fn stage(&self, name: &str) -> Option<&[StageEntry]> {
        self.stages.get(name).map(|v| v.as_slice())
    }
}

/// One function's full deployment description for one region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEntry {
    pub function_name: String,
    pub handler: String,
    #[serde(default = "default_memory")]
    pub memory_size: u32,
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default = "default_runtime")]
    pub runtime: String,
    /// May be left empty in the stage file; the CLI fills it from the
    /// ambient default region before validation
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub policy_statements: Vec<PolicyStatement>,
    pub bucket: String,
    pub object_key: String,
    #[serde(default)]
    pub api_gateway: Option<ApiGatewayConfig>,
}

fn default_memory() -> u32 {
    128
}

fn default_timeout() -> u32 {
    60
}

fn default_runtime() -> String {
    "python3.12".to_string()
}

impl StageEntry {
    /// Execution role name derived from the function name
    pub fn role_name(&self) -> String {
        format!("{}-role", self.function_name)
    }

    /// Access policy name derived from the function name
    pub fn policy_name(&self) -> String {
        format!("{}-policy", self.function_name)
    }

    /// Reject malformed entries before any remote call is issued
    pub fn validate(&self) -> std::result::Result<(), ProvisionError> {
        if self.function_name.is_empty() {
            return Err(ProvisionError::Configuration(
                "function_name must not be empty".to_string(),
            ));
        }
        if !valid_resource_name(&self.function_name) {
            return Err(ProvisionError::Configuration(format!(
                "function_name '{}' contains invalid characters",
                self.function_name
            )));
        }
        if self.handler.is_empty() {
            return Err(ProvisionError::Configuration(format!(
                "{}: handler must not be empty",
                self.function_name
            )));
        }
        if self.bucket.is_empty() {
            return Err(ProvisionError::Configuration(format!(
                "{}: bucket must not be empty",
                self.function_name
            )));
        }
        if self.object_key.is_empty() {
            return Err(ProvisionError::Configuration(format!(
                "{}: object_key must not be empty",
                self.function_name
            )));
        }
        if !valid_region(&self.region) {
            return Err(ProvisionError::Configuration(format!(
                "{}: '{}' is not a valid region",
                self.function_name, self.region
            )));
        }
        if self.memory_size < MIN_MEMORY_MB || self.memory_size > MAX_MEMORY_MB {
            return Err(ProvisionError::Configuration(format!(
                "{}: memory_size {} is outside {}..={} MB",
                self.function_name, self.memory_size, MIN_MEMORY_MB, MAX_MEMORY_MB
            )));
        }
        if self.timeout == 0 || self.timeout > MAX_TIMEOUT_SECS {
            return Err(ProvisionError::Configuration(format!(
                "{}: timeout {} is outside 1..={} seconds",
                self.function_name, self.timeout, MAX_TIMEOUT_SECS
            )));
        }
        if let Some(gw) = &self.api_gateway {
            if gw.name.is_empty() {
                return Err(ProvisionError::Configuration(format!(
                    "{}: api_gateway.name must not be empty",
                    self.function_name
                )));
            }
        }
        Ok(())
    }
}

/// Optional HTTP front-end for a function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiGatewayConfig {
    pub name: String,
}

/// One IAM policy statement, serialized verbatim into the policy document.
/// Field names follow the IAM wire format (PascalCase) with snake_case
/// aliases so stage files can use either.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(alias = "effect")]
    pub effect: Effect,
    #[serde(default, alias = "action")]
    pub action: Vec<String>,
    #[serde(default, alias = "resource")]
    pub resource: Vec<String>,
    #[serde(default, alias = "principal", skip_serializing_if = "Option::is_none")]
    pub principal: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Function names: letters, digits, hyphens, underscores
fn valid_resource_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Regions look like "eu-west-1": lowercase letters, digits, hyphens
fn valid_region(region: &str) -> bool {
    !region.is_empty()
        && region.contains('-')
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
