//! Provisioning orchestrator
//!
//! Turns a declarative stage description into an idempotent sequence of
//! remote-resource operations. The provisioners in this module depend only
//! on the capability traits below, never on the concrete AWS clients, so
//! tests substitute in-memory fakes.
//!
//! # Module Structure
//!
//! - [`orchestrator`] - sequences provisioners per stage entry (`install`/`update`)
//! - [`role`] - execution role and policy composition
//! - [`bucket`] - artifact bucket existence/creation
//! - [`artifact`] - packaged code upload
//! - [`function`] - function create / code update
//! - [`gateway`] - optional HTTP front-end wiring
//! - [`retry`] - bounded backoff for IAM propagation lag

pub mod artifact;
pub mod bucket;
pub mod error;
pub mod function;
pub mod gateway;
pub mod orchestrator;
pub mod retry;
pub mod role;

pub use error::ProvisionError;
pub use orchestrator::Deployer;

use crate::config::StageEntry;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// The provider's default region: bucket creation there must use the
/// region-default call (no location constraint)
pub const DEFAULT_REGION: &str = "us-east-1";

/// Service principal allowed to assume a function's execution role
pub const LAMBDA_PRINCIPAL: &str = "lambda.amazonaws.com";

/// Service principal allowed to assume the gateway's invocation role
pub const APIGATEWAY_PRINCIPAL: &str = "apigateway.amazonaws.com";

/// An execution/trust role as seen by the identity service
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub arn: String,
}

/// Tagged result of a role-creation attempt
#[derive(Debug, Clone)]
pub enum RoleOutcome {
    Created(Role),
    AlreadyExists,
}

/// Tagged result of a function-creation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionOutcome {
    Created,
    AlreadyExists,
}

/// What the bucket provisioner did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketOutcome {
    Created,
    Skipped,
}

/// One resource under a REST API (id plus its path)
#[derive(Debug, Clone)]
pub struct GatewayResource {
    pub id: String,
    pub path: String,
}

/// Full configuration for a function-creation call
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub function_name: String,
    pub handler: String,
    pub runtime: String,
    pub memory_size: u32,
    pub timeout: u32,
    pub role_arn: String,
    pub bucket: String,
    pub object_key: String,
    pub region: String,
    pub environment: BTreeMap<String, String>,
}

impl FunctionSpec {
    pub fn from_entry(entry: &StageEntry, role_arn: &str) -> Self {
        Self {
            function_name: entry.function_name.clone(),
            handler: entry.handler.clone(),
            runtime: entry.runtime.clone(),
            memory_size: entry.memory_size,
            timeout: entry.timeout,
            role_arn: role_arn.to_string(),
            bucket: entry.bucket.clone(),
            object_key: entry.object_key.clone(),
            region: entry.region.clone(),
            environment: entry.environment.clone(),
        }
    }
}

/// Object-storage capability: bucket existence, creation, object upload
#[async_trait]
pub trait StorageService {
    async fn bucket_exists(&self, name: &str, region: &str) -> Result<bool, ProvisionError>;

    /// Create a bucket. `location_constraint` is `None` for the provider's
    /// default region and `Some(region)` everywhere else.
    async fn create_bucket(
        &self,
        name: &str,
        location_constraint: Option<&str>,
    ) -> Result<(), ProvisionError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        region: &str,
    ) -> Result<(), ProvisionError>;
}

/// Identity capability: roles, policies, caller identity
#[async_trait]
pub trait IdentityService {
    async fn create_role(
        &self,
        name: &str,
        trust_document: &Value,
    ) -> Result<RoleOutcome, ProvisionError>;

    async fn get_role(&self, name: &str) -> Result<Role, ProvisionError>;

    /// Create a managed policy, returning its ARN
    async fn create_policy(&self, name: &str, document: &Value) -> Result<String, ProvisionError>;

    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProvisionError>;

    /// ARN of the credentials' owner, used to derive the account id
    async fn caller_identity(&self) -> Result<String, ProvisionError>;
}

/// Compute capability: function creation and code replacement
#[async_trait]
pub trait ComputeService {
    async fn create_function(&self, spec: &FunctionSpec) -> Result<FunctionOutcome, ProvisionError>;

    /// Replace only the code artifact reference; configuration is untouched
    async fn update_function_code(
        &self,
        function_name: &str,
        bucket: &str,
        key: &str,
        region: &str,
    ) -> Result<(), ProvisionError>;
}

/// API-gateway capability: the linear REST API dependency chain
#[async_trait]
pub trait GatewayService {
    async fn create_rest_api(&self, name: &str, region: &str) -> Result<String, ProvisionError>;

    async fn list_resources(
        &self,
        api_id: &str,
        region: &str,
    ) -> Result<Vec<GatewayResource>, ProvisionError>;

    async fn create_resource(
        &self,
        api_id: &str,
        parent_id: &str,
        path_part: &str,
        region: &str,
    ) -> Result<String, ProvisionError>;

    /// Register an unauthenticated ANY method accepting a greedy path parameter
    async fn put_method(
        &self,
        api_id: &str,
        resource_id: &str,
        region: &str,
    ) -> Result<(), ProvisionError>;

    /// Proxy-style backend integration using the given invocation role
    async fn put_integration(
        &self,
        api_id: &str,
        resource_id: &str,
        integration_uri: &str,
        credentials_arn: &str,
        region: &str,
    ) -> Result<(), ProvisionError>;

    async fn create_deployment(
        &self,
        api_id: &str,
        stage: &str,
        region: &str,
    ) -> Result<(), ProvisionError>;
}
