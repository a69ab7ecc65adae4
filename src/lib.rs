//! skylift - deploy serverless functions to AWS
//!
//! Provisions Lambda functions and their supporting resources (S3 artifact
//! bucket, IAM execution role and policy, optional API Gateway front-end)
//! across named deployment stages, from a declarative YAML stage file.
//!
//! The [`provision`] module is the core: it turns a stage description into
//! an idempotent sequence of remote operations against the capability traits
//! it defines. The [`aws`] module implements those traits over the AWS REST
//! APIs; [`config`] loads and validates the stage file.

pub mod aws;
pub mod config;
pub mod provision;

/// Version injected at compile time via SKYLIFT_VERSION env var (set by
/// CI/CD), or "dev" for local builds.
pub const VERSION: &str = match option_env!("SKYLIFT_VERSION") {
    Some(v) => v,
    None => "dev",
};
