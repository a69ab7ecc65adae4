//! AWS API interaction module
//!
//! Everything that actually talks to AWS lives here: credential resolution,
//! SigV4 signing, the shared HTTP client, and one thin client per service
//! implementing the capability traits from [`crate::provision`].
//!
//! # Module Structure
//!
//! - [`auth`] - ambient credential and default-region resolution
//! - [`sign`] - SigV4 request signing
//! - [`http`] - signed HTTP transport and error classification
//! - [`client`] - shared handle and per-service endpoint builders
//! - [`s3`], [`iam`], [`lambda`], [`apigateway`] - service clients

pub mod apigateway;
pub mod auth;
pub mod client;
pub mod http;
pub mod iam;
pub mod lambda;
pub mod s3;
pub mod sign;

use crate::provision::ProvisionError;
use http::ApiFailure;

/// Map an API failure onto the fatal error taxonomy, tagging it with the
/// identity of the resource being provisioned.
pub(crate) fn remote_error(resource: &str, failure: ApiFailure) -> ProvisionError {
    match failure {
        ApiFailure::Transport(e) => ProvisionError::Remote {
            resource: resource.to_string(),
            code: None,
            message: e.to_string(),
        },
        ApiFailure::Api { code, message, .. } => ProvisionError::Remote {
            resource: resource.to_string(),
            code,
            message,
        },
    }
}
