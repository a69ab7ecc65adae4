//! Provisioning error taxonomy
//!
//! Four failure kinds cover everything the deployment pipeline can hit:
//! bad configuration (rejected before any remote call), IAM propagation lag
//! (safe to retry the whole command), remote service failures (fatal), and
//! local I/O failures while reading the artifact.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A StageEntry failed validation. No remote call was issued for it.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A freshly created role is not yet visible to the dependent service.
    /// Re-running the same command is safe: every other step is
    /// existence-checked or replace-idempotent.
    #[error("{resource} is not yet usable ({message}); re-run the command once IAM propagation has caught up")]
    NotYetPropagated { resource: String, message: String },

    /// Any other provider failure: malformed request, permission denied,
    /// quota exceeded, name collision with a foreign account.
    #[error("remote service error on {resource}{}: {message}", .code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Remote {
        resource: String,
        code: Option<String>,
        message: String,
    },

    /// Local filesystem failure, e.g. the packaged artifact is unreadable.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProvisionError {
    /// Provider error code, when the remote service supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ProvisionError::Remote { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
