//! AWS Authentication
//!
//! Resolves ambient credentials the way the AWS CLI does: environment
//! variables first, then the shared credentials file (`~/.aws/credentials`),
//! honoring `AWS_PROFILE`. Also resolves the default region from the
//! environment or the shared config file.

use anyhow::{bail, Result};
use std::path::PathBuf;

/// Static access credentials used to sign every request
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    // The secret key never goes to logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AwsCredentials {
    /// Resolve credentials: environment, then the shared credentials file
    pub fn resolve() -> Result<Self> {
        if let (Ok(access_key_id), Ok(secret_access_key)) = (
            std::env::var("AWS_ACCESS_KEY_ID"),
            std::env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            return Ok(Self {
                access_key_id,
                secret_access_key,
                session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
            });
        }

        let profile = std::env::var("AWS_PROFILE").unwrap_or_else(|_| "default".to_string());
        if let Some(creds) = from_shared_file(&profile) {
            return Ok(creds);
        }

        bail!(
            "No AWS credentials found. Set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY \
             or configure a profile with 'aws configure'"
        )
    }

    /// Fixed credentials, for tests
    pub fn from_static(access_key_id: &str, secret_access_key: &str) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: None,
        }
    }
}

/// Locate the shared AWS config directory
pub fn shared_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".aws"))
}

fn from_shared_file(profile: &str) -> Option<AwsCredentials> {
    let path = match std::env::var("AWS_SHARED_CREDENTIALS_FILE") {
        Ok(p) => PathBuf::from(p),
        Err(_) => shared_config_dir()?.join("credentials"),
    };
    let content = std::fs::read_to_string(&path).ok()?;

    let access_key_id = read_profile_key(&content, profile, "aws_access_key_id")?;
    let secret_access_key = read_profile_key(&content, profile, "aws_secret_access_key")?;
    let session_token = read_profile_key(&content, profile, "aws_session_token");

    tracing::debug!("Loaded credentials for profile '{}' from {:?}", profile, path);

    Some(AwsCredentials {
        access_key_id,
        secret_access_key,
        session_token,
    })
}

/// Resolve the default region: environment first, then the shared config file
pub fn default_region() -> Option<String> {
    if let Ok(region) = std::env::var("AWS_REGION") {
        return Some(region);
    }
    if let Ok(region) = std::env::var("AWS_DEFAULT_REGION") {
        return Some(region);
    }

    let profile = std::env::var("AWS_PROFILE").unwrap_or_else(|_| "default".to_string());
    let section = if profile == "default" {
        "default".to_string()
    } else {
        format!("profile {profile}")
    };

    let path = match std::env::var("AWS_CONFIG_FILE") {
        Ok(p) => PathBuf::from(p),
        Err(_) => shared_config_dir()?.join("config"),
    };
    let content = std::fs::read_to_string(&path).ok()?;
    read_profile_key(&content, &section, "region")
}

/// Read `key = value` from the named INI section, skipping comments
fn read_profile_key(content: &str, section: &str, key: &str) -> Option<String> {
    let header = format!("[{section}]");
    let mut in_section = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_section = line == header;
            continue;
        }
        if in_section {
            if let Some((k, v)) = line.split_once('=') {
                if k.trim() == key {
                    let value = v.trim();
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    None
}
