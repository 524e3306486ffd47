//! AWS credential resolution for a named profile.
//!
//! Resolution order mirrors the slice of the default chain this tool needs:
//! environment variables for the default profile, then the shared credentials
//! file (`$AWS_SHARED_CREDENTIALS_FILE` or `~/.aws/credentials`). Anything
//! deeper (SSO, instance metadata, assume-role) is out of scope.
use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

use crate::cli::DEFAULT_PROFILE;

/// Static credentials used to sign control-plane requests.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Resolve credentials for `profile`, or fail before any provider call.
pub fn resolve_credentials(profile: &str) -> Result<Credentials> {
    if profile == DEFAULT_PROFILE {
        if let Some(credentials) = from_env() {
            return Ok(credentials);
        }
    }
    let path = credentials_file_path()?;
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("read credentials file {}", path.display()))?;
    parse_profile(&contents, profile)
        .with_context(|| format!("resolve profile {profile:?} from {}", path.display()))
}

fn from_env() -> Option<Credentials> {
    let access_key_id = env::var("AWS_ACCESS_KEY_ID").ok()?;
    let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok()?;
    Some(Credentials {
        access_key_id,
        secret_access_key,
        session_token: env::var("AWS_SESSION_TOKEN").ok(),
    })
}

fn credentials_file_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os("AWS_SHARED_CREDENTIALS_FILE") {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("home directory is not resolvable"))?;
    Ok(home.join(".aws").join("credentials"))
}

/// Parse one `[profile]` section of the shared credentials file.
fn parse_profile(contents: &str, profile: &str) -> Result<Credentials> {
    let mut in_section = false;
    let mut access_key_id = None;
    let mut secret_access_key = None;
    let mut session_token = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            in_section = section.trim() == profile;
            continue;
        }
        if !in_section {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "aws_access_key_id" => access_key_id = Some(value),
            "aws_secret_access_key" => secret_access_key = Some(value),
            "aws_session_token" => session_token = Some(value),
            _ => {}
        }
    }

    match (access_key_id, secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(Credentials {
            access_key_id,
            secret_access_key,
            session_token,
        }),
        _ => Err(anyhow!("profile {profile:?} has no complete key pair")),
    }
}
