use std::fs;
use std::path::PathBuf;

use aapctl_core::Auth;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::config::config_dir;

/// Stored credentials: Basic Auth or an API token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum StoredCredentials {
    #[serde(rename = "basic")]
    Basic {
        host: String,
        username: String,
        password: String,
    },
    #[serde(rename = "token")]
    Token { host: String, token: String },
}

impl StoredCredentials {
    pub fn host(&self) -> &str {
        match self {
            Self::Basic { host, .. } | Self::Token { host, .. } => host,
        }
    }
}

fn creds_path(env: &str) -> Result<PathBuf> {
    Ok(config_dir()?.join(format!("credentials.{env}.json")))
}

pub fn load_credentials(env: &str) -> Result<Option<StoredCredentials>> {
    let path = creds_path(env)?;
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let creds: StoredCredentials = serde_json::from_str(&content)?;
    Ok(Some(creds))
}

pub fn save_credentials(env: &str, creds: &StoredCredentials) -> Result<()> {
    let path = creds_path(env)?;
    let content = serde_json::to_string_pretty(creds)?;
    fs::write(&path, content)?;
    restrict_permissions(&path)?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) -> Result<()> {
    Ok(())
}

pub fn remove_credentials(env: &str) -> Result<bool> {
    let path = creds_path(env)?;
    if path.exists() {
        fs::remove_file(path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

pub fn to_auth(creds: &StoredCredentials) -> Auth {
    match creds {
        StoredCredentials::Basic {
            username, password, ..
        } => Auth::Basic {
            username: username.clone(),
            password: password.clone(),
        },
        StoredCredentials::Token { token, .. } => Auth::Token {
            token: token.clone(),
        },
    }
}

/// Credentials given on the command line, if complete
pub fn auth_from_flags(
    username: Option<&str>,
    password: Option<&str>,
    token: Option<&str>,
) -> Result<Option<Auth>> {
    if let Some(token) = token {
        return Ok(Some(Auth::Token {
            token: token.to_string(),
        }));
    }
    match (username, password) {
        (Some(username), Some(password)) => Ok(Some(Auth::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })),
        (Some(_), None) => anyhow::bail!("--password (or AAP_PASSWORD) is required with --username"),
        (None, Some(_)) => anyhow::bail!("--username (or AAP_USERNAME) is required with --password"),
        (None, None) => Ok(None),
    }
}

/// Flags and env vars first, then credentials stored by `aapctl login`
pub fn resolve_auth(cli: &Cli) -> Result<Option<Auth>> {
    if let Some(auth) = auth_from_flags(
        cli.username.as_deref(),
        cli.password.as_deref(),
        cli.token.as_deref(),
    )? {
        return Ok(Some(auth));
    }
    Ok(load_credentials(&cli.env)?.as_ref().map(to_auth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_beats_basic() {
        let auth = auth_from_flags(Some("admin"), Some("pw"), Some("tok"))
            .unwrap()
            .unwrap();
        assert!(matches!(auth, Auth::Token { token } if token == "tok"));
    }

    #[test]
    fn basic_needs_both_halves() {
        assert!(auth_from_flags(Some("admin"), None, None).is_err());
        assert!(auth_from_flags(None, Some("pw"), None).is_err());
        assert!(auth_from_flags(None, None, None).unwrap().is_none());
        let auth = auth_from_flags(Some("admin"), Some("pw"), None)
            .unwrap()
            .unwrap();
        assert!(matches!(auth, Auth::Basic { username, .. } if username == "admin"));
    }

    #[test]
    fn stored_credentials_are_tagged() {
        let creds = StoredCredentials::Token {
            host: "https://aap.lab.local".into(),
            token: "abc".into(),
        };
        let json = serde_json::to_value(&creds).unwrap();
        assert_eq!(json["type"], "token");
        let back: StoredCredentials = serde_json::from_value(json).unwrap();
        assert_eq!(back, creds);
        assert_eq!(back.host(), "https://aap.lab.local");
    }
}
