//! Credential store for the Reddit application credentials.
//!
//! Credentials live in a small JSON file:
//!
//! ```json
//! { "client_id": "...", "client_secret": "...", "user_agent": "Goon/1.0" }
//! ```
//!
//! A missing file is not an error; it just means no credentials yet. The
//! gateway turns incomplete credentials into an authentication error at
//! fetch time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_USER_AGENT: &str = "Goon/1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            user_agent: user_agent.unwrap_or_default(),
        }
        .normalized()
    }

    /// Trim whitespace and fill in the default user agent.
    pub fn normalized(self) -> Self {
        let user_agent = self.user_agent.trim();
        Self {
            client_id: self.client_id.trim().to_string(),
            client_secret: self.client_secret.trim().to_string(),
            user_agent: if user_agent.is_empty() {
                DEFAULT_USER_AGENT.to_string()
            } else {
                user_agent.to_string()
            },
        }
    }

    /// Both the client id and the secret are present.
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Neither the client id nor the secret is present; saving this resets the store.
    pub fn is_reset(&self) -> bool {
        self.client_id.is_empty() && self.client_secret.is_empty()
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Presence summary that is safe to log or return over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStatus {
    pub configured: bool,
    pub client_id_present: bool,
    pub client_secret_present: bool,
}

impl From<&Credentials> for CredentialStatus {
    fn from(c: &Credentials) -> Self {
        Self {
            configured: c.is_complete(),
            client_id_present: !c.client_id.is_empty(),
            client_secret_present: !c.client_secret.is_empty(),
        }
    }
}

/// File-backed credential store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load credentials, returning empty ones when the file is absent.
    pub fn load(&self) -> Result<Credentials> {
        if !self.path.exists() {
            return Ok(Credentials::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credentials file: {}", self.path.display()))?;
        let creds: Credentials = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse credentials file: {}", self.path.display())
        })?;
        Ok(creds.normalized())
    }

    pub fn save(&self, creds: &Credentials) -> Result<()> {
        let creds = creds.clone().normalized();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create credentials directory: {}", parent.display())
                })?;
            }
        }
        let json = serde_json::to_string_pretty(&creds)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write credentials file: {}", self.path.display()))?;

        let status = CredentialStatus::from(&creds);
        info!(
            path = %self.path.display(),
            client_id_present = status.client_id_present,
            client_secret_present = status.client_secret_present,
            "saved credentials"
        );
        Ok(())
    }

    /// Write a placeholder file next to the credentials file, once.
    pub fn write_template(&self) -> Result<Option<PathBuf>> {
        let template = self.path.with_file_name("credentials_template.json");
        if template.exists() {
            return Ok(None);
        }
        if let Some(parent) = template.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create credentials directory: {}", parent.display())
                })?;
            }
        }
        let placeholder = Credentials {
            client_id: "YOUR_REDDIT_CLIENT_ID_HERE".to_string(),
            client_secret: "YOUR_REDDIT_CLIENT_SECRET_HERE".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        };
        match std::fs::write(&template, serde_json::to_string_pretty(&placeholder)?) {
            Ok(()) => Ok(Some(template)),
            Err(e) => {
                warn!(path = %template.display(), error = %e, "could not write credentials template");
                Ok(None)
            }
        }
    }
}
