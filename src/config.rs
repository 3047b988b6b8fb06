use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory served at `/` (index page, scripts, sounds).
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("./static")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    /// Explicitly configured user content directory. Probed after the
    /// executable-adjacent directory and before the static directory.
    #[serde(default)]
    pub user_dir: Option<PathBuf>,
    /// Application-bundled content root; always probed last.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Probe `<exe dir>/user_content` first (packaged deployments).
    #[serde(default)]
    pub exe_adjacent: bool,
    #[serde(default = "default_folder_cache_ttl")]
    pub folder_cache_ttl_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            user_dir: None,
            static_dir: default_static_dir(),
            exe_adjacent: false,
            folder_cache_ttl_secs: default_folder_cache_ttl(),
        }
    }
}

fn default_folder_cache_ttl() -> u64 {
    60
}

impl ContentConfig {
    pub fn folder_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.folder_cache_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedditConfig {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Packaged deployments cap session reuse at five minutes.
    #[serde(default)]
    pub packaged: bool,
    /// Explicit session reuse limit; overrides the packaged default.
    #[serde(default)]
    pub session_ttl_secs: Option<u64>,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            api_url: default_api_url(),
            credentials_path: default_credentials_path(),
            timeout_secs: default_timeout_secs(),
            packaged: false,
            session_ttl_secs: None,
        }
    }
}

fn default_auth_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}
fn default_api_url() -> String {
    "https://oauth.reddit.com".to_string()
}
fn default_credentials_path() -> PathBuf {
    PathBuf::from("./credentials.json")
}
fn default_timeout_secs() -> u64 {
    16
}

pub const PACKAGED_SESSION_TTL_SECS: u64 = 300;

impl RedditConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// How long an authenticated session may be reused. `None` means until
    /// the credentials change or the session is invalidated.
    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl_secs
            .or(self.packaged.then_some(PACKAGED_SESSION_TTL_SECS))
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("./user_settings.json")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if config.content.folder_cache_ttl_secs == 0 {
        anyhow::bail!("content.folder_cache_ttl_secs must be > 0");
    }

    if config.reddit.timeout_secs == 0 {
        anyhow::bail!("reddit.timeout_secs must be > 0");
    }

    if config.reddit.session_ttl_secs == Some(0) {
        anyhow::bail!("reddit.session_ttl_secs must be > 0 when set");
    }

    for (field, url) in [
        ("reddit.auth_url", &config.reddit.auth_url),
        ("reddit.api_url", &config.reddit.api_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("{} must be an http(s) URL, got '{}'", field, url);
        }
    }

    Ok(())
}
