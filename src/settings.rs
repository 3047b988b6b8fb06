//! Settings store.
//!
//! The browser client owns a flat camelCase JSON document with everything
//! from subreddit lists to theme and metronome volume. The rotator only
//! interprets the fields that drive selection; every other key is kept as-is
//! and written back on save.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{
    lenient_u32, CollectionEntry, EnabledFolders, SelectionRequest, SourceMode, TimerBounds,
    DEFAULT_TIMER_MAX, DEFAULT_TIMER_MIN,
};

/// Written into every saved document.
pub const SETTINGS_VERSION: &str = "1.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub favorites: Vec<CollectionEntry>,
    #[serde(default)]
    pub punishments: Vec<CollectionEntry>,
    #[serde(default = "default_timer_min", deserialize_with = "lenient_u32")]
    pub timer_min: u32,
    #[serde(default = "default_timer_max", deserialize_with = "lenient_u32")]
    pub timer_max: u32,
    #[serde(default)]
    pub content_source: SourceMode,
    #[serde(default)]
    pub punishments_enabled: bool,
    #[serde(default)]
    pub enabled_content_folders: Vec<String>,
    #[serde(default)]
    pub enabled_punishment_folders: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// Client-only keys (theme, sounds, counters...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            favorites: Vec::new(),
            punishments: Vec::new(),
            timer_min: DEFAULT_TIMER_MIN,
            timer_max: DEFAULT_TIMER_MAX,
            content_source: SourceMode::default(),
            punishments_enabled: false,
            enabled_content_folders: Vec::new(),
            enabled_punishment_folders: Vec::new(),
            version: None,
            last_updated: None,
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Build a selection request from the saved preferences. There is no
    /// history on this path; `mode` overrides the saved content source.
    pub fn selection_request(&self, mode: Option<SourceMode>) -> Result<SelectionRequest> {
        Ok(SelectionRequest {
            mode: mode.unwrap_or(self.content_source),
            favorites: self.favorites.clone(),
            punishments: self.punishments.clone(),
            enabled_folders: EnabledFolders {
                content: self.enabled_content_folders.clone(),
                punishment: self.enabled_punishment_folders.clone(),
            },
            history: Vec::new(),
            timer: TimerBounds::new(self.timer_min, self.timer_max)?,
            punishments_enabled: self.punishments_enabled,
        })
    }
}

fn default_timer_min() -> u32 {
    DEFAULT_TIMER_MIN
}

fn default_timer_max() -> u32 {
    DEFAULT_TIMER_MAX
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load settings; a missing file yields defaults.
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings file: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", self.path.display()))
    }

    /// Stamp version and timestamp, then write. Returns what was written.
    pub fn save(&self, mut settings: Settings) -> Result<Settings> {
        settings.version = Some(SETTINGS_VERSION.to_string());
        settings.last_updated = Some(Utc::now().to_rfc3339());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create settings directory: {}", parent.display())
                })?;
            }
        }
        let json = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write settings file: {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            favorites = settings.favorites.len(),
            punishments = settings.punishments.len(),
            "saved settings"
        );
        Ok(settings)
    }
}
