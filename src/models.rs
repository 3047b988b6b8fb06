//! Core data models used throughout the rotator.
//!
//! These types describe the items fetched from the remote source, the
//! request a client sends for its next piece of content, and the normalized
//! descriptor handed back.

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::ops::RangeInclusive;

use crate::history::HistoryRecord;

/// Which kind of source a selection request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    #[default]
    #[serde(alias = "reddit")]
    Remote,
    #[serde(alias = "custom")]
    Local,
    Mixed,
}

impl std::str::FromStr for SourceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "reddit" => Ok(SourceMode::Remote),
            "local" | "custom" => Ok(SourceMode::Local),
            "mixed" => Ok(SourceMode::Mixed),
            other => bail!(
                "Unknown content source: '{}'. Must be remote, local, or mixed.",
                other
            ),
        }
    }
}

/// The concrete source a descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    #[serde(alias = "reddit")]
    Remote,
    #[serde(alias = "custom")]
    Local,
}

/// A favorite or punishment collection as stored by the client.
///
/// Older settings files hold bare strings; newer ones hold objects with an
/// `enabled` toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionEntry {
    Name(String),
    Toggle {
        name: String,
        #[serde(default = "default_true")]
        enabled: bool,
    },
}

impl CollectionEntry {
    pub fn name(&self) -> &str {
        match self {
            CollectionEntry::Name(name) => name,
            CollectionEntry::Toggle { name, .. } => name,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            CollectionEntry::Name(_) => true,
            CollectionEntry::Toggle { enabled, .. } => *enabled,
        }
    }
}

/// Names of enabled entries, in list order.
pub fn enabled_names(entries: &[CollectionEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.is_enabled())
        .map(|e| e.name().to_string())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionLists {
    #[serde(default)]
    pub favorites: Vec<CollectionEntry>,
    #[serde(default)]
    pub punishments: Vec<CollectionEntry>,
}

/// Local folders the user switched on, per folder kind.
///
/// An empty list means every folder on disk is eligible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnabledFolders {
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub punishment: Vec<String>,
}

/// Inclusive bounds for the randomized display timer, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerBounds {
    min: u32,
    max: u32,
}

impl TimerBounds {
    pub fn new(min: u32, max: u32) -> anyhow::Result<Self> {
        if min > max {
            bail!("timerMin ({}) must not exceed timerMax ({})", min, max);
        }
        Ok(Self { min, max })
    }

    pub fn range(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }
}

impl Default for TimerBounds {
    fn default() -> Self {
        Self {
            min: DEFAULT_TIMER_MIN,
            max: DEFAULT_TIMER_MAX,
        }
    }
}

pub const DEFAULT_TIMER_MIN: u32 = 30;
pub const DEFAULT_TIMER_MAX: u32 = 120;

/// Body of `POST /get_content`, as the browser client sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    #[serde(default)]
    pub content_source: SourceMode,
    #[serde(default)]
    pub subreddits: CollectionLists,
    #[serde(default)]
    pub enabled_folders: EnabledFolders,
    #[serde(default = "default_timer_min", deserialize_with = "lenient_u32")]
    pub timer_min: u32,
    #[serde(default = "default_timer_max", deserialize_with = "lenient_u32")]
    pub timer_max: u32,
    #[serde(default)]
    pub content_history: Vec<HistoryRecord>,
    #[serde(default = "default_true")]
    pub punishments_enabled: bool,
}

/// A validated selection request handed to the engine.
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    pub mode: SourceMode,
    pub favorites: Vec<CollectionEntry>,
    pub punishments: Vec<CollectionEntry>,
    pub enabled_folders: EnabledFolders,
    pub history: Vec<HistoryRecord>,
    pub timer: TimerBounds,
    pub punishments_enabled: bool,
}

impl TryFrom<ContentRequest> for SelectionRequest {
    type Error = anyhow::Error;

    fn try_from(req: ContentRequest) -> anyhow::Result<Self> {
        Ok(SelectionRequest {
            mode: req.content_source,
            favorites: req.subreddits.favorites,
            punishments: req.subreddits.punishments,
            enabled_folders: req.enabled_folders,
            history: req.content_history,
            timer: TimerBounds::new(req.timer_min, req.timer_max)?,
            punishments_enabled: req.punishments_enabled,
        })
    }
}

/// Boolean flags carried by a remote item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFlags {
    pub stickied: bool,
    pub is_self: bool,
    pub over_18: bool,
    pub is_gallery: bool,
}

/// A post fetched from the remote source. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub url: String,
    pub permalink: String,
    pub flags: ItemFlags,
    /// One URL per gallery media entry, in payload order. Empty for
    /// non-gallery posts and for galleries with nothing extractable.
    pub gallery_images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub subreddit: String,
}

/// A local folder and how many eligible files it held at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDescriptor {
    pub name: String,
    pub file_count: usize,
}

/// What the client should display next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub source: ContentSource,
    pub url: String,
    /// Post title for remote content, folder name for local content.
    pub title: String,
    /// Subreddit as the user entered it, or the local folder name.
    pub collection: String,
    /// Remote post id or local file name; what a history record stores.
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub info: String,
    pub is_gallery: bool,
    pub gallery_images: Vec<String>,
    pub gallery_image_count: usize,
    pub timer_seconds: u32,
    pub metronome_speed: u32,
    pub is_punishment: bool,
}

fn default_true() -> bool {
    true
}

fn default_timer_min() -> u32 {
    DEFAULT_TIMER_MIN
}

fn default_timer_max() -> u32 {
    DEFAULT_TIMER_MAX
}

/// Accepts `30`, `"30"`, or `" 30 "`. Settings files written by older
/// clients store timer bounds as strings.
pub(crate) fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(u64),
        Float(f64),
        Str(String),
    }

    let value = match NumOrString::deserialize(deserializer)? {
        NumOrString::Num(n) => n,
        NumOrString::Float(f) if f >= 0.0 => f as u64,
        NumOrString::Float(f) => {
            return Err(serde::de::Error::custom(format!("negative value: {}", f)))
        }
        NumOrString::Str(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid number {:?}: {}", s, e)))?,
    };
    u32::try_from(value).map_err(serde::de::Error::custom)
}
