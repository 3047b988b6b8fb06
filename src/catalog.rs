//! Folder catalog for user-supplied content.
//!
//! Local content lives in two trees, one per [`FolderKind`]:
//!
//! ```text
//! <root>/custom_content/<folder>/<files>
//! <root>/custom_punishment/<folder>/<files>
//! ```
//!
//! # Root resolution
//!
//! Roots are probed in this order, and the first `<root>/<kind>` directory
//! that exists wins:
//!
//! 1. `<executable dir>/user_content` (only when `content.exe_adjacent` is set and it exists)
//! 2. `content.user_dir` (only when configured and it exists)
//! 3. `content.static_dir` (always)
//!
//! When none exists, the first candidate is created, falling back to the
//! second if that fails.
//!
//! # Eligible files
//!
//! Regular files with a `jpg`, `jpeg`, `png`, `gif`, `mp4`, or `webm`
//! extension, in any case.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ContentConfig;
use crate::error::{Result, SelectionError};
use crate::history::{exclude_recent, recent_items, HistoryRecord};
use crate::models::{ContentSource, FolderDescriptor};

pub const MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "mp4", "webm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderKind {
    Content,
    Punishment,
}

impl FolderKind {
    pub const ALL: [FolderKind; 2] = [FolderKind::Content, FolderKind::Punishment];

    /// Directory name under each content root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            FolderKind::Content => "custom_content",
            FolderKind::Punishment => "custom_punishment",
        }
    }

    /// Path segment used in media URLs (`/media/<segment>/...`).
    pub fn route(&self) -> &'static str {
        match self {
            FolderKind::Content => "content",
            FolderKind::Punishment => "punishment",
        }
    }
}

#[derive(Debug, Clone)]
struct Root {
    path: PathBuf,
    /// Optional roots are skipped unless they already exist.
    optional: bool,
}

/// Ordered list of content roots.
#[derive(Debug, Clone)]
pub struct ContentRoots {
    roots: Vec<Root>,
}

impl ContentRoots {
    pub fn from_config(config: &ContentConfig) -> Self {
        let mut roots = Vec::new();
        if config.exe_adjacent {
            if let Some(dir) = std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|p| p.join("user_content")))
            {
                roots.push(Root {
                    path: dir,
                    optional: true,
                });
            }
        }
        if let Some(user_dir) = &config.user_dir {
            roots.push(Root {
                path: user_dir.clone(),
                optional: true,
            });
        }
        roots.push(Root {
            path: config.static_dir.clone(),
            optional: false,
        });
        Self { roots }
    }

    /// A single root that is always probed. Used by tests and tooling.
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![Root {
                path: path.into(),
                optional: false,
            }],
        }
    }

    fn candidates(&self, kind: FolderKind) -> Vec<PathBuf> {
        self.roots
            .iter()
            .filter(|r| !r.optional || r.path.exists())
            .map(|r| r.path.join(kind.dir_name()))
            .collect()
    }
}

/// Both folder lists as of the last scan.
#[derive(Debug, Clone)]
struct FolderSnapshot {
    content: Vec<FolderDescriptor>,
    punishment: Vec<FolderDescriptor>,
    scanned_at: Instant,
}

/// Response shape of the folder listing.
#[derive(Debug, Clone, Serialize)]
pub struct FolderListing {
    pub content_folders: Vec<FolderDescriptor>,
    pub punishment_folders: Vec<FolderDescriptor>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age: Option<f64>,
}

pub struct FolderCatalog {
    roots: ContentRoots,
    ttl: Duration,
    media: GlobSet,
    cache: Mutex<Option<FolderSnapshot>>,
}

impl FolderCatalog {
    pub fn new(roots: ContentRoots, ttl: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            roots,
            ttl,
            media: build_media_matcher()?,
            cache: Mutex::new(None),
        })
    }

    pub fn from_config(config: &ContentConfig) -> anyhow::Result<Self> {
        Self::new(ContentRoots::from_config(config), config.folder_cache_ttl())
    }

    /// The directory holding `kind` folders, created if nothing exists yet.
    pub fn resolve_base_dir(&self, kind: FolderKind) -> Result<PathBuf> {
        let candidates = self.roots.candidates(kind);
        if let Some(existing) = candidates.iter().find(|p| p.is_dir()) {
            return Ok(existing.clone());
        }

        let mut last_err = None;
        for candidate in candidates.iter().take(2) {
            match std::fs::create_dir_all(candidate) {
                Ok(()) => {
                    info!(path = %candidate.display(), "created content directory");
                    return Ok(candidate.clone());
                }
                Err(e) => {
                    warn!(path = %candidate.display(), error = %e, "failed to create content directory");
                    last_err = Some(SelectionError::storage(candidate, e));
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            SelectionError::NoEligibleSource(format!(
                "no {} directory candidates configured",
                kind.route()
            ))
        }))
    }

    /// Folder lists for both kinds, served from cache unless stale or forced.
    pub fn list_all(&self, force_refresh: bool) -> Result<FolderListing> {
        if !force_refresh {
            let guard = self.lock();
            if let Some(snapshot) = guard.as_ref() {
                let age = snapshot.scanned_at.elapsed();
                if age < self.ttl {
                    debug!(age_secs = age.as_secs_f64(), "using cached folder listing");
                    return Ok(FolderListing {
                        content_folders: snapshot.content.clone(),
                        punishment_folders: snapshot.punishment.clone(),
                        cached: true,
                        cache_age: Some(age.as_secs_f64()),
                    });
                }
            }
        }

        let content = self.scan_folders(&self.resolve_base_dir(FolderKind::Content)?)?;
        let punishment = self.scan_folders(&self.resolve_base_dir(FolderKind::Punishment)?)?;
        *self.lock() = Some(FolderSnapshot {
            content: content.clone(),
            punishment: punishment.clone(),
            scanned_at: Instant::now(),
        });
        info!(
            content = content.len(),
            punishment = punishment.len(),
            "scanned content folders"
        );
        Ok(FolderListing {
            content_folders: content,
            punishment_folders: punishment,
            cached: false,
            cache_age: None,
        })
    }

    pub fn list_folders(&self, kind: FolderKind, force_refresh: bool) -> Result<Vec<FolderDescriptor>> {
        let listing = self.list_all(force_refresh)?;
        Ok(match kind {
            FolderKind::Content => listing.content_folders,
            FolderKind::Punishment => listing.punishment_folders,
        })
    }

    /// Folders of `kind` on disk right now, restricted to `enabled` unless
    /// that list is empty.
    pub fn eligible_folders(&self, kind: FolderKind, enabled: &[String]) -> Result<Vec<String>> {
        let base = self.resolve_base_dir(kind)?;
        let mut names = subdirectories(&base)?;
        if !enabled.is_empty() {
            names.retain(|n| enabled.contains(n));
        }
        Ok(names)
    }

    /// Pick a random eligible file from `folder`, skipping files the
    /// history lists for this folder unless that would leave nothing.
    pub fn pick_item<R: Rng + ?Sized>(
        &self,
        kind: FolderKind,
        folder: &str,
        history: &[HistoryRecord],
        rng: &mut R,
    ) -> Result<PathBuf> {
        let candidates = self.candidate_items(kind, folder, history)?;
        candidates
            .choose(rng)
            .cloned()
            .ok_or_else(|| SelectionError::NoContentAvailable(format!("folder \"{}\"", folder)))
    }

    /// Files in `folder` that `pick_item` chooses from: recently shown ones
    /// are dropped unless that would leave nothing. Never empty on success.
    pub fn candidate_items(
        &self,
        kind: FolderKind,
        folder: &str,
        history: &[HistoryRecord],
    ) -> Result<Vec<PathBuf>> {
        if folder.is_empty() || folder.contains(['/', '\\']) || folder == ".." {
            return Err(SelectionError::InvalidCollectionName(folder.to_string()));
        }
        let dir = self.resolve_base_dir(kind)?.join(folder);
        let files = self.media_files(&dir)?;
        if files.is_empty() {
            return Err(SelectionError::NoContentAvailable(format!(
                "folder \"{}\"",
                folder
            )));
        }

        let recent = recent_items(history, ContentSource::Local, folder);
        let total = files.len();
        let candidates = exclude_recent(files, &recent, |p| file_name(p));
        debug!(
            folder,
            total,
            recently_seen = recent.len(),
            candidates = candidates.len(),
            "filtered folder by history"
        );
        Ok(candidates)
    }

    /// Folder descriptors under `base`, sorted by name.
    pub fn scan_folders(&self, base: &Path) -> Result<Vec<FolderDescriptor>> {
        let mut folders = Vec::new();
        for name in subdirectories(base)? {
            match self.media_files(&base.join(&name)) {
                Ok(files) => folders.push(FolderDescriptor {
                    name,
                    file_count: files.len(),
                }),
                Err(e) => warn!(folder = %name, error = %e, "skipping unreadable folder"),
            }
        }
        Ok(folders)
    }

    /// Eligible media files directly inside `dir`, sorted by name.
    pub fn media_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| walk_error(dir, e))?;
            if entry.file_type().is_file() && self.is_media(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    pub fn is_media(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.media.is_match(Path::new(name)))
            .unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<FolderSnapshot>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

/// Names of the directories directly inside `base`, sorted.
fn subdirectories(base: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(base)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| walk_error(base, e))?;
        if entry.file_type().is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    Ok(names)
}

fn build_media_matcher() -> anyhow::Result<GlobSet> {
    let pattern = format!("*.{{{}}}", MEDIA_EXTENSIONS.join(","));
    let mut builder = GlobSetBuilder::new();
    builder.add(GlobBuilder::new(&pattern).case_insensitive(true).build()?);
    Ok(builder.build()?)
}

fn walk_error(root: &Path, err: walkdir::Error) -> SelectionError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let io = err.into_io_error().unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop detected")
    });
    SelectionError::storage(path, io)
}
