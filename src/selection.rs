//! Selection engine.
//!
//! Turns a [`SelectionRequest`] into one [`ContentDescriptor`]:
//!
//! 1. Draw the display timer and metronome speed.
//! 2. Resolve the mode. `mixed` flips a fair coin between remote and local.
//! 3. Decide favorite vs. punishment. Punishment needs punishments enabled,
//!    a non-empty punishment pool, and a 20% draw.
//! 4. Pick a collection (subreddit or folder) uniformly from the pool.
//! 5. Pick an item, skipping recently shown ones unless nothing else is left.
//!
//! Remote listings go through the [`ListingCache`]; local folders through
//! the [`FolderCatalog`]. The engine itself keeps no state besides its RNG.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::catalog::{file_name, FolderCatalog, FolderKind};
use crate::collection::{normalize, CollectionKey};
use crate::error::{Result, SelectionError};
use crate::gateway::{displayable, touch_up_url, Gateway};
use crate::history::{exclude_recent, recent_items};
use crate::listing_cache::{pick_supplement, ListingCache};
use crate::models::{
    enabled_names, ContentDescriptor, ContentSource, Item, SelectionRequest, SourceMode,
};

/// Chance that a request with a usable punishment pool draws from it.
pub const PUNISHMENT_PROBABILITY: f64 = 0.2;
/// Chance that a mixed-mode request goes remote.
pub const MIXED_REMOTE_PROBABILITY: f64 = 0.5;
pub const METRONOME_BPM: RangeInclusive<u32> = 40..=120;

/// Per-request random hints that do not depend on the source.
#[derive(Debug, Clone, Copy)]
struct Pacing {
    timer_seconds: u32,
    metronome_speed: u32,
}

pub struct SelectionEngine {
    gateway: Arc<dyn Gateway>,
    listings: Arc<ListingCache>,
    catalog: Arc<FolderCatalog>,
    rng: Mutex<StdRng>,
}

impl SelectionEngine {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        listings: Arc<ListingCache>,
        catalog: Arc<FolderCatalog>,
    ) -> Self {
        Self::with_rng(gateway, listings, catalog, StdRng::from_entropy())
    }

    /// Deterministic engine for tests and reproducible runs.
    pub fn with_seed(
        gateway: Arc<dyn Gateway>,
        listings: Arc<ListingCache>,
        catalog: Arc<FolderCatalog>,
        seed: u64,
    ) -> Self {
        Self::with_rng(gateway, listings, catalog, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        gateway: Arc<dyn Gateway>,
        listings: Arc<ListingCache>,
        catalog: Arc<FolderCatalog>,
        rng: StdRng,
    ) -> Self {
        Self {
            gateway,
            listings,
            catalog,
            rng: Mutex::new(rng),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn listings(&self) -> &Arc<ListingCache> {
        &self.listings
    }

    pub fn catalog(&self) -> &Arc<FolderCatalog> {
        &self.catalog
    }

    /// Pick the next piece of content for `req`.
    pub async fn select(&self, req: &SelectionRequest) -> Result<ContentDescriptor> {
        let (pacing, remote) = {
            let mut rng = self.rng();
            let pacing = Pacing {
                timer_seconds: rng.gen_range(req.timer.range()),
                metronome_speed: rng.gen_range(METRONOME_BPM),
            };
            let remote = match req.mode {
                SourceMode::Remote => true,
                SourceMode::Local => false,
                SourceMode::Mixed => rng.gen_bool(MIXED_REMOTE_PROBABILITY),
            };
            (pacing, remote)
        };
        debug!(
            mode = ?req.mode,
            remote,
            timer = pacing.timer_seconds,
            bpm = pacing.metronome_speed,
            "drew request pacing"
        );

        if remote {
            self.select_remote(req, pacing).await
        } else {
            self.select_local(req, pacing)
        }
    }

    async fn select_remote(
        &self,
        req: &SelectionRequest,
        pacing: Pacing,
    ) -> Result<ContentDescriptor> {
        let favorites = enabled_names(&req.favorites);
        let punishments = if req.punishments_enabled {
            enabled_names(&req.punishments)
        } else {
            Vec::new()
        };

        let (name, drew_punishment, supplement) = {
            let mut rng = self.rng();
            let drew_punishment = draw_punishment(&mut *rng, !punishments.is_empty());
            let pool = if drew_punishment {
                &punishments
            } else {
                &favorites
            };
            let name = pool.choose(&mut *rng).cloned().ok_or_else(|| {
                SelectionError::NoEligibleSource("no enabled subreddits".to_string())
            })?;
            (name, drew_punishment, pick_supplement(&mut *rng))
        };
        let key = CollectionKey::parse(&name)?;
        info!(collection = %key, punishment_pool = drew_punishment, "selected subreddit");

        let (items, _kind) = self
            .listings
            .get_or_fetch_with(&key, self.gateway.as_ref(), supplement)
            .await?;
        let shown = displayable(&items);
        let recent = recent_items(&req.history, ContentSource::Remote, key.as_str());
        let total = shown.len();
        let candidates = exclude_recent(shown, &recent, |i| i.id.as_str());
        debug!(
            collection = %key,
            total,
            candidates = candidates.len(),
            "filtered listing by history"
        );

        let item: &Item = {
            let mut rng = self.rng();
            candidates
                .choose(&mut *rng)
                .copied()
                .ok_or_else(|| SelectionError::NoContentAvailable(format!("r/{}", key)))?
        };

        let punishment_keys: HashSet<String> =
            punishments.iter().map(|p| normalize(p)).collect();
        let is_punishment = punishment_keys.contains(key.as_str());

        Ok(remote_descriptor(item, &name, &key, is_punishment, pacing))
    }

    fn select_local(&self, req: &SelectionRequest, pacing: Pacing) -> Result<ContentDescriptor> {
        let punishment_folders = if req.punishments_enabled {
            self.catalog
                .eligible_folders(FolderKind::Punishment, &req.enabled_folders.punishment)?
        } else {
            Vec::new()
        };

        let drew_punishment = draw_punishment(&mut *self.rng(), !punishment_folders.is_empty());
        let (kind, folders) = if drew_punishment {
            (FolderKind::Punishment, punishment_folders)
        } else {
            (
                FolderKind::Content,
                self.catalog
                    .eligible_folders(FolderKind::Content, &req.enabled_folders.content)?,
            )
        };

        let folder = folders.choose(&mut *self.rng()).cloned().ok_or_else(|| {
            let qualifier = match kind {
                FolderKind::Content if req.enabled_folders.content.is_empty() => "",
                FolderKind::Punishment if req.enabled_folders.punishment.is_empty() => "",
                _ => "enabled ",
            };
            SelectionError::NoEligibleSource(format!("no {}{} folders found", qualifier, kind.route()))
        })?;
        info!(folder = %folder, kind = kind.route(), "selected folder");

        let candidates = self
            .catalog
            .candidate_items(kind, &folder, &req.history)?;
        let path = candidates
            .choose(&mut *self.rng())
            .cloned()
            .ok_or_else(|| SelectionError::NoContentAvailable(format!("folder \"{}\"", folder)))?;
        let file = file_name(&path).to_string();

        Ok(ContentDescriptor {
            source: ContentSource::Local,
            url: format!("/media/{}/{}/{}", kind.route(), folder, file),
            title: folder.clone(),
            collection: folder.clone(),
            item_id: file.clone(),
            file_name: Some(file),
            info: match kind {
                FolderKind::Punishment => format!("Punishment from folder \"{}\"", folder),
                FolderKind::Content => format!("Custom content from folder \"{}\"", folder),
            },
            is_gallery: false,
            gallery_images: Vec::new(),
            gallery_image_count: 0,
            timer_seconds: pacing.timer_seconds,
            metronome_speed: pacing.metronome_speed,
            is_punishment: drew_punishment,
        })
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Bernoulli draw for the punishment pool. Never true for an empty pool.
fn draw_punishment<R: Rng + ?Sized>(rng: &mut R, pool_available: bool) -> bool {
    pool_available && rng.gen_bool(PUNISHMENT_PROBABILITY)
}

fn remote_descriptor(
    item: &Item,
    entered_name: &str,
    key: &CollectionKey,
    is_punishment: bool,
    pacing: Pacing,
) -> ContentDescriptor {
    let main_url = item
        .gallery_images
        .first()
        .cloned()
        .unwrap_or_else(|| item.url.clone());
    ContentDescriptor {
        source: ContentSource::Remote,
        url: touch_up_url(&main_url),
        title: item.title.clone(),
        collection: entered_name.trim().to_string(),
        item_id: item.id.clone(),
        file_name: None,
        info: if is_punishment {
            format!("Punishment from r/{}", key)
        } else {
            format!("From r/{}", key)
        },
        is_gallery: item.flags.is_gallery,
        gallery_images: item.gallery_images.clone(),
        gallery_image_count: item.gallery_images.len(),
        timer_seconds: pacing.timer_seconds,
        metronome_speed: pacing.metronome_speed,
        is_punishment,
    }
}
