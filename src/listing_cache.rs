//! Listing cache.
//!
//! Memoizes gateway listings per [`CollectionKey`] so rotating through the
//! same handful of subreddits does not hit the API on every request.
//!
//! # Policy
//!
//! | Situation | Behaviour |
//! |-----------|-----------|
//! | entry younger than its expiration and non-empty | served verbatim |
//! | miss or stale | fetch `hot` (30); if fewer than 10 items, also `new` or `top` (20) |
//! | result has ≥ 10 items | expires after 30 minutes |
//! | result has < 10 items | expires after 5 minutes |
//! | 50 entries and a new key arrives | the entry with the oldest `fetched_at` is evicted |
//! | gateway error | error propagates, cache untouched |
//!
//! Staleness is only detected on lookup; nothing refreshes in the
//! background. A stale entry stays in place until a successful fetch
//! replaces it.
//!
//! The map sits behind a `Mutex`. The lock is released while the gateway
//! is called, so two concurrent misses on one key may both fetch; the last
//! one to finish wins.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use crate::collection::CollectionKey;
use crate::error::Result;
use crate::gateway::{Gateway, ListingType};
use crate::models::Item;

/// Lifetime of a well-populated entry.
pub const CACHE_EXPIRATION: Duration = Duration::from_secs(30 * 60);
/// Lifetime of a sparse entry, so thin or failing collections retry sooner.
pub const CACHE_EXPIRATION_EMPTY: Duration = Duration::from_secs(5 * 60);
pub const MAX_CACHE_ENTRIES: usize = 50;
/// Below this many primary items a supplementary listing is fetched.
pub const MIN_ITEMS_THRESHOLD: usize = 10;
pub const PRIMARY_BATCH: u32 = 30;
pub const SUPPLEMENT_BATCH: u32 = 20;

/// Which listings an entry was assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListingKind {
    #[serde(rename = "hot")]
    Hot,
    #[serde(rename = "hot+new")]
    HotNew,
    #[serde(rename = "hot+top")]
    HotTop,
}

impl ListingKind {
    fn with_supplement(supplement: ListingType) -> Self {
        match supplement {
            ListingType::New => ListingKind::HotNew,
            ListingType::Top => ListingKind::HotTop,
            ListingType::Hot => ListingKind::Hot,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    items: Arc<Vec<Item>>,
    fetched_at: DateTime<Utc>,
    kind: ListingKind,
    expiration: Duration,
}

impl CacheEntry {
    fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or_default()
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.age(now) < self.expiration && !self.items.is_empty()
    }
}

/// Point-in-time view of one entry, for the `/cache` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryStats {
    pub key: CollectionKey,
    pub kind: ListingKind,
    pub items: usize,
    pub fetched_at: DateTime<Utc>,
    pub age_secs: u64,
    pub expires_in_secs: u64,
}

pub struct ListingCache {
    entries: Mutex<HashMap<CollectionKey, CacheEntry>>,
    max_entries: usize,
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingCache {
    pub fn new() -> Self {
        Self::with_capacity(MAX_CACHE_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Cached items for `key`, fetching through `gateway` on a miss.
    pub async fn get_or_fetch(
        &self,
        key: &CollectionKey,
        gateway: &dyn Gateway,
    ) -> Result<(Arc<Vec<Item>>, ListingKind)> {
        let supplement = pick_supplement(&mut rand::thread_rng());
        self.get_or_fetch_at(key, gateway, supplement, Utc::now()).await
    }

    /// Same as [`get_or_fetch`](Self::get_or_fetch), with the supplementary
    /// listing drawn by the caller.
    pub async fn get_or_fetch_with(
        &self,
        key: &CollectionKey,
        gateway: &dyn Gateway,
        supplement: ListingType,
    ) -> Result<(Arc<Vec<Item>>, ListingKind)> {
        self.get_or_fetch_at(key, gateway, supplement, Utc::now()).await
    }

    /// Explicit supplement and clock. `supplement` is only used when the
    /// `hot` listing comes back sparse.
    pub async fn get_or_fetch_at(
        &self,
        key: &CollectionKey,
        gateway: &dyn Gateway,
        supplement: ListingType,
        now: DateTime<Utc>,
    ) -> Result<(Arc<Vec<Item>>, ListingKind)> {
        if let Some(hit) = self.lookup(key, now) {
            return Ok(hit);
        }

        info!(collection = %key, "listing cache miss; fetching");
        let mut items = gateway.fetch_listing(key, ListingType::Hot, PRIMARY_BATCH).await?;
        let mut kind = ListingKind::Hot;
        debug!(collection = %key, count = items.len(), "hot listing");

        if items.len() < MIN_ITEMS_THRESHOLD {
            let extra = gateway
                .fetch_listing(key, supplement, SUPPLEMENT_BATCH)
                .await?;
            debug!(collection = %key, %supplement, count = extra.len(), "supplementary listing");
            items.extend(extra);
            kind = ListingKind::with_supplement(supplement);
        }

        let expiration = if items.len() >= MIN_ITEMS_THRESHOLD {
            CACHE_EXPIRATION
        } else {
            CACHE_EXPIRATION_EMPTY
        };
        let items = Arc::new(items);
        self.insert(
            key.clone(),
            CacheEntry {
                items: Arc::clone(&items),
                fetched_at: now,
                kind,
                expiration,
            },
        );
        info!(
            collection = %key,
            count = items.len(),
            expires_in_mins = expiration.as_secs() / 60,
            "listing cached"
        );
        Ok((items, kind))
    }

    fn lookup(
        &self,
        key: &CollectionKey,
        now: DateTime<Utc>,
    ) -> Option<(Arc<Vec<Item>>, ListingKind)> {
        let entries = self.lock();
        let entry = entries.get(key)?;
        if entry.is_fresh(now) {
            debug!(
                collection = %key,
                count = entry.items.len(),
                age_secs = entry.age(now).as_secs(),
                "listing cache hit"
            );
            return Some((Arc::clone(&entry.items), entry.kind));
        }
        None
    }

    fn insert(&self, key: CollectionKey, entry: CacheEntry) {
        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.fetched_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                info!(collection = %oldest, "evicting oldest listing cache entry");
                entries.remove(&oldest);
            }
        }
        entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CollectionKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Entries ordered by key, ages measured against `now`.
    pub fn stats(&self, now: DateTime<Utc>) -> Vec<CacheEntryStats> {
        let entries = self.lock();
        let mut stats: Vec<CacheEntryStats> = entries
            .iter()
            .map(|(key, e)| {
                let age = e.age(now);
                CacheEntryStats {
                    key: key.clone(),
                    kind: e.kind,
                    items: e.items.len(),
                    fetched_at: e.fetched_at,
                    age_secs: age.as_secs(),
                    expires_in_secs: e.expiration.saturating_sub(age).as_secs(),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        stats
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CollectionKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `new` or `top`, uniformly.
pub fn pick_supplement<R: Rng + ?Sized>(rng: &mut R) -> ListingType {
    if rng.gen_bool(0.5) {
        ListingType::New
    } else {
        ListingType::Top
    }
}
