//! Source gateway abstraction.
//!
//! A [`Gateway`] fetches raw listings for a named collection. The
//! production implementation is [`RedditGateway`](crate::connector_reddit::RedditGateway);
//! tests plug in an in-memory double. The listing cache and the selection
//! engine only ever see this trait.
//!
//! Also hosts the item-level post-processing every gateway result goes
//! through before it reaches the caller:
//! - [`displayable`]: drops stickied and self (text-only) posts
//! - [`touch_up_url`]: adds `.jpg` to bare image-host links

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::collection::CollectionKey;
use crate::error::Result;
use crate::models::Item;

/// Retrieval mode for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Hot,
    New,
    Top,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Hot => "hot",
            ListingType::New => "new",
            ListingType::Top => "top",
        }
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads item listings from an upstream content provider.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Fetch up to `limit` items from `key` under the given listing mode.
    ///
    /// Gallery posts come back already flattened into
    /// [`Item::gallery_images`]. Failures map to
    /// [`SelectionError::Auth`](crate::error::SelectionError::Auth) or
    /// [`SelectionError::SourceUnavailable`](crate::error::SelectionError::SourceUnavailable).
    async fn fetch_listing(
        &self,
        key: &CollectionKey,
        listing: ListingType,
        limit: u32,
    ) -> Result<Vec<Item>>;

    /// Drop any cached session so the next fetch re-authenticates.
    fn invalidate_session(&self) {}
}

/// Items worth showing: no stickied announcements, no text-only posts.
pub fn displayable(items: &[Item]) -> Vec<&Item> {
    items
        .iter()
        .filter(|i| !i.flags.stickied && !i.flags.is_self)
        .collect()
}

/// Image hosts whose page links also resolve as direct images once an
/// extension is appended.
const IMAGE_HOSTS: &[&str] = &["imgur.com"];

const MEDIA_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".mp4", ".webm"];

/// Append `.jpg` to image-host URLs that lack a media extension.
///
/// URLs ending in `/` (albums, profile pages) are left alone.
pub fn touch_up_url(url: &str) -> String {
    let on_image_host = IMAGE_HOSTS.iter().any(|host| url.contains(host));
    if !on_image_host {
        return url.to_string();
    }
    let lowered = url.to_ascii_lowercase();
    if MEDIA_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext)) || url.ends_with('/') {
        return url.to_string();
    }
    format!("{}.jpg", url)
}
