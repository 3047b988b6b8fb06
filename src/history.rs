//! Recency exclusion shared by the remote and local selection paths.
//!
//! The client keeps a short list of what it showed recently and sends it
//! with every request. Nothing here is persisted: the records are only used
//! to drop recently-seen candidates within the current call.

use serde::{Deserialize, Serialize};

use crate::collection::normalize;
use crate::models::ContentSource;

/// One recently shown item, as reported by the client.
///
/// `source` is optional: a record without it matches either source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ContentSource>,
    #[serde(rename = "folder", alias = "subreddit", alias = "collection")]
    pub collection: String,
    #[serde(rename = "file", alias = "post_id", alias = "item")]
    pub item: String,
}

impl HistoryRecord {
    pub fn local(folder: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            source: Some(ContentSource::Local),
            collection: folder.into(),
            item: file.into(),
        }
    }

    pub fn remote(subreddit: impl Into<String>, post_id: impl Into<String>) -> Self {
        Self {
            source: Some(ContentSource::Remote),
            collection: subreddit.into(),
            item: post_id.into(),
        }
    }

    fn matches_collection(&self, source: ContentSource, collection: &str) -> bool {
        if let Some(s) = self.source {
            if s != source {
                return false;
            }
        }
        match source {
            ContentSource::Local => self.collection == collection,
            // Remote records may carry the name as typed ("r/Pics").
            ContentSource::Remote => normalize(&self.collection) == collection,
        }
    }
}

/// Item identifiers the history marks as recently shown in one collection.
///
/// For [`ContentSource::Remote`], `collection` must already be normalized.
pub fn recent_items<'a>(
    history: &'a [HistoryRecord],
    source: ContentSource,
    collection: &str,
) -> Vec<&'a str> {
    history
        .iter()
        .filter(|r| r.matches_collection(source, collection))
        .map(|r| r.item.as_str())
        .collect()
}

/// Drop candidates whose id appears in `recent`.
///
/// If that would leave nothing, the unfiltered candidates are returned
/// instead, so selection never starves because everything was seen lately.
pub fn exclude_recent<T, F>(candidates: Vec<T>, recent: &[&str], id_of: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> &str,
{
    if recent.is_empty() {
        return candidates;
    }
    let fresh: Vec<T> = candidates
        .iter()
        .filter(|c| !recent.iter().any(|r| *r == id_of(*c)))
        .cloned()
        .collect();
    if fresh.is_empty() {
        candidates
    } else {
        fresh
    }
}
