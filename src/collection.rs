//! Collection name normalization.
//!
//! Users type subreddit names however they like (`r/AskReddit `, `/r/pics`,
//! `EarthPorn`). Everything that keys on a collection, including the
//! listing cache, history matching, and punishment membership, goes through
//! [`CollectionKey::parse`] so the same collection always maps to the same key.

use serde::Serialize;
use std::fmt;

use crate::error::{Result, SelectionError};

/// Normalized identifier for a remote collection.
///
/// Lowercase, `[a-z0-9_-]` only, with any `r/` or `/r/` prefix removed.
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CollectionKey(String);

impl CollectionKey {
    /// Normalize a raw user-entered name.
    ///
    /// Returns [`SelectionError::InvalidCollectionName`] when nothing
    /// survives normalization.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(SelectionError::InvalidCollectionName(raw.to_string()));
        }
        Ok(CollectionKey(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic normalization. May return an empty string.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();
    let without_prefix = lowered
        .strip_prefix("/r/")
        .or_else(|| lowered.strip_prefix("r/"))
        .unwrap_or(&lowered);

    without_prefix
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_case() {
        assert_eq!(normalize("r/AskReddit "), "askreddit");
        assert_eq!(normalize("askreddit"), "askreddit");
        assert_eq!(normalize("/r/EarthPorn"), "earthporn");
        assert_eq!(normalize("R/pics"), "pics");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["r/AskReddit ", "  /r/Some_Sub-Name!", "plain", "r/r/nested"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_invalid_characters_removed() {
        assert_eq!(normalize("cats & dogs!"), "catsdogs");
        assert_eq!(normalize("under_score-dash"), "under_score-dash");
    }

    #[test]
    fn test_empty_is_invalid() {
        assert!(matches!(
            CollectionKey::parse(""),
            Err(SelectionError::InvalidCollectionName(_))
        ));
        assert!(matches!(
            CollectionKey::parse("r/ !!"),
            Err(SelectionError::InvalidCollectionName(_))
        ));
    }

    #[test]
    fn test_parse_equal_keys() {
        let a = CollectionKey::parse("r/AskReddit ").unwrap();
        let b = CollectionKey::parse("askreddit").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "askreddit");
    }
}
