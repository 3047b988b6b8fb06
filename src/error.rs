//! Error taxonomy for the selection core.
//!
//! Every failure a selection call can end with is one of these variants.
//! None of them are retried inside the core; the caller decides whether to
//! try again on the next request.

use std::path::PathBuf;

/// Result alias used by the cache, catalog, gateway, and engine.
pub type Result<T> = std::result::Result<T, SelectionError>;

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// Credentials are missing, incomplete, or were rejected upstream.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The upstream listing fetch failed (network, HTTP status, or payload).
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The user's configuration yields zero candidate collections or folders.
    #[error("no eligible source: {0}")]
    NoEligibleSource(String),

    /// A collection name normalized to the empty string.
    #[error("invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    /// The chosen collection had nothing to show after every fallback.
    #[error("no content available in {0}")]
    NoContentAvailable(String),

    /// Filesystem scan or directory creation failed.
    #[error("storage error at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SelectionError {
    /// Machine-readable code used in the HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            SelectionError::Auth(_) => "auth_error",
            SelectionError::SourceUnavailable(_) => "source_unavailable",
            SelectionError::NoEligibleSource(_) => "no_eligible_source",
            SelectionError::InvalidCollectionName(_) => "invalid_collection_name",
            SelectionError::NoContentAvailable(_) => "no_content_available",
            SelectionError::Storage { .. } => "storage_error",
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SelectionError::Storage {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_mentions_path() {
        let err = SelectionError::storage(
            "/tmp/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing"));
        assert!(msg.contains("gone"));
        assert_eq!(err.code(), "storage_error");
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            SelectionError::Auth(String::new()).code(),
            SelectionError::SourceUnavailable(String::new()).code(),
            SelectionError::NoEligibleSource(String::new()).code(),
            SelectionError::InvalidCollectionName(String::new()).code(),
            SelectionError::NoContentAvailable(String::new()).code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
