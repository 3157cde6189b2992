//! Error types for manifest resolution.

use thiserror::Error;

use crate::http::FetchError;
use crate::store::StoreError;

/// Errors raised while resolving a record's asset URLs from its manifest.
///
/// "No manifest declared" is not an error: records with a direct asset list
/// never reach the manifest path, and records with neither are rejected by
/// eligibility before resolution runs.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The declared manifest URL is not well-formed; no request was issued.
    #[error("manifest URL is not well-formed: {url}")]
    InvalidUrl {
        /// The malformed URL.
        url: String,
    },

    /// The manifest document could not be fetched.
    #[error("manifest fetch failed for {url}: {source}")]
    Fetch {
        /// The manifest URL.
        url: String,
        /// The underlying fetch error.
        #[source]
        source: FetchError,
    },

    /// The manifest document is not valid JSON.
    #[error("manifest at {url} is not parseable")]
    Parse {
        /// The manifest URL.
        url: String,
    },

    /// The manifest's version/context field matches neither supported version.
    #[error("unsupported manifest version: context {context:?}")]
    UnsupportedVersion {
        /// The context value that failed to match.
        context: String,
    },

    /// The raw manifest could not be persisted to side storage.
    #[error("manifest side-file write failed: {0}")]
    Persist(#[from] StoreError),
}

impl ManifestError {
    /// Creates an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a fetch error.
    pub fn fetch(url: impl Into<String>, source: FetchError) -> Self {
        Self::Fetch {
            url: url.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(url: impl Into<String>) -> Self {
        Self::Parse { url: url.into() }
    }

    /// Creates an unsupported-version error.
    pub fn unsupported_version(context: impl Into<String>) -> Self {
        Self::UnsupportedVersion {
            context: context.into(),
        }
    }
}
