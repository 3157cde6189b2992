//! Provider directory: upload permissions and knowledge-base ids per partner.
//!
//! One JSON document maps provider display names to their wikidata id, upload
//! permission, and nested institutions (data providers). The directory is
//! loaded once per pipeline run and is read-only afterwards, so sharing it
//! across workers needs no synchronization.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::http::{FetchClient, FetchError};

/// One provider or institution entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    /// External knowledge-base identifier (e.g. `Q518155`). Empty means the
    /// provider cannot be attributed and records under it are ineligible.
    #[serde(default)]
    pub wikidata_id: Option<String>,
    /// Whether this provider has opted in to publication.
    #[serde(default)]
    pub upload_allowed: bool,
    /// Nested data providers keyed by display name.
    #[serde(default)]
    pub institutions: HashMap<String, Provider>,
}

impl Provider {
    /// Returns true if the entry has a non-empty wikidata id.
    #[must_use]
    pub fn has_wikidata_id(&self) -> bool {
        self.wikidata_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }
}

/// Errors loading the provider directory.
#[derive(Debug, Error)]
pub enum ProviderDirectoryError {
    /// Fetching the directory document failed.
    #[error("provider directory fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Reading a local directory file failed.
    #[error("provider directory unreadable at {path}: {source}")]
    Io {
        /// The local path.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not the expected name-to-entry map.
    #[error("provider directory is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The full directory, keyed by provider display name.
#[derive(Debug, Clone, Default)]
pub struct ProviderDirectory {
    providers: HashMap<String, Provider>,
}

impl ProviderDirectory {
    /// Parses a directory document.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDirectoryError::Malformed`] when the document is not
    /// a map of provider entries.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProviderDirectoryError> {
        let providers: HashMap<String, Provider> = serde_json::from_slice(bytes)?;
        Ok(Self { providers })
    }

    /// Loads the directory from an `http(s)://` URL or a local file path.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDirectoryError`] when the source is unreachable,
    /// unreadable, or malformed.
    pub async fn load(client: &FetchClient, source: &str) -> Result<Self, ProviderDirectoryError> {
        let bytes = if source.starts_with("http://") || source.starts_with("https://") {
            client.get_bytes(source).await?.bytes
        } else {
            tokio::fs::read(source)
                .await
                .map_err(|e| ProviderDirectoryError::Io {
                    path: source.to_string(),
                    source: e,
                })?
        };
        let directory = Self::from_json(&bytes)?;
        info!(providers = directory.providers.len(), "provider directory loaded");
        Ok(directory)
    }

    /// Looks up a provider by display name.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    /// Looks up a data provider (institution) under a provider.
    ///
    /// Falls back to the provider's own entry when the institution is not
    /// listed separately; many partners register only at the top level.
    #[must_use]
    pub fn data_provider(&self, provider_name: &str, data_provider_name: &str) -> Option<&Provider> {
        let provider = self.providers.get(provider_name)?;
        provider
            .institutions
            .get(data_provider_name)
            .or(Some(provider))
    }

    /// Returns the number of top-level providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true when the directory has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
