//! Aggregator API client.
//!
//! Fetches one catalog record by id: `GET {base}/{id}` with an auth header.
//! The response wraps matches in a `docs` array; the first element is the
//! record, an empty array means the id is unknown.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::http::{FetchClient, FetchError};

use super::Record;

/// Errors from record lookups.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// The API request failed.
    #[error("aggregator request failed: {0}")]
    Fetch(#[from] FetchError),

    /// The API answered but the id is unknown.
    #[error("record {id} not found in aggregator")]
    NotFound {
        /// The unknown record id.
        id: String,
    },

    /// The API answered with a document the record model cannot read.
    #[error("record {id} has a malformed aggregator document")]
    Malformed {
        /// The record id whose document was unusable.
        id: String,
    },
}

/// Client for the aggregator's item API.
///
/// Borrows the owning worker's [`FetchClient`]; one worker, one client.
#[derive(Debug)]
pub struct AggregatorClient<'a> {
    http: &'a FetchClient,
    base_url: String,
    api_key: String,
}

impl<'a> AggregatorClient<'a> {
    /// Creates a client for the given API base URL and key.
    #[must_use]
    pub fn new(http: &'a FetchClient, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Fetches one record by id.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::NotFound`] for an empty `docs` array,
    /// [`AggregatorError::Malformed`] for an unreadable document, and
    /// [`AggregatorError::Fetch`] for transport failures.
    #[instrument(skip(self), fields(record_id = %id))]
    pub async fn fetch_record(&self, id: &str) -> Result<Record, AggregatorError> {
        let url = format!("{}/{id}", self.base_url);
        let document = self
            .http
            .get_json(&url, &[("Authorization", self.api_key.as_str())])
            .await?;

        let doc = document
            .get("docs")
            .and_then(|docs| docs.as_array())
            .and_then(|docs| docs.first())
            .cloned()
            .ok_or_else(|| AggregatorError::NotFound { id: id.to_string() })?;

        debug!("record document fetched");

        Record::from_document(doc).ok_or_else(|| AggregatorError::Malformed { id: id.to_string() })
    }
}
