//! Asset-URL discovery for one record.
//!
//! A record either carries a direct, ordered asset list (returned unchanged,
//! no manifest traffic) or declares a IIIF manifest. Declared manifests are
//! fetched, persisted verbatim to the record's side storage for audit/replay,
//! then dispatched on their version/context field to the 2.x or 3.0 parser.
//! Any other version is a hard failure; there is no silent fallback.
//!
//! Identifiers coming out of a manifest parser are run through
//! [`maximize`](maximize::maximize) before being returned; direct asset lists
//! are not touched.

mod error;
pub mod maximize;
mod v2;
mod v3;

pub use error::ManifestError;
pub use maximize::rewrite_with_grammars;

use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use crate::http::FetchClient;
use crate::store::{MediaStore, paths};
use crate::record::Record;

/// Context identifier for Presentation API 2.x.
const CONTEXT_V2: &str = "iiif.io/api/presentation/2/context.json";

/// Context identifier for Presentation API 3.0.
const CONTEXT_V3: &str = "iiif.io/api/presentation/3/context.json";

/// Supported manifest versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestVersion {
    /// Presentation API 2.x.
    V2,
    /// Presentation API 3.0.
    V3,
}

/// Resolves ordered asset URLs for records.
#[derive(Debug)]
pub struct ManifestResolver<'a> {
    http: &'a FetchClient,
    store: &'a MediaStore,
    partner: &'a str,
}

impl<'a> ManifestResolver<'a> {
    /// Creates a resolver bound to one worker's clients.
    #[must_use]
    pub fn new(http: &'a FetchClient, store: &'a MediaStore, partner: &'a str) -> Self {
        Self { http, store, partner }
    }

    /// Discovers the ordered asset URLs for a record.
    ///
    /// The returned list's positions are the asset ordinals; empty-string
    /// entries are unresolvable pages whose slots must be preserved.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] when a declared manifest cannot be fetched,
    /// persisted, or parsed, or carries an unsupported version.
    #[instrument(skip(self, record), fields(record_id = %record.id))]
    pub async fn resolve_asset_urls(&self, record: &Record) -> Result<Vec<String>, ManifestError> {
        if record.has_media_urls() {
            debug!(urls = record.media_urls.len(), "record carries a direct asset list");
            return Ok(record.media_urls.clone());
        }

        let Some(manifest_url) = record.manifest_url.as_deref() else {
            // Eligibility guarantees one of the two sources; an empty list
            // here just means there is nothing to ingest.
            return Ok(Vec::new());
        };

        if Url::parse(manifest_url).is_err() {
            return Err(ManifestError::invalid_url(manifest_url));
        }

        let payload = self
            .http
            .get_bytes(manifest_url)
            .await
            .map_err(|e| ManifestError::fetch(manifest_url, e))?;

        // Audit copy first: a later re-run must be able to replay the parse
        // even if this run dies before storing any asset.
        self.store
            .put_side_file(
                &paths::manifest_path(self.partner, &record.id),
                payload.bytes.clone(),
                "application/json",
            )
            .await?;

        let manifest: Value = serde_json::from_slice(&payload.bytes)
            .map_err(|_| ManifestError::parse(manifest_url))?;

        let version = detect_version(&manifest)?;
        let identifiers = match version {
            ManifestVersion::V2 => v2::parse(&manifest),
            ManifestVersion::V3 => v3::parse(&manifest),
        };

        let mut urls = Vec::with_capacity(identifiers.len());
        for identifier in &identifiers {
            urls.push(maximize::maximize(self.http, identifier).await);
        }

        info!(
            version = ?version,
            canvases = identifiers.len(),
            resolved = urls.iter().filter(|u| !u.is_empty()).count(),
            "manifest resolved"
        );

        Ok(urls)
    }
}

/// Inspects the manifest's version/context field.
///
/// The field may be a single string or a list of strings; any element equal to
/// a known version identifier selects that version (3.0 checked first).
///
/// # Errors
///
/// Returns [`ManifestError::UnsupportedVersion`] when no element matches.
pub fn detect_version(manifest: &Value) -> Result<ManifestVersion, ManifestError> {
    let context = manifest.get("@context");

    let candidates: Vec<&str> = match context {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    if candidates.iter().any(|c| c.ends_with(CONTEXT_V3)) {
        return Ok(ManifestVersion::V3);
    }
    if candidates.iter().any(|c| c.ends_with(CONTEXT_V2)) {
        return Ok(ManifestVersion::V2);
    }

    Err(ManifestError::unsupported_version(
        context.map_or_else(|| "<missing>".to_string(), Value::to_string),
    ))
}
