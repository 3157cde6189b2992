//! Eligibility evaluation for catalog records.
//!
//! Five independent checks decide whether a record may be published: rights
//! category, provider upload permission, wikidata attribution, asset presence,
//! and the denylist. Every check is computed even when an earlier one has
//! already failed, so an operator sees all reasons in one pass rather than
//! replaying the record check by check.
//!
//! The asset-presence check may have a side effect: when a record exposes
//! neither a direct asset list nor a manifest, a manifest URL is synthesized
//! from the record's landing page against a known collection-platform path
//! pattern and probed with a HEAD request. On success the discovered URL is
//! written back onto the record for downstream reuse.

pub mod rights;

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::http::FetchClient;
use crate::record::Record;
use crate::record::provider::Provider;

use rights::RightsCategory;

/// Landing-page pattern for the one collection platform whose manifest URLs
/// can be derived: `/digital/collection/{alias}/id/{pointer}`.
#[allow(clippy::expect_used)]
static COLLECTION_PLATFORM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<origin>https?://[^/]+)/digital/collection/(?P<alias>[^/]+)/id/(?P<pointer>\d+)")
        .expect("static pattern must compile")
});

/// Per-check results for one record.
///
/// All five checks are computed and individually loggable; the record is
/// eligible only when every one holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityReport {
    /// Rights category equals unlimited re-use.
    pub rights_ok: bool,
    /// Provider or data provider has opted in to publication.
    pub upload_allowed: bool,
    /// Both provider and data provider carry wikidata ids.
    pub attributable: bool,
    /// The record exposes at least one asset (direct list or manifest,
    /// possibly discovered by the probe).
    pub has_assets: bool,
    /// The record id is not denylisted.
    pub not_denylisted: bool,
}

impl EligibilityReport {
    /// True only when every check passed.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.rights_ok
            && self.upload_allowed
            && self.attributable
            && self.has_assets
            && self.not_denylisted
    }

    /// Names of the failed checks, for logs and diagnostics.
    #[must_use]
    pub fn failures(&self) -> Vec<&'static str> {
        let mut failures = Vec::new();
        if !self.rights_ok {
            failures.push("rights category not unlimited re-use");
        }
        if !self.upload_allowed {
            failures.push("no upload permission from provider or data provider");
        }
        if !self.attributable {
            failures.push("missing wikidata id");
        }
        if !self.has_assets {
            failures.push("no asset list or manifest");
        }
        if !self.not_denylisted {
            failures.push("record id denylisted");
        }
        failures
    }
}

/// Evaluates records against the publication rules.
#[derive(Debug)]
pub struct Evaluator<'a> {
    http: &'a FetchClient,
    denylist: &'a HashSet<String>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator over a loaded denylist.
    #[must_use]
    pub fn new(http: &'a FetchClient, denylist: &'a HashSet<String>) -> Self {
        Self { http, denylist }
    }

    /// Runs all five checks against a record.
    ///
    /// `provider` and `data_provider` are the directory entries matching the
    /// record's display names; `None` means the name was not in the directory.
    /// The record is mutable only so the derived-manifest probe can cache its
    /// discovery.
    #[instrument(skip(self, record, provider, data_provider), fields(record_id = %record.id))]
    pub async fn evaluate(
        &self,
        record: &mut Record,
        provider: Option<&Provider>,
        data_provider: Option<&Provider>,
    ) -> EligibilityReport {
        let rights_ok =
            rights::category_for(record.rights_uri.as_deref()) == RightsCategory::UnlimitedReUse;

        let upload_allowed = provider.is_some_and(|p| p.upload_allowed)
            || data_provider.is_some_and(|p| p.upload_allowed);

        let attributable = provider.is_some_and(Provider::has_wikidata_id)
            && data_provider.is_some_and(Provider::has_wikidata_id);

        let has_assets = self.check_asset_presence(record).await;

        let not_denylisted = !self.denylist.contains(&record.id);

        let report = EligibilityReport {
            rights_ok,
            upload_allowed,
            attributable,
            has_assets,
            not_denylisted,
        };

        if report.is_eligible() {
            debug!("record eligible");
        } else {
            // Each failed check is reported, not just the first one hit.
            for failure in report.failures() {
                info!(reason = failure, "eligibility check failed");
            }
        }

        report
    }

    /// Asset-presence check, including the derived-manifest probe.
    async fn check_asset_presence(&self, record: &mut Record) -> bool {
        if record.has_media_urls() || record.has_manifest() {
            return true;
        }

        let Some(shown_at) = record.is_shown_at.as_deref() else {
            return false;
        };
        let Some(candidate) = derive_manifest_url(shown_at) else {
            debug!(url = %shown_at, "landing page matches no known platform pattern");
            return false;
        };

        match self.http.head(&candidate).await {
            Ok(_) => {
                info!(manifest = %candidate, "derived manifest probe succeeded");
                record.set_discovered_manifest(candidate);
                true
            }
            Err(e) => {
                warn!(manifest = %candidate, error = %e, "derived manifest probe failed");
                false
            }
        }
    }
}

/// Synthesizes a candidate manifest URL from a landing-page URL.
///
/// Returns `None` when the landing page is not on the known platform.
#[must_use]
pub fn derive_manifest_url(shown_at: &str) -> Option<String> {
    let caps = COLLECTION_PLATFORM_PATTERN.captures(shown_at)?;
    Some(format!(
        "{}/iiif/info/{}/{}/manifest.json",
        &caps["origin"], &caps["alias"], &caps["pointer"]
    ))
}

/// Loads the record-id denylist from a file, one id per line.
///
/// Blank lines and `#` comments are ignored. Membership tests against the
/// returned set are O(1).
///
/// # Errors
///
/// Returns the IO error when the file cannot be read; a missing denylist file
/// aborts the run before any record is processed.
pub fn load_denylist(path: &Path) -> Result<HashSet<String>, std::io::Error> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect())
}
