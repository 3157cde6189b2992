//! URL maximization: rewrite an image-service URL to request the largest
//! available rendition.
//!
//! Manifests usually embed a default or thumbnail-sized image request. Image
//! services also differ in how many path segments precede the opaque image
//! identifier (zero to three), and the identifier itself may contain slashes,
//! so a single pattern cannot parse every deployment. The rewrite is driven by
//! an ordered grammar table evaluated most-specific first: a less-specific
//! grammar would otherwise mis-parse a fully-specified Image API request. New
//! server layouts are supported by appending a row, not by branching logic.
//!
//! When no grammar matches, the maximal-resolution suffix is appended to the
//! input as-is and verified with a HEAD request; only a response with an image
//! content type makes the rewrite valid. Maximization never fails: total
//! failure yields an empty string, logged as its own outcome.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::http::FetchClient;

/// Image API region values.
const REGION: &str = r"(?:full|square|max|pct:[0-9.,]+|\d+,\d+,\d+,\d+)";
/// Image API size values.
const SIZE: &str = r"(?:full|max|\^max|!?\d*,\d*|pct:[0-9.]+)";
/// Image API rotation values.
const ROTATION: &str = r"!?\d+(?:\.\d+)?";
/// Image API quality values.
const QUALITY: &str = r"(?:default|native|color|gray|bitonal)";
/// Image API format values.
const FORMAT: &str = r"(?:jpg|jpeg|png|gif|webp|tif|tiff|jp2|pdf)";

/// One row of the grammar cascade.
struct Grammar {
    /// Diagnostic name, logged when the row matches.
    name: &'static str,
    /// Pattern with a `base` capture ending at the image identifier.
    pattern: Regex,
    /// Rewrite applied to the captures on match.
    rewrite: fn(&Captures<'_>) -> String,
}

/// Replaces everything after the identifier with the maximal request.
fn rewrite_to_max(caps: &Captures<'_>) -> String {
    let base = &caps["base"];
    format!("{base}{}", max_suffix(base))
}

/// Returns the maximal-rendition suffix for a service base URL.
///
/// Services addressed through an explicit Image API 2.x path keep the 2.x
/// `full` size keyword; everything else gets the 3.0 `max` keyword.
fn max_suffix(base: &str) -> &'static str {
    if base.contains("/iiif/2/") {
        "/full/full/0/default.jpg"
    } else {
        "/full/max/0/default.jpg"
    }
}

/// Builds a full-request row with `prefixes` path segments before the
/// identifier.
#[allow(clippy::expect_used)]
fn full_request_row(name: &'static str, prefixes: usize) -> Grammar {
    let pattern = format!(
        r"^(?P<base>https?://[^/]+/(?:[^/]+/){{{prefixes}}}[^/]+)/{REGION}/{SIZE}/{ROTATION}/{QUALITY}\.{FORMAT}$"
    );
    Grammar {
        name,
        pattern: Regex::new(&pattern).expect("static grammar pattern must compile"),
        rewrite: rewrite_to_max,
    }
}

/// Builds a row from a fixed pattern string.
#[allow(clippy::expect_used)]
fn fixed_row(name: &'static str, pattern: &str) -> Grammar {
    Grammar {
        name,
        pattern: Regex::new(pattern).expect("static grammar pattern must compile"),
        rewrite: rewrite_to_max,
    }
}

/// The cascade, most-specific first.
static GRAMMARS: LazyLock<Vec<Grammar>> = LazyLock::new(|| {
    vec![
        // A complete Image API request already present: replace only the
        // trailing region/size/rotation/quality.format. Deeper prefixes first
        // so an identifier is never swallowed by a shorter row.
        full_request_row("full-request-3-prefixes", 3),
        full_request_row("full-request-2-prefixes", 2),
        full_request_row("full-request-1-prefix", 1),
        full_request_row("full-request-0-prefixes", 0),
        // An info.json service description: the base is everything before it.
        fixed_row(
            "info-json",
            r"^(?P<base>https?://[^/]+(?:/[^/]+)+)/info\.json$",
        ),
        // A bare image-service identifier on a recognizable service path.
        fixed_row(
            "bare-service-identifier",
            r"^(?P<base>https?://[^/]+(?:/[^/]+)*?/iiif/(?:[23]/)?[^/]+)$",
        ),
    ]
});

/// Rewrites a URL through the grammar table without any network traffic.
///
/// Returns `None` when no row matches.
#[must_use]
pub fn rewrite_with_grammars(url: &str) -> Option<String> {
    for grammar in GRAMMARS.iter() {
        if let Some(caps) = grammar.pattern.captures(url) {
            let rewritten = (grammar.rewrite)(&caps);
            debug!(grammar = grammar.name, url = %url, rewritten = %rewritten, "grammar matched");
            return Some(rewritten);
        }
    }
    None
}

/// Maximizes an image-service URL, best-effort.
///
/// Grammar rows are tried first; if none match, the maximal suffix is appended
/// to the input and verified with a HEAD request for an image content type.
/// Returns an empty string on total failure.
pub async fn maximize(http: &FetchClient, url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }

    if let Some(rewritten) = rewrite_with_grammars(url) {
        return rewritten;
    }

    // No grammar recognized the layout: append and verify before trusting it.
    let candidate = format!("{}{}", url.trim_end_matches('/'), max_suffix(url));
    match http.head(&candidate).await {
        Ok(info)
            if info
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("image/")) =>
        {
            debug!(url = %url, rewritten = %candidate, "fallback rewrite verified");
            candidate
        }
        _ => {
            warn!(url = %url, "maximization failed, dropping URL");
            String::new()
        }
    }
}
