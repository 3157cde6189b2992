//! Deterministic page-title derivation.
//!
//! A page title is built from the record's display title (truncated, with
//! markup-reserved characters replaced), the record id, an optional page
//! ordinal for multi-asset records, and the extension derived from the stored
//! content type. The same record/ordinal always yields the same title. The
//! duplicate-by-hash check, not title uniqueness, is what prevents
//! re-publishing, but deterministic titles keep re-runs from minting aliases.

/// Maximum length of the display-title portion, in characters.
///
/// The repository caps full titles at 240 bytes; truncating the free-text part
/// well below that leaves room for the id, page suffix, and extension.
const MAX_TITLE_LENGTH: usize = 181;

/// Characters reserved by the target markup language, each replaced with `-`.
const RESERVED: [char; 11] = ['[', ']', '{', '}', '|', '#', '<', '>', ':', '/', '?'];

/// Derives the page title for one asset.
///
/// `page` is `Some(ordinal)` only when the record has more than one asset.
#[must_use]
pub fn page_title(
    display_title: Option<&str>,
    record_id: &str,
    page: Option<usize>,
    extension: &str,
) -> String {
    let cleaned = escape_title(display_title.unwrap_or("Untitled"));
    let truncated: String = cleaned.chars().take(MAX_TITLE_LENGTH).collect();
    let truncated = truncated.trim();

    match page {
        Some(n) => format!("{truncated} - {record_id} (page {n}).{extension}"),
        None => format!("{truncated} - {record_id}.{extension}"),
    }
}

/// Replaces markup-reserved characters and collapses whitespace runs.
#[must_use]
pub fn escape_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| if RESERVED.contains(&c) { '-' } else { c })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Guesses a file extension from a stored content type.
///
/// Returns `None` when no extension can be derived; such assets are skipped
/// rather than uploaded with a guessed suffix.
#[must_use]
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    match normalized.as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/tiff" => Some("tif"),
        "image/jp2" => Some("jp2"),
        "image/webp" => Some("webp"),
        "image/bmp" => Some("bmp"),
        "image/svg+xml" => Some("svg"),
        "application/pdf" => Some("pdf"),
        "audio/mpeg" => Some("mp3"),
        "video/mp4" => Some("mp4"),
        _ => None,
    }
}
