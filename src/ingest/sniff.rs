//! Byte-level content-type detection for downloaded payloads.
//!
//! The server-declared Content-Type is not trusted: servers under error
//! conditions return HTML/JSON/XML error pages with a 200 status, and storing
//! those as media would poison the repository. Detection order is magic bytes
//! first, then a textual-document heuristic, then the declared header as a
//! last resort.

/// Content types that signal an error page rather than media.
const INVALID_CONTENT_TYPES: [&str; 6] = [
    "text/html",
    "application/json",
    "application/xhtml+xml",
    "application/xml",
    "text/xml",
    "text/plain",
];

/// Determines the effective content type of a payload.
///
/// `declared` is the server-supplied Content-Type header, consulted only when
/// the bytes themselves are inconclusive.
#[must_use]
pub fn sniff_content_type(bytes: &[u8], declared: Option<&str>) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    if let Some(textual) = detect_textual_document(bytes) {
        return textual.to_string();
    }

    declared
        .map(normalize_declared)
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Returns true for content types that must never be stored as media.
#[must_use]
pub fn is_invalid_media_type(content_type: &str) -> bool {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    INVALID_CONTENT_TYPES.contains(&normalized.as_str()) || normalized.starts_with("text/")
}

/// Heuristic for textual documents that magic-byte detection cannot see.
fn detect_textual_document(bytes: &[u8]) -> Option<&'static str> {
    let leading = bytes
        .iter()
        .take(512)
        .copied()
        .skip_while(|b| b.is_ascii_whitespace())
        .take(64)
        .collect::<Vec<u8>>();

    let head = String::from_utf8_lossy(&leading).to_ascii_lowercase();
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return Some("text/html");
    }
    if head.starts_with("<?xml") || head.starts_with('<') && head.contains('>') {
        return Some("application/xml");
    }
    if head.starts_with('{') || head.starts_with('[') {
        return Some("application/json");
    }
    None
}

/// Strips parameters from a declared Content-Type header.
fn normalize_declared(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or(declared)
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal JPEG magic prefix.
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

    #[test]
    fn test_sniff_jpeg_by_magic_bytes() {
        let detected = sniff_content_type(JPEG_MAGIC, Some("text/html"));
        assert_eq!(detected, "image/jpeg");
        assert!(!is_invalid_media_type(&detected));
    }

    #[test]
    fn test_sniff_html_error_page() {
        let body = b"<!DOCTYPE html><html><body>Service unavailable</body></html>";
        let detected = sniff_content_type(body, Some("image/jpeg"));
        assert_eq!(detected, "text/html");
        assert!(is_invalid_media_type(&detected));
    }

    #[test]
    fn test_sniff_json_error_body() {
        let body = br#"{"error": "not found"}"#;
        let detected = sniff_content_type(body, None);
        assert_eq!(detected, "application/json");
        assert!(is_invalid_media_type(&detected));
    }

    #[test]
    fn test_sniff_xml_document() {
        let body = br#"<?xml version="1.0"?><error/>"#;
        assert_eq!(sniff_content_type(body, None), "application/xml");
    }

    #[test]
    fn test_sniff_falls_back_to_declared_header() {
        // Random binary with no recognizable magic and no textual shape.
        let body = &[0x01u8, 0x02, 0x03, 0x04, 0x05];
        let detected = sniff_content_type(body, Some("image/x-raw; charset=binary"));
        assert_eq!(detected, "image/x-raw");
    }

    #[test]
    fn test_sniff_unknown_binary_is_octet_stream() {
        let body = &[0x01u8, 0x02, 0x03, 0x04, 0x05];
        assert_eq!(sniff_content_type(body, None), "application/octet-stream");
    }

    #[test]
    fn test_invalid_media_types() {
        for ct in [
            "text/html",
            "text/html; charset=utf-8",
            "application/json",
            "application/xml",
            "text/plain",
            "text/anything-else",
        ] {
            assert!(is_invalid_media_type(ct), "{ct} must be invalid");
        }
    }

    #[test]
    fn test_valid_media_types() {
        for ct in ["image/jpeg", "image/tiff", "image/png", "application/pdf"] {
            assert!(!is_invalid_media_type(ct), "{ct} must be valid");
        }
    }
}
