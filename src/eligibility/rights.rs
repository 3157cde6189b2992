//! Rights-URI categorization.
//!
//! Publication requires the single allowed category: unlimited re-use. The
//! mapping from rights URI to category is a fixed prefix table covering the
//! statements the aggregator actually emits.

/// Standardized rights categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightsCategory {
    /// Free of known restrictions; publication allowed.
    UnlimitedReUse,
    /// Re-use restricted in some way; publication refused.
    LimitedReUse,
    /// No recognized rights statement; publication refused.
    Unknown,
}

/// Rights-URI prefixes that grant unlimited re-use.
const UNLIMITED_PREFIXES: [&str; 5] = [
    "creativecommons.org/publicdomain/zero/",
    "creativecommons.org/publicdomain/mark/",
    "creativecommons.org/licenses/by/",
    "creativecommons.org/licenses/by-sa/",
    "rightsstatements.org/vocab/NoC-US/",
];

/// Rights-URI prefixes that are recognized but restrict re-use.
const LIMITED_PREFIXES: [&str; 4] = [
    "creativecommons.org/licenses/",
    "rightsstatements.org/vocab/InC",
    "rightsstatements.org/vocab/NoC-",
    "rightsstatements.org/page/",
];

/// Maps a rights URI to its category.
#[must_use]
pub fn category_for(rights_uri: Option<&str>) -> RightsCategory {
    let Some(uri) = rights_uri else {
        return RightsCategory::Unknown;
    };
    let normalized = uri
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.");

    if UNLIMITED_PREFIXES.iter().any(|p| normalized.starts_with(p)) {
        return RightsCategory::UnlimitedReUse;
    }
    if LIMITED_PREFIXES.iter().any(|p| normalized.starts_with(p)) {
        return RightsCategory::LimitedReUse;
    }
    RightsCategory::Unknown
}
