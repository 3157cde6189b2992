//! Publication errors and the upload-failure taxonomy.
//!
//! Raw provider error text is never surfaced to operators directly. Upload
//! failures are string-matched against a small set of known markers and
//! collapsed into [`UploadFailureKind`], which is what gets logged and
//! counted.

use thiserror::Error;

use crate::store::StoreError;
use crate::wiki::WikiError;

/// Errors fatal to one asset's publication.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Reading the stored object or its metadata failed.
    #[error("stored object access failed: {0}")]
    Store(#[from] StoreError),

    /// The repository interaction failed.
    #[error("wiki operation failed: {0}")]
    Wiki(#[from] WikiError),
}

/// Fixed classification of upload failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFailureKind {
    /// A file with this name exists on a shared repository and may not be
    /// overridden.
    FileExistsForbidden,
    /// The payload's MIME type does not match its extension.
    BadMime,
    /// The file type is banned by repository policy.
    BannedType,
    /// The repository already holds these bytes under another title.
    Duplicate,
    /// The upload was a no-op (identical content already present).
    NoChange,
    /// Anything that matched no known marker.
    Other,
}

impl UploadFailureKind {
    /// Human-readable label for logs and the run summary.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::FileExistsForbidden => "file exists and may not be replaced",
            Self::BadMime => "MIME type does not match extension",
            Self::BannedType => "file type banned by repository policy",
            Self::Duplicate => "content already present under another title",
            Self::NoChange => "upload was a no-op",
            Self::Other => "unclassified upload failure",
        }
    }
}

/// Known error markers, checked in order.
const MARKERS: [(&str, UploadFailureKind); 7] = [
    ("fileexists-shared-forbidden", UploadFailureKind::FileExistsForbidden),
    ("fileexists-forbidden", UploadFailureKind::FileExistsForbidden),
    ("filetype-badmime", UploadFailureKind::BadMime),
    ("filetype-banned", UploadFailureKind::BannedType),
    ("no-change", UploadFailureKind::NoChange),
    ("nochange", UploadFailureKind::NoChange),
    ("duplicate", UploadFailureKind::Duplicate),
];

/// Classifies an upload failure message into the fixed taxonomy.
#[must_use]
pub fn classify_upload_failure(message: &str) -> UploadFailureKind {
    let lowered = message.to_ascii_lowercase();
    MARKERS
        .iter()
        .find(|(marker, _)| lowered.contains(marker))
        .map_or(UploadFailureKind::Other, |(_, kind)| *kind)
}
