//! Publication of stored assets to the target wiki repository.
//!
//! The publisher never touches the origin source: content type and hash come
//! from the stored object's metadata, and the payload is materialized from the
//! object store only after the duplicate-by-hash check says the upload will
//! actually happen.

mod error;
pub mod title;
pub mod wikitext;

pub use error::{PublishError, UploadFailureKind, classify_upload_failure};

use tracing::{debug, info, instrument};

use crate::ingest::sniff;
use crate::record::Record;
use crate::store::{MediaStore, paths};
use crate::wiki::{UploadRequest, WikiRepository};

/// Edit summary attached to every upload.
const UPLOAD_COMMENT: &str = "Uploaded media from a digital-library partner batch";

/// Why an asset was skipped without attempting an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No stored object exists at the asset's destination path.
    NotStored,
    /// The stored content type is on the invalid list.
    InvalidType,
    /// The stored object is empty.
    EmptyPayload,
    /// The stored object carries no hash metadata (incomplete prior ingest).
    MissingHash,
    /// No file extension could be derived from the content type.
    NoExtension,
}

impl SkipReason {
    /// Human-readable label for logs and the run summary.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NotStored => "asset was never stored",
            Self::InvalidType => "stored content type is not publishable",
            Self::EmptyPayload => "stored object is empty",
            Self::MissingHash => "stored object has no hash metadata",
            Self::NoExtension => "no extension derivable from content type",
        }
    }
}

/// Terminal outcome of one publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The asset was uploaded under the given title.
    Published {
        /// The page title created.
        title: String,
    },
    /// The repository already holds these bytes; nothing uploaded.
    Duplicate {
        /// The existing page title.
        existing: String,
    },
    /// Policy skip; the asset was not publishable.
    Skipped {
        /// The reason for the skip.
        reason: SkipReason,
    },
    /// Dry run: all checks passed, the upload was withheld.
    DryRun {
        /// The title that would have been created.
        title: String,
    },
}

/// Publishes stored assets for one partner.
pub struct Publisher<'a> {
    store: &'a MediaStore,
    wiki: &'a dyn WikiRepository,
    partner: &'a str,
}

impl std::fmt::Debug for Publisher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("partner", &self.partner)
            .finish_non_exhaustive()
    }
}

impl<'a> Publisher<'a> {
    /// Creates a publisher bound to one worker's clients.
    #[must_use]
    pub fn new(store: &'a MediaStore, wiki: &'a dyn WikiRepository, partner: &'a str) -> Self {
        Self { store, wiki, partner }
    }

    /// Publishes one stored asset.
    ///
    /// `total_assets` controls whether the title carries a page-ordinal
    /// suffix (only multi-asset records get one).
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] for store failures and upload rejections;
    /// callers classify the latter via [`classify_upload_failure`].
    #[instrument(skip(self, record), fields(record_id = %record.id, ordinal))]
    pub async fn publish(
        &self,
        record: &Record,
        ordinal: usize,
        total_assets: usize,
        dry_run: bool,
    ) -> Result<PublishOutcome, PublishError> {
        let path = paths::asset_path(self.partner, &record.id, ordinal);

        // Metadata comes from the store, never from re-downloading the bytes.
        let Some(meta) = self.store.head_metadata(&path).await? else {
            return Ok(PublishOutcome::Skipped {
                reason: SkipReason::NotStored,
            });
        };

        let Some(content_type) = meta.content_type.as_deref() else {
            return Ok(PublishOutcome::Skipped {
                reason: SkipReason::InvalidType,
            });
        };
        if sniff::is_invalid_media_type(content_type) {
            return Ok(PublishOutcome::Skipped {
                reason: SkipReason::InvalidType,
            });
        }
        if meta.size_bytes == 0 {
            return Ok(PublishOutcome::Skipped {
                reason: SkipReason::EmptyPayload,
            });
        }
        let Some(sha1_hex) = meta.sha1.as_deref() else {
            return Ok(PublishOutcome::Skipped {
                reason: SkipReason::MissingHash,
            });
        };

        let Some(extension) = title::extension_for(content_type) else {
            return Ok(PublishOutcome::Skipped {
                reason: SkipReason::NoExtension,
            });
        };

        let page = (total_assets > 1).then_some(ordinal);
        let page_title = title::page_title(record.title.as_deref(), &record.id, page, extension);

        // Primary defense against re-publishing: if the repository already
        // holds these bytes, never invoke the upload.
        if let Some(existing) = self.wiki.find_by_sha1(sha1_hex).await? {
            info!(existing = %existing, "content hash already present at target");
            return Ok(PublishOutcome::Duplicate { existing });
        }

        if dry_run {
            debug!(title = %page_title, "dry run, withholding upload");
            return Ok(PublishOutcome::DryRun { title: page_title });
        }

        let bytes = self.store.get_bytes(&path).await?;
        let description = wikitext::description_document(record);

        self.wiki
            .upload(&UploadRequest {
                title: &page_title,
                bytes: &bytes,
                description: &description,
                comment: UPLOAD_COMMENT,
            })
            .await?;

        info!(title = %page_title, "asset published");
        Ok(PublishOutcome::Published { title: page_title })
    }
}
