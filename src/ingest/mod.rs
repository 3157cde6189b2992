//! Fetch-validate-store for one media asset.
//!
//! [`Ingestor::ingest`] walks the explicit decision points in order: the
//! existence fast path (no network traffic when the destination is already
//! live and overwrite is off), the retried download, byte-level type
//! validation, content hashing, and the metadata-attached put with a
//! matching-hash skip. A failure here is fatal to this asset only; sibling
//! assets of the same record are unaffected.
//!
//! Per-record side files (raw metadata document and the ordered asset-URL
//! list) are written once the URL list is known, independent of any
//! individual asset's outcome, so a later re-run can discover previously
//! stored assets even after a partial failure.

pub mod sniff;

use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::http::{FetchClient, FetchError};
use crate::record::Record;
use crate::store::{MediaStore, StoreError, paths};

/// Terminal outcome of one ingest attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Bytes were fetched, validated, and stored.
    Stored {
        /// Payload size.
        size_bytes: u64,
        /// Hex-encoded SHA-1 of the payload, computed exactly once here.
        sha1: String,
        /// Sniffed content type.
        content_type: String,
    },
    /// A live object already occupies the destination path; nothing fetched
    /// or written.
    SkippedExists,
    /// The payload sniffed as an error document, discarded without storing.
    InvalidType {
        /// The sniffed type that caused the rejection.
        content_type: String,
    },
}

/// Errors fatal to one asset.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The asset slot has no URL (an unresolvable manifest page).
    #[error("asset {ordinal} of record {record_id} has no resolved URL")]
    UnresolvedUrl {
        /// The record owning the asset.
        record_id: String,
        /// The empty slot's ordinal.
        ordinal: usize,
    },

    /// The download failed after exhausting the retry budget.
    #[error("asset download failed: {0}")]
    Fetch(#[from] FetchError),

    /// The object store rejected a read or write.
    #[error("asset store operation failed: {0}")]
    Store(#[from] StoreError),
}

/// Ingests assets for one partner into the object store.
#[derive(Debug)]
pub struct Ingestor<'a> {
    http: &'a FetchClient,
    store: &'a MediaStore,
    partner: &'a str,
}

impl<'a> Ingestor<'a> {
    /// Creates an ingestor bound to one worker's clients.
    #[must_use]
    pub fn new(http: &'a FetchClient, store: &'a MediaStore, partner: &'a str) -> Self {
        Self { http, store, partner }
    }

    /// Fetches, validates, and stores one asset.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] when the slot is unresolved, the download
    /// exhausts its retry budget, or the store fails. Policy skips
    /// (already-exists, invalid type) are outcomes, not errors.
    #[instrument(skip(self, record), fields(record_id = %record.id, ordinal))]
    pub async fn ingest(
        &self,
        record: &Record,
        ordinal: usize,
        source_url: &str,
        overwrite: bool,
    ) -> Result<IngestOutcome, IngestError> {
        let destination = paths::asset_path(self.partner, &record.id, ordinal);

        // Idempotence fast path: no network fetch when the object is live.
        if !overwrite && self.store.exists(&destination).await? {
            debug!(path = %destination, "destination already populated");
            return Ok(IngestOutcome::SkippedExists);
        }

        if source_url.trim().is_empty() {
            return Err(IngestError::UnresolvedUrl {
                record_id: record.id.clone(),
                ordinal,
            });
        }

        let payload = self.http.get_bytes(source_url).await?;

        let content_type =
            sniff::sniff_content_type(&payload.bytes, payload.content_type.as_deref());
        if sniff::is_invalid_media_type(&content_type) {
            info!(
                content_type = %content_type,
                url = %source_url,
                "payload sniffed as an error document, discarding"
            );
            return Ok(IngestOutcome::InvalidType { content_type });
        }

        // The hash is computed once, here, from the fetched bytes. It is
        // never recomputed from a re-upload.
        let sha1_hex = hex_sha1(&payload.bytes);

        // Matching hash at the destination means a prior run already synced
        // these bytes; differing hash means the origin changed and the object
        // is overwritten.
        if let Some(existing) = self.store.head_metadata(&destination).await? {
            if existing.sha1.as_deref() == Some(sha1_hex.as_str()) {
                debug!(path = %destination, "destination already holds identical bytes");
                return Ok(IngestOutcome::SkippedExists);
            }
        }

        let size_bytes = payload.bytes.len() as u64;
        self.store
            .put_with_metadata(&destination, payload.bytes, &content_type, &sha1_hex)
            .await?;

        info!(path = %destination, size_bytes, "asset stored");

        Ok(IngestOutcome::Stored {
            size_bytes,
            sha1: sha1_hex,
            content_type,
        })
    }

    /// Writes the per-record side files: the raw metadata document and the
    /// ordered asset-URL list.
    ///
    /// Called once per record as soon as the URL list is known; safe to call
    /// on re-runs (identical content overwrites identically).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when either write fails.
    #[instrument(skip(self, record, urls), fields(record_id = %record.id))]
    pub async fn write_side_files(
        &self,
        record: &Record,
        urls: &[String],
    ) -> Result<(), StoreError> {
        let metadata = serde_json::to_vec_pretty(&record.raw).unwrap_or_default();
        self.store
            .put_side_file(
                &paths::metadata_path(self.partner, &record.id),
                metadata,
                "application/json",
            )
            .await?;

        let mut file_list = urls.join("\n");
        file_list.push('\n');
        self.store
            .put_side_file(
                &paths::file_list_path(self.partner, &record.id),
                file_list.into_bytes(),
                "text/plain",
            )
            .await?;

        debug!("side files written");
        Ok(())
    }
}

/// Hex-encodes the SHA-1 digest of a byte stream.
#[must_use]
pub fn hex_sha1(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Minimal JPEG magic prefix, enough for type detection.
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

    fn test_record() -> Record {
        Record::from_document(json!({
            "id": "abcd1234",
            "sourceResource": {"title": "Test"}
        }))
        .unwrap()
    }

    #[test]
    fn test_hex_sha1_known_vector() {
        // SHA-1("abc")
        assert_eq!(hex_sha1(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[tokio::test]
    async fn test_ingest_stores_valid_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_bytes(JPEG_MAGIC),
            )
            .mount(&server)
            .await;

        let http = FetchClient::new();
        let store = MediaStore::in_memory();
        let ingestor = Ingestor::new(&http, &store, "p");
        let record = test_record();

        let outcome = ingestor
            .ingest(&record, 1, &format!("{}/img", server.uri()), false)
            .await
            .unwrap();

        match outcome {
            IngestOutcome::Stored {
                size_bytes,
                sha1,
                content_type,
            } => {
                assert_eq!(size_bytes, JPEG_MAGIC.len() as u64);
                assert_eq!(sha1, hex_sha1(JPEG_MAGIC));
                assert_eq!(content_type, "image/jpeg");
            }
            other => panic!("Expected Stored, got: {other:?}"),
        }

        let meta = store
            .head_metadata(&paths::asset_path("p", "abcd1234", 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.sha1.as_deref(), Some(hex_sha1(JPEG_MAGIC).as_str()));
    }

    #[tokio::test]
    async fn test_ingest_second_run_skips_without_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_bytes(JPEG_MAGIC),
            )
            .expect(1)
            .mount(&server)
            .await;

        let http = FetchClient::new();
        let store = MediaStore::in_memory();
        let ingestor = Ingestor::new(&http, &store, "p");
        let record = test_record();
        let url = format!("{}/img", server.uri());

        let first = ingestor.ingest(&record, 1, &url, false).await.unwrap();
        assert!(matches!(first, IngestOutcome::Stored { .. }));

        // Exactly one network fetch across both runs: wiremock enforces it.
        let second = ingestor.ingest(&record, 1, &url, false).await.unwrap();
        assert_eq!(second, IngestOutcome::SkippedExists);
    }

    #[tokio::test]
    async fn test_ingest_overwrite_with_matching_hash_skips_put() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_bytes(JPEG_MAGIC),
            )
            .expect(2)
            .mount(&server)
            .await;

        let http = FetchClient::new();
        let store = MediaStore::in_memory();
        let ingestor = Ingestor::new(&http, &store, "p");
        let record = test_record();
        let url = format!("{}/img", server.uri());

        ingestor.ingest(&record, 1, &url, false).await.unwrap();
        // overwrite=true re-fetches but recognizes identical bytes.
        let outcome = ingestor.ingest(&record, 1, &url, true).await.unwrap();
        assert_eq!(outcome, IngestOutcome::SkippedExists);
    }

    #[tokio::test]
    async fn test_ingest_html_error_page_is_invalid_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_string("<html><body>oops</body></html>"),
            )
            .mount(&server)
            .await;

        let http = FetchClient::new();
        let store = MediaStore::in_memory();
        let ingestor = Ingestor::new(&http, &store, "p");
        let record = test_record();

        let outcome = ingestor
            .ingest(&record, 1, &format!("{}/img", server.uri()), false)
            .await
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::InvalidType { .. }));

        // Nothing stored.
        assert!(
            !store
                .exists(&paths::asset_path("p", "abcd1234", 1))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_ingest_unresolved_slot_is_error() {
        let http = FetchClient::new();
        let store = MediaStore::in_memory();
        let ingestor = Ingestor::new(&http, &store, "p");
        let record = test_record();

        let result = ingestor.ingest(&record, 2, "", false).await;
        assert!(matches!(result, Err(IngestError::UnresolvedUrl { ordinal: 2, .. })));
    }

    #[tokio::test]
    async fn test_ingest_download_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let http = FetchClient::new();
        let store = MediaStore::in_memory();
        let ingestor = Ingestor::new(&http, &store, "p");
        let record = test_record();

        let result = ingestor
            .ingest(&record, 1, &format!("{}/img", server.uri()), false)
            .await;
        assert!(matches!(result, Err(IngestError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_write_side_files_persists_metadata_and_file_list() {
        let http = FetchClient::new();
        let store = MediaStore::in_memory();
        let ingestor = Ingestor::new(&http, &store, "p");
        let record = test_record();
        let urls = vec!["https://a/1".to_string(), String::new(), "https://a/3".to_string()];

        ingestor.write_side_files(&record, &urls).await.unwrap();

        let map = store
            .get_bytes(&paths::metadata_path("p", "abcd1234"))
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&map).unwrap();
        assert_eq!(parsed["id"], "abcd1234");

        let list = store
            .get_bytes(&paths::file_list_path("p", "abcd1234"))
            .await
            .unwrap();
        assert_eq!(&list[..], b"https://a/1\n\nhttps://a/3\n");
    }
}
