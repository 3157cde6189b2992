//! Object-store wrapper for content-addressed media persistence.
//!
//! [`MediaStore`] is the narrow interface the pipeline consumes: existence
//! check, metadata head, get, and put-with-metadata. It wraps any
//! [`object_store::ObjectStore`] backend; the content hash and content type of
//! every stored object ride along as object attributes so the publisher can
//! re-derive them without re-downloading the payload.

pub mod paths;

use std::sync::Arc;

use bytes::Bytes;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, GetOptions, ObjectStore, PutOptions, memory::InMemory,
};
use thiserror::Error;
use tracing::{debug, instrument};

/// Attribute key carrying the hex-encoded SHA-1 of the stored bytes.
///
/// The target repository indexes files by SHA-1; this equality is load-bearing
/// for duplicate detection, not incidental.
const SHA1_ATTRIBUTE: &str = "sha1";

/// Errors from object-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store rejected or failed the operation.
    #[error("object store error at {path}: {source}")]
    Backend {
        /// The object path involved.
        path: String,
        /// The underlying store error.
        #[source]
        source: object_store::Error,
    },
}

impl StoreError {
    fn backend(path: &Path, source: object_store::Error) -> Self {
        Self::Backend {
            path: path.to_string(),
            source,
        }
    }
}

/// Metadata attached to a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObjectMeta {
    /// Object size in bytes.
    pub size_bytes: u64,
    /// Content type recorded at store time, if any.
    pub content_type: Option<String>,
    /// Hex-encoded SHA-1 recorded at store time, if any.
    ///
    /// Absence signals a prior incomplete ingest; the publisher rejects such
    /// objects rather than re-hashing them.
    pub sha1: Option<String>,
}

/// Narrow object-store interface used by ingest and publish.
#[derive(Clone)]
pub struct MediaStore {
    inner: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for MediaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStore").finish_non_exhaustive()
    }
}

impl MediaStore {
    /// Wraps an already-constructed backend.
    #[must_use]
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    /// Creates an in-memory store. Used by tests and dry runs.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Returns true if a live object exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for any failure other than not-found.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        match self.inner.head(path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(source) => Err(StoreError::backend(path, source)),
        }
    }

    /// Fetches the metadata of a stored object without its payload.
    ///
    /// Returns `None` when no object exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for backend failures.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn head_metadata(&self, path: &Path) -> Result<Option<StoredObjectMeta>, StoreError> {
        let options = GetOptions {
            head: true,
            ..GetOptions::default()
        };
        match self.inner.get_opts(path, options).await {
            Ok(result) => {
                let content_type = result
                    .attributes
                    .get(&Attribute::ContentType)
                    .map(|v| v.as_ref().to_string());
                let sha1 = result
                    .attributes
                    .get(&Attribute::Metadata(SHA1_ATTRIBUTE.into()))
                    .map(|v| v.as_ref().to_string());
                Ok(Some(StoredObjectMeta {
                    size_bytes: result.meta.size,
                    content_type,
                    sha1,
                }))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(source) => Err(StoreError::backend(path, source)),
        }
    }

    /// Fetches the full payload of a stored object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the object is missing or the backend fails.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn get_bytes(&self, path: &Path) -> Result<Bytes, StoreError> {
        let result = self
            .inner
            .get(path)
            .await
            .map_err(|source| StoreError::backend(path, source))?;
        result
            .bytes()
            .await
            .map_err(|source| StoreError::backend(path, source))
    }

    /// Stores a payload with its content type and SHA-1 attached as attributes.
    ///
    /// Overwrites any existing object at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend rejects the put.
    #[instrument(skip(self, bytes), fields(path = %path, bytes = bytes.len()))]
    pub async fn put_with_metadata(
        &self,
        path: &Path,
        bytes: Vec<u8>,
        content_type: &str,
        sha1_hex: &str,
    ) -> Result<(), StoreError> {
        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        attributes.insert(
            Attribute::Metadata(SHA1_ATTRIBUTE.into()),
            AttributeValue::from(sha1_hex.to_string()),
        );

        let options = PutOptions {
            attributes,
            ..PutOptions::default()
        };

        self.inner
            .put_opts(path, bytes.into(), options)
            .await
            .map_err(|source| StoreError::backend(path, source))?;
        debug!("object stored");
        Ok(())
    }

    /// Stores a side-file document (no hash attribute, plain content type).
    ///
    /// Side files are written idempotently; overwriting with identical content
    /// is safe.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend rejects the put.
    #[instrument(skip(self, bytes), fields(path = %path, bytes = bytes.len()))]
    pub async fn put_side_file(
        &self,
        path: &Path,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );

        let options = PutOptions {
            attributes,
            ..PutOptions::default()
        };

        self.inner
            .put_opts(path, bytes.into(), options)
            .await
            .map_err(|source| StoreError::backend(path, source))?;
        Ok(())
    }
}
