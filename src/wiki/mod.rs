//! Target wiki repository client.
//!
//! [`WikiRepository`] is the seam the publisher talks through: a
//! duplicate-by-hash query and an upload operation. The production
//! implementation speaks the MediaWiki action API; tests substitute their own
//! doubles. Uploads are never retried: the verb is not idempotent, and a
//! double upload is exactly the failure mode the duplicate check exists to
//! prevent.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Upload warnings that do not abort the upload.
///
/// These indicate pre-existing-but-unlinked pages or remnants of deleted
/// pages; re-submitting with warnings ignored is safe.
const TOLERATED_WARNINGS: [&str; 4] = ["exists", "exists-normalized", "was-deleted", "page-exists"];

/// Errors from the wiki repository.
#[derive(Debug, Error)]
pub enum WikiError {
    /// Transport-level failure talking to the API.
    #[error("wiki API request failed: {source}")]
    Http {
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with an error envelope.
    #[error("wiki API error {code}: {info}")]
    Api {
        /// Machine-readable error code.
        code: String,
        /// Human-readable error text.
        info: String,
    },

    /// The upload was rejected by a non-tolerated warning.
    #[error("upload rejected: {warnings}")]
    UploadRejected {
        /// The warning keys that aborted the upload.
        warnings: String,
    },

    /// The API response was missing an expected field.
    #[error("wiki API response malformed: missing {field}")]
    MalformedResponse {
        /// The missing field.
        field: &'static str,
    },
}

/// One upload request.
#[derive(Debug)]
pub struct UploadRequest<'a> {
    /// Target page title, extension included.
    pub title: &'a str,
    /// The asset payload, materialized from the object store.
    pub bytes: &'a [u8],
    /// Wikitext description document for the file page.
    pub description: &'a str,
    /// Edit summary.
    pub comment: &'a str,
}

/// Narrow interface the publisher consumes.
#[async_trait]
pub trait WikiRepository: Send + Sync {
    /// Looks up an existing file with the given content hash.
    ///
    /// Returns the existing page title when found. This check runs before
    /// every upload and is the primary defense against re-publishing.
    async fn find_by_sha1(&self, sha1_hex: &str) -> Result<Option<String>, WikiError>;

    /// Uploads a file. Never retried.
    async fn upload(&self, request: &UploadRequest<'_>) -> Result<(), WikiError>;
}

/// MediaWiki action-API implementation.
pub struct MediaWikiClient {
    client: reqwest::Client,
    api_url: String,
    access_token: String,
}

impl std::fmt::Debug for MediaWikiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaWikiClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl MediaWikiClient {
    /// Creates a client for an action-API endpoint with an OAuth bearer token.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(api_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            api_url: api_url.into(),
            access_token: access_token.into(),
        }
    }

    /// Issues an authenticated GET against the action API.
    async fn api_get(&self, query: &[(&str, &str)]) -> Result<Value, WikiError> {
        let response = self
            .client
            .get(&self.api_url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|source| WikiError::Http { source })?;

        let value: Value = response
            .json()
            .await
            .map_err(|source| WikiError::Http { source })?;
        check_api_error(&value)?;
        Ok(value)
    }

    /// Fetches a CSRF token for write operations.
    async fn csrf_token(&self) -> Result<String, WikiError> {
        let value = self
            .api_get(&[
                ("action", "query"),
                ("meta", "tokens"),
                ("type", "csrf"),
                ("format", "json"),
            ])
            .await?;

        value
            .pointer("/query/tokens/csrftoken")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or(WikiError::MalformedResponse { field: "csrftoken" })
    }

    /// Submits one upload form.
    async fn post_upload(
        &self,
        request: &UploadRequest<'_>,
        token: &str,
        ignore_warnings: bool,
    ) -> Result<Value, WikiError> {
        let file_part = reqwest::multipart::Part::bytes(request.bytes.to_vec())
            .file_name(request.title.to_string());

        let mut form = reqwest::multipart::Form::new()
            .text("action", "upload")
            .text("format", "json")
            .text("filename", request.title.to_string())
            .text("comment", request.comment.to_string())
            .text("text", request.description.to_string())
            .text("token", token.to_string())
            .part("file", file_part);
        if ignore_warnings {
            form = form.text("ignorewarnings", "1");
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|source| WikiError::Http { source })?;

        let value: Value = response
            .json()
            .await
            .map_err(|source| WikiError::Http { source })?;
        check_api_error(&value)?;
        Ok(value)
    }
}

#[async_trait]
impl WikiRepository for MediaWikiClient {
    #[instrument(skip(self))]
    async fn find_by_sha1(&self, sha1_hex: &str) -> Result<Option<String>, WikiError> {
        let value = self
            .api_get(&[
                ("action", "query"),
                ("list", "allimages"),
                ("aisha1", sha1_hex),
                ("format", "json"),
            ])
            .await?;

        let existing = value
            .pointer("/query/allimages/0/name")
            .and_then(Value::as_str)
            .map(ToString::to_string);

        debug!(found = existing.is_some(), "hash lookup complete");
        Ok(existing)
    }

    #[instrument(skip(self, request), fields(title = %request.title, bytes = request.bytes.len()))]
    async fn upload(&self, request: &UploadRequest<'_>) -> Result<(), WikiError> {
        let token = self.csrf_token().await?;

        let value = self.post_upload(request, &token, false).await?;
        match upload_result(&value)? {
            UploadResult::Success => return Ok(()),
            UploadResult::Warnings(warnings) => {
                let blocking: Vec<&String> = warnings
                    .iter()
                    .filter(|w| !TOLERATED_WARNINGS.contains(&w.as_str()))
                    .collect();
                if !blocking.is_empty() {
                    return Err(WikiError::UploadRejected {
                        warnings: warnings.join(","),
                    });
                }
                warn!(warnings = %warnings.join(","), "re-submitting with tolerated warnings ignored");
            }
        }

        // Only tolerated warnings: submit once more, warnings ignored.
        let value = self.post_upload(request, &token, true).await?;
        match upload_result(&value)? {
            UploadResult::Success => Ok(()),
            UploadResult::Warnings(warnings) => Err(WikiError::UploadRejected {
                warnings: warnings.join(","),
            }),
        }
    }
}

/// Parsed `upload.result` field.
enum UploadResult {
    Success,
    Warnings(Vec<String>),
}

/// Maps an API error envelope to [`WikiError::Api`].
fn check_api_error(value: &Value) -> Result<(), WikiError> {
    if let Some(error) = value.get("error") {
        return Err(WikiError::Api {
            code: error
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            info: error
                .get("info")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    Ok(())
}

/// Reads the upload result from a response envelope.
fn upload_result(value: &Value) -> Result<UploadResult, WikiError> {
    let result = value
        .pointer("/upload/result")
        .and_then(Value::as_str)
        .ok_or(WikiError::MalformedResponse { field: "upload.result" })?;

    if result == "Success" {
        return Ok(UploadResult::Success);
    }

    let warnings = value
        .pointer("/upload/warnings")
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();
    Ok(UploadResult::Warnings(warnings))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_find_by_sha1_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("aisha1", "cafebabe"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"query":{"allimages":[{"name":"Existing_file.jpg"}]}}"#,
            ))
            .mount(&server)
            .await;

        let client = MediaWikiClient::new(format!("{}/w/api.php", server.uri()), "token");
        let existing = client.find_by_sha1("cafebabe").await.unwrap();
        assert_eq!(existing.as_deref(), Some("Existing_file.jpg"));
    }

    #[tokio::test]
    async fn test_find_by_sha1_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"query":{"allimages":[]}}"#),
            )
            .mount(&server)
            .await;

        let client = MediaWikiClient::new(format!("{}/w/api.php", server.uri()), "token");
        assert!(client.find_by_sha1("cafebabe").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_error_envelope_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"error":{"code":"ratelimited","info":"Too many requests"}}"#,
            ))
            .mount(&server)
            .await;

        let client = MediaWikiClient::new(format!("{}/w/api.php", server.uri()), "token");
        let result = client.find_by_sha1("cafebabe").await;
        match result {
            Err(WikiError::Api { code, .. }) => assert_eq!(code, "ratelimited"),
            other => panic!("Expected Api error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_success_single_post() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("meta", "tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"query":{"tokens":{"csrftoken":"abc+\\"}}}"#,
            ))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"upload":{"result":"Success"}}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = MediaWikiClient::new(format!("{}/w/api.php", server.uri()), "token");
        let request = UploadRequest {
            title: "File.jpg",
            bytes: b"payload",
            description: "desc",
            comment: "comment",
        };
        client.upload(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_blocking_warning_rejects_without_resubmit() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("meta", "tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"query":{"tokens":{"csrftoken":"abc+\\"}}}"#,
            ))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"upload":{"result":"Warning","warnings":{"duplicate":["Other.jpg"]}}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = MediaWikiClient::new(format!("{}/w/api.php", server.uri()), "token");
        let request = UploadRequest {
            title: "File.jpg",
            bytes: b"payload",
            description: "desc",
            comment: "comment",
        };
        let result = client.upload(&request).await;
        match result {
            Err(WikiError::UploadRejected { warnings }) => {
                assert!(warnings.contains("duplicate"));
            }
            other => panic!("Expected UploadRejected, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_tolerated_warning_resubmits_ignoring() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("meta", "tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"query":{"tokens":{"csrftoken":"abc+\\"}}}"#,
            ))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"upload":{"result":"Warning","warnings":{"exists":""}}}"#,
            ))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"upload":{"result":"Success"}}"#),
            )
            .mount(&server)
            .await;

        let client = MediaWikiClient::new(format!("{}/w/api.php", server.uri()), "token");
        let request = UploadRequest {
            title: "File.jpg",
            bytes: b"payload",
            description: "desc",
            comment: "comment",
        };
        client.upload(&request).await.unwrap();
    }
}
