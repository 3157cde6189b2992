//! Shared HTTP fetch client with bounded retry.
//!
//! This module provides the [`FetchClient`] used for every outbound GET/HEAD
//! in the pipeline: aggregator record lookups, manifest documents, image
//! payloads, and probe requests. Retries are built into the client (bounded
//! attempts, exponential backoff with jitter, fixed retryable status set) and
//! apply only to the idempotent verbs this client exposes; uploads go through
//! the wiki client, which never retries.
//!
//! Workers do not share a client. Each pipeline worker constructs its own
//! instance so retry and connection state stay isolated per worker.

mod error;
mod retry;

pub use error::FetchError;
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
};

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument, warn};
use url::Url;

/// Connect timeout for all requests (seconds).
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout for all requests (seconds). Media payloads can be large.
const READ_TIMEOUT_SECS: u64 = 300;

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/wikiharvest";

/// Default User-Agent identifying the tool.
fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("wikiharvest/{version} (digital-library-ingest; +{PROJECT_UA_URL})")
}

/// A fully buffered GET response.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    /// The complete response body.
    pub bytes: Vec<u8>,
    /// The server-declared Content-Type header, if present.
    pub content_type: Option<String>,
}

/// Result of a HEAD request that returned a success status.
#[derive(Debug, Clone)]
pub struct HeadInfo {
    /// The response status code.
    pub status: u16,
    /// The server-declared Content-Type header, if present.
    pub content_type: Option<String>,
}

/// Retrying HTTP client for GET/HEAD requests.
///
/// Construct one per worker; the type is deliberately not `Clone` so sharing
/// across workers has to be an explicit decision.
#[derive(Debug)]
pub struct FetchClient {
    client: Client,
    policy: RetryPolicy,
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchClient {
    /// Creates a client with default timeouts and retry policy.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy::default())
    }

    /// Creates a client with a custom retry policy.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self::with_policy_and_timeouts(policy, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_policy_and_timeouts(
        policy: RetryPolicy,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client, policy }
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL and buffers the full response body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the URL is invalid, the request fails after
    /// exhausting the retry budget, or the server returns a non-success status.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_bytes(&self, url: &str) -> Result<FetchedPayload, FetchError> {
        self.get_bytes_with_headers(url, &[]).await
    }

    /// Fetches a URL with extra request headers (e.g. an API auth header).
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`get_bytes`](Self::get_bytes).
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_bytes_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<FetchedPayload, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        self.with_retry(url, || self.attempt_get(url, headers)).await
    }

    /// Fetches a URL and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on fetch failure, or [`FetchError::InvalidUrl`]
    /// when the body is not valid JSON (permanent, never retried).
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<serde_json::Value, FetchError> {
        let payload = self.get_bytes_with_headers(url, headers).await?;
        serde_json::from_slice(&payload.bytes).map_err(|e| {
            warn!(url = %url, error = %e, "response body is not valid JSON");
            FetchError::invalid_url(url)
        })
    }

    /// Issues a HEAD request.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::HttpStatus`] for non-success statuses (after the
    /// retry budget for retryable ones), or a transport-level error.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn head(&self, url: &str) -> Result<HeadInfo, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        self.with_retry(url, || self.attempt_head(url)).await
    }

    /// Runs one request closure under the retry policy.
    async fn with_retry<T, F, Fut>(&self, url: &str, make_attempt: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match make_attempt().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let failure_type = classify_error(&e);
                    match self.policy.should_retry(failure_type, attempt) {
                        RetryDecision::Retry {
                            delay,
                            attempt: next_attempt,
                        } => {
                            debug!(
                                url = %url,
                                attempt = next_attempt,
                                delay_ms = delay.as_millis(),
                                error = %e,
                                "retrying request"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            debug!(url = %url, %reason, "not retrying request");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Single GET attempt: send, check status, stream body to memory.
    async fn attempt_get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<FetchedPayload, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        if !response.status().is_success() {
            return Err(FetchError::http_status(url, response.status().as_u16()));
        }

        let content_type = header_value(&response, CONTENT_TYPE.as_str());

        let mut stream = response.bytes_stream();
        let mut bytes = Vec::new();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| FetchError::body(url, e))?;
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedPayload { bytes, content_type })
    }

    /// Single HEAD attempt.
    async fn attempt_head(&self, url: &str) -> Result<HeadInfo, FetchError> {
        let response = self.client.head(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        Ok(HeadInfo {
            status: status.as_u16(),
            content_type: header_value(&response, CONTENT_TYPE.as_str()),
        })
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_user_agent_format() {
        let ua = default_user_agent();
        assert!(ua.starts_with("wikiharvest/"));
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
        assert!(ua.contains(PROJECT_UA_URL));
    }

    #[tokio::test]
    async fn test_get_bytes_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/asset.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_bytes(b"jpeg bytes"),
            )
            .mount(&server)
            .await;

        let client = FetchClient::new();
        let payload = client
            .get_bytes(&format!("{}/asset.jpg", server.uri()))
            .await
            .unwrap();

        assert_eq!(payload.bytes, b"jpeg bytes");
        assert_eq!(payload.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_get_bytes_invalid_url() {
        let client = FetchClient::new();
        let result = client.get_bytes("not-a-valid-url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_get_bytes_404_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = FetchClient::new();
        let result = client.get_bytes(&format!("{}/missing", server.uri())).await;

        match result {
            Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_bytes_retries_503_until_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok"))
            .expect(1)
            .mount(&server)
            .await;

        let policy = RetryPolicy::new(
            3,
            Duration::from_millis(10),
            Duration::from_millis(20),
            2.0,
        );
        let client = FetchClient::with_policy(policy);
        let payload = client
            .get_bytes(&format!("{}/flaky", server.uri()))
            .await
            .unwrap();
        assert_eq!(payload.bytes, b"ok");
    }

    #[tokio::test]
    async fn test_get_bytes_exhausts_retry_budget() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let policy = RetryPolicy::new(
            2,
            Duration::from_millis(10),
            Duration::from_millis(20),
            2.0,
        );
        let client = FetchClient::with_policy(policy);
        let result = client.get_bytes(&format!("{}/down", server.uri())).await;
        assert!(matches!(
            result,
            Err(FetchError::HttpStatus { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_head_success_reports_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/probe"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "image/jpeg"))
            .mount(&server)
            .await;

        let client = FetchClient::new();
        let info = client.head(&format!("{}/probe", server.uri())).await.unwrap();
        assert_eq!(info.status, 200);
        assert_eq!(info.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_head_error_status_surfaces() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = FetchClient::new();
        let result = client.head(&format!("{}/gone", server.uri())).await;
        assert!(matches!(
            result,
            Err(FetchError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_get_json_parses_document() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/doc.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"docs":[{"id":"1"}]}"#))
            .mount(&server)
            .await;

        let client = FetchClient::new();
        let value = client
            .get_json(&format!("{}/doc.json", server.uri()), &[])
            .await
            .unwrap();
        assert_eq!(value["docs"][0]["id"], "1");
    }

    #[tokio::test]
    async fn test_get_bytes_sends_extra_headers() {
        use wiremock::matchers::header;

        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/secured"))
            .and(header("Authorization", "apikey"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"granted"))
            .mount(&server)
            .await;

        let client = FetchClient::new();
        let payload = client
            .get_bytes_with_headers(
                &format!("{}/secured", server.uri()),
                &[("Authorization", "apikey")],
            )
            .await
            .unwrap();
        assert_eq!(payload.bytes, b"granted");
    }
}
