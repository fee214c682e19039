//! Remote fetcher for the daily digest API and story assets.
//!
//! One [`Fetcher`] wraps a single `reqwest::Client` carrying the fixed
//! identifying User-Agent and the transport timeout. Any non-2xx response or
//! connection failure surfaces as [`DigestError::Transport`]; a digest
//! payload that fails to decode surfaces as [`DigestError::Decode`]. The
//! transport timeout is the only guard against unbounded waits — there is no
//! mid-fetch cancellation.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use dailydigest_shared::{DigestError, FetchConfig, Result, Stories};

/// HTTP client for digest, image, and body fetches.
pub struct Fetcher {
    client: Client,
    base_url: Url,
}

impl Fetcher {
    /// Build a fetcher from runtime config.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DigestError::Transport(format!("failed to build HTTP client: {e}")))?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            DigestError::config(format!("invalid api base URL {:?}: {e}", config.base_url))
        })?;

        Ok(Self { client, base_url })
    }

    /// Fetch and decode the digest for `date` from
    /// `<base_url>/<date:YYYYMMDD>`.
    #[instrument(skip(self))]
    pub async fn fetch_digest(&self, date: &str) -> Result<Stories> {
        let url = self.digest_url(date)?;
        debug!(%url, "fetching digest");

        let bytes = self.get_bytes(url.as_str()).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| DigestError::Decode(format!("digest for {date}: {e}")))
    }

    /// Fetch raw bytes from an arbitrary URL (lead images).
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.get_bytes(url).await
    }

    /// Fetch text from an arbitrary URL (article bodies).
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let bytes = self.get_bytes(url).await?;
        String::from_utf8(bytes)
            .map_err(|e| DigestError::Decode(format!("{url}: body is not UTF-8: {e}")))
    }

    /// The digest endpoint for a date key.
    fn digest_url(&self, date: &str) -> Result<Url> {
        // Treat the base as a directory so the date lands as a path segment
        // even when the configured URL lacks a trailing slash.
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                DigestError::config(format!("api base URL {} cannot take a path", self.base_url))
            })?;
            segments.pop_if_empty().push(date);
        }
        Ok(url)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DigestError::Transport(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Transport(format!("{url}: HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DigestError::Transport(format!("{url}: body read failed: {e}")))?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> FetchConfig {
        FetchConfig {
            base_url: base_url.into(),
            user_agent: "dailydigest/test".into(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn digest_fetch_decodes_payload_and_sends_user_agent() {
        let server = MockServer::start().await;

        let payload = r#"{
            "date": "20240101",
            "stories": [
                {"id": 1, "title": "One", "url": "https://s/1", "images": []},
                {"id": 2, "title": "Two", "url": "https://s/2", "images": ["https://i/2.jpg"]}
            ]
        }"#;

        Mock::given(method("GET"))
            .and(path("/digest/20240101"))
            .and(header("user-agent", "dailydigest/test"))
            .respond_with(ResponseTemplate::new(200).set_body_string(payload))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(&format!("{}/digest", server.uri()))).expect("build");
        let stories = fetcher.fetch_digest("20240101").await.expect("fetch");
        assert_eq!(stories.date, "20240101");
        assert_eq!(stories.stories.len(), 2);
        assert_eq!(stories.stories[1].first_image_candidate(), Some("https://i/2.jpg"));
    }

    #[tokio::test]
    async fn trailing_slash_on_base_url_is_tolerated() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/digest/20240101"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"date":"20240101","stories":[]}"#),
            )
            .mount(&server)
            .await;

        let fetcher =
            Fetcher::new(&config(&format!("{}/digest/", server.uri()))).expect("build");
        let stories = fetcher.fetch_digest("20240101").await.expect("fetch");
        assert!(stories.stories.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_a_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/digest/20240101"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(&format!("{}/digest", server.uri()))).expect("build");
        let err = fetcher.fetch_digest("20240101").await.expect_err("500");
        assert!(matches!(err, DigestError::Transport(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn malformed_payload_is_a_decode_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/digest/20240101"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(&format!("{}/digest", server.uri()))).expect("build");
        let err = fetcher.fetch_digest("20240101").await.expect_err("bad payload");
        assert!(matches!(err, DigestError::Decode(_)));
    }

    #[tokio::test]
    async fn fetch_bytes_returns_raw_payload() {
        let server = MockServer::start().await;
        let blob: Vec<u8> = vec![0xFF, 0xD8, 0xFF, 0xE0];

        Mock::given(method("GET"))
            .and(path("/img.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(blob.clone()))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(&server.uri())).expect("build");
        let bytes = fetcher
            .fetch_bytes(&format!("{}/img.jpg", server.uri()))
            .await
            .expect("fetch");
        assert_eq!(bytes, blob);
    }

    #[tokio::test]
    async fn fetch_text_rejects_non_utf8() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/body"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xC0, 0x80]))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(&server.uri())).expect("build");
        let err = fetcher
            .fetch_text(&format!("{}/body", server.uri()))
            .await
            .expect_err("invalid utf-8");
        assert!(matches!(err, DigestError::Decode(_)));
    }

    #[tokio::test]
    async fn connection_failure_is_a_transport_error() {
        // Unroutable port: nothing is listening.
        let fetcher = Fetcher::new(&config("http://127.0.0.1:1/digest")).expect("build");
        let err = fetcher.fetch_digest("20240101").await.expect_err("refused");
        assert!(matches!(err, DigestError::Transport(_)));
    }
}
