//! Outbound retrieval of target documents.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ProbeConfig;

/// Errors raised while fetching or decoding a target document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request to {target} failed: {source}")]
    Request {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to read response body from {target}: {source}")]
    Body {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Response body from {target} exceeds {limit} bytes")]
    TooLarge { target: String, limit: usize },
    #[error("Invalid JSON from {target}: {source}")]
    Parse {
        target: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of JSON documents for probes.
///
/// Implementations are shared by all concurrent probes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `target` and parse its body as JSON.
    async fn fetch(&self, target: &str) -> Result<Value, FetchError>;
}

/// HTTP(S) fetcher backed by a pooled [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// Build the process-wide client from probe settings.
    pub fn new(config: &ProbeConfig) -> Result<Self, FetchError> {
        if config.insecure_skip_verify {
            warn!("TLS certificate verification is disabled for probe targets");
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("json-exporter/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .pool_max_idle_per_host(config.max_idle_connections)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, target: &str) -> Result<Value, FetchError> {
        let mut response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                target: target.to_string(),
                source,
            })?;

        debug!(target_url = %target, status = %response.status(), "Received response");

        let too_large = || FetchError::TooLarge {
            target: target.to_string(),
            limit: self.max_body_bytes,
        };

        if response
            .content_length()
            .is_some_and(|length| length > self.max_body_bytes as u64)
        {
            return Err(too_large());
        }

        // Content-Length may be absent; the limit also applies while streaming.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|source| FetchError::Body {
            target: target.to_string(),
            source,
        })? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&body).map_err(|source| FetchError::Parse {
            target: target.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_defaults() {
        assert!(HttpFetcher::new(&ProbeConfig::default()).is_ok());
    }

    #[test]
    fn test_build_client_with_verification() {
        let config = ProbeConfig {
            insecure_skip_verify: false,
            ..Default::default()
        };
        assert!(HttpFetcher::new(&config).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let fetcher = HttpFetcher::new(&ProbeConfig::default()).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop to obtain a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(&ProbeConfig::default()).unwrap();
        let err = fetcher
            .fetch(&format!("http://{}/", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
        assert!(err.to_string().contains(&addr.to_string()));
    }

    /// Serve `body` once on a random local port.
    async fn serve_body(body: &'static str) -> std::net::SocketAddr {
        let app = axum::Router::new().route("/", axum::routing::get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_fetch_body_within_limit() {
        let addr = serve_body(r#"{"a": [1, 2]}"#).await;
        let config = ProbeConfig {
            max_body_bytes: 64,
            ..Default::default()
        };

        let fetcher = HttpFetcher::new(&config).unwrap();
        let value = fetcher.fetch(&format!("http://{}/", addr)).await.unwrap();
        assert_eq!(value, serde_json::json!({"a": [1, 2]}));
    }

    #[tokio::test]
    async fn test_fetch_body_too_large() {
        let addr = serve_body(r#"{"a": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]}"#).await;
        let config = ProbeConfig {
            max_body_bytes: 16,
            ..Default::default()
        };

        let fetcher = HttpFetcher::new(&config).unwrap();
        let err = fetcher
            .fetch(&format!("http://{}/", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 16, .. }));
        assert!(err.to_string().contains("exceeds 16 bytes"));
    }
}
