//! HTTP client adapter for the upstream APIs.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{AppError, TransportError};
use crate::metrics;

use super::types::ApiSource;
use super::upstream::UpstreamRequest;

/// Successful upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// Parsed JSON body.
    pub body: Value,
}

/// Issues a single GET against an upstream API. No retries.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `request`, classifying every failure into a [`TransportError`].
    async fn get(&self, request: &UpstreamRequest) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Base URL for the Gamma API.
    gamma_url: String,
    /// Base URL for the CLOB API.
    clob_url: String,
    /// CLOB API key.
    api_key: String,
    /// Funder address.
    funder: String,
}

impl HttpTransport {
    /// Create a transport from config.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            // Per-call timeout, 30s by default
            .timeout(config.http_timeout())
            .connect_timeout(std::time::Duration::from_secs(10))
            .tcp_nodelay(true)
            // Keep connections alive for reuse
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(config.http_pool_size)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .user_agent(concat!("polymarket-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            gamma_url: config.polymarket_gamma_url.trim_end_matches('/').to_string(),
            clob_url: config.polymarket_clob_url.trim_end_matches('/').to_string(),
            api_key: config.polymarket_api_key.clone(),
            funder: config.polymarket_funder.clone(),
        })
    }

    /// Base URL for `source`.
    pub fn base_url(&self, source: ApiSource) -> &str {
        match source {
            ApiSource::Gamma => &self.gamma_url,
            ApiSource::Clob => &self.clob_url,
        }
    }

    /// Headers sent with every request to `source`.
    fn auth_headers(&self, source: ApiSource) -> Vec<(&'static str, &str)> {
        match source {
            ApiSource::Gamma => Vec::new(),
            ApiSource::Clob => vec![
                ("POLY_API_KEY", self.api_key.as_str()),
                ("POLY_ADDRESS", self.funder.as_str()),
            ],
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self), fields(api = %request.source, path = %request.path))]
    async fn get(&self, request: &UpstreamRequest) -> Result<RawResponse, TransportError> {
        let _timer = metrics::LatencyTimer::upstream(request.source);
        metrics::inc_upstream_requests(request.source);

        let url = format!("{}{}", self.base_url(request.source), request.path);
        let mut builder = self
            .http
            .get(&url)
            .query(&request.query)
            .header(reqwest::header::ACCEPT, "application/json");
        for (key, value) in self.auth_headers(request.source) {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            debug!(status = %status, "Upstream returned error status");
            return Err(TransportError::Status {
                code: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(classify)?;
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::MalformedBody(e.to_string()))?;

        debug!(bytes = bytes.len(), "Upstream response received");

        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Map a reqwest failure onto the transport taxonomy.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if let Some(status) = err.status() {
        TransportError::Status {
            code: status.as_u16(),
        }
    } else if err.is_decode() {
        TransportError::MalformedBody(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config =
            Config::with_credentials("test-key", "0x1111111111111111111111111111111111111111");
        config.polymarket_gamma_url = "https://gamma.test/".to_string();
        config
    }

    #[test]
    fn transport_creation_works() {
        let transport = HttpTransport::new(&test_config()).unwrap();
        assert_eq!(transport.base_url(ApiSource::Gamma), "https://gamma.test");
        assert_eq!(
            transport.base_url(ApiSource::Clob),
            "https://clob.polymarket.com"
        );
    }

    #[test]
    fn auth_headers_only_go_to_clob() {
        let transport = HttpTransport::new(&test_config()).unwrap();
        assert!(transport.auth_headers(ApiSource::Gamma).is_empty());
        let headers = transport.auth_headers(ApiSource::Clob);
        assert_eq!(headers[0], ("POLY_API_KEY", "test-key"));
        assert_eq!(
            headers[1],
            ("POLY_ADDRESS", "0x1111111111111111111111111111111111111111")
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_a_connection_failure() {
        let mut config = test_config();
        // Port 9 (discard) on localhost is closed in test environments.
        config.polymarket_gamma_url = "http://127.0.0.1:9".to_string();
        config.http_timeout_ms = 2_000;
        let transport = HttpTransport::new(&config).unwrap();

        let result = transport
            .get(&UpstreamRequest::new(ApiSource::Gamma, "/markets"))
            .await;
        assert!(matches!(
            result,
            Err(TransportError::Connection(_)) | Err(TransportError::Timeout)
        ));
    }
}
