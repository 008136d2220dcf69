//! Application configuration loaded from environment variables.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// Loaded once at startup and shared read-only for the life of the process.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Polymarket Credentials ===
    /// CLOB API key, sent as `POLY_API_KEY` on fallback requests.
    #[serde(default)]
    pub polymarket_api_key: String,

    /// Funder (proxy wallet) address, sent as `POLY_ADDRESS`.
    #[serde(default)]
    pub polymarket_funder: String,

    // === Upstream Endpoints ===
    /// Gamma listings API base URL (primary).
    #[serde(default = "default_gamma_url")]
    pub polymarket_gamma_url: String,

    /// CLOB API base URL (fallback and price history).
    #[serde(default = "default_clob_url")]
    pub polymarket_clob_url: String,

    // === HTTP Client ===
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Idle connections kept per upstream host.
    #[serde(default = "default_http_pool_size")]
    pub http_pool_size: usize,

    // === Features ===
    /// Serve `get-market-history` from the CLOB price history endpoint.
    #[serde(default = "default_true")]
    pub history_enabled: bool,

    // === Observability ===
    /// Port for the Prometheus exporter; disabled when unset.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_clob_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_http_pool_size() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Build a configuration for the given credentials with every other field defaulted.
    pub fn with_credentials(api_key: impl Into<String>, funder: impl Into<String>) -> Self {
        Self {
            polymarket_api_key: api_key.into(),
            polymarket_funder: funder.into(),
            polymarket_gamma_url: default_gamma_url(),
            polymarket_clob_url: default_clob_url(),
            http_timeout_ms: default_http_timeout_ms(),
            http_pool_size: default_http_pool_size(),
            history_enabled: default_true(),
            metrics_port: None,
        }
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.polymarket_api_key.trim().is_empty() {
            return Err("POLYMARKET_API_KEY is required".to_string());
        }

        if self.polymarket_funder.trim().is_empty() {
            return Err("POLYMARKET_FUNDER is required".to_string());
        }

        let funder = self.polymarket_funder.trim();
        let hex = funder.strip_prefix("0x").ok_or_else(|| {
            "POLYMARKET_FUNDER must start with 0x".to_string()
        })?;
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("POLYMARKET_FUNDER must be a 20-byte hex address".to_string());
        }

        for (name, url) in [
            ("POLYMARKET_GAMMA_URL", &self.polymarket_gamma_url),
            ("POLYMARKET_CLOB_URL", &self.polymarket_clob_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("{} must be an http(s) URL", name));
            }
        }

        if self.http_timeout_ms == 0 {
            return Err("HTTP_TIMEOUT_MS must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Per-call HTTP timeout.
    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.http_timeout_ms)
    }
}
