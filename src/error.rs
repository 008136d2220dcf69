//! Unified error types for the market data server.

use thiserror::Error;

/// Process-level error: startup, configuration and transport wiring.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP client construction error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics exporter could not be installed.
    #[error("metrics exporter error: {0}")]
    Metrics(String),
}

/// Failure of a single outbound HTTP call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No response within the per-call timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established or was dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Upstream answered with a 4xx/5xx status.
    #[error("HTTP {code}")]
    Status {
        /// HTTP status code.
        code: u16,
    },

    /// Body was not valid JSON.
    #[error("malformed response body: {0}")]
    MalformedBody(String),
}

impl TransportError {
    /// 4xx responses are authoritative and never retried elsewhere.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TransportError::Status { code } if (400..500).contains(code))
    }

    /// 5xx responses.
    pub fn is_server_error(&self) -> bool {
        matches!(self, TransportError::Status { code } if *code >= 500)
    }
}

/// Raised when an upstream payload cannot be mapped onto a market record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    /// A required field (id or title) is absent or empty.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// The payload has the wrong JSON type at the top level.
    #[error("expected {expected}, got {found}")]
    UnexpectedShape {
        /// What the normalizer expected.
        expected: &'static str,
        /// JSON type actually received.
        found: String,
    },
}

/// Outcome of one upstream attempt that did not yield usable data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// HTTP layer failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Payload arrived but could not be normalized.
    #[error("unexpected response shape: {0}")]
    Normalization(#[from] NormalizationError),

    /// Payload was well-formed but held no markets.
    #[error("upstream returned no markets")]
    Empty,
}

/// Errors surfaced to the tool caller. Every variant renders as text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Bad or missing tool argument.
    #[error("invalid argument `{field}`: {reason}")]
    Validation {
        /// Offending argument name.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Tool name is not one of the four operations.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Upstream 404, or no market matched the lookup.
    #[error("market not found: {}", .market_id.as_deref().unwrap_or("listing"))]
    NotFound {
        /// Market id or slug that was looked up.
        market_id: Option<String>,
    },

    /// Upstream 429.
    #[error("rate limited by upstream")]
    RateLimited,

    /// Upstream 401/403.
    #[error("unauthorized by upstream (HTTP {code})")]
    Unauthorized {
        /// HTTP status code.
        code: u16,
    },

    /// Timeout, connection failure or 5xx with no usable fallback.
    #[error("upstream unavailable: {detail}")]
    UpstreamUnavailable {
        /// Underlying failure description.
        detail: String,
    },

    /// Any other 4xx.
    #[error("upstream returned HTTP {code}")]
    UpstreamStatus {
        /// HTTP status code.
        code: u16,
    },

    /// Upstream payload did not match the expected shape.
    #[error("unexpected upstream response: {0}")]
    Normalization(String),

    /// Market resolved but its price series could not be fetched.
    #[error("price history unavailable for {market_id}: {detail}")]
    HistoryUnavailable {
        /// Market whose series was requested.
        market_id: String,
        /// Underlying failure description.
        detail: String,
    },
}

impl ToolError {
    /// Build a validation error for `field`.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Map the error chosen by the fallback selector onto the caller taxonomy.
    pub fn from_fetch(err: FetchError, market_id: Option<&str>) -> Self {
        let market_id = market_id.map(str::to_string);
        match err {
            FetchError::Empty => ToolError::NotFound { market_id },
            FetchError::Normalization(e) => ToolError::Normalization(e.to_string()),
            FetchError::Transport(TransportError::Status { code }) => match code {
                404 => ToolError::NotFound { market_id },
                429 => ToolError::RateLimited,
                401 | 403 => ToolError::Unauthorized { code },
                500..=599 => ToolError::UpstreamUnavailable {
                    detail: format!("HTTP {}", code),
                },
                _ => ToolError::UpstreamStatus { code },
            },
            FetchError::Transport(TransportError::MalformedBody(detail)) => {
                ToolError::Normalization(format!("malformed response body: {}", detail))
            }
            FetchError::Transport(e) => ToolError::UpstreamUnavailable {
                detail: e.to_string(),
            },
        }
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
