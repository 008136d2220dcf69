//! Primary/fallback orchestration.
//!
//! A lookup runs against the primary API first. Its outcome is an
//! [`Attempt`]; [`should_fall_back`] decides whether the equivalent request
//! goes to the fallback API. When both fail, [`pick_error`] keeps the more
//! actionable error and the other is only logged.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{FetchError, TransportError};
use crate::metrics;

use super::transport::Transport;
use super::types::ApiSource;
use super::upstream::UpstreamRequest;

/// Result of one upstream attempt, after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    /// Usable data.
    Success(T),
    /// Transport, normalization or empty-result failure.
    Failed(FetchError),
}

impl<T> From<Result<T, FetchError>> for Attempt<T> {
    fn from(result: Result<T, FetchError>) -> Self {
        match result {
            Ok(value) => Attempt::Success(value),
            Err(e) => Attempt::Failed(e),
        }
    }
}

/// Whether a primary failure should be retried against the fallback API.
///
/// Connectivity failures, 5xx, unparseable and empty results fall back.
/// Every 4xx is authoritative.
pub fn should_fall_back(err: &FetchError) -> bool {
    match err {
        FetchError::Transport(t) => !t.is_client_error(),
        FetchError::Normalization(_) | FetchError::Empty => true,
    }
}

/// Higher is more actionable for the caller.
fn specificity(err: &FetchError) -> u8 {
    match err {
        FetchError::Transport(t) if t.is_client_error() => 6,
        FetchError::Normalization(_) => 5,
        FetchError::Transport(TransportError::MalformedBody(_)) => 4,
        FetchError::Empty => 3,
        FetchError::Transport(TransportError::Status { .. }) => 2,
        FetchError::Transport(TransportError::Timeout) => 1,
        FetchError::Transport(TransportError::Connection(_)) => 0,
    }
}

/// Choose which of two failures to surface. Ties go to the primary.
///
/// Returns `(surfaced, suppressed)`.
pub fn pick_error(primary: FetchError, secondary: FetchError) -> (FetchError, FetchError) {
    if specificity(&secondary) > specificity(&primary) {
        (secondary, primary)
    } else {
        (primary, secondary)
    }
}

/// Runs a request against the primary API and, when warranted, the fallback.
#[derive(Clone)]
pub struct FallbackSelector {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for FallbackSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackSelector").finish_non_exhaustive()
    }
}

impl FallbackSelector {
    /// Create a selector over `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Perform one request and parse its body.
    pub async fn attempt<T, F>(&self, request: &UpstreamRequest, parse: &F) -> Attempt<T>
    where
        F: Fn(&Value, ApiSource) -> Result<T, FetchError>,
    {
        match self.transport.get(request).await {
            Ok(response) => {
                debug!(api = %request.source, status = response.status, "Parsing upstream body");
                parse(&response.body, request.source).into()
            }
            Err(e) => Attempt::Failed(e.into()),
        }
    }

    /// Run `primary`, falling back to `secondary` per [`should_fall_back`].
    ///
    /// `secondary` is `None` when the fallback API cannot express the
    /// lookup; the primary error is then surfaced directly.
    pub async fn run<T, F>(
        &self,
        primary: UpstreamRequest,
        secondary: Option<UpstreamRequest>,
        parse: F,
    ) -> Result<T, FetchError>
    where
        F: Fn(&Value, ApiSource) -> Result<T, FetchError>,
    {
        let primary_err = match self.attempt(&primary, &parse).await {
            Attempt::Success(value) => return Ok(value),
            Attempt::Failed(e) => e,
        };

        if !should_fall_back(&primary_err) {
            debug!(api = %primary.source, error = %primary_err, "Primary failure is authoritative");
            return Err(primary_err);
        }

        let Some(secondary) = secondary else {
            warn!(
                api = %primary.source,
                error = %primary_err,
                "Primary failed and the fallback API has no equivalent request"
            );
            return Err(primary_err);
        };

        warn!(
            primary = %primary.source,
            fallback = %secondary.source,
            error = %primary_err,
            "Primary failed, trying fallback"
        );
        metrics::inc_fallbacks();

        match self.attempt(&secondary, &parse).await {
            Attempt::Success(value) => {
                info!(api = %secondary.source, "Recovered via fallback");
                Ok(value)
            }
            Attempt::Failed(secondary_err) => {
                let (surfaced, suppressed) = pick_error(primary_err, secondary_err);
                warn!(surfaced = %surfaced, suppressed = %suppressed, "Both upstreams failed");
                Err(surfaced)
            }
        }
    }
}
