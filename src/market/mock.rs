//! Mock transport for unit testing.
//!
//! Replies are scripted per `(api, path)` and every request is recorded so
//! tests can assert how often each upstream was hit.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

use super::transport::{RawResponse, Transport};
use super::types::ApiSource;
use super::upstream::UpstreamRequest;

/// Scripted reply for a mocked route.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 200 with this JSON body.
    Json(Value),
    /// Error status.
    Status(u16),
    /// Per-call timeout elapsed.
    Timeout,
    /// Connection refused.
    ConnectionRefused,
    /// 200 with a non-JSON body.
    Garbage,
}

impl MockReply {
    fn into_result(self) -> Result<RawResponse, TransportError> {
        match self {
            MockReply::Json(body) => Ok(RawResponse { status: 200, body }),
            MockReply::Status(code) => Err(TransportError::Status { code }),
            MockReply::Timeout => Err(TransportError::Timeout),
            MockReply::ConnectionRefused => {
                Err(TransportError::Connection("connection refused".to_string()))
            }
            MockReply::Garbage => Err(TransportError::MalformedBody(
                "expected value at line 1 column 1".to_string(),
            )),
        }
    }
}

/// In-memory [`Transport`] with scripted replies.
///
/// Unscripted routes answer 404.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Replies by upstream and path.
    routes: Mutex<HashMap<(ApiSource, String), MockReply>>,
    /// Requests received, in order.
    calls: Mutex<Vec<UpstreamRequest>>,
}

impl MockTransport {
    /// Create a mock with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the reply for `path` on `source`, replacing any earlier one.
    pub fn on(&self, source: ApiSource, path: impl Into<String>, reply: MockReply) {
        let mut routes = self.routes.lock().unwrap();
        routes.insert((source, path.into()), reply);
    }

    /// Number of requests sent to `source`.
    pub fn calls_to(&self, source: ApiSource) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.source == source)
            .count()
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Forget recorded requests, keeping routes.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, request: &UpstreamRequest) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());
        let reply = self
            .routes
            .lock()
            .unwrap()
            .get(&(request.source, request.path.clone()))
            .cloned()
            .unwrap_or(MockReply::Status(404));
        reply.into_result()
    }
}
