//! Market data access for Polymarket.
//!
//! This module handles:
//! - Market types and the normalized record shape
//! - Request shapes for the Gamma (primary) and CLOB (fallback) APIs
//! - The HTTP transport and a mock transport for testing
//! - Payload normalization and primary/fallback orchestration

pub mod client;
pub mod fallback;
pub mod mock;
pub mod normalize;
pub mod transport;
pub mod types;
pub mod upstream;

pub use client::{History, MarketClient};
pub use fallback::{should_fall_back, Attempt, FallbackSelector};
pub use mock::{MockReply, MockTransport};
pub use transport::{HttpTransport, RawResponse, Transport};
pub use types::{
    ApiSource, ListQuery, MarketLookup, MarketOrder, MarketRecord, MarketStatus, OutcomePrice,
    PricePoint, Timeframe,
};
pub use upstream::UpstreamRequest;
