//! Request shapes for the Gamma and CLOB APIs.
//!
//! Each logical operation maps to one request per upstream. The CLOB API
//! only addresses markets by condition id, so a slug or numeric Gamma id
//! has no CLOB equivalent and yields `None`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::types::{ApiSource, ListQuery, MarketLookup, Timeframe};

/// Outbound GET request relative to an upstream base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    /// Which upstream to call.
    pub source: ApiSource,
    /// Path below the base URL, starting with `/`.
    pub path: String,
    /// Query parameters in send order.
    pub query: Vec<(String, String)>,
}

impl UpstreamRequest {
    /// Create a request with no query parameters.
    pub fn new(source: ApiSource, path: impl Into<String>) -> Self {
        Self {
            source,
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Append a query parameter.
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// Gamma request fetching a single market. Gamma addresses every lookup kind.
pub fn gamma_market_request(lookup: &MarketLookup) -> UpstreamRequest {
    let source = ApiSource::Gamma;
    match lookup {
        MarketLookup::NumericId(id) => UpstreamRequest::new(source, format!("/markets/{}", id)),
        MarketLookup::ConditionId(id) => {
            UpstreamRequest::new(source, "/markets").param("condition_ids", id)
        }
        MarketLookup::Slug(slug) => UpstreamRequest::new(source, "/markets").param("slug", slug),
    }
}

/// CLOB request fetching a single market, if the lookup is a condition id.
pub fn clob_market_request(lookup: &MarketLookup) -> Option<UpstreamRequest> {
    match lookup {
        MarketLookup::ConditionId(id) => Some(UpstreamRequest::new(
            ApiSource::Clob,
            format!("/markets/{}", id),
        )),
        MarketLookup::NumericId(_) | MarketLookup::Slug(_) => None,
    }
}

/// Request fetching a page of markets.
pub fn list_request(source: ApiSource, query: &ListQuery) -> UpstreamRequest {
    match source {
        ApiSource::Gamma => UpstreamRequest::new(source, "/markets")
            .param("active", query.active)
            .param("closed", query.closed)
            .param("archived", query.archived)
            .param("limit", query.limit)
            .param("offset", query.offset)
            .param("order", query.order.gamma_field())
            .param("ascending", query.ascending),
        // CLOB pages by an opaque cursor which is the base64 of the offset.
        ApiSource::Clob => UpstreamRequest::new(source, "/markets")
            .param("next_cursor", clob_cursor(query.offset)),
    }
}

/// Request fetching a CLOB price series for one outcome token.
pub fn history_request(token_id: &str, timeframe: Timeframe) -> UpstreamRequest {
    UpstreamRequest::new(ApiSource::Clob, "/prices-history")
        .param("market", token_id)
        .param("interval", timeframe.clob_interval())
        .param("fidelity", timeframe.fidelity_minutes())
}

/// Encode a record offset as a CLOB pagination cursor.
pub fn clob_cursor(offset: u32) -> String {
    STANDARD.encode(offset.to_string())
}
