//! Market data client: the four lookups behind the tools.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{AppError, FetchError, ToolError, TransportError};

use super::fallback::FallbackSelector;
use super::normalize::{normalize_history, normalize_market, normalize_markets};
use super::transport::{HttpTransport, Transport};
use super::types::{
    ApiSource, ListQuery, MarketLookup, MarketOrder, MarketRecord, PricePoint, Timeframe,
};
use super::upstream::{clob_market_request, gamma_market_request, history_request, list_request};

/// Price history lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum History {
    /// No upstream can serve a series for this market.
    Unsupported,
    /// Series for one outcome.
    Series {
        /// Outcome the series belongs to.
        outcome: String,
        /// Points in upstream order.
        points: Vec<PricePoint>,
    },
}

/// Polymarket market data client with Gamma-first, CLOB-fallback lookups.
#[derive(Debug, Clone)]
pub struct MarketClient {
    /// Primary/fallback orchestration over the shared transport.
    selector: FallbackSelector,
    /// Whether the CLOB price history endpoint may be used.
    history_enabled: bool,
}

impl MarketClient {
    /// Create a client from config backed by the HTTP transport.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            config.history_enabled,
        ))
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(transport: Arc<dyn Transport>, history_enabled: bool) -> Self {
        Self {
            selector: FallbackSelector::new(transport),
            history_enabled,
        }
    }

    /// Whether `get-market-history` can be served at all.
    pub fn history_enabled(&self) -> bool {
        self.history_enabled
    }

    /// Fetch one market by numeric id, slug or condition id.
    #[instrument(skip(self))]
    pub async fn get_market(&self, market_id: &str) -> Result<MarketRecord, ToolError> {
        let lookup = MarketLookup::classify(market_id);
        let primary = gamma_market_request(&lookup);
        let secondary = clob_market_request(&lookup);

        let parse = |body: &Value, source: ApiSource| -> Result<MarketRecord, FetchError> {
            normalize_market(body, source)?.ok_or(FetchError::Empty)
        };

        self.selector
            .run(primary, secondary, parse)
            .await
            .map_err(|e| ToolError::from_fetch(e, Some(market_id)))
    }

    /// Fetch a filtered, paginated page of markets.
    ///
    /// At most `query.limit` records are returned whatever the upstream sends.
    ///
    /// On the CLOB fallback `query.offset` becomes the page cursor and counts
    /// unfiltered records; the status flags are applied to that page
    /// afterwards. The same offset can therefore select a different page
    /// than Gamma would.
    #[instrument(skip(self))]
    pub async fn list_markets(&self, query: &ListQuery) -> Result<Vec<MarketRecord>, ToolError> {
        let primary = list_request(ApiSource::Gamma, query);
        let secondary = list_request(ApiSource::Clob, query);

        let parse = |body: &Value, source: ApiSource| -> Result<Vec<MarketRecord>, FetchError> {
            let mut records = normalize_markets(body, source)?;
            if source == ApiSource::Clob {
                // CLOB has no server-side filters or ordering.
                records.retain(|r| query.admits(r.status));
                sort_locally(&mut records, query);
            }
            records.truncate(query.limit as usize);
            if records.is_empty() {
                return Err(FetchError::Empty);
            }
            Ok(records)
        };

        match self.selector.run(primary, Some(secondary), parse).await {
            Ok(records) => Ok(records),
            Err(FetchError::Empty) => Ok(Vec::new()),
            Err(e) => Err(ToolError::from_fetch(e, None)),
        }
    }

    /// Fetch the price series of the market's first outcome.
    ///
    /// Returns [`History::Unsupported`] when history is disabled, the
    /// market carries no CLOB token id, or the series endpoint answers
    /// 404, 405 or 501.
    #[instrument(skip(self, market), fields(market_id = %market.id))]
    pub async fn price_history(
        &self,
        market: &MarketRecord,
        timeframe: Timeframe,
    ) -> Result<History, ToolError> {
        if !self.history_enabled {
            return Ok(History::Unsupported);
        }
        let Some((outcome, token_id)) = market
            .outcomes
            .iter()
            .find_map(|o| o.token_id.as_deref().map(|t| (o.label.clone(), t)))
        else {
            debug!("Market has no token ids, history unavailable");
            return Ok(History::Unsupported);
        };

        let request = history_request(token_id, timeframe);
        let parse = |body: &Value, _source: ApiSource| -> Result<Vec<PricePoint>, FetchError> {
            Ok(normalize_history(body)?)
        };

        match self.selector.run(request, None, parse).await {
            Ok(points) => Ok(History::Series { outcome, points }),
            Err(FetchError::Transport(TransportError::Status {
                code: code @ (404 | 405 | 501),
            })) => {
                debug!(code, "Series endpoint has no history for this market");
                Ok(History::Unsupported)
            }
            Err(e) => Err(ToolError::HistoryUnavailable {
                market_id: market.id.clone(),
                detail: e.to_string(),
            }),
        }
    }
}

/// Order records the way Gamma would for the fields CLOB carries.
///
/// Keys CLOB does not report keep upstream order.
fn sort_locally(records: &mut [MarketRecord], query: &ListQuery) {
    match query.order {
        MarketOrder::Volume => records.sort_by(|a, b| a.volume.cmp(&b.volume)),
        MarketOrder::Liquidity => records.sort_by(|a, b| a.liquidity.cmp(&b.liquidity)),
        MarketOrder::EndDate => records.sort_by(|a, b| a.end_date.cmp(&b.end_date)),
        MarketOrder::Volume24hr | MarketOrder::StartDate => return,
    }
    if !query.ascending {
        records.reverse();
    }
}
