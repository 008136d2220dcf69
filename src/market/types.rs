//! Market-related types shared by the upstream adapters and the formatter.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

/// 0x-prefixed 32-byte hex condition id, shared by both upstream APIs.
static CONDITION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("valid regex"));

/// Upstream API a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum ApiSource {
    /// Gamma listings API (primary).
    #[strum(serialize = "gamma")]
    Gamma,
    /// CLOB trading API (fallback).
    #[strum(serialize = "clob")]
    Clob,
}

/// Lifecycle state of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MarketStatus {
    /// Open for trading.
    #[default]
    Active,
    /// Trading halted, not yet resolved.
    Closed,
    /// Hidden from listings.
    Archived,
    /// Closed with a winning outcome.
    Resolved,
}

/// One possible resolution of a market and its implied probability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomePrice {
    /// Outcome label (e.g. "Yes").
    pub label: String,
    /// Last price in [0, 1]; absent when the upstream omitted it.
    pub price: Option<Decimal>,
    /// CLOB token id for this outcome, used for price history.
    pub token_id: Option<String>,
}

/// Normalized market, independent of which upstream produced it.
///
/// Built per request and discarded after formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketRecord {
    /// Condition id when available, otherwise the upstream id.
    pub id: String,
    /// Market question.
    pub title: String,
    /// Lifecycle state.
    pub status: MarketStatus,
    /// Category label.
    pub category: Option<String>,
    /// Lifetime traded volume in USDC (zero when unknown).
    pub volume: Decimal,
    /// Current liquidity in USDC.
    pub liquidity: Option<Decimal>,
    /// Scheduled end of trading.
    pub end_date: Option<OffsetDateTime>,
    /// URL slug.
    pub slug: Option<String>,
    /// Outcomes in upstream order.
    pub outcomes: Vec<OutcomePrice>,
}

/// A single point of a price history series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePoint {
    /// Sample time.
    pub timestamp: OffsetDateTime,
    /// Price in [0, 1].
    pub price: Decimal,
}

/// History window accepted by `get-market-history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
pub enum Timeframe {
    /// Last 24 hours.
    #[strum(serialize = "1d")]
    OneDay,
    /// Last 7 days.
    #[strum(serialize = "7d")]
    #[default]
    SevenDays,
    /// Last 30 days.
    #[strum(serialize = "30d")]
    ThirtyDays,
    /// Entire market lifetime.
    #[strum(serialize = "all")]
    All,
}

impl Timeframe {
    /// CLOB `interval` parameter.
    pub fn clob_interval(&self) -> &'static str {
        match self {
            Timeframe::OneDay => "1d",
            Timeframe::SevenDays => "1w",
            Timeframe::ThirtyDays => "1m",
            Timeframe::All => "max",
        }
    }

    /// CLOB `fidelity` parameter: sample spacing in minutes.
    pub fn fidelity_minutes(&self) -> u32 {
        match self {
            Timeframe::OneDay => 60,
            Timeframe::SevenDays => 360,
            Timeframe::ThirtyDays => 1440,
            Timeframe::All => 10080,
        }
    }
}

/// Sort key for `list-markets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(ascii_case_insensitive)]
pub enum MarketOrder {
    /// Lifetime volume.
    #[strum(serialize = "volume")]
    #[default]
    Volume,
    /// 24 hour volume.
    #[strum(serialize = "volume24hr", serialize = "volume_24hr")]
    Volume24hr,
    /// Current liquidity.
    #[strum(serialize = "liquidity")]
    Liquidity,
    /// Scheduled end date.
    #[strum(serialize = "end_date", serialize = "endDate")]
    EndDate,
    /// Creation / start date.
    #[strum(serialize = "start_date", serialize = "startDate")]
    StartDate,
}

impl MarketOrder {
    /// Field name understood by the Gamma `order` parameter.
    pub fn gamma_field(&self) -> &'static str {
        match self {
            MarketOrder::Volume => "volume",
            MarketOrder::Volume24hr => "volume24hr",
            MarketOrder::Liquidity => "liquidity",
            MarketOrder::EndDate => "endDate",
            MarketOrder::StartDate => "startDate",
        }
    }
}

/// Validated `list-markets` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Include active markets.
    pub active: bool,
    /// Include closed markets.
    pub closed: bool,
    /// Include archived markets.
    pub archived: bool,
    /// Page size, 1 to 100.
    pub limit: u32,
    /// Records to skip.
    pub offset: u32,
    /// Sort key.
    pub order: MarketOrder,
    /// Sort ascending instead of descending.
    pub ascending: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            active: true,
            closed: false,
            archived: false,
            limit: 10,
            offset: 0,
            order: MarketOrder::default(),
            ascending: false,
        }
    }
}

impl ListQuery {
    /// Whether a market with `status` passes the active/closed/archived flags.
    pub fn admits(&self, status: MarketStatus) -> bool {
        match status {
            MarketStatus::Active => self.active,
            MarketStatus::Closed | MarketStatus::Resolved => self.closed,
            MarketStatus::Archived => self.archived,
        }
    }
}

/// How a `market_id` argument addresses a market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketLookup {
    /// Numeric Gamma id.
    NumericId(String),
    /// 0x condition id.
    ConditionId(String),
    /// URL slug.
    Slug(String),
}

impl MarketLookup {
    /// Classify a trimmed, non-empty market id.
    pub fn classify(market_id: &str) -> Self {
        if market_id.chars().all(|c| c.is_ascii_digit()) {
            MarketLookup::NumericId(market_id.to_string())
        } else if CONDITION_ID.is_match(market_id) {
            MarketLookup::ConditionId(market_id.to_lowercase())
        } else {
            MarketLookup::Slug(market_id.to_string())
        }
    }
}
