//! Text rendering of market records and errors.
//!
//! Every tool answers with plain text. Layouts are fixed so that the same
//! records always render to the same bytes: missing optional fields print
//! [`NOT_AVAILABLE`] instead of disappearing.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::ToolError;
use crate::market::{MarketRecord, OutcomePrice, PricePoint, Timeframe};

/// Placeholder for absent optional fields.
pub const NOT_AVAILABLE: &str = "N/A";

/// Separator line between records in a listing.
pub const RECORD_SEPARATOR: &str = "---";

/// Rendered for a listing with no records.
pub const NO_MARKETS: &str = "No markets found.";

/// Rendered when no upstream can serve a price series.
pub const HISTORY_NOT_IMPLEMENTED: &str =
    "Price history is not yet implemented for this upstream API.";

/// `$1,234.57`: thousands separators, two decimals, half away from zero.
pub fn money(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = format!("{:.2}", rounded.abs());
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));
    format!("{}${}.{}", sign, group_thousands(whole), fraction)
}

/// `52.5%`: price × 100, one decimal.
pub fn probability(price: Decimal) -> String {
    let pct = (price * dec!(100)).round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.1}%", pct)
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn date(ts: Option<OffsetDateTime>) -> String {
    ts.and_then(|ts| {
        ts.format(format_description!(
            "[year]-[month]-[day] [hour]:[minute] UTC"
        ))
        .ok()
    })
    .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or(NOT_AVAILABLE)
}

fn outcome_probability(outcome: &OutcomePrice) -> String {
    outcome
        .price
        .map(probability)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Full detail block for `get-market-info`.
pub fn market_info(market: &MarketRecord) -> String {
    let mut lines = vec![
        format!("Title: {}", market.title),
        format!("Market ID: {}", market.id),
        format!("Slug: {}", or_na(market.slug.as_deref())),
        format!("Category: {}", or_na(market.category.as_deref())),
        format!("Status: {}", market.status),
        format!("End Date: {}", date(market.end_date)),
        format!("Volume: {}", money(market.volume)),
        format!(
            "Liquidity: {}",
            market
                .liquidity
                .map(money)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        ),
        String::new(),
        "Outcomes:".to_string(),
    ];

    if market.outcomes.is_empty() {
        lines.push(format!("- {}", NOT_AVAILABLE));
    }
    for outcome in &market.outcomes {
        lines.push(format!("- {}: {}", outcome.label, outcome_probability(outcome)));
    }

    lines.join("\n")
}

/// One summary block per market for `list-markets`, separated by `---`.
pub fn market_list(markets: &[MarketRecord]) -> String {
    if markets.is_empty() {
        return NO_MARKETS.to_string();
    }

    markets
        .iter()
        .map(list_block)
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n", RECORD_SEPARATOR))
}

fn list_block(market: &MarketRecord) -> String {
    let prices = if market.outcomes.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        market
            .outcomes
            .iter()
            .map(|o| format!("{} {}", o.label, outcome_probability(o)))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    [
        format!("Title: {}", market.title),
        format!("Market ID: {}", market.id),
        format!("Status: {}", market.status),
        format!("Volume: {}", money(market.volume)),
        format!(
            "Liquidity: {}",
            market
                .liquidity
                .map(money)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        ),
        format!("End Date: {}", date(market.end_date)),
        format!("Prices: {}", prices),
    ]
    .join("\n")
}

/// Current outcome prices for `get-market-prices`.
pub fn market_prices(market: &MarketRecord) -> String {
    let mut lines = vec![
        format!("Prices for: {}", market.title),
        format!("Market ID: {}", market.id),
        format!("Status: {}", market.status),
        String::new(),
    ];

    if market.outcomes.is_empty() {
        lines.push(format!("- {}", NOT_AVAILABLE));
    }
    for outcome in &market.outcomes {
        let line = match outcome.price {
            Some(price) => format!(
                "- {}: {:.4} ({})",
                outcome.label,
                price.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero),
                probability(price)
            ),
            None => format!("- {}: {}", outcome.label, NOT_AVAILABLE),
        };
        lines.push(line);
    }

    lines.join("\n")
}

/// Series summary and points for `get-market-history`.
pub fn price_history(
    market: &MarketRecord,
    outcome: &str,
    timeframe: Timeframe,
    points: &[PricePoint],
) -> String {
    let mut lines = vec![
        format!("Price history for: {}", market.title),
        format!("Outcome: {}", outcome),
        format!("Timeframe: {}", timeframe),
        format!("Points: {}", points.len()),
    ];

    match (points.first(), points.last()) {
        (Some(first), Some(last)) => {
            let high = points.iter().map(|p| p.price).max().unwrap_or(first.price);
            let low = points.iter().map(|p| p.price).min().unwrap_or(first.price);
            lines.push(format!(
                "Open: {} | Close: {} | High: {} | Low: {}",
                probability(first.price),
                probability(last.price),
                probability(high),
                probability(low)
            ));
            lines.push(String::new());
            for point in points {
                lines.push(format!(
                    "{}: {}",
                    date(Some(point.timestamp)),
                    probability(point.price)
                ));
            }
        }
        _ => lines.push("No price points returned for this timeframe.".to_string()),
    }

    lines.join("\n")
}

/// One-paragraph, human-readable rendering of a tool failure.
pub fn error(err: &ToolError) -> String {
    match err {
        ToolError::Validation { field, reason } => {
            format!("Invalid argument '{}': {}.", field, reason)
        }
        ToolError::UnknownTool(name) => format!(
            "Unknown tool: {}. Available tools: get-market-info, list-markets, get-market-prices, get-market-history.",
            name
        ),
        ToolError::NotFound {
            market_id: Some(id),
        } => format!(
            "Market not found: {}. Check the market ID, slug or condition ID and try again.",
            id
        ),
        ToolError::NotFound { market_id: None } => {
            "The requested market data was not found upstream.".to_string()
        }
        ToolError::RateLimited => "The market data API is rate limiting requests. Please wait a moment and retry later.".to_string(),
        ToolError::Unauthorized { code } => format!(
            "The market data API refused access (HTTP {}). Check the POLYMARKET_API_KEY and POLYMARKET_FUNDER credentials.",
            code
        ),
        ToolError::UpstreamUnavailable { detail } => format!(
            "The market data API is currently unavailable ({}). Please try again later.",
            detail
        ),
        ToolError::UpstreamStatus { code } => format!(
            "The market data API rejected the request (HTTP {}).",
            code
        ),
        ToolError::Normalization(detail) => format!(
            "The market data API returned a response in an unexpected shape ({}). This is likely a bug worth reporting.",
            detail
        ),
        ToolError::HistoryUnavailable { market_id, detail } => format!(
            "Price history for market {} could not be retrieved ({}). Please try again later.",
            market_id, detail
        ),
    }
}
