//! Normalization of Gamma and CLOB payloads into [`MarketRecord`]s.
//!
//! Required fields are the market id and title; everything else is
//! optional and degrades to `None` (or zero volume) when absent or
//! unparseable. Numeric fields may arrive as JSON numbers or strings.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::warn;

use crate::error::NormalizationError;

use super::types::{ApiSource, MarketRecord, MarketStatus, OutcomePrice, PricePoint};

/// Normalize a single-market payload.
///
/// Gamma lookups by slug or condition id answer with an array; the first
/// element is the match. An empty array yields `Ok(None)`.
pub fn normalize_market(
    payload: &Value,
    source: ApiSource,
) -> Result<Option<MarketRecord>, NormalizationError> {
    match payload {
        Value::Array(items) => match items.first() {
            Some(item) => normalize_item(item, source).map(Some),
            None => Ok(None),
        },
        Value::Object(_) => normalize_item(payload, source).map(Some),
        other => Err(unexpected("market object", other)),
    }
}

/// Normalize a list payload: a bare array, or an object wrapping one under
/// `data` or `markets`.
///
/// Malformed items are skipped; a non-empty list in which every item is
/// malformed fails with the first item's error.
pub fn normalize_markets(
    payload: &Value,
    source: ApiSource,
) -> Result<Vec<MarketRecord>, NormalizationError> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("data").or_else(|| map.get("markets")) {
            Some(Value::Array(items)) => items,
            Some(other) => return Err(unexpected("market array", other)),
            None => return Err(unexpected("market array", payload)),
        },
        other => return Err(unexpected("market array", other)),
    };

    let mut records = Vec::with_capacity(items.len());
    let mut first_error = None;
    for item in items {
        match normalize_item(item, source) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(api = %source, error = %e, "Skipping malformed market");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if records.is_empty() => Err(e),
        _ => Ok(records),
    }
}

/// Normalize a CLOB `/prices-history` payload.
pub fn normalize_history(payload: &Value) -> Result<Vec<PricePoint>, NormalizationError> {
    let history = payload
        .get("history")
        .and_then(Value::as_array)
        .ok_or_else(|| unexpected("object with `history` array", payload))?;

    Ok(history
        .iter()
        .filter_map(|point| {
            let seconds = point.get("t").and_then(decimal)?.trunc().to_i64()?;
            let timestamp = OffsetDateTime::from_unix_timestamp(seconds).ok()?;
            let price = point.get("p").and_then(decimal)?;
            Some(PricePoint { timestamp, price })
        })
        .collect())
}

fn normalize_item(item: &Value, source: ApiSource) -> Result<MarketRecord, NormalizationError> {
    if !item.is_object() {
        return Err(unexpected("market object", item));
    }
    match source {
        ApiSource::Gamma => normalize_gamma(item),
        ApiSource::Clob => normalize_clob(item),
    }
}

fn normalize_gamma(item: &Value) -> Result<MarketRecord, NormalizationError> {
    let id = text(item, &["conditionId", "id"]).ok_or(NormalizationError::MissingField("id"))?;
    let title =
        text(item, &["question", "title"]).ok_or(NormalizationError::MissingField("title"))?;

    let resolved = text(item, &["umaResolutionStatus"])
        .map(|s| s.eq_ignore_ascii_case("resolved"))
        .unwrap_or(false);

    let labels = string_list(item.get("outcomes"));
    let prices = string_list(item.get("outcomePrices"));
    let tokens = string_list(item.get("clobTokenIds"));
    let outcomes = labels
        .iter()
        .enumerate()
        .map(|(i, label)| OutcomePrice {
            label: value_text(label).unwrap_or_else(|| "N/A".to_string()),
            price: prices.get(i).and_then(decimal),
            token_id: tokens.get(i).and_then(value_text),
        })
        .collect();

    Ok(MarketRecord {
        id,
        title,
        status: status(item, resolved),
        category: text(item, &["category"]),
        volume: number(item, &["volume", "volumeNum"]).unwrap_or(Decimal::ZERO),
        liquidity: number(item, &["liquidity", "liquidityNum"]),
        end_date: text(item, &["endDate", "endDateIso"]).and_then(|s| timestamp(&s)),
        slug: text(item, &["slug"]),
        outcomes,
    })
}

fn normalize_clob(item: &Value) -> Result<MarketRecord, NormalizationError> {
    let id = text(item, &["condition_id"]).ok_or(NormalizationError::MissingField("id"))?;
    let title = text(item, &["question"]).ok_or(NormalizationError::MissingField("title"))?;

    let tokens = item
        .get("tokens")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let resolved = tokens
        .iter()
        .any(|t| t.get("winner").and_then(Value::as_bool).unwrap_or(false));
    let outcomes = tokens
        .iter()
        .map(|t| OutcomePrice {
            label: text(t, &["outcome"]).unwrap_or_else(|| "N/A".to_string()),
            price: t.get("price").and_then(decimal),
            token_id: text(t, &["token_id"]),
        })
        .collect();

    Ok(MarketRecord {
        id,
        title,
        status: status(item, resolved),
        category: text(item, &["category"]),
        volume: number(item, &["volume"]).unwrap_or(Decimal::ZERO),
        liquidity: number(item, &["liquidity"]),
        end_date: text(item, &["end_date_iso"]).and_then(|s| timestamp(&s)),
        slug: text(item, &["market_slug"]),
        outcomes,
    })
}

fn status(item: &Value, resolved: bool) -> MarketStatus {
    let flag = |key: &str| item.get(key).and_then(Value::as_bool).unwrap_or(false);
    if flag("archived") {
        MarketStatus::Archived
    } else if flag("closed") && resolved {
        MarketStatus::Resolved
    } else if flag("closed") {
        MarketStatus::Closed
    } else {
        MarketStatus::Active
    }
}

/// First non-empty string (or number rendered as string) among `keys`.
fn text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| item.get(*key).and_then(value_text))
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First parseable decimal among `keys`.
fn number(item: &Value, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|key| item.get(*key).and_then(decimal))
}

/// Coerce a JSON string or number into a decimal.
pub fn decimal(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

/// Gamma encodes some arrays as JSON strings (`"[\"Yes\", \"No\"]"`).
fn string_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// RFC 3339 timestamp or bare `YYYY-MM-DD` date (midnight UTC).
fn timestamp(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).ok().or_else(|| {
        Date::parse(raw, format_description!("[year]-[month]-[day]"))
            .ok()
            .map(|d| d.midnight().assume_utc())
    })
}

fn unexpected(expected: &'static str, found: &Value) -> NormalizationError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    NormalizationError::UnexpectedShape {
        expected,
        found: found.to_string(),
    }
}
