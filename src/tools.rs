//! Tool dispatcher: argument validation and routing of the four operations.
//!
//! Dispatch never fails. Every error, including an unknown tool name, is
//! rendered to text via [`format::error`].

use std::str::FromStr;

use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use tracing::{debug, instrument, warn};

use crate::error::ToolError;
use crate::format;
use crate::market::{History, ListQuery, MarketClient, MarketOrder, Timeframe};
use crate::metrics;

/// The four callable operations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
pub enum ToolName {
    /// Full detail of one market.
    #[strum(serialize = "get-market-info")]
    GetMarketInfo,
    /// Filtered, paginated market listing.
    #[strum(serialize = "list-markets")]
    ListMarkets,
    /// Current outcome prices of one market.
    #[strum(serialize = "get-market-prices")]
    GetMarketPrices,
    /// Price series of one market.
    #[strum(serialize = "get-market-history")]
    GetMarketHistory,
}

/// Metric label for a requested tool name.
///
/// Unrecognised names share one label so callers cannot grow the series set.
pub fn metric_label(name: &str) -> &'static str {
    ToolName::from_str(name)
        .map(<&'static str>::from)
        .unwrap_or("unknown")
}

/// A tool invocation as received from the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolRequest {
    /// Tool name.
    pub name: String,
    /// Named arguments.
    pub arguments: Map<String, Value>,
}

impl ToolRequest {
    /// Build a request from a name and a JSON object of arguments.
    ///
    /// A missing or `null` argument value is treated as no arguments.
    pub fn new(name: impl Into<String>, arguments: Option<Value>) -> Result<Self, ToolError> {
        let arguments = match arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(ToolError::invalid("arguments", "must be an object")),
        };
        Ok(Self {
            name: name.into(),
            arguments,
        })
    }
}

/// Plain-text tool answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// Rendered text, never empty.
    pub text: String,
    /// Whether `text` describes a failure.
    pub is_error: bool,
}

impl ToolResult {
    fn success(text: String) -> Self {
        Self {
            text,
            is_error: false,
        }
    }

    fn failure(err: &ToolError) -> Self {
        Self {
            text: format::error(err),
            is_error: true,
        }
    }
}

/// Validated arguments for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    /// `get-market-info`.
    MarketInfo {
        /// Numeric id, slug or condition id.
        market_id: String,
    },
    /// `list-markets`.
    ListMarkets(ListQuery),
    /// `get-market-prices`.
    MarketPrices {
        /// Numeric id, slug or condition id.
        market_id: String,
    },
    /// `get-market-history`.
    MarketHistory {
        /// Numeric id, slug or condition id.
        market_id: String,
        /// History window.
        timeframe: Timeframe,
    },
}

impl ToolCall {
    /// Validate `args` for `tool`, applying defaults.
    pub fn parse(tool: ToolName, args: &Map<String, Value>) -> Result<Self, ToolError> {
        Ok(match tool {
            ToolName::GetMarketInfo => ToolCall::MarketInfo {
                market_id: market_id(args)?,
            },
            ToolName::GetMarketPrices => ToolCall::MarketPrices {
                market_id: market_id(args)?,
            },
            ToolName::GetMarketHistory => ToolCall::MarketHistory {
                market_id: market_id(args)?,
                timeframe: choice(args, &["timeframe"], Timeframe::default(), "1d, 7d, 30d or all")?,
            },
            ToolName::ListMarkets => {
                let defaults = ListQuery::default();
                ToolCall::ListMarkets(ListQuery {
                    active: flag(args, "active", defaults.active)?,
                    closed: flag(args, "closed", defaults.closed)?,
                    archived: flag(args, "archived", defaults.archived)?,
                    limit: integer(args, "limit", defaults.limit, 1, 100)?,
                    offset: integer(args, "offset", defaults.offset, 0, u32::MAX)?,
                    order: choice(
                        args,
                        &["order", "order_by"],
                        MarketOrder::default(),
                        "volume, volume24hr, liquidity, end_date or start_date",
                    )?,
                    ascending: flag(args, "ascending", defaults.ascending)?,
                })
            }
        })
    }
}

fn present<'a>(args: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    args.get(field).filter(|v| !v.is_null())
}

fn market_id(args: &Map<String, Value>) -> Result<String, ToolError> {
    match present(args, "market_id") {
        None => Err(ToolError::invalid("market_id", "is required")),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(ToolError::invalid("market_id", "must not be empty")),
        Some(Value::Number(n)) if n.is_u64() => Ok(n.to_string()),
        Some(_) => Err(ToolError::invalid(
            "market_id",
            "must be a string (numeric id, slug or condition id)",
        )),
    }
}

fn flag(args: &Map<String, Value>, field: &str, default: bool) -> Result<bool, ToolError> {
    match present(args, field) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        Some(_) => Err(ToolError::invalid(field, "must be a boolean")),
    }
}

fn integer(
    args: &Map<String, Value>,
    field: &str,
    default: u32,
    min: u32,
    max: u32,
) -> Result<u32, ToolError> {
    let value = match present(args, field) {
        None => return Ok(default),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    }
    .ok_or_else(|| ToolError::invalid(field, "must be an integer"))?;

    if value < i64::from(min) || value > i64::from(max) {
        let reason = if max == u32::MAX {
            format!("must be at least {}", min)
        } else {
            format!("must be between {} and {}", min, max)
        };
        return Err(ToolError::invalid(field, reason));
    }
    Ok(value as u32)
}

fn choice<T: FromStr>(
    args: &Map<String, Value>,
    fields: &[&str],
    default: T,
    allowed: &str,
) -> Result<T, ToolError> {
    let Some((field, value)) = fields
        .iter()
        .find_map(|f| present(args, f).map(|v| (*f, v)))
    else {
        return Ok(default);
    };
    value
        .as_str()
        .and_then(|s| T::from_str(s.trim()).ok())
        .ok_or_else(|| ToolError::invalid(field, format!("must be one of {}", allowed)))
}

/// Routes tool requests to the market client and renders the answer.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    client: MarketClient,
}

impl ToolDispatcher {
    /// Create a dispatcher over `client`.
    pub fn new(client: MarketClient) -> Self {
        Self { client }
    }

    /// Run one tool invocation. Always yields text.
    #[instrument(skip(self, request), fields(tool = %request.name))]
    pub async fn dispatch(&self, request: &ToolRequest) -> ToolResult {
        let label = metric_label(&request.name);
        metrics::inc_tool_calls(label);

        let result = match ToolName::from_str(&request.name) {
            Ok(tool) => match ToolCall::parse(tool, &request.arguments) {
                Ok(call) => self.execute(call).await,
                Err(e) => Err(e),
            },
            Err(_) => Err(ToolError::UnknownTool(request.name.clone())),
        };

        match result {
            Ok(text) => ToolResult::success(text),
            Err(e) => {
                warn!(error = %e, "Tool call failed");
                metrics::inc_tool_errors(label);
                ToolResult::failure(&e)
            }
        }
    }

    /// Convenience wrapper taking the name and raw JSON arguments.
    pub async fn call(&self, name: &str, arguments: Option<Value>) -> ToolResult {
        match ToolRequest::new(name, arguments) {
            Ok(request) => self.dispatch(&request).await,
            Err(e) => ToolResult::failure(&e),
        }
    }

    async fn execute(&self, call: ToolCall) -> Result<String, ToolError> {
        debug!(?call, "Executing tool");
        match call {
            ToolCall::MarketInfo { market_id } => {
                let market = self.client.get_market(&market_id).await?;
                Ok(format::market_info(&market))
            }
            ToolCall::ListMarkets(query) => {
                let markets = self.client.list_markets(&query).await?;
                Ok(format::market_list(&markets))
            }
            ToolCall::MarketPrices { market_id } => {
                let market = self.client.get_market(&market_id).await?;
                Ok(format::market_prices(&market))
            }
            ToolCall::MarketHistory {
                market_id,
                timeframe,
            } => {
                if !self.client.history_enabled() {
                    return Ok(format::HISTORY_NOT_IMPLEMENTED.to_string());
                }
                let market = self.client.get_market(&market_id).await?;
                match self.client.price_history(&market, timeframe).await? {
                    History::Unsupported => Ok(format::HISTORY_NOT_IMPLEMENTED.to_string()),
                    History::Series { outcome, points } => Ok(format::price_history(
                        &market, &outcome, timeframe, &points,
                    )),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test arguments must be an object"),
        }
    }

    #[test]
    fn tool_names_round_trip() {
        let names: Vec<String> = ToolName::iter().map(|t| t.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "get-market-info",
                "list-markets",
                "get-market-prices",
                "get-market-history"
            ]
        );
        assert!(ToolName::from_str("get-market").is_err());
    }

    #[test]
    fn metric_labels_are_bounded() {
        assert_eq!(metric_label("list-markets"), "list-markets");
        assert_eq!(metric_label("get-market-history"), "get-market-history");
        assert_eq!(metric_label("drop-table"), "unknown");
        assert_eq!(metric_label("x".repeat(200).as_str()), "unknown");
    }

    #[test]
    fn list_defaults() {
        let call = ToolCall::parse(ToolName::ListMarkets, &Map::new()).unwrap();
        assert_eq!(call, ToolCall::ListMarkets(ListQuery::default()));
    }

    #[test]
    fn list_arguments_are_coerced() {
        let call = ToolCall::parse(
            ToolName::ListMarkets,
            &args(json!({
                "active": "false",
                "closed": true,
                "limit": "25",
                "offset": 50,
                "order_by": "liquidity",
                "ascending": null
            })),
        )
        .unwrap();
        let ToolCall::ListMarkets(query) = call else {
            panic!("expected list-markets");
        };
        assert!(!query.active);
        assert!(query.closed);
        assert_eq!(query.limit, 25);
        assert_eq!(query.offset, 50);
        assert_eq!(query.order, MarketOrder::Liquidity);
        assert!(!query.ascending);
    }

    #[test]
    fn limit_out_of_range_names_field() {
        for bad in [json!(0), json!(101), json!(-5), json!("ten"), json!(2.5)] {
            let err = ToolCall::parse(ToolName::ListMarkets, &args(json!({ "limit": bad })))
                .unwrap_err();
            assert!(
                matches!(&err, ToolError::Validation { field, .. } if field == "limit"),
                "{:?}",
                err
            );
        }
    }

    #[test]
    fn negative_offset_is_rejected() {
        let err =
            ToolCall::parse(ToolName::ListMarkets, &args(json!({"offset": -1}))).unwrap_err();
        assert_eq!(err, ToolError::invalid("offset", "must be at least 0"));
    }

    #[test]
    fn bad_enum_and_bool_values() {
        let err = ToolCall::parse(ToolName::ListMarkets, &args(json!({"order": "random"})))
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation { field, .. } if field == "order"));

        let err =
            ToolCall::parse(ToolName::ListMarkets, &args(json!({"active": 1}))).unwrap_err();
        assert!(matches!(err, ToolError::Validation { field, .. } if field == "active"));

        let err = ToolCall::parse(ToolName::GetMarketHistory, &args(json!({"market_id": "1", "timeframe": "2w"})))
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation { field, .. } if field == "timeframe"));
    }

    #[test]
    fn market_id_validation() {
        let missing = ToolCall::parse(ToolName::GetMarketInfo, &Map::new()).unwrap_err();
        assert_eq!(missing, ToolError::invalid("market_id", "is required"));

        let blank =
            ToolCall::parse(ToolName::GetMarketPrices, &args(json!({"market_id": "  "})))
                .unwrap_err();
        assert!(matches!(blank, ToolError::Validation { .. }));

        let numeric =
            ToolCall::parse(ToolName::GetMarketInfo, &args(json!({"market_id": 253591}))).unwrap();
        assert_eq!(
            numeric,
            ToolCall::MarketInfo {
                market_id: "253591".to_string()
            }
        );
    }

    #[test]
    fn history_defaults_to_seven_days() {
        let call =
            ToolCall::parse(ToolName::GetMarketHistory, &args(json!({"market_id": "fed"})))
                .unwrap();
        assert_eq!(
            call,
            ToolCall::MarketHistory {
                market_id: "fed".to_string(),
                timeframe: Timeframe::SevenDays
            }
        );
    }

    #[test]
    fn request_arguments_must_be_an_object() {
        assert!(ToolRequest::new("list-markets", None).is_ok());
        assert!(ToolRequest::new("list-markets", Some(Value::Null)).is_ok());
        assert!(ToolRequest::new("list-markets", Some(json!([1]))).is_err());
    }
}
