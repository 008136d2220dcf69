//! Integration tests for the Polymarket MCP tools.
//!
//! Most tests drive the full dispatcher over a scripted transport. The live
//! tests at the bottom hit the real Polymarket APIs.
//! Run those with: cargo test --test integration -- --ignored

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use polymarket_mcp::config::Config;
use polymarket_mcp::format;
use polymarket_mcp::market::{ApiSource, MarketClient, MockReply, MockTransport};
use polymarket_mcp::server::McpServer;
use polymarket_mcp::tools::ToolDispatcher;

const CID: &str = "0x5f65177b394277fd294cd75650044e32ba009a95022d88a0c1d565897d72f8f1";

fn gamma_market() -> Value {
    json!({
        "id": "253591",
        "conditionId": CID,
        "question": "Will the Fed cut rates in March?",
        "slug": "fed-cut-march",
        "category": "Economics",
        "active": true,
        "closed": false,
        "archived": false,
        "volume": "1234567.891",
        "liquidity": "45000.5",
        "endDate": "2025-03-19T18:00:00Z",
        "outcomes": "[\"Yes\", \"No\"]",
        "outcomePrices": "[\"0.525\", \"0.475\"]",
        "clobTokenIds": "[\"111\", \"222\"]"
    })
}

fn clob_market() -> Value {
    json!({
        "condition_id": CID,
        "question": "Will the Fed cut rates in March?",
        "market_slug": "fed-cut-march",
        "category": "Economics",
        "active": true,
        "closed": false,
        "archived": false,
        "volume": "1234567.891",
        "liquidity": 45000.5,
        "end_date_iso": "2025-03-19T18:00:00Z",
        "tokens": [
            {"token_id": "111", "outcome": "Yes", "price": 0.525, "winner": false},
            {"token_id": "222", "outcome": "No", "price": 0.475, "winner": false}
        ]
    })
}

fn dispatcher(mock: &Arc<MockTransport>, history_enabled: bool) -> ToolDispatcher {
    ToolDispatcher::new(MarketClient::with_transport(mock.clone(), history_enabled))
}

fn market_args() -> Value {
    json!({ "market_id": CID })
}

#[tokio::test]
async fn test_output_independent_of_answering_api() {
    let primary = Arc::new(MockTransport::new());
    primary.on(ApiSource::Gamma, "/markets", MockReply::Json(json!([gamma_market()])));

    let fallback = Arc::new(MockTransport::new());
    fallback.on(ApiSource::Gamma, "/markets", MockReply::Timeout);
    fallback.on(
        ApiSource::Clob,
        format!("/markets/{}", CID),
        MockReply::Json(clob_market()),
    );

    for tool in ["get-market-info", "get-market-prices"] {
        let from_gamma = dispatcher(&primary, true)
            .call(tool, Some(market_args()))
            .await;
        let from_clob = dispatcher(&fallback, true)
            .call(tool, Some(market_args()))
            .await;

        assert!(!from_gamma.is_error, "{}", from_gamma.text);
        assert_eq!(from_gamma, from_clob);
    }

    assert_eq!(primary.calls_to(ApiSource::Clob), 0);
    assert_eq!(fallback.calls_to(ApiSource::Clob), 2);
}

#[tokio::test]
async fn test_prices_show_rounded_probabilities() {
    let mock = Arc::new(MockTransport::new());
    mock.on(ApiSource::Gamma, "/markets", MockReply::Json(json!([gamma_market()])));

    let result = dispatcher(&mock, true)
        .call("get-market-prices", Some(market_args()))
        .await;

    assert_eq!(
        result.text,
        format!(
            "Prices for: Will the Fed cut rates in March?\n\
             Market ID: {}\n\
             Status: active\n\
             \n\
             - Yes: 0.5250 (52.5%)\n\
             - No: 0.4750 (47.5%)",
            CID
        )
    );
}

#[tokio::test]
async fn test_list_respects_limit() {
    let mock = Arc::new(MockTransport::new());
    let markets: Vec<Value> = (1..=25)
        .map(|i| {
            json!({
                "id": i.to_string(),
                "question": format!("Market {}", i),
                "volume": 1000 - i,
                "active": true,
                "closed": false
            })
        })
        .collect();
    mock.on(ApiSource::Gamma, "/markets", MockReply::Json(Value::Array(markets)));

    let result = dispatcher(&mock, true)
        .call("list-markets", Some(json!({ "limit": 10 })))
        .await;

    assert!(!result.is_error);
    assert_eq!(result.text.matches("\n---\n").count(), 9);
    assert_eq!(result.text.matches("Title: ").count(), 10);

    let sent = mock.requests();
    assert!(sent[0].query.contains(&("limit".to_string(), "10".to_string())));
}

#[tokio::test]
async fn test_not_found_does_not_fall_back() {
    let mock = Arc::new(MockTransport::new());
    mock.on(ApiSource::Gamma, "/markets", MockReply::Status(404));

    let result = dispatcher(&mock, true)
        .call("get-market-info", Some(market_args()))
        .await;

    assert!(result.is_error);
    assert!(result.text.starts_with("Market not found"), "{}", result.text);
    assert_eq!(mock.calls_to(ApiSource::Clob), 0);
}

#[tokio::test]
async fn test_unknown_numeric_id_is_not_found() {
    // Unscripted routes answer 404
    let mock = Arc::new(MockTransport::new());

    let result = dispatcher(&mock, true)
        .call("get-market-info", Some(json!({ "market_id": 999999999 })))
        .await;

    assert!(result.is_error);
    assert!(result.text.contains("999999999"));
    assert_eq!(mock.calls_to(ApiSource::Clob), 0);
}

#[tokio::test]
async fn test_both_apis_down() {
    let mock = Arc::new(MockTransport::new());
    mock.on(ApiSource::Gamma, "/markets", MockReply::Status(503));
    mock.on(
        ApiSource::Clob,
        format!("/markets/{}", CID),
        MockReply::ConnectionRefused,
    );

    let result = dispatcher(&mock, true)
        .call("get-market-prices", Some(market_args()))
        .await;

    assert!(result.is_error);
    assert!(result.text.contains("unavailable"), "{}", result.text);
}

#[tokio::test]
async fn test_history_not_implemented_is_not_an_error() {
    let mock = Arc::new(MockTransport::new());
    let result = dispatcher(&mock, false)
        .call("get-market-history", Some(json!({ "market_id": "fed-cut-march", "timeframe": "30d" })))
        .await;

    assert!(!result.is_error);
    assert_eq!(result.text, format::HISTORY_NOT_IMPLEMENTED);
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_history_without_token_ids() {
    let mock = Arc::new(MockTransport::new());
    mock.on(
        ApiSource::Gamma,
        "/markets/42",
        MockReply::Json(json!({"id": "42", "question": "No tokens here"})),
    );

    let result = dispatcher(&mock, true)
        .call("get-market-history", Some(json!({ "market_id": "42" })))
        .await;

    assert!(!result.is_error);
    assert_eq!(result.text, format::HISTORY_NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_history_series() {
    let mock = Arc::new(MockTransport::new());
    mock.on(ApiSource::Gamma, "/markets", MockReply::Json(json!([gamma_market()])));
    mock.on(
        ApiSource::Clob,
        "/prices-history",
        MockReply::Json(json!({
            "history": [
                {"t": 1735689600, "p": 0.41},
                {"t": 1735776000, "p": 0.55},
                {"t": 1735862400, "p": 0.525}
            ]
        })),
    );

    let result = dispatcher(&mock, true)
        .call("get-market-history", Some(json!({ "market_id": CID, "timeframe": "1d" })))
        .await;

    assert_eq!(
        result.text,
        "Price history for: Will the Fed cut rates in March?\n\
         Outcome: Yes\n\
         Timeframe: 1d\n\
         Points: 3\n\
         Open: 41.0% | Close: 52.5% | High: 55.0% | Low: 41.0%\n\
         \n\
         2025-01-01 00:00 UTC: 41.0%\n\
         2025-01-02 00:00 UTC: 55.0%\n\
         2025-01-03 00:00 UTC: 52.5%"
    );

    let history = mock
        .requests()
        .into_iter()
        .find(|r| r.path == "/prices-history")
        .expect("history request sent");
    assert!(history.query.contains(&("market".to_string(), "111".to_string())));
    assert!(history.query.contains(&("interval".to_string(), "1d".to_string())));
}

#[tokio::test]
async fn test_history_endpoint_without_series() {
    // /prices-history left unscripted answers 404
    let mock = Arc::new(MockTransport::new());
    mock.on(ApiSource::Gamma, "/markets", MockReply::Json(json!([gamma_market()])));

    let result = dispatcher(&mock, true)
        .call("get-market-history", Some(market_args()))
        .await;

    assert!(!result.is_error, "{}", result.text);
    assert_eq!(result.text, format::HISTORY_NOT_IMPLEMENTED);
    assert_eq!(mock.calls_to(ApiSource::Clob), 1);
}

#[tokio::test]
async fn test_history_series_failure_keeps_market() {
    let mock = Arc::new(MockTransport::new());
    mock.on(ApiSource::Gamma, "/markets", MockReply::Json(json!([gamma_market()])));
    mock.on(ApiSource::Clob, "/prices-history", MockReply::Timeout);

    let result = dispatcher(&mock, true)
        .call("get-market-history", Some(market_args()))
        .await;

    assert!(result.is_error);
    assert!(result.text.starts_with("Price history for market"), "{}", result.text);
    assert!(!result.text.contains("not found"), "{}", result.text);
}

#[tokio::test]
async fn test_list_falls_back_to_clob() {
    let mock = Arc::new(MockTransport::new());
    mock.on(ApiSource::Gamma, "/markets", MockReply::Status(502));
    mock.on(
        ApiSource::Clob,
        "/markets",
        MockReply::Json(json!({ "data": [clob_market()], "next_cursor": "LTE=" })),
    );

    let result = dispatcher(&mock, true)
        .call("list-markets", Some(json!({ "offset": 100 })))
        .await;

    assert!(!result.is_error, "{}", result.text);
    assert!(result.text.contains("Title: Will the Fed cut rates in March?"));
    let clob = mock
        .requests()
        .into_iter()
        .find(|r| r.source == ApiSource::Clob)
        .expect("fallback request sent");
    assert_eq!(clob.query, vec![("next_cursor".to_string(), "MTAw".to_string())]);
}

#[tokio::test]
async fn test_repeated_calls_are_byte_identical() {
    let mock = Arc::new(MockTransport::new());
    mock.on(ApiSource::Gamma, "/markets", MockReply::Json(json!([gamma_market()])));
    let dispatcher = dispatcher(&mock, true);

    let first = dispatcher.call("list-markets", None).await;
    let second = dispatcher.call("list-markets", None).await;

    assert_eq!(first.text.as_bytes(), second.text.as_bytes());
}

#[tokio::test]
async fn test_validation_errors_name_the_field() {
    let mock = Arc::new(MockTransport::new());
    let dispatcher = dispatcher(&mock, true);

    let cases = [
        ("list-markets", json!({ "limit": 0 }), "limit"),
        ("list-markets", json!({ "limit": 101 }), "limit"),
        ("list-markets", json!({ "order": "popularity" }), "order"),
        ("get-market-info", json!({}), "market_id"),
        ("get-market-history", json!({ "market_id": CID, "timeframe": "1y" }), "timeframe"),
    ];

    for (tool, args, field) in cases {
        let result = dispatcher.call(tool, Some(args)).await;
        assert!(result.is_error);
        assert!(
            result.text.contains(&format!("'{}'", field)),
            "{} did not mention {}: {}",
            tool,
            field,
            result.text
        );
    }
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_unknown_tool() {
    let mock = Arc::new(MockTransport::new());
    let result = dispatcher(&mock, true).call("get-market-volume", None).await;

    assert!(result.is_error);
    assert!(result.text.starts_with("Unknown tool: get-market-volume"));
}

#[tokio::test]
async fn test_stdio_session() {
    let mock = Arc::new(MockTransport::new());
    mock.on(ApiSource::Gamma, "/markets", MockReply::Json(json!([gamma_market()])));
    let server = McpServer::new(dispatcher(&mock, true));

    let input = [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
               "params": {"name": "get-market-prices", "arguments": {"market_id": CID}}}),
    ]
    .iter()
    .map(|v| v.to_string())
    .collect::<Vec<_>>()
    .join("\n");

    let mut output = Vec::new();
    server.serve(input.as_bytes(), &mut output).await.unwrap();

    let responses: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["result"]["protocolVersion"], json!("2024-11-05"));
    assert_eq!(responses[1]["result"]["isError"], json!(false));
    let text = responses[1]["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("- Yes: 0.5250 (52.5%)"));
}

/// Build a live client from environment, if credentials are present.
fn live_dispatcher() -> Option<ToolDispatcher> {
    dotenvy::dotenv().ok();
    let config = Config::load().ok()?;
    config.validate().ok()?;
    MarketClient::new(&config).ok().map(ToolDispatcher::new)
}

/// List real markets from the Gamma API.
#[tokio::test]
#[ignore = "requires network and POLYMARKET_API_KEY/POLYMARKET_FUNDER"]
async fn test_live_list_markets() {
    let Some(dispatcher) = live_dispatcher() else {
        println!("Skipping: credentials not set or invalid");
        return;
    };

    let result = dispatcher
        .call("list-markets", Some(json!({ "limit": 3 })))
        .await;
    assert!(!result.is_error, "{}", result.text);
    println!("{}", result.text);
}

/// Fetch a real market by the id of the first listed one.
#[tokio::test]
#[ignore = "requires network and POLYMARKET_API_KEY/POLYMARKET_FUNDER"]
async fn test_live_market_info() {
    let Some(dispatcher) = live_dispatcher() else {
        println!("Skipping: credentials not set or invalid");
        return;
    };

    let listing = dispatcher
        .call("list-markets", Some(json!({ "limit": 1 })))
        .await;
    let Some(id) = listing
        .text
        .lines()
        .find_map(|l| l.strip_prefix("Market ID: "))
    else {
        println!("Skipping: no markets listed");
        return;
    };

    let result = dispatcher
        .call("get-market-info", Some(json!({ "market_id": id })))
        .await;
    assert!(!result.is_error, "{}", result.text);
    println!("{}", result.text);
}
