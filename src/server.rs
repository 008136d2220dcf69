//! MCP server over stdio: newline-delimited JSON-RPC 2.0.
//!
//! Each request line yields at most one response line. Notifications
//! (messages without an `id`) never get an answer.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::tools::{ToolDispatcher, ToolName};

/// Name reported in the `initialize` handshake.
pub const SERVER_NAME: &str = "polymarket_predictions";

/// Protocol version used when the client does not send one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Incoming JSON-RPC message.
#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// `tools/call` parameters.
#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

fn success(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn failure(id: Value, code: i64, message: impl Into<String>) -> Value {
    let error = RpcError {
        code,
        message: message.into(),
    };
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}

/// Tool descriptors advertised by `tools/list`.
pub fn tool_catalogue() -> Value {
    let market_id = json!({
        "type": "string",
        "description": "Market numeric id, slug, or condition id (0x-prefixed)"
    });

    json!([
        {
            "name": ToolName::GetMarketInfo.as_ref(),
            "description": "Get detailed information about a specific prediction market",
            "inputSchema": {
                "type": "object",
                "properties": { "market_id": market_id },
                "required": ["market_id"]
            }
        },
        {
            "name": ToolName::ListMarkets.as_ref(),
            "description": "List prediction markets with optional filters",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "active": { "type": "boolean", "description": "Include active markets", "default": true },
                    "closed": { "type": "boolean", "description": "Include closed markets", "default": false },
                    "archived": { "type": "boolean", "description": "Include archived markets", "default": false },
                    "limit": {
                        "type": "integer",
                        "description": "Number of markets to return",
                        "default": 10,
                        "minimum": 1,
                        "maximum": 100
                    },
                    "offset": {
                        "type": "integer",
                        "description": "Number of markets to skip (for pagination)",
                        "default": 0,
                        "minimum": 0
                    },
                    "order": {
                        "type": "string",
                        "description": "Sort key",
                        "enum": ["volume", "volume24hr", "liquidity", "end_date", "start_date"],
                        "default": "volume"
                    },
                    "ascending": { "type": "boolean", "description": "Sort ascending", "default": false }
                }
            }
        },
        {
            "name": ToolName::GetMarketPrices.as_ref(),
            "description": "Get current prices and trading information for a market",
            "inputSchema": {
                "type": "object",
                "properties": { "market_id": market_id },
                "required": ["market_id"]
            }
        },
        {
            "name": ToolName::GetMarketHistory.as_ref(),
            "description": "Get historical price data for a market",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "market_id": market_id,
                    "timeframe": {
                        "type": "string",
                        "description": "Time period for historical data",
                        "enum": ["1d", "7d", "30d", "all"],
                        "default": "7d"
                    }
                },
                "required": ["market_id"]
            }
        }
    ])
}

/// MCP request handler wrapping a [`ToolDispatcher`].
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: ToolDispatcher,
}

impl McpServer {
    /// Create a server that routes `tools/call` to `dispatcher`.
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Handle one raw input line.
    ///
    /// Returns the response to write back, or `None` for blank lines and
    /// notifications.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Unparseable request line");
                return Some(failure(Value::Null, PARSE_ERROR, format!("Parse error: {}", e)));
            }
        };

        if request.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
            let id = request.id.unwrap_or(Value::Null);
            return Some(failure(id, INVALID_REQUEST, "jsonrpc must be \"2.0\""));
        }

        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        Some(self.handle_request(id, &request.method, request.params).await)
    }

    async fn handle_request(&self, id: Value, method: &str, params: Option<Value>) -> Value {
        debug!(method, "Request received");
        match method {
            "initialize" => {
                let version = params
                    .as_ref()
                    .and_then(|p| p.get("protocolVersion"))
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL_VERSION);
                success(
                    id,
                    json!({
                        "protocolVersion": version,
                        "capabilities": { "tools": {} },
                        "serverInfo": {
                            "name": SERVER_NAME,
                            "version": env!("CARGO_PKG_VERSION")
                        }
                    }),
                )
            }
            "ping" => success(id, json!({})),
            "tools/list" => success(id, json!({ "tools": tool_catalogue() })),
            "tools/call" => {
                let params: CallParams = match params.map(serde_json::from_value::<CallParams>) {
                    Some(Ok(p)) => p,
                    Some(Err(e)) => {
                        return failure(id, INVALID_PARAMS, format!("Invalid params: {}", e))
                    }
                    None => return failure(id, INVALID_PARAMS, "Missing params"),
                };
                let result = self.dispatcher.call(&params.name, params.arguments).await;
                success(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": result.text }],
                        "isError": result.is_error
                    }),
                )
            }
            other => failure(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
        }
    }

    /// Serve requests from stdin until it closes.
    pub async fn run_stdio(&self) -> Result<(), AppError> {
        info!(server = SERVER_NAME, "MCP server listening on stdio");
        let stdin = BufReader::new(io::stdin());
        let mut stdout = io::stdout();
        self.serve(stdin, &mut stdout).await
    }

    /// Serve newline-delimited requests from `input`, writing to `output`.
    pub async fn serve<R, W>(&self, input: R, output: &mut W) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(response) = self.handle_line(&line).await {
                let mut bytes = serde_json::to_vec(&response)?;
                bytes.push(b'\n');
                output.write_all(&bytes).await?;
                output.flush().await?;
            }
        }
        info!("Input closed, shutting down");
        Ok(())
    }
}
