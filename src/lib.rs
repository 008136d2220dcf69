//! Polymarket prediction market tools served over MCP.
//!
//! Exposes four read-only tools to an MCP client over stdio:
//!
//! ```text
//! get-market-info     full detail block for one market
//! list-markets        filtered, paginated market listing
//! get-market-prices   outcome prices and implied probabilities
//! get-market-history  price series for the first outcome
//! ```
//!
//! Lookups go to the Gamma API first and fall back to the CLOB API when
//! Gamma is unreachable, broken or empty. Both payload shapes normalize to
//! the same [`market::MarketRecord`], so the rendered text does not depend
//! on which API answered.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Error types for config, transport, normalization and tools
//! - [`market`]: Upstream requests, normalization and fallback
//! - [`format`]: Plain-text rendering of records and errors
//! - [`tools`]: Argument validation and tool dispatch
//! - [`server`]: MCP JSON-RPC over stdio
//! - [`metrics`]: Prometheus counters and latency histograms

pub mod config;
pub mod error;
pub mod format;
pub mod market;
pub mod metrics;
pub mod server;
pub mod tools;

pub use config::Config;
pub use error::{AppError, Result};
