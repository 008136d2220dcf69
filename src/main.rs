//! Polymarket MCP server entry point.

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use polymarket_mcp::config::Config;
use polymarket_mcp::error::AppError;
use polymarket_mcp::market::MarketClient;
use polymarket_mcp::metrics;
use polymarket_mcp::server::McpServer;
use polymarket_mcp::tools::ToolDispatcher;

/// Polymarket prediction market tools over MCP.
#[derive(Parser, Debug)]
#[command(name = "polymarket-mcp")]
#[command(about = "MCP server exposing Polymarket market data tools over stdio")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve MCP requests on stdin/stdout (default).
    Serve,

    /// Check configuration validity.
    CheckConfig,

    /// Run a single tool and print its text output.
    Call {
        /// Tool name, e.g. list-markets.
        tool: String,

        /// Tool arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the protocol
    let filter = if args.verbose {
        EnvFilter::new("polymarket_mcp=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    metrics::init_metrics();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Call { tool, args }) => cmd_call(&tool, &args).await,
        Some(Command::Serve) | None => cmd_serve().await,
    }
}

/// Load and validate configuration, exiting on failure.
fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load config: {}", e);
        e
    })?;
    config.validate().map_err(|e| {
        error!("Invalid config: {}", e);
        AppError::InvalidConfig(e)
    })?;
    Ok(config)
}

fn build_dispatcher(config: &Config) -> anyhow::Result<ToolDispatcher> {
    if let Some(port) = config.metrics_port {
        metrics::install_exporter(port)?;
    }
    let client = MarketClient::new(config)?;
    Ok(ToolDispatcher::new(client))
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("POLYMARKET MCP - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  API Key: {}", mask(&config.polymarket_api_key));
    println!("  Funder Address: {}", config.polymarket_funder);
    println!("  Gamma API: {}", config.polymarket_gamma_url);
    println!("  CLOB API: {}", config.polymarket_clob_url);
    println!("  HTTP Timeout: {}ms", config.http_timeout_ms);
    println!("  Price History: {}", if config.history_enabled { "Enabled" } else { "Disabled" });
    match config.metrics_port {
        Some(port) => println!("  Metrics: port {}", port),
        None => println!("  Metrics: Disabled"),
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

fn mask(secret: &str) -> String {
    let shown: String = secret.chars().take(4).collect();
    format!("{}****", shown)
}

/// Run one tool and print its output.
async fn cmd_call(tool: &str, raw_args: &str) -> anyhow::Result<()> {
    let config = load_config()?;
    let dispatcher = build_dispatcher(&config)?;

    let arguments: Value = serde_json::from_str(raw_args)
        .map_err(|e| anyhow::anyhow!("--args is not valid JSON: {}", e))?;

    let result = dispatcher.call(tool, Some(arguments)).await;
    println!("{}", result.text);

    if result.is_error {
        return Err(anyhow::anyhow!("Tool {} returned an error", tool));
    }
    Ok(())
}

/// Serve MCP over stdio until stdin closes or Ctrl+C.
async fn cmd_serve() -> anyhow::Result<()> {
    info!("Loading configuration...");
    let config = load_config()?;
    let server = McpServer::new(build_dispatcher(&config)?);

    info!(
        gamma = %config.polymarket_gamma_url,
        clob = %config.polymarket_clob_url,
        history = config.history_enabled,
        "Starting Polymarket MCP server"
    );

    tokio::select! {
        result = server.run_stdio() => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
    }

    Ok(())
}
