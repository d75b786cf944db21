//! mail-ews-mcp-rs: Exchange Web Services MCP server
//!
//! This server provides read/write access to an Exchange mailbox via the
//! Model Context Protocol (MCP). It speaks EWS SOAP over HTTPS, renders
//! Markdown bodies to inline-styled HTML, and guards write tools with a
//! bounded idempotency ledger.
//!
//! # Architecture
//!
//! - [`main`]: Process entry point with transport selection (stdio or HTTP)
//! - [`config`]: Environment-driven configuration for the EWS account
//! - [`errors`]: Application error model with MCP error mapping
//! - [`ews`]: EWS transport and mailbox operations over SOAP
//! - [`soap`]: Envelope construction and response parsing
//! - [`server`]: MCP tool handlers with validation and business orchestration
//! - [`models`]: Input/output DTOs and schema-bearing types
//! - [`render`]: Markdown-to-styled-HTML body rendering pipeline
//! - [`content`]: HTML-to-text and attachment text extraction
//! - [`idempotency`]: Bounded write-deduplication ledger

mod config;
mod content;
mod errors;
mod ews;
mod idempotency;
mod models;
mod render;
mod server;
mod soap;

use clap::{Parser, ValueEnum};
use config::ServerConfig;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use tracing_subscriber::EnvFilter;

/// Command-line options
///
/// Everything account-related comes from the environment; the CLI only
/// selects how the server is exposed.
#[derive(Debug, Parser)]
#[command(name = "mail-ews-mcp-rs", version, about = "Exchange Web Services MCP server")]
struct Cli {
    /// Transport to serve MCP over
    #[arg(long, value_enum, env = "MAIL_EWS_TRANSPORT", default_value = "stdio")]
    transport: Transport,
    /// Bind address for the HTTP transport
    #[arg(long, env = "MAIL_EWS_HTTP_BIND", default_value = "127.0.0.1:8123")]
    bind: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    /// Serve over stdin/stdout (for MCP clients that spawn the process)
    Stdio,
    /// Serve over streamable HTTP at `/mcp`
    Http,
}

/// Application entry point
///
/// Initializes tracing from environment, loads config, and serves the MCP
/// server over the selected transport.
///
/// # Environment Variables
///
/// See [`ServerConfig::load_from_env`] for full configuration options.
///
/// # Example
///
/// ```no_run
/// MAIL_EWS_ENDPOINT=https://mail.example.com/EWS/Exchange.asmx \
/// MAIL_EWS_USERNAME=user@example.com \
/// MAIL_EWS_PASSWORD=secret \
/// cargo run
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load_from_env()?;

    match cli.transport {
        Transport::Stdio => {
            let service = server::MailEwsServer::new(config)?.serve(stdio()).await?;
            service.waiting().await?;
        }
        Transport::Http => serve_http(config, &cli.bind).await?,
    }
    Ok(())
}

/// Serve MCP over streamable HTTP with graceful shutdown on Ctrl-C
async fn serve_http(
    config: ServerConfig,
    bind: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = StreamableHttpService::new(
        move || server::MailEwsServer::new(config.clone()).map_err(std::io::Error::other),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(bind, "serving MCP over streamable HTTP");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
