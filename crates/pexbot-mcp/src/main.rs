//! `pexbot-mcp` binary: serves pex.bot tools over stdio.
//!
//! Configure with `PEXBOT_*` environment variables; see `config.rs`.

use anyhow::Context;
use clap::Parser;
use pexbot_mcp::config::Config;
use pexbot_mcp::logging::{self, LogFormat};
use pexbot_mcp::{AuthMode, PexbotClient, PexbotServer};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pexbot-mcp", version, about = "pex.bot trading simulation MCP server (stdio)")]
struct Cli {
    /// API base URL (overrides PEXBOT_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Log format: pretty, json, or compact (overrides PEXBOT_LOG_FORMAT)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(url) = cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    logging::init(config.log_format);

    if let Some(missing) = config.login_missing {
        warn!("Auto-login disabled: {missing} is not set (PEXBOT_EMAIL and PEXBOT_PASSWORD must both be set)");
    }

    let client = PexbotClient::new(&config).context("failed to build HTTP client")?;
    match client.auth().mode().await {
        AuthMode::ApiKey => info!("Using API key authentication"),
        AuthMode::SessionToken => info!("Using session token authentication (fallback)"),
        AuthMode::AutoLogin => info!("Will log in with PEXBOT_EMAIL on first authenticated call"),
        AuthMode::None => warn!(
            "No auth credentials found. Set PEXBOT_API_KEY or PEXBOT_TOKEN, or call the register tool."
        ),
    }
    info!(api_url = %config.api_url, "Server running on stdio");

    let server = Arc::new(PexbotServer::new(client));
    server
        .serve_stdio()
        .await
        .context("stdio transport failed")?;

    info!("stdin closed; shutting down");
    Ok(())
}
