//! `caredesk serve`: run the bundled in-memory REST store

use std::net::SocketAddr;

use anyhow::{Context, Result};
use caredesk_server::{run_server, ServerConfig};
use clap::Parser;

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', default_value = "127.0.0.1:8787")]
    pub bind: SocketAddr,

    /// Allow any CORS origin instead of localhost only
    #[arg(long)]
    pub cors_permissive: bool,
}

/// Blocks until Ctrl+C or SIGTERM.
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    tracing::info!("Starting caredesk server on {}", args.bind);

    let config = ServerConfig {
        bind_addr: args.bind,
        cors_permissive: args.cors_permissive,
    };
    run_server(config).await.context("Server error")?;
    Ok(())
}
