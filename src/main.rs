//! ftp-engine server - Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;

use ftp_engine::{Server, ServerConfig};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "ftp-engine", about = "A small FTP server with passive-mode transfers.")]
struct Cli {
    /// Path to the configuration file (defaults to ./config.toml if present)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the control port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // RUST_LOG overrides the default filter
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = args.port {
        config.control_port = port;
    }

    info!("Launching FTP server...");
    let server = Server::bind(&config)
        .await
        .context("failed to start server")?;
    server.run().await.context("server stopped")?;

    Ok(())
}
