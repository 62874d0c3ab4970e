//! Reference service binary
//!
//! Runs the unauthenticated fixture so the scanner has something to find.

use anyhow::Result;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Intentionally insecure MCP-style reference service
#[derive(Parser, Debug)]
#[command(name = "mcpscan-fixture")]
#[command(version)]
#[command(about = "Unauthenticated reference service for mcpscan", long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = mcpscan_fixture::DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    warn!("Reference service has no authentication; do not expose it");

    let addr = SocketAddr::new(args.bind, args.port);
    mcpscan_fixture::listen(addr).await?;
    Ok(())
}
