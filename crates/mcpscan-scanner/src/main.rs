//! mcpscan - local MCP service discovery
//!
//! Command line front end: loads configuration, runs one scan and renders
//! the report.

use anyhow::{bail, Context, Result};
use clap::Parser;
use mcpscan_common::logging::{init_logging, LogConfig, LogFormat};
use mcpscan_common::Config;
use mcpscan_core::{Error, ScanReport};
use mcpscan_network::Scanner;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "mcpscan.toml";

/// Discover MCP servers and other HTTP services listening on local ports
#[derive(Parser, Debug)]
#[command(name = "mcpscan")]
#[command(version)]
#[command(about = "Local MCP service discovery scanner", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json, compact); overrides config
    #[arg(long)]
    log_format: Option<String>,

    /// Host to probe
    #[arg(long)]
    host: Option<String>,

    /// Ports to probe, e.g. "3000-3005,8080"
    #[arg(short, long)]
    ports: Option<String>,

    /// Endpoints to probe on every port, comma separated
    #[arg(short, long)]
    endpoints: Option<String>,

    /// Ports probed concurrently
    #[arg(long)]
    batch_size: Option<usize>,

    /// List tools of every unauthenticated service found
    #[arg(long)]
    tools: bool,

    /// Sweep every built-in service group on its own endpoints
    /// instead of the configured ports × endpoints
    #[arg(long, conflicts_with_all = ["ports", "endpoints"])]
    all_services: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let mut log_config = LogConfig::from_settings(&config.logging);
    if let Some(level) = &args.log_level {
        log_config = log_config.level(level.as_str());
    }
    if let Some(format) = &args.log_format {
        log_config = log_config.format(LogFormat::from_name(format));
    }
    init_logging(log_config);

    info!("mcpscan {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.scanner.host,
        ports = config.scanner.ports.len(),
        endpoints = config.scanner.endpoints.len(),
        "Scan plan"
    );

    let scanner = Arc::new(Scanner::new(&config).map_err(coded)?);

    let observer = scanner.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(500));
        loop {
            interval.tick().await;
            let progress = observer.progress();
            if progress.total > 0 {
                info!(
                    current = progress.current,
                    total = progress.total,
                    "Progress {}%",
                    progress.percentage
                );
            }
        }
    });

    let result = if args.all_services {
        info!("Sweeping all service groups");
        scanner.scan_all_services().await
    } else {
        scanner
            .run_scan(&config.scanner.ports, &config.scanner.endpoints)
            .await
    };
    ticker.abort();
    let report = result.map_err(coded)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .map_err(coded)
            .with_context(|| format!("loading {}", path))?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::from_file(DEFAULT_CONFIG_PATH).map_err(coded)?
        }
        None => Config::default(),
    };
    config = config.merge_env();

    if let Some(host) = &args.host {
        config.scanner.host = host.clone();
    }
    if let Some(spec) = &args.ports {
        config.scanner.ports = parse_ports(spec)?;
    }
    if let Some(list) = &args.endpoints {
        config.scanner.endpoints = list
            .split(',')
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
    }
    if let Some(size) = args.batch_size {
        config.scanner.batch_size = size;
    }
    if args.tools {
        config.scanner.enumerate_tools = true;
    }

    config.validate().map_err(coded)?;
    Ok(config)
}

/// Prefix engine errors with their stable code
fn coded(e: Error) -> anyhow::Error {
    let code = e.code();
    anyhow::Error::new(e).context(code)
}

/// Parse "80,443,8000-8010" keeping first-seen order
fn parse_ports(spec: &str) -> Result<Vec<u16>> {
    let mut ports = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (a.trim().parse::<u16>()?, b.trim().parse::<u16>()?),
            None => {
                let p = part.parse::<u16>()?;
                (p, p)
            }
        };
        if start == 0 || start > end {
            bail!("invalid port range: {}", part);
        }

        for port in start..=end {
            if !ports.contains(&port) {
                ports.push(port);
            }
        }
    }

    if ports.is_empty() {
        bail!("no ports in \"{}\"", spec);
    }
    Ok(ports)
}

fn print_summary(report: &ScanReport) {
    println!("Scan {} at {}", report.scan_id, report.timestamp.to_rfc3339());

    if report.is_empty() {
        println!("No services found");
        return;
    }

    println!(
        "Found {} service(s), {} without authentication",
        report.total_found,
        report.exposed_count()
    );
    for (risk, count) in report.counts_by_risk.iter().rev() {
        println!("  {:<8} {}", risk, count);
    }
    println!();

    for service in &report.services {
        let auth = if service.authenticated { "auth" } else { "OPEN" };
        println!(
            "[{}] {} {} ({}, {}, risk {})",
            auth,
            service.url,
            service.dialect.label(),
            service.guessed_service,
            service.category,
            service.risk
        );
        if let Some(info) = &service.server_info {
            println!("    server: {} {}", info.name, info.version);
        }
        if let Some(fingerprint) = &service.fingerprint {
            println!("    fingerprint: {} ({})", fingerprint.name, fingerprint.description);
        }
        if let Some(session) = &service.session_id {
            println!("    session: {}", session);
        }
        if let Some(tools) = &service.tool_list {
            println!("    tools ({}):", tools.len());
            for tool in tools {
                println!(
                    "      - {}: {}",
                    tool.name,
                    tool.description.as_deref().unwrap_or("")
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ports() {
        assert_eq!(parse_ports("8080").unwrap(), vec![8080]);
        assert_eq!(parse_ports("3001, 3000-3002").unwrap(), vec![3001, 3000, 3002]);
        assert_eq!(parse_ports("8000-8002,,80").unwrap(), vec![8000, 8001, 8002, 80]);
    }

    #[test]
    fn test_engine_errors_carry_code() {
        let err = coded(Error::InvalidConfig {
            key: String::from("scanner.batch_size"),
            message: String::from("must be at least 1"),
        });
        assert_eq!(err.to_string(), "INVALID_CONFIG");
        assert!(format!("{:#}", err).contains("scanner.batch_size"));
    }

    #[test]
    fn test_all_services_conflicts_with_ports() {
        assert!(Args::try_parse_from(["mcpscan", "--all-services"]).is_ok());
        assert!(Args::try_parse_from(["mcpscan", "--all-services", "-p", "3001"]).is_err());
    }

    #[test]
    fn test_parse_ports_rejects_bad_input() {
        assert!(parse_ports("0").is_err());
        assert!(parse_ports("90-80").is_err());
        assert!(parse_ports("http").is_err());
        assert!(parse_ports("70000").is_err());
        assert!(parse_ports(" , ").is_err());
    }
}
