//! Configuration management for mcpscan components

use mcpscan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ports probed when the caller does not supply a list
pub const DEFAULT_PORTS: &[u16] = &[
    // MCP and web servers
    3000, 3001, 3002, 3003, 3004, 3005, 5173, 5174, 8000, 8001, 8080, 8081, 8888, 5000, 5001,
    4000, 4001, 4200, 9000, 9001,
    // Database HTTP interfaces
    27017, 27018, 28017, 8123,
    // Development tools
    9229, 9230, 6006,
];

/// Endpoints probed on every port
pub const DEFAULT_ENDPOINTS: &[&str] = &["/sse", "/mcp", "/api/mcp", "/"];

/// Protocol version sent in the `initialize` handshake
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scan orchestration settings
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Per-request probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (MCPSCAN_ prefix)
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Merge values from an arbitrary variable source
    pub fn merge_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Scanner settings
        if let Some(val) = lookup("MCPSCAN_HOST") {
            self.scanner.host = val;
        }
        if let Some(val) = lookup("MCPSCAN_PORTS") {
            let ports: Vec<u16> = val
                .split(',')
                .filter_map(|p| p.trim().parse().ok())
                .collect();
            if !ports.is_empty() {
                self.scanner.ports = ports;
            }
        }
        if let Some(val) = lookup("MCPSCAN_ENDPOINTS") {
            let endpoints: Vec<String> = val
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            if !endpoints.is_empty() {
                self.scanner.endpoints = endpoints;
            }
        }
        if let Some(val) = lookup("MCPSCAN_BATCH_SIZE") {
            if let Ok(n) = val.parse() {
                self.scanner.batch_size = n;
            }
        }
        if let Some(val) = lookup("MCPSCAN_ENUMERATE_TOOLS") {
            self.scanner.enumerate_tools = matches!(val.as_str(), "1" | "true" | "yes");
        }

        // Probe settings
        if let Some(val) = lookup("MCPSCAN_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                self.probe.timeout_ms = n;
            }
        }

        // Logging
        if let Some(val) = lookup("MCPSCAN_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("MCPSCAN_LOG_FORMAT") {
            self.logging.format = val;
        }

        self
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.scanner.host.trim().is_empty() {
            return Err(invalid("scanner.host", "must not be empty"));
        }
        if self.scanner.batch_size == 0 {
            return Err(invalid("scanner.batch_size", "must be at least 1"));
        }
        if self.scanner.ports.contains(&0) {
            return Err(invalid("scanner.ports", "port 0 is not a valid port"));
        }
        if self.scanner.endpoints.is_empty() {
            return Err(invalid("scanner.endpoints", "at least one endpoint is required"));
        }
        if self.probe.timeout_ms == 0 || self.probe.banner_timeout_ms == 0 {
            return Err(invalid("probe.timeout_ms", "timeouts must be non-zero"));
        }
        if self.probe.body_prefix_len == 0 {
            return Err(invalid("probe.body_prefix_len", "must be non-zero"));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> Error {
    Error::InvalidConfig {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Scan orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Host every port is probed on
    #[serde(default = "default_host")]
    pub host: String,

    /// Ports to probe
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Endpoint paths tried on every port
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Ports probed concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// List tools of unauthenticated services during the scan
    #[serde(default)]
    pub enumerate_tools: bool,
}

fn default_host() -> String {
    String::from("localhost")
}

fn default_ports() -> Vec<u16> {
    DEFAULT_PORTS.to_vec()
}

fn default_endpoints() -> Vec<String> {
    DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect()
}

fn default_batch_size() -> usize {
    5
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            ports: default_ports(),
            endpoints: default_endpoints(),
            batch_size: default_batch_size(),
            enumerate_tools: false,
        }
    }
}

/// Probe request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Deadline for dialect and enumeration requests (ms)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Deadline for the plain banner fetch (ms)
    #[serde(default = "default_banner_timeout_ms")]
    pub banner_timeout_ms: u64,

    /// Characters of body kept in a probe outcome
    #[serde(default = "default_body_prefix_len")]
    pub body_prefix_len: usize,

    /// Upper bound on a JSON-RPC response body (bytes)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// User agent sent with every probe
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Protocol version sent in `initialize`
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    /// Client identity sent in `initialize`
    #[serde(default = "default_client_name")]
    pub client_name: String,

    #[serde(default = "default_client_version")]
    pub client_version: String,
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_banner_timeout_ms() -> u64 {
    2000
}

fn default_body_prefix_len() -> usize {
    500
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_user_agent() -> String {
    format!("mcpscan/{}", env!("CARGO_PKG_VERSION"))
}

fn default_protocol_version() -> String {
    String::from(DEFAULT_PROTOCOL_VERSION)
}

fn default_client_name() -> String {
    String::from("mcpscan")
}

fn default_client_version() -> String {
    String::from(env!("CARGO_PKG_VERSION"))
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            banner_timeout_ms: default_banner_timeout_ms(),
            body_prefix_len: default_body_prefix_len(),
            max_body_bytes: default_max_body_bytes(),
            user_agent: default_user_agent(),
            protocol_version: default_protocol_version(),
            client_name: default_client_name(),
            client_version: default_client_version(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("pretty")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.scanner.host = host.into();
        self
    }

    pub fn ports(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.config.scanner.ports = ports.into();
        self
    }

    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.scanner.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.scanner.batch_size = size;
        self
    }

    pub fn enumerate_tools(mut self, enabled: bool) -> Self {
        self.config.scanner.enumerate_tools = enabled;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.probe.timeout_ms = ms;
        self
    }

    pub fn banner_timeout_ms(mut self, ms: u64) -> Self {
        self.config.probe.banner_timeout_ms = ms;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
