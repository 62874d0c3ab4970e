//! Fingerprint catalog - service labels from port conventions and banner text
//!
//! Three static tables drive classification:
//! - a port → label map used for the `guessed_service` of every result
//! - ordered fingerprint rules matched against banner text or default port
//! - ordered service groups carrying the category and risk of a port

use mcpscan_core::{FingerprintMatch, RiskLevel};
use regex::Regex;
use tracing::debug;

/// Label returned for ports without a known convention
pub const UNKNOWN_SERVICE: &str = "Unknown Service";

/// Category of ports outside every service group
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Guess a human-readable service label from the port number
pub fn guess_service_name(port: u16) -> &'static str {
    match port {
        3000 => "React/Express/Node.js",
        3001 => "Node.js/MCP",
        3306 => "MySQL",
        4200 => "Angular",
        5000 => "Flask",
        5173 | 5174 => "Vite",
        5432 => "PostgreSQL",
        6006 => "TensorBoard",
        6379 => "Redis",
        8000 => "Python/Django",
        8080 => "Tomcat/webpack",
        8123 => "ClickHouse",
        8888 => "Jupyter Notebook",
        9000 => "PHP/Go",
        9200 => "Elasticsearch",
        9229 => "Node.js Debugger",
        27017 => "MongoDB",
        28017 => "MongoDB HTTP",
        _ => UNKNOWN_SERVICE,
    }
}

/// How a service sweep checks the ports of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Dialect detection on every group endpoint
    Dialect,
    /// Plain GET per endpoint; a 2xx answer is recorded
    Http,
    /// Plain GET on `/`; any answer is recorded
    Reachability,
}

/// A configured set of ports sharing a category and risk level
#[derive(Debug, Clone, Copy)]
pub struct ServiceGroup {
    pub key: &'static str,
    pub category: &'static str,
    pub risk: RiskLevel,
    pub ports: &'static [u16],
    /// Paths requested in a sweep; empty means `/`
    pub endpoints: &'static [&'static str],
    pub mode: SweepMode,
}

impl ServiceGroup {
    /// Endpoints a sweep requests on each port of this group
    pub fn sweep_endpoints(&self) -> Vec<String> {
        if self.endpoints.is_empty() {
            vec![String::from("/")]
        } else {
            self.endpoints.iter().map(|e| e.to_string()).collect()
        }
    }
}

/// Service groups in lookup order; the first group holding a port wins
pub const SERVICE_GROUPS: &[ServiceGroup] = &[
    ServiceGroup {
        key: "mcp",
        category: "MCP Server",
        risk: RiskLevel::High,
        ports: &[3000, 3001, 3002, 3003, 3004, 3005],
        endpoints: &["/sse", "/mcp", "/api/mcp"],
        mode: SweepMode::Dialect,
    },
    ServiceGroup {
        key: "web_servers",
        category: "Web Dev Server",
        risk: RiskLevel::Medium,
        ports: &[3000, 3001, 5000, 5173, 5174, 8000, 8080, 8081, 8888, 4200, 4000, 9000],
        endpoints: &["/"],
        mode: SweepMode::Http,
    },
    ServiceGroup {
        key: "databases",
        category: "Database",
        risk: RiskLevel::Critical,
        ports: &[27017, 27018, 27019, 6379, 6380, 5432, 5433, 3306, 3307, 9200, 9300],
        endpoints: &[],
        mode: SweepMode::Reachability,
    },
    ServiceGroup {
        key: "api_servers",
        category: "API Service",
        risk: RiskLevel::Medium,
        ports: &[8000, 8001, 8080, 8081, 9000, 9001, 4000, 4001],
        endpoints: &["/api", "/graphql", "/health", "/status", "/docs"],
        mode: SweepMode::Http,
    },
    ServiceGroup {
        key: "dev_tools",
        category: "Dev Tool",
        risk: RiskLevel::High,
        ports: &[9229, 5858, 2375, 8888, 6006, 4040],
        endpoints: &[],
        mode: SweepMode::Reachability,
    },
];

/// Find the service group a port belongs to
pub fn service_group(port: u16) -> Option<&'static ServiceGroup> {
    SERVICE_GROUPS.iter().find(|g| g.ports.contains(&port))
}

/// Risk and category for a port, with the fallback for ungrouped ports
pub fn classify_port(port: u16) -> (RiskLevel, &'static str) {
    match service_group(port) {
        Some(group) => (group.risk, group.category),
        None => (RiskLevel::Medium, UNCATEGORIZED),
    }
}

struct FingerprintRule {
    name: &'static str,
    regex: Regex,
    default_port: u16,
    description: &'static str,
}

/// Banner fingerprint matcher
pub struct FingerprintCatalog {
    rules: Vec<FingerprintRule>,
}

impl FingerprintCatalog {
    /// Create a catalog with the default rule set
    pub fn new() -> Self {
        Self {
            rules: Self::default_rules(),
        }
    }

    /// Identify a product from banner text or the probed port
    ///
    /// Rules are tried in declaration order; a rule matches when its pattern
    /// occurs anywhere in the banner or the port equals its default port.
    pub fn identify(&self, banner: &str, port: u16) -> Option<FingerprintMatch> {
        let rule = self
            .rules
            .iter()
            .find(|r| r.regex.is_match(banner) || r.default_port == port)?;

        debug!("Fingerprint {} matched on port {}", rule.name, port);
        Some(FingerprintMatch {
            name: rule.name.to_string(),
            description: rule.description.to_string(),
        })
    }

    /// Number of loaded rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn default_rules() -> Vec<FingerprintRule> {
        let table: &[(&'static str, &str, u16, &'static str)] = &[
            (
                "MongoDB",
                r"(?i)mongodb",
                27017,
                "Unauthenticated access may leak data",
            ),
            (
                "Redis",
                r"(?i)redis",
                6379,
                "Redis without a password allows remote command execution",
            ),
            (
                "PostgreSQL",
                r"(?i)postgresql",
                5432,
                "Check whether password authentication is required",
            ),
            (
                "MySQL",
                r"(?i)mysql",
                3306,
                "Make sure the root user has a password",
            ),
            (
                "Elasticsearch",
                r"(?i)elasticsearch",
                9200,
                "Elasticsearch without authentication can be read and written by anyone",
            ),
            (
                "Docker",
                r"(?i)docker",
                2375,
                "An exposed Docker API can run commands in containers",
            ),
            (
                "Vite",
                r"(?i)vite",
                5173,
                "Development server, should be off in production",
            ),
            (
                "webpack-dev-server",
                r"(?i)webpack",
                8080,
                "Development server, should be off in production",
            ),
        ];

        let mut rules = Vec::with_capacity(table.len());
        for &(name, pattern, default_port, description) in table {
            if let Ok(regex) = Regex::new(pattern) {
                rules.push(FingerprintRule {
                    name,
                    regex,
                    default_port,
                    description,
                });
            }
        }
        rules
    }
}

impl Default for FingerprintCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Combine the fields of a banner response into the text fingerprints see
pub fn banner_text(server: Option<&str>, body: Option<&str>) -> String {
    format!("{} {}", server.unwrap_or(""), body.unwrap_or("")).to_lowercase()
}
