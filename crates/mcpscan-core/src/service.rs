//! Discovered service definitions - HTTP services that answered a dialect probe

use crate::risk::RiskLevel;
use crate::target::ScanTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protocol dialect a probed service speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Event-stream handshake with an optional session header
    EventStream,
    /// JSON-RPC 2.0 over plain HTTP POST
    StreamableRpc,
    /// Plain HTTP banner only
    PlainHttp,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::EventStream => "event_stream",
            Dialect::StreamableRpc => "streamable_rpc",
            Dialect::PlainHttp => "plain_http",
        }
    }

    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            Dialect::EventStream => "SSE",
            Dialect::StreamableRpc => "Streamable HTTP",
            Dialect::PlainHttp => "HTTP",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Server identity reported in an `initialize` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// A callable operation advertised by a `tools/list` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Opaque JSON schema, kept verbatim
    #[serde(
        rename = "inputSchema",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub input_schema: Option<serde_json::Value>,
}

/// Product guess from banner text or port convention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintMatch {
    pub name: String,
    pub description: String,
}

/// A service that answered one of the known dialect probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredService {
    pub dialect: Dialect,
    pub url: String,
    pub port: u16,
    pub endpoint: String,

    /// Session token issued by an event-stream service
    pub session_id: Option<String>,

    /// Best-effort: inferred from the session header or the RPC result/error
    /// shape, not from a verified access-control check.
    pub authenticated: bool,

    pub server_info: Option<ServerInfo>,
    pub guessed_service: String,
    pub fingerprint: Option<FingerprintMatch>,

    /// Classification from the port's service group
    pub risk: RiskLevel,
    pub category: String,

    pub tool_list: Option<Vec<ToolDescriptor>>,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredService {
    /// Create a new service builder for a target on `host`
    pub fn builder(dialect: Dialect, target: &ScanTarget, host: &str) -> DiscoveredServiceBuilder {
        DiscoveredServiceBuilder::new(dialect, target, host)
    }

    /// True when the service answered without an authentication gate
    pub fn is_exposed(&self) -> bool {
        !self.authenticated
    }

    /// Attach the port classification
    pub fn with_classification(
        mut self,
        risk: RiskLevel,
        category: impl Into<String>,
        fingerprint: Option<FingerprintMatch>,
    ) -> Self {
        self.risk = risk;
        self.category = category.into();
        self.fingerprint = fingerprint;
        self
    }

    /// Attach an enumerated tool list
    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tool_list = Some(tools);
        self
    }
}

/// Builder for constructing discovered services
pub struct DiscoveredServiceBuilder {
    service: DiscoveredService,
}

impl DiscoveredServiceBuilder {
    pub fn new(dialect: Dialect, target: &ScanTarget, host: &str) -> Self {
        Self {
            service: DiscoveredService {
                dialect,
                url: target.url(host),
                port: target.port(),
                endpoint: target.endpoint().to_string(),
                session_id: None,
                authenticated: false,
                server_info: None,
                guessed_service: String::from("Unknown Service"),
                fingerprint: None,
                risk: RiskLevel::default(),
                category: String::from("Uncategorized"),
                tool_list: None,
                discovered_at: Utc::now(),
            },
        }
    }

    pub fn session_id(mut self, session_id: Option<String>) -> Self {
        self.service.session_id = session_id;
        self
    }

    pub fn authenticated(mut self, authenticated: bool) -> Self {
        self.service.authenticated = authenticated;
        self
    }

    pub fn server_info(mut self, info: Option<ServerInfo>) -> Self {
        self.service.server_info = info;
        self
    }

    pub fn guessed_service(mut self, name: impl Into<String>) -> Self {
        self.service.guessed_service = name.into();
        self
    }

    pub fn build(self) -> DiscoveredService {
        self.service
    }
}
