//! Scan target definitions

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single (port, endpoint) pair to probe
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanTarget {
    port: u16,
    endpoint: String,
}

impl ScanTarget {
    /// Create a target, rejecting port 0 and normalising the endpoint path
    pub fn new(port: u16, endpoint: impl AsRef<str>) -> Result<Self> {
        if port == 0 {
            return Err(Error::InvalidTarget(String::from("port 0 is not a valid port")));
        }
        Ok(Self {
            port,
            endpoint: normalize_endpoint(endpoint.as_ref()),
        })
    }

    /// Build the full cross product of ports and endpoints, ports outermost
    pub fn cross_product(ports: &[u16], endpoints: &[String]) -> Result<Vec<Self>> {
        let mut targets = Vec::with_capacity(ports.len() * endpoints.len());
        for &port in ports {
            for endpoint in endpoints {
                targets.push(Self::new(port, endpoint)?);
            }
        }
        Ok(targets)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Render the probe URL for this target on `host`
    ///
    /// IPv6 literals are bracketed.
    pub fn url(&self, host: &str) -> String {
        if host.contains(':') && !host.starts_with('[') {
            format!("http://[{}]:{}{}", host, self.port, self.endpoint)
        } else {
            format!("http://{}:{}{}", host, self.port, self.endpoint)
        }
    }
}

impl std::fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ":{}{}", self.port, self.endpoint)
    }
}

/// Ensure an endpoint path starts with a single `/`
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
