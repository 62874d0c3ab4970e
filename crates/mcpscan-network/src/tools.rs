//! Tool enumeration - `tools/list` against an already-detected service

use crate::client::{ProbeClient, ProbeRequest};
use crate::dialect::SESSION_HEADER;
use crate::jsonrpc::RpcRequest;
use mcpscan_core::{Dialect, DiscoveredService, Error, Result, ToolDescriptor};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Lists the callable operations of a discovered service
///
/// Unlike detection, failures here are surfaced: the caller has already
/// committed to showing the service and must tell "no tools" apart from
/// "enumeration failed".
pub struct ToolEnumerator {
    client: Arc<ProbeClient>,
    timeout: Duration,
}

impl ToolEnumerator {
    pub fn new(client: Arc<ProbeClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetch `result.tools` using the transport of the service's dialect
    pub async fn list_tools(&self, service: &DiscoveredService) -> Result<Vec<ToolDescriptor>> {
        let url = enumeration_url(service)?;
        let mut request = ProbeRequest::post_json(&url, RpcRequest::tools_list().to_body())
            .timeout(self.timeout);
        if service.dialect == Dialect::EventStream {
            if let Some(session_id) = &service.session_id {
                request = request.header(SESSION_HEADER, session_id.as_str());
            }
        }

        let outcome = self.client.probe(request).await;
        if !outcome.reachable {
            let reason = outcome
                .failure
                .map(|f| f.to_string())
                .unwrap_or_else(|| String::from("no response"));
            return Err(Error::EnumerationFailed { url, reason });
        }
        if !outcome.succeeded {
            return Err(Error::EnumerationStatus {
                url,
                status: outcome.status.unwrap_or_default(),
            });
        }

        let envelope = match outcome.envelope {
            Some(envelope) if envelope.is_envelope() => envelope,
            _ => {
                return Err(Error::MalformedResponse {
                    url,
                    message: String::from("body is not a JSON-RPC 2.0 envelope"),
                })
            }
        };
        if envelope.result.is_none() {
            return Err(Error::Rpc {
                url,
                code: envelope.error_code(),
                message: envelope.error_message(),
            });
        }

        let tools = envelope.tools().map_err(|e| Error::MalformedResponse {
            url: url.clone(),
            message: format!("invalid tools list: {}", e),
        })?;
        debug!("{} tool(s) listed at {}", tools.len(), url);
        Ok(tools)
    }
}

/// Where `tools/list` is posted for a service
///
/// Event-stream services take follow-up requests on the session-scoped
/// `messages` sub-path; JSON-RPC services take them on their own URL.
pub fn enumeration_url(service: &DiscoveredService) -> Result<String> {
    match service.dialect {
        Dialect::EventStream => Ok(format!("{}/messages", service.url.trim_end_matches('/'))),
        Dialect::StreamableRpc => Ok(service.url.clone()),
        Dialect::PlainHttp => Err(Error::UnsupportedDialect {
            dialect: service.dialect.to_string(),
        }),
    }
}
