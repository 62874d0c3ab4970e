//! Dialect detection - event-stream handshake, JSON-RPC initialize, plain banner
//!
//! Detection for a (port, endpoint) pair tries the dialects in a fixed order
//! and stops at the first match. The `authenticated` flag it reports is a
//! heuristic: a session header, or an RPC `error` without a `result`, is read
//! as an authentication gate. It is not a verified access-control check.

use crate::catalog::guess_service_name;
use crate::client::{Capture, ProbeClient, ProbeOutcome, ProbeRequest};
use crate::jsonrpc::RpcRequest;
use mcpscan_common::config::ProbeConfig;
use mcpscan_core::{Dialect, DiscoveredService, ScanTarget};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Primary session header of event-stream services
pub const SESSION_HEADER: &str = "x-session-id";

/// Alias checked when the primary session header is absent
pub const SESSION_HEADER_ALIAS: &str = "x-mcp-session";

/// Dialect detector configuration
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Host every target is probed on
    pub host: String,
    /// Deadline for each dialect attempt
    pub timeout: Duration,
    /// Deadline for the plain banner fetch
    pub banner_timeout: Duration,
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
}

impl DetectorConfig {
    pub fn new(host: impl Into<String>, probe: &ProbeConfig) -> Self {
        Self {
            host: host.into(),
            timeout: Duration::from_millis(probe.timeout_ms),
            banner_timeout: Duration::from_millis(probe.banner_timeout_ms),
            protocol_version: probe.protocol_version.clone(),
            client_name: probe.client_name.clone(),
            client_version: probe.client_version.clone(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new("localhost", &ProbeConfig::default())
    }
}

/// Tries each known dialect against a target
pub struct DialectDetector {
    client: Arc<ProbeClient>,
    config: DetectorConfig,
}

impl DialectDetector {
    pub fn new(client: Arc<ProbeClient>, config: DetectorConfig) -> Self {
        Self { client, config }
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Detect the dialect of a target, `None` if it speaks neither
    pub async fn detect(&self, target: &ScanTarget) -> Option<DiscoveredService> {
        if let Some(service) = self.try_event_stream(target).await {
            return Some(service);
        }
        self.try_streamable_rpc(target).await
    }

    /// GET with `Accept: text/event-stream`
    pub async fn try_event_stream(&self, target: &ScanTarget) -> Option<DiscoveredService> {
        let url = target.url(&self.config.host);
        let request = ProbeRequest::get(&url)
            .header("Accept", "text/event-stream")
            .timeout(self.config.timeout);

        let outcome = self.client.probe(request).await;
        if !(outcome.succeeded && outcome.is_event_stream()) {
            return None;
        }

        let session_id = session_id(&outcome);
        // No session means no gate was enforced on the stream
        let authenticated = session_id.is_some();
        debug!("Event-stream service at {} (session: {:?})", url, session_id);

        Some(
            DiscoveredService::builder(Dialect::EventStream, target, &self.config.host)
                .session_id(session_id)
                .authenticated(authenticated)
                .guessed_service(guess_service_name(target.port()))
                .build(),
        )
    }

    /// POST a JSON-RPC `initialize`
    pub async fn try_streamable_rpc(&self, target: &ScanTarget) -> Option<DiscoveredService> {
        let url = target.url(&self.config.host);
        let body = RpcRequest::initialize(
            &self.config.protocol_version,
            &self.config.client_name,
            &self.config.client_version,
        )
        .to_body();
        let request = ProbeRequest::post_json(&url, body).timeout(self.config.timeout);

        let outcome = self.client.probe(request).await;
        if !outcome.succeeded {
            return None;
        }
        let envelope = outcome.envelope.filter(|e| e.is_envelope())?;

        // A result means the server answered without asking for a credential;
        // an error alone is read as a rejection
        let authenticated = envelope.result.is_none();
        let server_info = envelope.server_info();
        debug!(
            "JSON-RPC service at {} (authenticated: {}, server: {:?})",
            url, authenticated, server_info
        );

        Some(
            DiscoveredService::builder(Dialect::StreamableRpc, target, &self.config.host)
                .authenticated(authenticated)
                .server_info(server_info)
                .guessed_service(guess_service_name(target.port()))
                .build(),
        )
    }

    /// Plain GET used only as fingerprint input; never yields a service
    pub async fn fetch_banner(&self, target: &ScanTarget) -> ProbeOutcome {
        let request = ProbeRequest::get(target.url(&self.config.host))
            .timeout(self.config.banner_timeout)
            .capture(Capture::Banner);
        self.client.probe(request).await
    }
}

fn session_id(outcome: &ProbeOutcome) -> Option<String> {
    outcome
        .header(SESSION_HEADER)
        .or_else(|| outcome.header(SESSION_HEADER_ALIAS))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::HeaderName;
    use axum::routing::{get, post};
    use axum::Router;
    use mcpscan_fixture::serve;
    use std::net::SocketAddr;

    fn detector() -> DialectDetector {
        let probe = ProbeConfig {
            timeout_ms: 1000,
            ..ProbeConfig::default()
        };
        let client = Arc::new(ProbeClient::new(&probe).unwrap());
        DialectDetector::new(client, DetectorConfig::new("127.0.0.1", &probe))
    }

    fn target(addr: SocketAddr, endpoint: &str) -> ScanTarget {
        ScanTarget::new(addr.port(), endpoint).unwrap()
    }

    fn rpc_app(body: &'static str) -> Router {
        Router::new().route(
            "/mcp",
            post(move || async move { ([(CONTENT_TYPE, "application/json")], body) }),
        )
    }

    #[tokio::test]
    async fn test_event_stream_without_session_is_unauthenticated() {
        let app = Router::new().route(
            "/sse",
            get(|| async { ([(CONTENT_TYPE, "text/event-stream")], "data: {}\n\n") }),
        );
        let addr = serve(app).await.unwrap();

        let service = detector().detect(&target(addr, "/sse")).await.unwrap();
        assert_eq!(service.dialect, Dialect::EventStream);
        assert!(service.session_id.is_none());
        assert!(!service.authenticated);
    }

    #[tokio::test]
    async fn test_event_stream_with_session_is_authenticated() {
        let app = Router::new().route(
            "/sse",
            get(|| async {
                let session = HeaderName::from_static("x-mcp-session");
                (
                    [(CONTENT_TYPE, "text/event-stream"), (session, "abc123")],
                    "data: {}\n\n",
                )
            }),
        );
        let addr = serve(app).await.unwrap();

        let service = detector().detect(&target(addr, "/sse")).await.unwrap();
        assert_eq!(service.session_id.as_deref(), Some("abc123"));
        assert!(service.authenticated);
    }

    #[tokio::test]
    async fn test_rpc_result_is_unauthenticated() {
        let addr = serve(rpc_app(
            r#"{"jsonrpc":"2.0","result":{"serverInfo":{"name":"demo","version":"2.1"}},"id":1}"#,
        ))
        .await
        .unwrap();

        let service = detector().detect(&target(addr, "/mcp")).await.unwrap();
        assert_eq!(service.dialect, Dialect::StreamableRpc);
        assert!(!service.authenticated);
        assert_eq!(service.server_info.unwrap().name, "demo");
    }

    #[tokio::test]
    async fn test_rpc_error_is_authenticated() {
        let addr = serve(rpc_app(
            r#"{"jsonrpc":"2.0","error":{"code":-32001,"message":"Unauthorized"},"id":1}"#,
        ))
        .await
        .unwrap();

        let service = detector().detect(&target(addr, "/mcp")).await.unwrap();
        assert_eq!(service.dialect, Dialect::StreamableRpc);
        assert!(service.authenticated);
        assert!(service.server_info.is_none());
    }

    #[tokio::test]
    async fn test_json_without_result_or_error_is_ignored() {
        let addr = serve(rpc_app(r#"{"status":"ok"}"#)).await.unwrap();
        assert!(detector().detect(&target(addr, "/mcp")).await.is_none());

        let addr = serve(rpc_app("not json at all")).await.unwrap();
        assert!(detector().detect(&target(addr, "/mcp")).await.is_none());
    }

    #[tokio::test]
    async fn test_plain_html_is_ignored() {
        let app = Router::new().route(
            "/",
            get(|| async { "<html>Vite</html>" }).post(|| async { "<html>" }),
        );
        let addr = serve(app).await.unwrap();

        let detector = detector();
        let root = target(addr, "/");
        assert!(detector.detect(&root).await.is_none());

        let banner = detector.fetch_banner(&root).await;
        assert!(banner.succeeded);
        assert_eq!(banner.body_prefix.as_deref(), Some("<html>Vite</html>"));
    }
}
