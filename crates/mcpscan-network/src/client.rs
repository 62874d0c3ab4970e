//! Probe client - one timed HTTP request per call, failures folded into the outcome

use crate::jsonrpc::RpcResponse;
use mcpscan_common::config::ProbeConfig;
use mcpscan_core::{Error, Result};
use reqwest::{header, Client, Method, Response};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::trace;

/// Why a probe produced no HTTP response
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProbeFailure {
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),
}

/// How much of the response body a probe reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capture {
    /// Status and headers only, the body is never read
    #[default]
    Headers,
    /// A bounded text prefix of the body
    Banner,
    /// The body up to the byte cap, decoded as a JSON-RPC response
    Envelope,
}

/// A single HTTP request to issue
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
    pub capture: Capture,
}

impl ProbeRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            capture: Capture::Headers,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// POST a JSON body and decode the reply as a JSON-RPC envelope
    pub fn post_json(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
            .header(header::CONTENT_TYPE.as_str(), "application/json")
            .body(body)
            .capture(Capture::Envelope)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn capture(mut self, capture: Capture) -> Self {
        self.capture = capture;
        self
    }
}

/// Normalised result of one HTTP attempt
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeOutcome {
    /// An HTTP response with a 2xx status arrived
    pub succeeded: bool,
    /// Any HTTP response arrived
    pub reachable: bool,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub server: Option<String>,
    pub body_prefix: Option<String>,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
    pub envelope: Option<RpcResponse>,
    pub failure: Option<ProbeFailure>,
    pub elapsed_ms: u64,
}

impl ProbeOutcome {
    fn failed(failure: ProbeFailure, elapsed_ms: u64) -> Self {
        Self {
            failure: Some(failure),
            elapsed_ms,
            ..Self::default()
        }
    }

    /// Get header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.as_str())
    }

    /// Check if the content type declares an event stream
    pub fn is_event_stream(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_lowercase().contains("text/event-stream"))
            .unwrap_or(false)
    }
}

/// HTTP client used for every probe
pub struct ProbeClient {
    client: Client,
    default_timeout: Duration,
    body_prefix_len: usize,
    max_body_bytes: usize,
}

impl ProbeClient {
    /// Create a probe client from the `[probe]` configuration
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_millis(config.timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            // Probes target local ports; never route them through a proxy
            .no_proxy()
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            default_timeout: Duration::from_millis(config.timeout_ms),
            body_prefix_len: config.body_prefix_len,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Issue exactly one request and normalise the result
    ///
    /// Never returns an error: refused connections, DNS and TLS failures and
    /// timeouts all come back as `succeeded = false, reachable = false`.
    pub async fn probe(&self, request: ProbeRequest) -> ProbeOutcome {
        let start = Instant::now();
        let limit = request.timeout.unwrap_or(self.default_timeout);
        let deadline = start + limit;
        let limit_ms = limit.as_millis() as u64;

        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let mut response = match timeout_at(deadline, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let failure = if e.is_timeout() {
                    ProbeFailure::Timeout(limit_ms)
                } else if e.is_connect() {
                    ProbeFailure::Connect(e.to_string())
                } else {
                    ProbeFailure::Request(e.to_string())
                };
                trace!("{} {} failed: {}", request.method, request.url, failure);
                return ProbeOutcome::failed(failure, elapsed_ms(start));
            }
            Err(_) => {
                trace!("{} {} timed out after {}ms", request.method, request.url, limit_ms);
                return ProbeOutcome::failed(ProbeFailure::Timeout(limit_ms), elapsed_ms(start));
            }
        };

        let status = response.status();
        let headers = collect_headers(&response);
        let content_type = headers.get("content-type").cloned();
        let server = headers.get("server").cloned();
        let streaming = content_type
            .as_deref()
            .map(|ct| ct.to_lowercase().contains("text/event-stream"))
            .unwrap_or(false);

        let mut body_prefix = None;
        let mut envelope = None;
        match request.capture {
            Capture::Headers => {}
            Capture::Banner => {
                let cap = self.body_prefix_len.saturating_mul(4);
                let raw = read_body(&mut response, deadline, cap, streaming).await;
                body_prefix = Some(truncate_chars(&String::from_utf8_lossy(&raw), self.body_prefix_len));
            }
            Capture::Envelope => {
                let raw = read_body(&mut response, deadline, self.max_body_bytes, streaming).await;
                envelope = RpcResponse::parse(&raw);
                body_prefix = Some(truncate_chars(&String::from_utf8_lossy(&raw), self.body_prefix_len));
            }
        }

        trace!("{} {} -> {}", request.method, request.url, status.as_u16());

        ProbeOutcome {
            succeeded: status.is_success(),
            reachable: true,
            status: Some(status.as_u16()),
            content_type,
            server,
            body_prefix,
            headers,
            envelope,
            failure: None,
            elapsed_ms: elapsed_ms(start),
        }
    }
}

fn collect_headers(response: &Response) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for (name, value) in response.headers() {
        if let Ok(v) = value.to_str() {
            headers.insert(name.as_str().to_lowercase(), v.to_string());
        }
    }
    headers
}

/// Read up to `cap` bytes before `deadline`, keeping whatever arrived in time
///
/// Event streams never end, so only their first chunk is read.
async fn read_body(response: &mut Response, deadline: Instant, cap: usize, streaming: bool) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = timeout_at(deadline, read_chunks(response, &mut buf, cap, streaming)).await;
    buf.truncate(cap);
    buf
}

async fn read_chunks(
    response: &mut Response,
    buf: &mut Vec<u8>,
    cap: usize,
    streaming: bool,
) -> std::result::Result<(), reqwest::Error> {
    while buf.len() < cap {
        match response.chunk().await? {
            Some(chunk) => buf.extend_from_slice(&chunk),
            None => break,
        }
        if streaming {
            break;
        }
    }
    Ok(())
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
