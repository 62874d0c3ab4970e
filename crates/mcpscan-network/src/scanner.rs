//! Scan orchestration - batched port probing with progress tracking
//!
//! A scan walks a port list in fixed-size batches. Batches run one after the
//! other; within a batch every port gets its own task, and each port task
//! walks the endpoint list in order. This caps the number of in-flight
//! requests at the batch size while still overlapping slow targets.
//!
//! A service sweep plans the same way from the service groups instead: each
//! group's ports are checked on the group's own endpoints and reported with
//! the group's category and risk.

use crate::catalog::{
    banner_text, classify_port, guess_service_name, FingerprintCatalog, ServiceGroup,
    SweepMode, SERVICE_GROUPS,
};
use crate::client::ProbeClient;
use crate::dialect::{DetectorConfig, DialectDetector};
use crate::tools::ToolEnumerator;
use futures::future::join_all;
use mcpscan_common::config::ScannerConfig;
use mcpscan_common::Config;
use mcpscan_core::{
    Dialect, DiscoveredService, Error, Result, RiskLevel, ScanReport, ScanTarget, ToolDescriptor,
};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Progress counter of one scan run
///
/// `total` is fixed when the run is planned and `current` only grows, so a
/// snapshot can never show more completed ports than planned.
#[derive(Debug)]
pub struct ScanProgress {
    current: AtomicUsize,
    total: usize,
}

impl ScanProgress {
    pub fn new(total: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            total,
        }
    }

    fn advance(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }

    /// Point-in-time view; never blocks
    pub fn snapshot(&self) -> ProgressSnapshot {
        let current = self.current.load(Ordering::SeqCst).min(self.total);
        ProgressSnapshot::new(current, self.total)
    }
}

/// Progress as seen by an observer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub current: usize,
    pub total: usize,
    /// Rounded; 0 when nothing is planned
    pub percentage: u8,
}

impl ProgressSnapshot {
    pub fn new(current: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((current * 100 + total / 2) / total).min(100) as u8
        };
        Self {
            current,
            total,
            percentage,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.current == self.total
    }
}

/// Result of an on-demand tool listing, shaped for an external caller
#[derive(Debug, Clone, Serialize)]
pub struct ToolsOutcome {
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Vec<ToolDescriptor>>> for ToolsOutcome {
    fn from(result: Result<Vec<ToolDescriptor>>) -> Self {
        match result {
            Ok(tools) => Self {
                succeeded: true,
                tools: Some(tools),
                error: None,
            },
            Err(e) => Self {
                succeeded: false,
                tools: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Probe components shared by every session
#[derive(Clone)]
pub struct ScanEngine {
    detector: Arc<DialectDetector>,
    enumerator: Arc<ToolEnumerator>,
    catalog: Arc<FingerprintCatalog>,
}

impl ScanEngine {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Arc::new(ProbeClient::new(&config.probe)?);
        let detector = DialectDetector::new(
            client.clone(),
            DetectorConfig::new(config.scanner.host.clone(), &config.probe),
        );
        let enumerator =
            ToolEnumerator::new(client, Duration::from_millis(config.probe.timeout_ms));

        Ok(Self {
            detector: Arc::new(detector),
            enumerator: Arc::new(enumerator),
            catalog: Arc::new(FingerprintCatalog::new()),
        })
    }
}

/// Targets of one port, in configured endpoint order
#[derive(Debug, Clone)]
struct PortPlan {
    index: usize,
    port: u16,
    targets: Vec<ScanTarget>,
    mode: SweepMode,
    /// Fixed classification; `None` classifies by the port's first group
    class: Option<(RiskLevel, &'static str)>,
}

struct Found {
    port_index: usize,
    endpoint_index: usize,
    service: DiscoveredService,
}

/// One scan run, created fresh for every scan
pub struct ScanSession {
    id: Uuid,
    engine: ScanEngine,
    plans: Vec<PortPlan>,
    batch_size: usize,
    enumerate_tools: bool,
    progress: Arc<ScanProgress>,
    found: Arc<Mutex<Vec<Found>>>,
}

impl ScanSession {
    /// Plan a run over `ports` × `endpoints`
    ///
    /// Duplicate ports are probed once, at their first position.
    pub fn new(
        engine: ScanEngine,
        ports: &[u16],
        endpoints: &[String],
        batch_size: usize,
        enumerate_tools: bool,
    ) -> Result<Self> {
        let mut plans: Vec<PortPlan> = Vec::with_capacity(ports.len());
        for &port in ports {
            if plans.iter().any(|p| p.port == port) {
                continue;
            }
            plans.push(PortPlan {
                index: plans.len(),
                port,
                targets: ScanTarget::cross_product(&[port], endpoints)?,
                mode: SweepMode::Dialect,
                class: None,
            });
        }
        Self::from_plans(engine, plans, batch_size, enumerate_tools)
    }

    /// Plan a sweep over every port of every group, each with its own endpoints
    ///
    /// A port listed in two groups is checked once per group and reported
    /// with that group's category and risk.
    pub fn for_groups(
        engine: ScanEngine,
        groups: &[ServiceGroup],
        batch_size: usize,
        enumerate_tools: bool,
    ) -> Result<Self> {
        let mut plans = Vec::new();
        for group in groups {
            let endpoints = group.sweep_endpoints();
            for &port in group.ports {
                plans.push(PortPlan {
                    index: plans.len(),
                    port,
                    targets: ScanTarget::cross_product(&[port], &endpoints)?,
                    mode: group.mode,
                    class: Some((group.risk, group.category)),
                });
            }
        }
        Self::from_plans(engine, plans, batch_size, enumerate_tools)
    }

    fn from_plans(
        engine: ScanEngine,
        plans: Vec<PortPlan>,
        batch_size: usize,
        enumerate_tools: bool,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig {
                key: String::from("scanner.batch_size"),
                message: String::from("must be at least 1"),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            engine,
            progress: Arc::new(ScanProgress::new(plans.len())),
            plans,
            batch_size,
            enumerate_tools,
            found: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Handle for observers; stays valid after the run ends
    pub fn progress(&self) -> Arc<ScanProgress> {
        self.progress.clone()
    }

    /// Ports in planned order, one entry per planned port task
    pub fn ports(&self) -> Vec<u16> {
        self.plans.iter().map(|p| p.port).collect()
    }

    pub fn batch_count(&self) -> usize {
        self.plans.len().div_ceil(self.batch_size)
    }

    /// Run every batch to completion and build the report
    pub async fn run(self) -> ScanReport {
        info!(
            scan_id = %self.id,
            ports = self.plans.len(),
            batches = self.batch_count(),
            "Starting scan"
        );

        for (batch_index, batch) in self.plans.chunks(self.batch_size).enumerate() {
            debug!("Batch {} ({} ports)", batch_index, batch.len());
            let mut handles = Vec::with_capacity(batch.len());

            for plan in batch {
                let task = PortTask {
                    engine: self.engine.clone(),
                    plan: plan.clone(),
                    enumerate_tools: self.enumerate_tools,
                    found: self.found.clone(),
                    progress: self.progress.clone(),
                };
                handles.push(tokio::spawn(task.run()));
            }

            for joined in join_all(handles).await {
                if let Err(e) = joined {
                    warn!("Port task failed: {}", e);
                }
            }
        }

        let mut found = {
            let mut guard = self.found.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        found.sort_by_key(|f| (f.port_index, f.endpoint_index));

        let services: Vec<DiscoveredService> = found.into_iter().map(|f| f.service).collect();
        let report = ScanReport::from_services(self.id, services);

        info!(
            scan_id = %self.id,
            found = report.total_found,
            exposed = report.exposed_count(),
            "Scan complete"
        );
        report
    }
}

struct PortTask {
    engine: ScanEngine,
    plan: PortPlan,
    enumerate_tools: bool,
    found: Arc<Mutex<Vec<Found>>>,
    progress: Arc<ScanProgress>,
}

impl PortTask {
    async fn run(self) {
        let port = self.plan.port;
        let found = match self.plan.mode {
            SweepMode::Dialect => self.detect_dialects().await,
            SweepMode::Http => self.fetch_pages(false).await,
            SweepMode::Reachability => self.fetch_pages(true).await,
        };

        for (endpoint_index, mut service) in found {
            let listable = service.dialect != Dialect::PlainHttp && service.is_exposed();
            if self.enumerate_tools && listable {
                match self.engine.enumerator.list_tools(&service).await {
                    Ok(tools) => service = service.with_tools(tools),
                    Err(e) => warn!("Tool enumeration failed for {}: {}", service.url, e),
                }
            }

            info!(
                port,
                endpoint = %service.endpoint,
                dialect = %service.dialect,
                authenticated = service.authenticated,
                "Discovered service"
            );

            // Only the append happens under the lock
            self.found
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(Found {
                    port_index: self.plan.index,
                    endpoint_index,
                    service,
                });
        }

        self.progress.advance();
    }

    fn classification(&self) -> (RiskLevel, &'static str) {
        self.plan
            .class
            .unwrap_or_else(|| classify_port(self.plan.port))
    }

    /// Dialect detection per endpoint; the first endpoint's banner labels all hits
    async fn detect_dialects(&self) -> Vec<(usize, DiscoveredService)> {
        let mut detected = Vec::new();
        let mut banner = String::new();

        for (endpoint_index, target) in self.plan.targets.iter().enumerate() {
            if let Some(service) = self.engine.detector.detect(target).await {
                detected.push((endpoint_index, service));
            }
            if endpoint_index == 0 {
                let outcome = self.engine.detector.fetch_banner(target).await;
                banner = banner_text(outcome.server.as_deref(), outcome.body_prefix.as_deref());
            }
        }

        let (risk, category) = self.classification();
        let fingerprint = self.engine.catalog.identify(&banner, self.plan.port);
        detected
            .into_iter()
            .map(|(i, service)| {
                let service = service.with_classification(risk, category, fingerprint.clone());
                (i, service)
            })
            .collect()
    }

    /// Plain GET per endpoint, recorded as plain HTTP services
    async fn fetch_pages(&self, any_status: bool) -> Vec<(usize, DiscoveredService)> {
        let (risk, category) = self.classification();
        let mut pages = Vec::new();

        for (endpoint_index, target) in self.plan.targets.iter().enumerate() {
            let outcome = self.engine.detector.fetch_banner(target).await;
            let answered = if any_status {
                outcome.reachable
            } else {
                outcome.succeeded
            };
            if !answered {
                continue;
            }

            let banner = banner_text(outcome.server.as_deref(), outcome.body_prefix.as_deref());
            let fingerprint = self.engine.catalog.identify(&banner, self.plan.port);
            let host = self.engine.detector.host();
            let service = DiscoveredService::builder(Dialect::PlainHttp, target, host)
                .authenticated(matches!(outcome.status, Some(401) | Some(403)))
                .guessed_service(guess_service_name(self.plan.port))
                .build()
                .with_classification(risk, category, fingerprint);
            pages.push((endpoint_index, service));
        }
        pages
    }
}

/// Entry point for external callers: scan, poll progress, list tools
pub struct Scanner {
    engine: ScanEngine,
    defaults: ScannerConfig,
    current: RwLock<Arc<ScanProgress>>,
}

impl Scanner {
    /// Create a scanner from a validated configuration
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: ScanEngine::new(config)?,
            defaults: config.scanner.clone(),
            current: RwLock::new(Arc::new(ScanProgress::new(0))),
        })
    }

    /// Plan a session with the configured batch size and tool setting
    pub fn session(&self, ports: &[u16], endpoints: &[String]) -> Result<ScanSession> {
        ScanSession::new(
            self.engine.clone(),
            ports,
            endpoints,
            self.defaults.batch_size,
            self.defaults.enumerate_tools,
        )
    }

    /// Plan a sweep over `groups`, each port checked on its group's endpoints
    pub fn sweep(&self, groups: &[ServiceGroup]) -> Result<ScanSession> {
        ScanSession::for_groups(
            self.engine.clone(),
            groups,
            self.defaults.batch_size,
            self.defaults.enumerate_tools,
        )
    }

    /// Run a planned session, making its progress the one `progress()` reports
    pub async fn run_session(&self, session: ScanSession) -> ScanReport {
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = session.progress();
        }
        session.run().await
    }

    /// Scan `ports` × `endpoints` and return the report
    ///
    /// Finding nothing is a successful, empty report.
    pub async fn run_scan(&self, ports: &[u16], endpoints: &[String]) -> Result<ScanReport> {
        let session = self.session(ports, endpoints)?;
        Ok(self.run_session(session).await)
    }

    /// Sweep every built-in service group
    pub async fn scan_all_services(&self) -> Result<ScanReport> {
        let session = self.sweep(SERVICE_GROUPS)?;
        Ok(self.run_session(session).await)
    }

    /// Scan the given ports (or the configured ones) on the configured endpoints
    pub async fn start_scan(&self, ports: Option<&[u16]>) -> Result<Vec<DiscoveredService>> {
        let ports = ports.unwrap_or(&self.defaults.ports);
        let report = self.run_scan(ports, &self.defaults.endpoints).await?;
        Ok(report.services)
    }

    /// Progress of the latest run
    pub fn progress(&self) -> ProgressSnapshot {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    /// List the tools of a discovered service
    pub async fn get_tools(&self, service: &DiscoveredService) -> ToolsOutcome {
        self.engine.enumerator.list_tools(service).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::StatusCode;
    use axum::routing::{any, get, post};
    use axum::Router;
    use mcpscan_fixture::{reference_router, serve};
    use std::net::SocketAddr;
    use std::time::Instant;

    fn config(batch_size: usize) -> Config {
        Config::builder()
            .host("127.0.0.1")
            .batch_size(batch_size)
            .timeout_ms(1000)
            .banner_timeout_ms(1000)
            .build()
    }

    fn endpoints(list: &[&str]) -> Vec<String> {
        list.iter().map(|e| e.to_string()).collect()
    }

    async fn closed_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[derive(Default)]
    struct Window {
        first: Option<Instant>,
        last: Option<Instant>,
    }

    /// A server whose every request takes 50ms; tracks global in-flight peak
    async fn slow_server(
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    ) -> (SocketAddr, Arc<Mutex<Window>>) {
        let window = Arc::new(Mutex::new(Window::default()));
        let w = window.clone();
        let app = Router::new().route(
            "/slow",
            any(move || {
                let w = w.clone();
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    w.lock().unwrap().first.get_or_insert_with(Instant::now);
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    w.lock().unwrap().last = Some(Instant::now());
                    "nope"
                }
            }),
        );
        (serve(app).await.unwrap(), window)
    }

    #[test]
    fn test_progress_snapshot() {
        assert_eq!(ProgressSnapshot::new(0, 0).percentage, 0);
        assert_eq!(ProgressSnapshot::new(1, 3).percentage, 33);
        assert_eq!(ProgressSnapshot::new(2, 3).percentage, 67);
        assert!(ProgressSnapshot::new(3, 3).is_complete());

        let progress = ScanProgress::new(2);
        progress.advance();
        progress.advance();
        progress.advance();
        assert_eq!(progress.snapshot().current, 2);
    }

    #[test]
    fn test_tools_outcome_from_result() {
        let ok: ToolsOutcome = Ok(Vec::new()).into();
        assert!(ok.succeeded);
        assert_eq!(ok.tools, Some(Vec::new()));

        let err: ToolsOutcome = Err(Error::EnumerationStatus {
            url: String::from("http://127.0.0.1:1/mcp"),
            status: 502,
        })
        .into();
        assert!(!err.succeeded);
        assert!(err.tools.is_none());
        assert!(err.error.unwrap().contains("502"));
    }

    #[tokio::test]
    async fn test_session_planning() {
        let engine = ScanEngine::new(&config(3)).unwrap();
        let eps = endpoints(&["/mcp"]);

        let session =
            ScanSession::new(engine.clone(), &[1, 2, 3, 2, 4, 5, 6, 7], &eps, 3, false).unwrap();
        assert_eq!(session.ports(), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(session.batch_count(), 3);
        assert_eq!(session.progress().snapshot(), ProgressSnapshot::new(0, 7));

        assert!(ScanSession::new(engine.clone(), &[0], &eps, 3, false).is_err());
        assert!(ScanSession::new(engine, &[3001], &eps, 0, false).is_err());
    }

    #[tokio::test]
    async fn test_reference_service_scan() {
        let addr = serve(reference_router()).await.unwrap();
        let scanner = Scanner::new(&config(5)).unwrap();

        let report = scanner
            .run_scan(&[addr.port()], &endpoints(&["/sse", "/mcp"]))
            .await
            .unwrap();

        assert_eq!(report.total_found, 2);
        let sse = &report.services[0];
        assert_eq!(sse.dialect, Dialect::EventStream);
        assert_eq!(sse.endpoint, "/sse");
        assert!(sse.session_id.as_deref().unwrap().starts_with("session_"));
        // The fixture hands out a session id, which the heuristic reads as a gate
        assert!(sse.authenticated);

        let rpc = &report.services[1];
        assert_eq!(rpc.dialect, Dialect::StreamableRpc);
        assert_eq!(rpc.endpoint, "/mcp");
        assert!(!rpc.authenticated);
        assert_eq!(rpc.server_info.as_ref().unwrap().name, "test-mcp-server");

        assert!(report.services.iter().all(|s| s.port == addr.port()));
        assert!(report.services.iter().all(|s| s.fingerprint.is_none()));
        assert_eq!(report.counts_by_risk[&RiskLevel::Medium], 2);
        assert_eq!(report.counts_by_category["Uncategorized"], 2);
        assert!(scanner.progress().is_complete());
    }

    #[tokio::test]
    async fn test_reference_service_tools() {
        let addr = serve(reference_router()).await.unwrap();
        let scanner = Scanner::new(&config(5)).unwrap();
        let report = scanner
            .run_scan(&[addr.port()], &endpoints(&["/sse", "/mcp"]))
            .await
            .unwrap();

        let rpc = report
            .services
            .iter()
            .find(|s| s.dialect == Dialect::StreamableRpc)
            .unwrap();
        let outcome = scanner.get_tools(rpc).await;
        assert!(outcome.succeeded);

        let tools = outcome.tools.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["read_file", "list_directory", "execute_command"]);
        assert!(tools
            .iter()
            .all(|t| t.description.as_deref().map(|d| !d.is_empty()).unwrap_or(false)));

        // The event-stream entry lists the same tools through its session path
        let sse = &report.services[0];
        let via_session = scanner.get_tools(sse).await;
        assert_eq!(via_session.tools.map(|t| t.len()), Some(3));
    }

    #[tokio::test]
    async fn test_enumerate_tools_during_scan() {
        let addr = serve(reference_router()).await.unwrap();
        let mut config = config(5);
        config.scanner.enumerate_tools = true;
        let scanner = Scanner::new(&config).unwrap();

        let report = scanner
            .run_scan(&[addr.port()], &endpoints(&["/sse", "/mcp"]))
            .await
            .unwrap();

        // Only the service that answered without a gate is enumerated
        assert!(report.services[0].tool_list.is_none());
        assert_eq!(report.services[1].tool_list.as_ref().map(|t| t.len()), Some(3));
    }

    #[tokio::test]
    async fn test_closed_port_yields_empty_report() {
        let port = closed_port().await;
        let scanner = Scanner::new(&config(5)).unwrap();

        let services = scanner.start_scan(Some(&[port][..])).await.unwrap();
        assert!(services.is_empty());
        assert_eq!(scanner.progress(), ProgressSnapshot::new(1, 1));
    }

    #[tokio::test]
    async fn test_batches_are_sequential_and_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut servers = Vec::new();
        for _ in 0..5 {
            servers.push(slow_server(in_flight.clone(), peak.clone()).await);
        }
        let ports: Vec<u16> = servers.iter().map(|(addr, _)| addr.port()).collect();

        let scanner = Scanner::new(&config(2)).unwrap();
        let session = scanner.session(&ports, &endpoints(&["/slow"])).unwrap();
        assert_eq!(session.batch_count(), 3);
        let report = session.run().await;
        assert!(report.is_empty());

        assert!(peak.load(Ordering::SeqCst) <= 2);

        let windows: Vec<(Instant, Instant)> = servers
            .iter()
            .map(|(_, w)| {
                let w = w.lock().unwrap();
                (w.first.unwrap(), w.last.unwrap())
            })
            .collect();
        let batches: Vec<&[(Instant, Instant)]> = windows.chunks(2).collect();
        for pair in batches.windows(2) {
            let previous_end = pair[0].iter().map(|w| w.1).max().unwrap();
            let next_start = pair[1].iter().map(|w| w.0).min().unwrap();
            assert!(next_start >= previous_end);
        }
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut ports = Vec::new();
        for _ in 0..4 {
            ports.push(slow_server(in_flight.clone(), peak.clone()).await.0.port());
        }

        let scanner = Arc::new(Scanner::new(&config(1)).unwrap());
        let runner = scanner.clone();
        let eps = endpoints(&["/slow"]);
        let handle = tokio::spawn(async move { runner.run_scan(&ports, &eps).await });

        let mut seen = Vec::new();
        while !handle.is_finished() {
            seen.push(scanner.progress());
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.await.unwrap().unwrap();
        seen.push(scanner.progress());

        assert!(seen.iter().all(|s| s.current <= s.total));
        assert!(seen.windows(2).all(|w| w[0].current <= w[1].current));
        assert_eq!(seen.last().copied(), Some(ProgressSnapshot::new(4, 4)));
    }

    fn group(
        key: &'static str,
        risk: RiskLevel,
        port: u16,
        endpoints: &'static [&'static str],
        mode: SweepMode,
    ) -> ServiceGroup {
        ServiceGroup {
            key,
            category: key,
            risk,
            ports: vec![port].leak(),
            endpoints,
            mode,
        }
    }

    #[tokio::test]
    async fn test_hanging_port_does_not_stall_batch() {
        let hanging = Router::new().route(
            "/mcp",
            any(|| async { std::future::pending::<&'static str>().await }),
        );
        let hanging_addr = serve(hanging).await.unwrap();
        let fixture_addr = serve(reference_router()).await.unwrap();

        let config = Config::builder()
            .host("127.0.0.1")
            .batch_size(5)
            .timeout_ms(300)
            .banner_timeout_ms(300)
            .build();
        let scanner = Scanner::new(&config).unwrap();

        let started = Instant::now();
        let report = scanner
            .run_scan(
                &[hanging_addr.port(), fixture_addr.port()],
                &endpoints(&["/mcp"]),
            )
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.total_found, 1);
        assert_eq!(report.services[0].port, fixture_addr.port());
        assert_eq!(report.services[0].dialect, Dialect::StreamableRpc);
        // Event-stream, initialize and banner attempts each end at their own deadline
        assert!(elapsed < Duration::from_millis(3 * 300 + 700), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_scan_labels_services_from_banner() {
        let app = Router::new()
            .route(
                "/",
                get(|| async { r#"<script type="module" src="/@vite/client"></script>"# }),
            )
            .route(
                "/mcp",
                post(|| async {
                    (
                        [(CONTENT_TYPE, "application/json")],
                        r#"{"jsonrpc":"2.0","result":{"serverInfo":{"name":"dev","version":"0.1"}},"id":1}"#,
                    )
                }),
            );
        let addr = serve(app).await.unwrap();
        let scanner = Scanner::new(&config(5)).unwrap();

        let report = scanner
            .run_scan(&[addr.port()], &endpoints(&["/", "/mcp"]))
            .await
            .unwrap();

        assert_eq!(report.total_found, 1);
        let service = &report.services[0];
        assert_eq!(service.endpoint, "/mcp");
        assert_eq!(service.fingerprint.as_ref().unwrap().name, "Vite");
        assert_eq!(service.category, "Uncategorized");
    }

    #[tokio::test]
    async fn test_service_sweep_uses_group_endpoints() {
        let mcp = serve(reference_router()).await.unwrap();
        let web = serve(Router::new().route(
            "/",
            get(|| async { r#"<html><script src="/@vite/client"></script></html>"# }),
        ))
        .await
        .unwrap();
        let database = serve(Router::new().route(
            "/",
            get(|| async { (StatusCode::UNAUTHORIZED, "auth required") }),
        ))
        .await
        .unwrap();
        let api = serve(
            Router::new()
                .route("/health", get(|| async { "ok" }))
                .route("/status", get(|| async { (StatusCode::FORBIDDEN, "no") })),
        )
        .await
        .unwrap();
        let closed = closed_port().await;

        let groups = vec![
            group("mcp", RiskLevel::High, mcp.port(), &["/sse", "/mcp"], SweepMode::Dialect),
            group("web", RiskLevel::Medium, web.port(), &["/"], SweepMode::Http),
            group("db", RiskLevel::Critical, database.port(), &[], SweepMode::Reachability),
            group("db", RiskLevel::Critical, closed, &[], SweepMode::Reachability),
            group(
                "api",
                RiskLevel::Medium,
                api.port(),
                &["/api", "/health", "/status"],
                SweepMode::Http,
            ),
        ];

        let scanner = Scanner::new(&config(5)).unwrap();
        let session = scanner.sweep(&groups).unwrap();
        assert_eq!(session.progress().snapshot().total, 5);
        let report = scanner.run_session(session).await;

        let summary: Vec<(u16, &str, Dialect, &str)> = report
            .services
            .iter()
            .map(|s| (s.port, s.endpoint.as_str(), s.dialect, s.category.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (mcp.port(), "/sse", Dialect::EventStream, "mcp"),
                (mcp.port(), "/mcp", Dialect::StreamableRpc, "mcp"),
                (web.port(), "/", Dialect::PlainHttp, "web"),
                (database.port(), "/", Dialect::PlainHttp, "db"),
                (api.port(), "/health", Dialect::PlainHttp, "api"),
            ]
        );

        assert_eq!(report.services[2].fingerprint.as_ref().unwrap().name, "Vite");
        assert!(!report.services[2].authenticated);
        assert!(report.services[3].authenticated);
        assert_eq!(report.services[3].risk, RiskLevel::Critical);
        assert_eq!(report.counts_by_risk[&RiskLevel::High], 2);
        assert_eq!(report.counts_by_risk[&RiskLevel::Medium], 2);
        assert_eq!(report.counts_by_category["db"], 1);
        assert!(scanner.progress().is_complete());
    }
}
