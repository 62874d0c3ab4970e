//! mcpscan Network - HTTP probing, dialect detection, scan orchestration
//!
//! This crate provides the probing engine:
//! - Fingerprint catalog (port labels, banner rules, service groups)
//! - Probe client (one timed HTTP request, failures folded into the outcome)
//! - Dialect detection (event-stream, JSON-RPC, plain banner)
//! - Tool enumeration (`tools/list`)
//! - Batched scan orchestration with progress

pub mod catalog;
pub mod client;
pub mod dialect;
pub mod jsonrpc;
pub mod scanner;
pub mod tools;

pub use catalog::{
    guess_service_name, service_group, FingerprintCatalog, ServiceGroup, SweepMode, SERVICE_GROUPS,
};
pub use client::{Capture, ProbeClient, ProbeFailure, ProbeOutcome, ProbeRequest};
pub use dialect::{DetectorConfig, DialectDetector};
pub use jsonrpc::{RpcRequest, RpcResponse};
pub use scanner::{ProgressSnapshot, ScanEngine, ScanProgress, ScanSession, Scanner, ToolsOutcome};
pub use tools::ToolEnumerator;
