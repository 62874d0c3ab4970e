//! mcpscan Core - Foundation types and error handling
//!
//! This crate provides the data model shared by the mcpscan engine:
//! - `ScanTarget`: a (port, endpoint) pair to probe
//! - `DiscoveredService`: an HTTP service that answered in a known dialect
//! - `ToolDescriptor`: a callable operation advertised by a service
//! - `ScanReport`: aggregated results of one scan run
//! - `RiskLevel`, `Dialect`: core enums

pub mod error;
pub mod report;
pub mod risk;
pub mod service;
pub mod target;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use report::ScanReport;
pub use risk::RiskLevel;
pub use service::{
    Dialect, DiscoveredService, DiscoveredServiceBuilder, FingerprintMatch, ServerInfo,
    ToolDescriptor,
};
pub use target::ScanTarget;
