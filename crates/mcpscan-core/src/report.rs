//! Scan report - aggregated view of one scan run

use crate::risk::RiskLevel;
use crate::service::DiscoveredService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Results of a single scan run, recomputed from scratch every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub total_found: usize,
    /// Every risk level is present, zero-filled
    pub counts_by_risk: BTreeMap<RiskLevel, usize>,
    pub counts_by_category: BTreeMap<String, usize>,
    pub services: Vec<DiscoveredService>,
}

impl ScanReport {
    /// Build a report from the services of one run
    pub fn from_services(scan_id: Uuid, services: Vec<DiscoveredService>) -> Self {
        let mut counts_by_risk: BTreeMap<RiskLevel, usize> =
            RiskLevel::ALL.iter().map(|level| (*level, 0)).collect();
        let mut counts_by_category = BTreeMap::new();

        for service in &services {
            *counts_by_risk.entry(service.risk).or_insert(0) += 1;
            *counts_by_category
                .entry(service.category.clone())
                .or_insert(0) += 1;
        }

        Self {
            scan_id,
            timestamp: Utc::now(),
            total_found: services.len(),
            counts_by_risk,
            counts_by_category,
            services,
        }
    }

    /// Number of services that answered without an authentication gate
    pub fn exposed_count(&self) -> usize {
        self.services.iter().filter(|s| s.is_exposed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Dialect;
    use crate::target::ScanTarget;

    fn service(port: u16, risk: RiskLevel, category: &str, authenticated: bool) -> DiscoveredService {
        let target = ScanTarget::new(port, "/mcp").unwrap();
        DiscoveredService::builder(Dialect::StreamableRpc, &target, "localhost")
            .authenticated(authenticated)
            .build()
            .with_classification(risk, category, None)
    }

    #[test]
    fn test_empty_report() {
        let report = ScanReport::from_services(Uuid::new_v4(), Vec::new());
        assert!(report.is_empty());
        assert_eq!(report.total_found, 0);
        assert_eq!(report.counts_by_risk.len(), 4);
        assert!(report.counts_by_risk.values().all(|&n| n == 0));
        assert!(report.counts_by_category.is_empty());
    }

    #[test]
    fn test_counts() {
        let services = vec![
            service(3001, RiskLevel::High, "MCP Server", false),
            service(3002, RiskLevel::High, "MCP Server", true),
            service(8000, RiskLevel::Medium, "Web Dev Server", false),
        ];
        let report = ScanReport::from_services(Uuid::new_v4(), services);

        assert_eq!(report.total_found, 3);
        assert_eq!(report.counts_by_risk[&RiskLevel::High], 2);
        assert_eq!(report.counts_by_risk[&RiskLevel::Medium], 1);
        assert_eq!(report.counts_by_risk[&RiskLevel::Critical], 0);
        assert_eq!(report.counts_by_category["MCP Server"], 2);
        assert_eq!(report.exposed_count(), 2);
    }
}
