//! Compliance check results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Names of the built-in checks.
pub mod checks {
    /// Every table has row-level security enabled.
    pub const RLS_ENABLED_ON_ALL_TABLES: &str = "rls.enabled_on_all_tables";
    /// Every audited table has its capture hook live.
    pub const AUDIT_HOOKS_APPLIED: &str = "audit.hooks_applied";
    /// Every policy's owning table is live.
    pub const RLS_POLICY_TABLES_APPLIED: &str = "rls.policy_tables_applied";
    /// Storage is encrypted at rest.
    pub const HIPAA_ENCRYPTION_AT_REST: &str = "hipaa.encryption_at_rest";
    /// Connections are encrypted in transit.
    pub const HIPAA_ENCRYPTION_IN_TRANSIT: &str = "hipaa.encryption_in_transit";
    /// Audit capture commits atomically with the row write.
    pub const AUDIT_ATOMIC_CAPTURE: &str = "audit.atomic_capture";
    /// No storage bucket is publicly readable.
    pub const STORAGE_BUCKETS_PRIVATE: &str = "storage.buckets_private";
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the check passed.
    pub passed: bool,
    /// Human-readable explanation.
    pub detail: String,
}

impl CheckResult {
    /// A passing result.
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
        }
    }

    /// A failing result.
    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Check name to result, in name order. Built once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplianceReport {
    checks: BTreeMap<String, CheckResult>,
}

impl ComplianceReport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, name: &str, result: CheckResult) {
        self.checks.insert(name.to_string(), result);
    }

    /// Result of one check.
    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.checks.get(name)
    }

    /// Whether every check passed.
    pub fn passed(&self) -> bool {
        self.checks.values().all(|c| c.passed)
    }

    /// Names of failed checks.
    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.checks
            .iter()
            .filter(|(_, c)| !c.passed)
            .map(|(name, _)| name.as_str())
    }

    /// All results in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CheckResult)> {
        self.checks.iter().map(|(name, c)| (name.as_str(), c))
    }

    /// Number of checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Check if no checks were recorded.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_status() {
        let mut report = ComplianceReport::new();
        assert!(report.passed());

        report.record(checks::HIPAA_ENCRYPTION_AT_REST, CheckResult::pass("enabled"));
        report.record(checks::RLS_ENABLED_ON_ALL_TABLES, CheckResult::fail("disabled on: t"));
        assert!(!report.passed());
        assert_eq!(report.failures().collect::<Vec<_>>(), vec!["rls.enabled_on_all_tables"]);
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_serializes_as_map() {
        let mut report = ComplianceReport::new();
        report.record(checks::STORAGE_BUCKETS_PRIVATE, CheckResult::pass("5 buckets private"));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["storage.buckets_private"]["passed"], true);

        let back: ComplianceReport = serde_json::from_value(value).unwrap();
        assert_eq!(back, report);
    }
}
