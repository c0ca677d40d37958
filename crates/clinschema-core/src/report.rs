//! Run report.
//!
//! One PASS/FAIL entry per provisioning stage (one stage per object kind)
//! and per compliance check, with totals and an overall verdict.

use crate::catalog::{ObjectKind, SchemaModel};
use crate::compliance::ComplianceReport;
use crate::provision::{ApplyResult, ApplyStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};

/// Pass or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Passed.
    Pass,
    /// Failed.
    Fail,
}

impl Verdict {
    fn from_bool(passed: bool) -> Self {
        if passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// Check if this is a pass.
    pub fn is_pass(&self) -> bool {
        *self == Verdict::Pass
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// One stage or check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Verdict.
    pub status: Verdict,
    /// Explanation.
    pub detail: String,
}

/// Totals over all entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    /// Report time.
    pub timestamp: DateTime<Utc>,
    /// Number of entries.
    pub total: usize,
    /// Passing entries.
    pub passed: usize,
    /// Failing entries.
    pub failed: usize,
    /// Passing share as a percentage string, e.g. `91.7%`.
    pub success_rate: String,
}

/// Overall verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Overall status: every compliance check passed and no required object
    /// failed.
    pub status: Verdict,
    /// One-line summary.
    pub message: String,
}

/// Report of one provisioning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Totals.
    pub run: RunTotals,
    /// Entries by name: `provision.<kind plural>` and `compliance.<check>`.
    pub results: BTreeMap<String, ReportEntry>,
    /// Overall verdict.
    pub summary: RunSummary,
}

impl RunReport {
    /// Build the report for a run.
    pub fn build(
        model: &SchemaModel,
        results: &[ApplyResult],
        compliance: &ComplianceReport,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut entries = BTreeMap::new();

        for kind in ObjectKind::ALL {
            let of_kind: Vec<&ApplyResult> =
                results.iter().filter(|r| r.object.kind == kind).collect();
            let count = |status: ApplyStatus| {
                of_kind.iter().filter(|r| r.status() == status).count()
            };
            let failed: Vec<String> = of_kind
                .iter()
                .filter_map(|r| r.error().map(|e| format!("{} ({})", r.object.name, e)))
                .collect();

            let mut detail = format!(
                "{} applied, {} already existed, {} failed",
                count(ApplyStatus::Applied),
                count(ApplyStatus::AlreadyExists),
                failed.len()
            );
            if !failed.is_empty() {
                detail.push_str(": ");
                detail.push_str(&failed.join("; "));
            }

            entries.insert(
                format!("provision.{}", kind.plural()),
                ReportEntry {
                    status: Verdict::from_bool(failed.is_empty()),
                    detail,
                },
            );
        }

        for (name, check) in compliance.iter() {
            entries.insert(
                format!("compliance.{}", name),
                ReportEntry {
                    status: Verdict::from_bool(check.passed),
                    detail: check.detail.clone(),
                },
            );
        }

        let total = entries.len();
        let passed = entries.values().filter(|e| e.status.is_pass()).count();
        let failed = total - passed;
        let success_rate = if total > 0 {
            format!("{:.1}%", passed as f64 / total as f64 * 100.0)
        } else {
            "0%".to_string()
        };

        let required_failures = results
            .iter()
            .filter(|r| r.is_failed())
            .filter(|r| model.get(&r.object).map_or(true, |o| o.required))
            .count();
        let status = Verdict::from_bool(compliance.passed() && required_failures == 0);

        Self {
            run: RunTotals {
                timestamp: generated_at,
                total,
                passed,
                failed,
                success_rate,
            },
            results: entries,
            summary: RunSummary {
                status,
                message: format!(
                    "provisioning checks completed: {}/{} passed, {} required objects failed",
                    passed, total, required_failures
                ),
            },
        }
    }

    /// Whether the run passed overall.
    pub fn passed(&self) -> bool {
        self.summary.status.is_pass()
    }

    /// Names of failing entries.
    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|(_, e)| !e.status.is_pass())
            .map(|(name, _)| name.as_str())
    }

    /// Log the totals and the verdict.
    pub fn log_summary(&self) {
        info!(
            total = self.run.total,
            passed = self.run.passed,
            failed = self.run.failed,
            success_rate = %self.run.success_rate,
            "run report"
        );
        for name in self.failures() {
            if let Some(entry) = self.results.get(name) {
                error!(entry = name, detail = %entry.detail, "report entry failed");
            }
        }
        if self.passed() {
            info!(message = %self.summary.message, "run passed");
        } else {
            error!(message = %self.summary.message, "run failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDef, ObjectId, SchemaObject, TableSpec};
    use crate::compliance::{ComplianceSettings, ComplianceValidator};
    use crate::provision::{BackendExecutor, MemoryExecutor, ProvisioningEngine};
    use crate::resolver::DependencyResolver;

    fn table(name: &str) -> SchemaObject {
        SchemaObject::table(
            name,
            TableSpec::new(vec![ColumnDef::new("id", "UUID").not_null()]).with_primary_key(["id"]),
        )
    }

    fn run(model: &SchemaModel, backend: &MemoryExecutor) -> RunReport {
        let order = DependencyResolver::resolve(model).unwrap();
        let results = ProvisioningEngine::new().apply(&order, backend);
        let compliance =
            ComplianceValidator::new(ComplianceSettings::encrypted(), backend.capabilities())
                .validate(model, &results);
        RunReport::build(model, &results, &compliance, Utc::now())
    }

    #[test]
    fn test_entries_per_stage_and_check() {
        let model = SchemaModel::new().with_object(table("patients")).unwrap();
        let report = run(&model, &MemoryExecutor::new());

        // six stages plus seven checks
        assert_eq!(report.run.total, 13);
        assert_eq!(report.run.passed, 13);
        assert_eq!(report.run.success_rate, "100.0%");
        assert!(report.passed());
        assert_eq!(
            report.results["provision.tables"].detail,
            "1 applied, 0 already existed, 0 failed"
        );
        assert!(report.results.contains_key("compliance.hipaa.encryption_at_rest"));
        assert!(report.results.contains_key("provision.buckets"));
    }

    #[test]
    fn test_required_failure_fails_run() {
        let model = SchemaModel::new().with_object(table("patients")).unwrap();
        let backend = MemoryExecutor::new();
        backend.fail_on(ObjectId::table("patients"), "denied");

        let report = run(&model, &backend);
        assert!(!report.passed());
        assert_eq!(report.results["provision.tables"].status, Verdict::Fail);
        assert!(report.results["provision.tables"]
            .detail
            .contains("patients (executor error: denied)"));
        assert_eq!(report.failures().collect::<Vec<_>>(), vec!["provision.tables"]);
    }

    #[test]
    fn test_optional_failure_keeps_run_passing() {
        let model = SchemaModel::new()
            .with_object(table("patients"))
            .unwrap()
            .with_object(table("scratch").optional())
            .unwrap();
        let backend = MemoryExecutor::new();
        backend.fail_on(ObjectId::table("scratch"), "denied");

        let report = run(&model, &backend);
        assert_eq!(report.results["provision.tables"].status, Verdict::Fail);
        assert!(report.passed());
    }

    #[test]
    fn test_verdict_serde() {
        assert_eq!(serde_json::to_string(&Verdict::Pass).unwrap(), "\"PASS\"");
        assert_eq!(Verdict::Fail.to_string(), "FAIL");
    }
}
