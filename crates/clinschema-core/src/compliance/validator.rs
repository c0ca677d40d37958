//! Compliance validation over a model and its apply results.

use super::report::{checks, CheckResult, ComplianceReport};
use crate::audit::AuditTrail;
use crate::catalog::{ObjectId, ObjectKind, SchemaModel};
use crate::provision::{ApplyResult, ApplyStatus, BackendCapabilities};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Encryption posture and declared standards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSettings {
    /// Backend storage is encrypted at rest.
    #[serde(default)]
    pub encryption_at_rest: bool,
    /// Backend connections are encrypted in transit.
    #[serde(default)]
    pub encryption_in_transit: bool,
    /// Compliance standard identifiers (e.g. `HIPAA`).
    #[serde(default)]
    pub standards: Vec<String>,
}

impl ComplianceSettings {
    /// Settings with both encryption flags on.
    pub fn encrypted() -> Self {
        Self {
            encryption_at_rest: true,
            encryption_in_transit: true,
            standards: Vec::new(),
        }
    }

    /// Set the declared standards.
    pub fn with_standards<I, S>(mut self, standards: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.standards = standards.into_iter().map(Into::into).collect();
        self
    }
}

/// Runs the compliance checks. Failures are recorded, never raised.
#[derive(Debug, Clone)]
pub struct ComplianceValidator {
    settings: ComplianceSettings,
    capabilities: BackendCapabilities,
}

impl ComplianceValidator {
    /// Create a validator for a backend.
    pub fn new(settings: ComplianceSettings, capabilities: BackendCapabilities) -> Self {
        Self {
            settings,
            capabilities,
        }
    }

    /// Check the model against the outcome of an apply run.
    pub fn validate(&self, model: &SchemaModel, results: &[ApplyResult]) -> ComplianceReport {
        let statuses: HashMap<&ObjectId, ApplyStatus> =
            results.iter().map(|r| (&r.object, r.status())).collect();
        let live = |id: &ObjectId| {
            matches!(
                statuses.get(id),
                Some(ApplyStatus::Applied | ApplyStatus::AlreadyExists)
            )
        };
        let describe = |id: &ObjectId| match statuses.get(id) {
            Some(status) => format!("{} ({})", id, status),
            None => format!("{} (not attempted)", id),
        };

        let mut report = ComplianceReport::new();
        let audited = AuditTrail::audited_tables(model);

        // rls.enabled_on_all_tables
        let without_rls: Vec<&str> = model
            .tables()
            .filter(|(_, spec)| !spec.rls_enabled)
            .map(|(object, _)| object.name.as_str())
            .collect();
        let table_count = model.tables().count();
        report.record(
            checks::RLS_ENABLED_ON_ALL_TABLES,
            if without_rls.is_empty() {
                CheckResult::pass(format!("RLS enabled on {} tables", table_count))
            } else {
                CheckResult::fail(format!("RLS disabled on: {}", without_rls.join(", ")))
            },
        );

        // audit.hooks_applied
        let mut missing_hooks = Vec::new();
        for table in &audited {
            for id in AuditTrail::hook_objects_for(table) {
                if !live(&id) {
                    missing_hooks.push(format!("{}: {}", table, describe(&id)));
                }
            }
        }
        report.record(
            checks::AUDIT_HOOKS_APPLIED,
            if missing_hooks.is_empty() {
                CheckResult::pass(format!("audit hooks live on {} tables", audited.len()))
            } else {
                CheckResult::fail(format!("audit hooks not live: {}", missing_hooks.join("; ")))
            },
        );

        // rls.policy_tables_applied
        let mut orphaned = Vec::new();
        let mut policy_count = 0;
        for policy in model.objects_of(ObjectKind::Policy) {
            let Some(spec) = policy.as_policy() else {
                continue;
            };
            policy_count += 1;
            let table = ObjectId::table(&spec.table);
            if !model.contains(&table) {
                orphaned.push(format!("{}: {} not declared", policy.name, table));
            } else if !live(&table) {
                orphaned.push(format!("{}: {}", policy.name, describe(&table)));
            }
        }
        report.record(
            checks::RLS_POLICY_TABLES_APPLIED,
            if orphaned.is_empty() {
                CheckResult::pass(format!("{} policies have live tables", policy_count))
            } else {
                CheckResult::fail(format!("policy tables not live: {}", orphaned.join("; ")))
            },
        );

        report.record(
            checks::HIPAA_ENCRYPTION_AT_REST,
            Self::flag(self.settings.encryption_at_rest, "encryption at rest"),
        );
        report.record(
            checks::HIPAA_ENCRYPTION_IN_TRANSIT,
            Self::flag(self.settings.encryption_in_transit, "encryption in transit"),
        );

        // audit.atomic_capture
        report.record(
            checks::AUDIT_ATOMIC_CAPTURE,
            if audited.is_empty() {
                CheckResult::pass("no audited tables")
            } else if self.capabilities.transactional_audit {
                CheckResult::pass("audit records commit with the row write")
            } else {
                CheckResult::fail(format!(
                    "backend cannot capture audit records atomically for: {}",
                    audited.join(", ")
                ))
            },
        );

        // storage.buckets_private
        let public: Vec<&str> = model
            .objects_of(ObjectKind::Bucket)
            .filter(|o| o.as_bucket().is_some_and(|b| b.public))
            .map(|o| o.name.as_str())
            .collect();
        let bucket_count = model.objects_of(ObjectKind::Bucket).count();
        report.record(
            checks::STORAGE_BUCKETS_PRIVATE,
            if public.is_empty() {
                CheckResult::pass(format!("{} buckets private", bucket_count))
            } else {
                CheckResult::fail(format!("public buckets: {}", public.join(", ")))
            },
        );

        for name in report.failures() {
            if let Some(result) = report.get(name) {
                warn!(check = name, detail = %result.detail, "compliance check failed");
            }
        }
        info!(
            checks = report.len(),
            passed = report.passed(),
            "compliance validation finished"
        );

        report
    }

    fn flag(enabled: bool, what: &str) -> CheckResult {
        if enabled {
            CheckResult::pass(format!("{} enabled", what))
        } else {
            CheckResult::fail(format!("{} not configured", what))
        }
    }
}
