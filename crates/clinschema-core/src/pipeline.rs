//! End-to-end provisioning run.
//!
//! Model → resolver → engine → compliance validator → documentation →
//! run report. Model and resolution errors abort the run before the backend
//! is touched; everything after that is recorded, not raised.

use crate::catalog::{ObjectId, SchemaModel};
use crate::compliance::{ComplianceReport, ComplianceSettings, ComplianceValidator};
use crate::docs::{self, DocumentMeta, SchemaDocument};
use crate::error::Result;
use crate::manifest::ProvisioningManifest;
use crate::provision::{
    ApplyResult, ApplySummary, BackendExecutor, CancellationToken, ProvisioningEngine,
};
use crate::report::RunReport;
use crate::resolver::DependencyResolver;
use chrono::{DateTime, Utc};
use tracing::info;

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct ProvisioningRun {
    /// Resolved apply order.
    pub order: Vec<ObjectId>,
    /// One result per object, in apply order.
    pub results: Vec<ApplyResult>,
    /// Compliance checks.
    pub compliance: ComplianceReport,
    /// Schema documentation.
    pub document: SchemaDocument,
    /// PASS/FAIL report.
    pub report: RunReport,
}

impl ProvisioningRun {
    /// Overall status: all compliance checks passed and no required object
    /// failed.
    pub fn passed(&self) -> bool {
        self.report.passed()
    }

    /// Outcome counts.
    pub fn summary(&self) -> ApplySummary {
        ApplySummary::of(&self.results)
    }

    /// Result for one object.
    pub fn result(&self, id: &ObjectId) -> Option<&ApplyResult> {
        self.results.iter().find(|r| &r.object == id)
    }
}

/// Runs the full provisioning pipeline.
#[derive(Debug, Clone, Default)]
pub struct Provisioner {
    engine: ProvisioningEngine,
    settings: ComplianceSettings,
}

impl Provisioner {
    /// Create a provisioner with the given compliance settings.
    pub fn new(settings: ComplianceSettings) -> Self {
        Self {
            engine: ProvisioningEngine::new(),
            settings,
        }
    }

    /// Stop runs when the token is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.engine = self.engine.with_cancellation(token);
        self
    }

    /// Handle for cancelling runs.
    pub fn cancellation(&self) -> CancellationToken {
        self.engine.cancellation()
    }

    /// Provision a model.
    pub fn run<E>(
        &self,
        model: &SchemaModel,
        executor: &E,
        meta: &DocumentMeta,
    ) -> Result<ProvisioningRun>
    where
        E: BackendExecutor + ?Sized,
    {
        model.validate()?;
        let ordered = DependencyResolver::resolve(model)?;
        let order: Vec<ObjectId> = ordered.iter().map(|o| o.id()).collect();
        info!(objects = order.len(), database = %meta.database_name, "starting provisioning run");

        let results = self.engine.apply(&ordered, executor);
        let compliance = ComplianceValidator::new(self.settings.clone(), executor.capabilities())
            .validate(model, &results);
        let document = docs::render(model, &results, &compliance, meta);
        let report = RunReport::build(model, &results, &compliance, meta.generated_at);

        Ok(ProvisioningRun {
            order,
            results,
            compliance,
            document,
            report,
        })
    }

    /// Provision everything a manifest declares, using its compliance
    /// settings.
    pub fn run_manifest<E>(
        manifest: &ProvisioningManifest,
        executor: &E,
        generated_at: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<ProvisioningRun>
    where
        E: BackendExecutor + ?Sized,
    {
        let model = manifest.to_model()?;
        Self::new(manifest.compliance.clone())
            .with_cancellation(cancel)
            .run(&model, executor, &manifest.document_meta(generated_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDef, ForeignKeyDef, SchemaObject, TableSpec};
    use crate::error::Error;
    use crate::provision::{MemoryExecutor, SimulationExecutor};
    use crate::resolver::ResolveError;

    fn meta() -> DocumentMeta {
        DocumentMeta {
            database_name: "clinic".to_string(),
            version: "1.0.0".to_string(),
            standards: vec!["HIPAA".to_string()],
            generated_at: Utc::now(),
        }
    }

    fn child(name: &str, parent: &str) -> SchemaObject {
        SchemaObject::table(
            name,
            TableSpec::new(vec![
                ColumnDef::new("id", "UUID").not_null(),
                ColumnDef::new("parent_id", "UUID"),
            ])
            .with_primary_key(["id"])
            .with_foreign_key(ForeignKeyDef::new("parent_id", parent, "id")),
        )
    }

    #[test]
    fn test_cycle_is_fatal_before_any_call() {
        let mut model = SchemaModel::new();
        model.insert_deferred(child("t1", "t2")).unwrap();
        model.insert_deferred(child("t2", "t1")).unwrap();
        let backend = MemoryExecutor::new();

        let err = Provisioner::new(ComplianceSettings::encrypted())
            .run(&model, &backend, &meta())
            .unwrap_err();
        assert!(matches!(err, Error::Resolve(ResolveError::CyclicDependency { .. })));
        assert_eq!(backend.exists_call_count(), 0);
        assert_eq!(backend.apply_call_count(), 0);
    }

    #[test]
    fn test_dangling_reference_is_fatal() {
        let mut model = SchemaModel::new();
        model.insert_deferred(child("sessions", "patients")).unwrap();

        let err = Provisioner::default()
            .run(&model, &SimulationExecutor::new(), &meta())
            .unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }

    #[test]
    fn test_simulation_run() {
        let mut model = SchemaModel::new();
        model.insert_deferred(child("sessions", "patients")).unwrap();
        model
            .insert_deferred(SchemaObject::table(
                "patients",
                TableSpec::new(vec![ColumnDef::new("id", "UUID")]).with_primary_key(["id"]),
            ))
            .unwrap();
        let executor = SimulationExecutor::new();

        let run = Provisioner::new(ComplianceSettings::encrypted())
            .run(&model, &executor, &meta())
            .unwrap();
        assert_eq!(run.order, vec![ObjectId::table("patients"), ObjectId::table("sessions")]);
        assert_eq!(run.summary().applied, 2);
        assert_eq!(executor.applied_count(), 2);
        assert!(run.passed());
        assert_eq!(run.document.tables.len(), 2);
    }
}
