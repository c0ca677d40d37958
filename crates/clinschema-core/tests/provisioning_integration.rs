//! Integration tests for the provisioning pipeline.

use chrono::{TimeZone, Utc};
use clinschema_core::compliance::checks;
use clinschema_core::{
    Actor, ApplyError, ApplyStatus, AuditAction, AuditLog, AuditTrail, BackendCapabilities,
    BackendExecutor, BlockReason, CancellationToken, ColumnDef, ComplianceSettings,
    DependencyResolver, DocumentMeta, ExecutorError, ForeignKeyDef, IndexSpec, MemoryExecutor,
    ObjectId, ObjectKind, OnDelete, Provisioner, ProvisioningEngine, ProvisioningManifest,
    SchemaDocument, SchemaModel, SchemaObject, SimulationExecutor, TableSpec,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

struct TestContext {
    backend: MemoryExecutor,
    provisioner: Provisioner,
}

impl TestContext {
    fn new() -> Self {
        Self {
            backend: MemoryExecutor::new(),
            provisioner: Provisioner::new(
                ComplianceSettings::encrypted().with_standards(["HIPAA", "IEC 62304 Class C"]),
            ),
        }
    }

    fn meta() -> DocumentMeta {
        DocumentMeta {
            database_name: "autonomous_physical_therapy_device".to_string(),
            version: "1.0.0".to_string(),
            standards: vec!["HIPAA".to_string(), "IEC 62304 Class C".to_string()],
            generated_at: Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap(),
        }
    }
}

fn clinical_model() -> SchemaModel {
    let patients = SchemaObject::table(
        "patients",
        TableSpec::new(vec![
            ColumnDef::new("id", "UUID")
                .not_null()
                .with_constraint("DEFAULT gen_random_uuid()"),
            ColumnDef::new("patient_identifier", "TEXT").not_null(),
            ColumnDef::new("updated_at", "TIMESTAMP WITH TIME ZONE"),
            ColumnDef::new("updated_by", "UUID"),
        ])
        .with_primary_key(["id"])
        .with_purpose("HIPAA-compliant patient information storage"),
    )
    .with_audit();

    let sessions = SchemaObject::table(
        "treatment_sessions",
        TableSpec::new(vec![
            ColumnDef::new("id", "UUID").not_null(),
            ColumnDef::new("patient_id", "UUID").not_null(),
            ColumnDef::new("session_date", "TIMESTAMP WITH TIME ZONE").not_null(),
        ])
        .with_primary_key(["id"])
        .with_foreign_key(
            ForeignKeyDef::new("patient_id", "patients", "id").with_on_delete(OnDelete::Cascade),
        )
        .with_purpose("Physical therapy session records"),
    )
    .with_audit();

    let index = SchemaObject::index(
        "idx_treatment_sessions_patient_id",
        IndexSpec::new("treatment_sessions", ["patient_id"]),
    );

    let mut model = SchemaModel::new()
        .with_object(patients)
        .unwrap()
        .with_object(sessions)
        .unwrap()
        .with_object(index)
        .unwrap();
    AuditTrail::install(&mut model).unwrap();
    model
}

fn position(order: &[ObjectId], id: &ObjectId) -> usize {
    order
        .iter()
        .position(|o| o == id)
        .unwrap_or_else(|| panic!("{} missing from order", id))
}

#[test]
fn test_end_to_end_success() {
    let ctx = TestContext::new();
    let model = clinical_model();

    let run = ctx
        .provisioner
        .run(&model, &ctx.backend, &TestContext::meta())
        .unwrap();

    let patients = ObjectId::table("patients");
    let sessions = ObjectId::table("treatment_sessions");
    let index = ObjectId::index("idx_treatment_sessions_patient_id");
    assert!(position(&run.order, &patients) < position(&run.order, &sessions));
    assert!(position(&run.order, &sessions) < position(&run.order, &index));

    for id in [&patients, &sessions, &index] {
        assert_eq!(run.result(id).unwrap().status(), ApplyStatus::Applied);
    }
    assert!(run.results.iter().all(|r| r.status() == ApplyStatus::Applied));

    assert!(run.compliance.get(checks::RLS_ENABLED_ON_ALL_TABLES).unwrap().passed);
    assert!(run.compliance.get(checks::AUDIT_HOOKS_APPLIED).unwrap().passed);
    assert!(run.passed());
}

#[test]
fn test_end_to_end_failure() {
    let ctx = TestContext::new();
    ctx.backend
        .fail_on(ObjectId::table("treatment_sessions"), "relation already locked");
    let model = clinical_model();

    let run = ctx
        .provisioner
        .run(&model, &ctx.backend, &TestContext::meta())
        .unwrap();

    assert_eq!(
        run.result(&ObjectId::table("patients")).unwrap().status(),
        ApplyStatus::Applied
    );
    assert_eq!(
        run.result(&ObjectId::table("treatment_sessions")).unwrap().error(),
        Some(&ApplyError::Executor(ExecutorError::new("relation already locked")))
    );
    assert_eq!(
        run.result(&ObjectId::index("idx_treatment_sessions_patient_id"))
            .unwrap()
            .error(),
        Some(&ApplyError::DependencyFailed {
            dependency: ObjectId::table("treatment_sessions"),
            reason: BlockReason::Failed,
        })
    );
    assert!(!run.compliance.get(checks::AUDIT_HOOKS_APPLIED).unwrap().passed);
    assert!(!run.passed());
    assert!(!run.report.passed());
}

#[test]
fn test_second_run_is_idempotent() {
    let ctx = TestContext::new();
    let model = clinical_model();

    ctx.provisioner
        .run(&model, &ctx.backend, &TestContext::meta())
        .unwrap();
    let calls_after_first = ctx.backend.apply_call_count();
    assert_eq!(calls_after_first, model.len());

    let second = ctx
        .provisioner
        .run(&model, &ctx.backend, &TestContext::meta())
        .unwrap();
    assert!(second
        .results
        .iter()
        .all(|r| r.status() == ApplyStatus::AlreadyExists));
    assert_eq!(ctx.backend.apply_call_count(), calls_after_first);
    assert!(second.passed());
}

#[test]
fn test_rls_check_fails_regardless_of_outcome() {
    let ctx = TestContext::new();
    let mut model = clinical_model();
    model
        .add_object(SchemaObject::table(
            "device_logs",
            TableSpec::new(vec![ColumnDef::new("id", "UUID").not_null()])
                .with_primary_key(["id"])
                .without_rls(),
        ))
        .unwrap();

    let run = ctx
        .provisioner
        .run(&model, &ctx.backend, &TestContext::meta())
        .unwrap();
    assert!(run.results.iter().all(|r| !r.is_failed()));
    assert!(!run.compliance.get(checks::RLS_ENABLED_ON_ALL_TABLES).unwrap().passed);
    assert!(!run.passed());
}

#[test]
fn test_simulated_backend_capabilities_drive_atomic_capture() {
    let ctx = TestContext::new();
    let model = clinical_model();

    let target = SimulationExecutor::new();
    let run = ctx
        .provisioner
        .run(&model, &target, &TestContext::meta())
        .unwrap();
    assert!(run.compliance.get(checks::AUDIT_ATOMIC_CAPTURE).unwrap().passed);

    let weaker = SimulationExecutor::new().with_capabilities(BackendCapabilities::default());
    let run = ctx
        .provisioner
        .run(&model, &weaker, &TestContext::meta())
        .unwrap();
    assert!(run.results.iter().all(|r| r.status() == ApplyStatus::Applied));
    assert!(!run.compliance.get(checks::AUDIT_ATOMIC_CAPTURE).unwrap().passed);
    assert!(!run.passed());
}

#[test]
fn test_cancellation_mid_run() {
    let model = clinical_model();
    let order = DependencyResolver::resolve(&model).unwrap();
    let backend = MemoryExecutor::new();
    let token = CancellationToken::new();
    let engine = ProvisioningEngine::new().with_cancellation(token.clone());

    let first = engine.apply(&order[..2], &backend);
    assert!(first.iter().all(|r| r.status() == ApplyStatus::Applied));

    token.cancel();
    let rest = engine.apply(&order, &backend);
    assert_eq!(rest.len(), order.len());
    assert!(rest.iter().all(|r| r.error() == Some(&ApplyError::Cancelled)));
    assert_eq!(backend.apply_call_count(), 2);
}

/// Backend that cancels the run from inside its k-th apply call, the way a
/// Ctrl-C lands while a unit is in flight.
struct CancelOnApply {
    inner: MemoryExecutor,
    token: CancellationToken,
    cancel_at: usize,
    calls: AtomicUsize,
}

impl BackendExecutor for CancelOnApply {
    fn exists(&self, kind: ObjectKind, name: &str) -> Result<bool, ExecutorError> {
        self.inner.exists(kind, name)
    }

    fn apply_unit(&self, object: &SchemaObject) -> Result<(), ExecutorError> {
        let result = self.inner.apply_unit(object);
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_at {
            self.token.cancel();
        }
        result
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.inner.capabilities()
    }
}

#[test]
fn test_cancellation_inside_single_apply() {
    let model = clinical_model();
    let order = DependencyResolver::resolve(&model).unwrap();
    let token = CancellationToken::new();
    let backend = CancelOnApply {
        inner: MemoryExecutor::new(),
        token: token.clone(),
        cancel_at: 2,
        calls: AtomicUsize::new(0),
    };

    let results = ProvisioningEngine::new()
        .with_cancellation(token)
        .apply(&order, &backend);

    assert_eq!(results.len(), order.len());
    assert!(results[..2].iter().all(|r| r.status() == ApplyStatus::Applied));
    assert!(results[2..]
        .iter()
        .all(|r| r.error() == Some(&ApplyError::Cancelled)));
    assert_eq!(
        results.iter().map(|r| r.object.clone()).collect::<Vec<_>>(),
        order.iter().map(SchemaObject::id).collect::<Vec<_>>()
    );
    assert_eq!(backend.inner.apply_call_count(), 2);
}

#[test]
fn test_documentation_round_trip() {
    let ctx = TestContext::new();
    let model = clinical_model();
    let run = ctx
        .provisioner
        .run(&model, &ctx.backend, &TestContext::meta())
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema_documentation.json");
    std::fs::write(&path, run.document.to_json_pretty().unwrap()).unwrap();
    let parsed = SchemaDocument::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();

    let source_tables: Vec<&str> = model.tables().map(|(o, _)| o.name.as_str()).collect();
    let mut doc_tables: Vec<&str> = parsed.tables.keys().map(String::as_str).collect();
    let mut expected = source_tables.clone();
    expected.sort_unstable();
    doc_tables.sort_unstable();
    assert_eq!(doc_tables, expected);

    for (object, spec) in model.tables() {
        let doc = &parsed.tables[&object.name];
        assert_eq!(doc.rls_enabled, spec.rls_enabled);
        assert_eq!(doc.audit_enabled, object.audit_enabled);
        let edges: Vec<(String, String, String)> = doc
            .foreign_keys
            .iter()
            .map(|fk| (fk.column.clone(), fk.table.clone(), fk.referenced_column.clone()))
            .collect();
        let expected: Vec<(String, String, String)> = spec
            .foreign_keys
            .iter()
            .map(|fk| {
                (
                    fk.column.clone(),
                    fk.referenced_table.clone(),
                    fk.referenced_column.clone(),
                )
            })
            .collect();
        assert_eq!(edges, expected);
    }
    assert_eq!(parsed, run.document);
}

#[test]
fn test_audit_capture_after_provisioning() {
    let ctx = TestContext::new();
    let model = clinical_model();
    ctx.provisioner
        .run(&model, &ctx.backend, &TestContext::meta())
        .unwrap();

    let actor = Actor::new("5f8e0c1a-therapist", "therapist").with_user_agent("tablet/1.2");
    ctx.backend
        .insert_row("patients", "p1", json!({"id": "p1", "patient_identifier": "PT-001"}), &actor)
        .unwrap();
    ctx.backend
        .update_row("patients", "p1", json!({"id": "p1", "patient_identifier": "PT-002"}), &actor)
        .unwrap();
    ctx.backend.delete_row("patients", "p1", &actor).unwrap();

    let records = ctx.backend.audit_log().records_for("patients");
    assert_eq!(records.len(), 3);
    assert_eq!(
        records.iter().map(|r| r.action).collect::<Vec<_>>(),
        vec![AuditAction::Insert, AuditAction::Update, AuditAction::Delete]
    );
    assert!(records.iter().all(|r| r.actor_role == "therapist"));
    assert_eq!(ctx.backend.audit_log().len(), 3);
}

#[test]
fn test_no_audit_when_hook_failed() {
    let ctx = TestContext::new();
    ctx.backend
        .fail_on(ObjectId::trigger("audit_patients"), "trigger creation denied");
    let model = clinical_model();
    let run = ctx
        .provisioner
        .run(&model, &ctx.backend, &TestContext::meta())
        .unwrap();
    assert!(!run.compliance.get(checks::AUDIT_HOOKS_APPLIED).unwrap().passed);

    ctx.backend
        .insert_row("patients", "p1", json!({"id": "p1"}), &Actor::new("u1", "admin"))
        .unwrap();
    assert!(ctx.backend.audit_log().is_empty());
}

#[test]
fn test_manifest_run() {
    let manifest = ProvisioningManifest::from_json(
        r#"{
            "database": {"name": "clinic", "version": "0.3.0"},
            "compliance": {"encryption_at_rest": true, "encryption_in_transit": false, "standards": ["GDPR"]},
            "tables": [
                {"name": "patients", "columns": [{"name": "id", "type": "UUID", "nullable": false}], "primary_key": ["id"], "audit_enabled": true}
            ],
            "buckets": [{"name": "reports"}]
        }"#,
    )
    .unwrap();
    let backend = MemoryExecutor::new();

    let run = Provisioner::run_manifest(
        &manifest,
        &backend,
        TestContext::meta().generated_at,
        CancellationToken::new(),
    )
    .unwrap();

    assert!(run.results.iter().all(|r| !r.is_failed()));
    assert!(!run.compliance.get(checks::HIPAA_ENCRYPTION_IN_TRANSIT).unwrap().passed);
    assert!(!run.passed());
    assert_eq!(run.document.database_name, "clinic");
    assert_eq!(run.document.compliance, vec!["GDPR"]);
    assert_eq!(run.document.storage_buckets, vec!["reports"]);
    assert!(run.document.functions.contains(&"audit_trail_capture".to_string()));
}
