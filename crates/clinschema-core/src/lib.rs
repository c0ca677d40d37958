//! Clinschema Core - declarative schema provisioning for regulated data stores.
//!
//! This crate models schema objects, orders them by dependency, applies them
//! idempotently through an injected backend executor, and checks the result
//! against compliance predicates (row-level security, audit capture,
//! encryption posture).

pub mod audit;
pub mod catalog;
pub mod compliance;
pub mod docs;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod provision;
pub mod report;
pub mod resolver;

pub use catalog::{
    BucketSpec, ColumnDef, ForeignKeyDef, FunctionSpec, IndexSpec, ModelError, ObjectId,
    ObjectKind, ObjectSpec, OnDelete, PolicyOperation, PolicySpec, SchemaModel, SchemaObject,
    TableSpec, TriggerEvent, TriggerSpec, TriggerTiming,
};
pub use error::{Error, Result};
pub use resolver::{DependencyResolver, ResolveError};

// Provisioning exports
pub use provision::{
    ApplyError, ApplyOutcome, ApplyResult, ApplyStatus, ApplySummary, BackendCapabilities,
    BackendExecutor, BlockReason, CancellationToken, ExecutorError, MemoryExecutor,
    ProvisioningEngine, RowWriteError, SimulationExecutor,
};

// Audit exports
pub use audit::{
    Actor, AuditAction, AuditError, AuditLog, AuditRecord, AuditTrail, MemoryAuditLog,
    RowMutation,
};

// Compliance, documentation and reporting exports
pub use compliance::{CheckResult, ComplianceReport, ComplianceSettings, ComplianceValidator};
pub use docs::{DocumentMeta, ForeignKeyRef, SchemaDocument, TableDoc};
pub use manifest::{ManifestError, ProvisioningManifest};
pub use pipeline::{Provisioner, ProvisioningRun};
pub use report::{RunReport, Verdict};
