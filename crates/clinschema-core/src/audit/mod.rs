//! Audit trail subsystem.
//!
//! Two halves:
//!
//! - [`AuditTrail`] expands the `audit_enabled` flag on tables into schema
//!   objects: the `audit_trail` table and its indexes, the capture function,
//!   and one capture trigger per audited table. The capture trigger runs
//!   AFTER the row write inside the writer's transaction, so the row and its
//!   record commit or roll back together.
//! - [`AuditLog`] is the runtime append-only log that backends write
//!   [`AuditRecord`]s into. [`MemoryAuditLog`] is the in-memory
//!   implementation used by the memory executor and tests.

mod record;
mod schema;

pub use record::{
    Actor, AuditAction, AuditError, AuditLog, AuditRecord, MemoryAuditLog, RowMutation,
};
pub use schema::AuditTrail;

/// Name of the audit trail table.
pub const AUDIT_TABLE: &str = "audit_trail";

/// Name of the row trigger function that writes audit records.
pub const CAPTURE_FUNCTION: &str = "audit_trail_capture";

/// Name of the BEFORE UPDATE function that stamps `updated_at`/`updated_by`.
pub const STAMP_FUNCTION: &str = "stamp_row_actor";
