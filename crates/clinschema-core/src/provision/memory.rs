//! In-memory backend executor.
//!
//! Stateful stand-in for a real backend: it remembers applied objects,
//! supports failure injection and call counting, and accepts row writes so
//! audit capture can be exercised end to end.

use super::error::ExecutorError;
use super::executor::{BackendCapabilities, BackendExecutor};
use crate::audit::{Actor, AuditError, AuditLog, AuditRecord, MemoryAuditLog, RowMutation};
use crate::catalog::{ObjectId, ObjectKind, SchemaObject};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

/// Row write errors.
#[derive(Debug, Error)]
pub enum RowWriteError {
    /// The table has not been provisioned.
    #[error("table not provisioned: {0}")]
    UnknownTable(String),

    /// A row with this id already exists.
    #[error("duplicate row {record_id} in {table}")]
    DuplicateRow {
        /// Table name.
        table: String,
        /// Row identifier.
        record_id: String,
    },

    /// No row with this id exists.
    #[error("row {record_id} not found in {table}")]
    RowNotFound {
        /// Table name.
        table: String,
        /// Row identifier.
        record_id: String,
    },

    /// The mutation's prior snapshot does not match the stored row.
    #[error("stale snapshot for row {record_id} in {table}")]
    StaleSnapshot {
        /// Table name.
        table: String,
        /// Row identifier.
        record_id: String,
    },

    /// Audit capture failed; the row write was rolled back.
    #[error("audit capture failed: {0}")]
    Audit(#[from] AuditError),
}

#[derive(Debug, Default)]
struct BackendState {
    installed: BTreeMap<ObjectId, SchemaObject>,
    apply_failures: HashMap<ObjectId, ExecutorError>,
    exists_failures: HashMap<ObjectId, ExecutorError>,
    apply_calls: Vec<ObjectId>,
    exists_calls: usize,
    rows: HashMap<String, BTreeMap<String, serde_json::Value>>,
}

impl BackendState {
    fn captures_audit(&self, table: &str) -> bool {
        self.installed.values().any(|object| {
            object
                .as_trigger()
                .map(|trigger| trigger.captures_audit && trigger.table == table)
                .unwrap_or(false)
        })
    }
}

/// In-memory backend.
#[derive(Debug)]
pub struct MemoryExecutor {
    state: Mutex<BackendState>,
    audit: MemoryAuditLog,
    capabilities: BackendCapabilities,
}

impl Default for MemoryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryExecutor {
    /// Create an empty backend with transactional audit capture.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            audit: MemoryAuditLog::new(),
            capabilities: BackendCapabilities::transactional(),
        }
    }

    /// Report audit capture as non-transactional.
    pub fn without_transactional_audit(mut self) -> Self {
        self.capabilities.transactional_audit = false;
        self
    }

    /// Make `apply_unit` fail for an object.
    pub fn fail_on(&self, id: ObjectId, message: impl Into<String>) {
        self.state
            .lock()
            .apply_failures
            .insert(id, ExecutorError::new(message));
    }

    /// Make `exists` fail for an object.
    pub fn fail_exists_on(&self, id: ObjectId, message: impl Into<String>) {
        self.state
            .lock()
            .exists_failures
            .insert(id, ExecutorError::new(message));
    }

    /// Mark an object as already live without counting an apply call.
    pub fn install(&self, object: SchemaObject) {
        self.state.lock().installed.insert(object.id(), object);
    }

    /// Check whether an object is live.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.state.lock().installed.contains_key(id)
    }

    /// Identifiers of all live objects.
    pub fn installed(&self) -> Vec<ObjectId> {
        self.state.lock().installed.keys().cloned().collect()
    }

    /// Objects passed to `apply_unit`, in call order.
    pub fn apply_calls(&self) -> Vec<ObjectId> {
        self.state.lock().apply_calls.clone()
    }

    /// Number of `apply_unit` calls.
    pub fn apply_call_count(&self) -> usize {
        self.state.lock().apply_calls.len()
    }

    /// Number of `exists` calls.
    pub fn exists_call_count(&self) -> usize {
        self.state.lock().exists_calls
    }

    /// The backend's audit trail.
    pub fn audit_log(&self) -> &MemoryAuditLog {
        &self.audit
    }

    /// Read a row.
    pub fn row(&self, table: &str, record_id: &str) -> Option<serde_json::Value> {
        self.state
            .lock()
            .rows
            .get(table)
            .and_then(|rows| rows.get(record_id))
            .cloned()
    }

    /// Number of rows in a table.
    pub fn row_count(&self, table: &str) -> usize {
        self.state.lock().rows.get(table).map_or(0, BTreeMap::len)
    }

    /// Insert a row. Returns the audit sequence number if the write was
    /// captured.
    pub fn insert_row(
        &self,
        table: &str,
        record_id: &str,
        data: serde_json::Value,
        actor: &Actor,
    ) -> Result<Option<u64>, RowWriteError> {
        self.write(RowMutation::insert(table, record_id, data), actor)
    }

    /// Replace a row. The prior snapshot is read under the same lock as
    /// the write.
    pub fn update_row(
        &self,
        table: &str,
        record_id: &str,
        data: serde_json::Value,
        actor: &Actor,
    ) -> Result<Option<u64>, RowWriteError> {
        let mut state = self.state.lock();
        let old = Self::current_row(&state, table, record_id)?;
        self.write_locked(&mut state, RowMutation::update(table, record_id, old, data), actor)
    }

    /// Delete a row.
    pub fn delete_row(
        &self,
        table: &str,
        record_id: &str,
        actor: &Actor,
    ) -> Result<Option<u64>, RowWriteError> {
        let mut state = self.state.lock();
        let old = Self::current_row(&state, table, record_id)?;
        self.write_locked(&mut state, RowMutation::delete(table, record_id, old), actor)
    }

    /// Apply a row mutation and, if the table's capture trigger is live,
    /// append exactly one audit record. Both happen under one lock; if the
    /// append fails the row change is undone.
    ///
    /// The mutation's `old_data` must equal the stored row, otherwise the
    /// write is rejected with [`RowWriteError::StaleSnapshot`].
    pub fn write(
        &self,
        mutation: RowMutation,
        actor: &Actor,
    ) -> Result<Option<u64>, RowWriteError> {
        let mut state = self.state.lock();
        self.write_locked(&mut state, mutation, actor)
    }

    fn current_row(
        state: &BackendState,
        table: &str,
        record_id: &str,
    ) -> Result<serde_json::Value, RowWriteError> {
        state
            .rows
            .get(table)
            .and_then(|rows| rows.get(record_id))
            .cloned()
            .ok_or_else(|| RowWriteError::RowNotFound {
                table: table.to_string(),
                record_id: record_id.to_string(),
            })
    }

    fn write_locked(
        &self,
        state: &mut BackendState,
        mutation: RowMutation,
        actor: &Actor,
    ) -> Result<Option<u64>, RowWriteError> {
        let table = mutation.table().to_string();
        let record_id = mutation.record_id().to_string();

        if !state.installed.contains_key(&ObjectId::table(&table)) {
            return Err(RowWriteError::UnknownTable(table));
        }
        let audited = state.captures_audit(&table);

        let rows = state.rows.entry(table.clone()).or_default();
        let previous = rows.get(&record_id).cloned();
        match (mutation.old_data(), &previous) {
            (None, Some(_)) => {
                return Err(RowWriteError::DuplicateRow { table, record_id });
            }
            (Some(_), None) => {
                return Err(RowWriteError::RowNotFound { table, record_id });
            }
            (Some(claimed), Some(stored)) if claimed != stored => {
                return Err(RowWriteError::StaleSnapshot { table, record_id });
            }
            _ => {}
        }

        match mutation.new_data() {
            Some(data) => {
                rows.insert(record_id.clone(), data.clone());
            }
            None => {
                rows.remove(&record_id);
            }
        }

        if !audited {
            return Ok(None);
        }

        // old_data is the stored row, never the caller's copy
        let mut record = AuditRecord::capture(&mutation, actor, Utc::now());
        record.old_data = previous.clone();
        match self.audit.append(record) {
            Ok(sequence) => {
                debug!(table = %table, record_id = %record_id, sequence, "audit record captured");
                Ok(Some(sequence))
            }
            Err(e) => {
                warn!(
                    table = %table,
                    record_id = %record_id,
                    error = %e,
                    "audit capture failed, rolling back write"
                );
                let rows = state.rows.entry(table).or_default();
                match previous {
                    Some(data) => rows.insert(record_id, data),
                    None => rows.remove(&record_id),
                };
                Err(e.into())
            }
        }
    }
}

impl BackendExecutor for MemoryExecutor {
    fn exists(&self, kind: ObjectKind, name: &str) -> Result<bool, ExecutorError> {
        let mut state = self.state.lock();
        state.exists_calls += 1;
        let id = ObjectId::new(kind, name);
        if let Some(err) = state.exists_failures.get(&id) {
            return Err(err.clone());
        }
        Ok(state.installed.contains_key(&id))
    }

    fn apply_unit(&self, object: &SchemaObject) -> Result<(), ExecutorError> {
        let mut state = self.state.lock();
        let id = object.id();
        state.apply_calls.push(id.clone());
        if let Some(err) = state.apply_failures.get(&id) {
            return Err(err.clone());
        }
        state.installed.insert(id, object.clone());
        Ok(())
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }
}
