//! Runtime audit records and the append-only log.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Mutating operation captured by the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    /// Row inserted.
    Insert,
    /// Row updated.
    Update,
    /// Row deleted.
    Delete,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::Insert => write!(f, "INSERT"),
            AuditAction::Update => write!(f, "UPDATE"),
            AuditAction::Delete => write!(f, "DELETE"),
        }
    }
}

/// Audit errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    /// Snapshots do not match the action.
    #[error("invalid {action} snapshot: {message}")]
    InvalidSnapshot {
        /// The action being recorded.
        action: AuditAction,
        /// What is wrong.
        message: String,
    },

    /// The log refused the record.
    #[error("audit log rejected record: {0}")]
    Rejected(String),
}

/// Caller identity attached to each record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Caller identifier.
    pub id: String,
    /// Caller role.
    pub role: String,
    /// Caller network address, if known.
    pub ip_address: Option<String>,
    /// Caller user agent, if known.
    pub user_agent: Option<String>,
}

impl Actor {
    /// Create an actor with identity and role.
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            ip_address: None,
            user_agent: None,
        }
    }

    /// Set the network address.
    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }
}

/// A single row write against a table.
///
/// Constructors fix the snapshot shape: inserts carry only the new row,
/// deletes only the old row, updates both.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMutation {
    table: String,
    record_id: String,
    action: AuditAction,
    old_data: Option<serde_json::Value>,
    new_data: Option<serde_json::Value>,
}

impl RowMutation {
    /// Insert a new row.
    pub fn insert(
        table: impl Into<String>,
        record_id: impl Into<String>,
        new_data: serde_json::Value,
    ) -> Self {
        Self {
            table: table.into(),
            record_id: record_id.into(),
            action: AuditAction::Insert,
            old_data: None,
            new_data: Some(new_data),
        }
    }

    /// Replace an existing row.
    pub fn update(
        table: impl Into<String>,
        record_id: impl Into<String>,
        old_data: serde_json::Value,
        new_data: serde_json::Value,
    ) -> Self {
        Self {
            table: table.into(),
            record_id: record_id.into(),
            action: AuditAction::Update,
            old_data: Some(old_data),
            new_data: Some(new_data),
        }
    }

    /// Remove an existing row.
    pub fn delete(
        table: impl Into<String>,
        record_id: impl Into<String>,
        old_data: serde_json::Value,
    ) -> Self {
        Self {
            table: table.into(),
            record_id: record_id.into(),
            action: AuditAction::Delete,
            old_data: Some(old_data),
            new_data: None,
        }
    }

    /// Build a mutation from loose parts, checking the snapshot shape.
    pub fn from_parts(
        table: impl Into<String>,
        record_id: impl Into<String>,
        action: AuditAction,
        old_data: Option<serde_json::Value>,
        new_data: Option<serde_json::Value>,
    ) -> Result<Self, AuditError> {
        let invalid = |message: &str| AuditError::InvalidSnapshot {
            action,
            message: message.to_string(),
        };

        match (action, &old_data, &new_data) {
            (AuditAction::Insert, None, Some(_)) => {}
            (AuditAction::Insert, _, _) => {
                return Err(invalid("insert must carry only new data"))
            }
            (AuditAction::Update, Some(_), Some(_)) => {}
            (AuditAction::Update, _, _) => {
                return Err(invalid("update must carry old and new data"))
            }
            (AuditAction::Delete, Some(_), None) => {}
            (AuditAction::Delete, _, _) => {
                return Err(invalid("delete must carry only old data"))
            }
        }

        Ok(Self {
            table: table.into(),
            record_id: record_id.into(),
            action,
            old_data,
            new_data,
        })
    }

    /// Target table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Target row identifier.
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    /// Operation.
    pub fn action(&self) -> AuditAction {
        self.action
    }

    /// Row before the write.
    pub fn old_data(&self) -> Option<&serde_json::Value> {
        self.old_data.as_ref()
    }

    /// Row after the write.
    pub fn new_data(&self) -> Option<&serde_json::Value> {
        self.new_data.as_ref()
    }
}

/// One entry in the audit trail. Never updated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the log, starting at 1. Assigned on append.
    pub sequence: u64,
    /// Table that was written.
    pub table_name: String,
    /// Row identifier.
    pub record_id: String,
    /// Operation.
    pub action: AuditAction,
    /// Row before the write.
    pub old_data: Option<serde_json::Value>,
    /// Row after the write.
    pub new_data: Option<serde_json::Value>,
    /// Caller identifier.
    pub actor_id: String,
    /// Caller role.
    pub actor_role: String,
    /// Caller network address.
    pub ip_address: Option<String>,
    /// Caller user agent.
    pub user_agent: Option<String>,
    /// When the write happened.
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Capture a mutation. The sequence number is filled in by the log.
    pub fn capture(mutation: &RowMutation, actor: &Actor, timestamp: DateTime<Utc>) -> Self {
        Self {
            sequence: 0,
            table_name: mutation.table.clone(),
            record_id: mutation.record_id.clone(),
            action: mutation.action,
            old_data: mutation.old_data.clone(),
            new_data: mutation.new_data.clone(),
            actor_id: actor.id.clone(),
            actor_role: actor.role.clone(),
            ip_address: actor.ip_address.clone(),
            user_agent: actor.user_agent.clone(),
            timestamp,
        }
    }
}

/// Append-only audit log backend.
pub trait AuditLog: Send + Sync {
    /// Append a record, returning its assigned sequence number.
    fn append(&self, record: AuditRecord) -> Result<u64, AuditError>;

    /// Snapshot of all records in append order.
    fn records(&self) -> Vec<AuditRecord>;

    /// Number of records.
    fn len(&self) -> usize {
        self.records().len()
    }

    /// Check if the log is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory audit log for testing.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditLog {
    records: Arc<Mutex<Vec<AuditRecord>>>,
    rejecting: Arc<AtomicBool>,
}

impl MemoryAuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent appends fail with [`AuditError::Rejected`].
    pub fn reject_appends(&self, reject: bool) {
        self.rejecting.store(reject, Ordering::SeqCst);
    }

    /// Records for one table, in append order.
    pub fn records_for(&self, table: &str) -> Vec<AuditRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.table_name == table)
            .cloned()
            .collect()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, mut record: AuditRecord) -> Result<u64, AuditError> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(AuditError::Rejected("log is not accepting writes".to_string()));
        }
        let mut records = self.records.lock();
        record.sequence = records.len() as u64 + 1;
        let sequence = record.sequence;
        records.push(record);
        Ok(sequence)
    }

    fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    fn len(&self) -> usize {
        self.records.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn actor() -> Actor {
        Actor::new("therapist-7", "therapist").with_ip_address("10.0.0.4")
    }

    #[test]
    fn test_mutation_shapes() {
        let insert = RowMutation::insert("patients", "p1", json!({"id": "p1"}));
        assert!(insert.old_data().is_none());
        assert!(insert.new_data().is_some());

        let delete = RowMutation::delete("patients", "p1", json!({"id": "p1"}));
        assert!(delete.new_data().is_none());
        assert_eq!(delete.action(), AuditAction::Delete);
    }

    #[test]
    fn test_from_parts_rejects_bad_shape() {
        let err = RowMutation::from_parts(
            "patients",
            "p1",
            AuditAction::Insert,
            Some(json!({})),
            Some(json!({})),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AuditError::InvalidSnapshot {
                action: AuditAction::Insert,
                ..
            }
        ));

        assert!(RowMutation::from_parts(
            "patients",
            "p1",
            AuditAction::Update,
            None,
            Some(json!({}))
        )
        .is_err());
        assert!(RowMutation::from_parts(
            "patients",
            "p1",
            AuditAction::Delete,
            Some(json!({})),
            None
        )
        .is_ok());
    }

    #[test]
    fn test_capture_copies_actor() {
        let mutation = RowMutation::update("patients", "p1", json!({"v": 1}), json!({"v": 2}));
        let record = AuditRecord::capture(&mutation, &actor(), Utc::now());
        assert_eq!(record.actor_id, "therapist-7");
        assert_eq!(record.actor_role, "therapist");
        assert_eq!(record.ip_address.as_deref(), Some("10.0.0.4"));
        assert!(record.user_agent.is_none());
        assert_eq!(record.action, AuditAction::Update);
    }

    #[test]
    fn test_memory_log_assigns_sequence() {
        let log = MemoryAuditLog::new();
        let mutation = RowMutation::insert("patients", "p1", json!({"id": "p1"}));

        let first = log.append(AuditRecord::capture(&mutation, &actor(), Utc::now())).unwrap();
        let second = log.append(AuditRecord::capture(&mutation, &actor(), Utc::now())).unwrap();
        assert_eq!((first, second), (1, 2));
        assert_eq!(log.len(), 2);
        assert_eq!(log.records_for("patients").len(), 2);
        assert!(log.records_for("device_logs").is_empty());
    }

    #[test]
    fn test_memory_log_rejects() {
        let log = MemoryAuditLog::new();
        log.reject_appends(true);
        let mutation = RowMutation::insert("patients", "p1", json!({}));
        assert!(log.append(AuditRecord::capture(&mutation, &actor(), Utc::now())).is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn test_action_serde() {
        assert_eq!(serde_json::to_string(&AuditAction::Delete).unwrap(), "\"DELETE\"");
        assert_eq!(AuditAction::Insert.to_string(), "INSERT");
    }
}
