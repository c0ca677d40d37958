//! Backend executor seam.

use super::error::ExecutorError;
use crate::catalog::{ObjectKind, SchemaObject};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// What a backend guarantees beyond applying units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BackendCapabilities {
    /// Audit capture triggers run inside the writer's transaction, so a row
    /// write and its audit record commit or roll back together.
    pub transactional_audit: bool,
}

impl BackendCapabilities {
    /// Capabilities of a backend with transactional row triggers.
    pub fn transactional() -> Self {
        Self {
            transactional_audit: true,
        }
    }
}

/// Executes schema units against a backend.
///
/// Calls are independent: no transaction spans two units.
pub trait BackendExecutor: Send + Sync {
    /// Check whether an object of this kind and name is already live.
    fn exists(&self, kind: ObjectKind, name: &str) -> Result<bool, ExecutorError>;

    /// Apply one object's unit. SQL backends send [`SchemaObject::unit_text`].
    fn apply_unit(&self, object: &SchemaObject) -> Result<(), ExecutorError>;

    /// Backend guarantees. Defaults to none.
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }
}

/// Executor that logs each unit and applies nothing.
///
/// Never reports an object as existing, so every unit is "applied".
///
/// It stands in for the transactional Postgres target and reports that
/// target's capabilities by default. A PASS on `audit.atomic_capture` from a
/// simulated run describes the target, not anything this executor enforces.
/// Use [`SimulationExecutor::with_capabilities`] to simulate a weaker backend.
#[derive(Debug)]
pub struct SimulationExecutor {
    applied: AtomicUsize,
    capabilities: BackendCapabilities,
}

impl Default for SimulationExecutor {
    fn default() -> Self {
        Self {
            applied: AtomicUsize::new(0),
            capabilities: BackendCapabilities::transactional(),
        }
    }
}

impl SimulationExecutor {
    /// Create a simulation executor for the transactional target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the given capabilities instead of the transactional target's.
    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Number of units logged so far.
    pub fn applied_count(&self) -> usize {
        self.applied.load(Ordering::Relaxed)
    }
}

impl BackendExecutor for SimulationExecutor {
    fn exists(&self, _kind: ObjectKind, _name: &str) -> Result<bool, ExecutorError> {
        Ok(false)
    }

    fn apply_unit(&self, object: &SchemaObject) -> Result<(), ExecutorError> {
        self.applied.fetch_add(1, Ordering::Relaxed);
        info!(object = %object.id(), "simulated apply");
        debug!(object = %object.id(), sql = %object.unit_text(), "unit text");
        Ok(())
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }
}
