//! Provisioning engine.
//!
//! Drives an ordered object list through a [`BackendExecutor`], one unit at a
//! time. Existing objects are never re-applied; a failure is recorded and the
//! run continues, with every dependent of a failed object skipped without
//! touching the backend.

use super::cancel::CancellationToken;
use super::error::{ApplyError, BlockReason};
use super::executor::BackendExecutor;
use crate::catalog::{ObjectId, SchemaObject};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn};

/// Result of applying one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The unit was applied.
    Applied,
    /// The object was already live; nothing was sent.
    AlreadyExists,
    /// The object was not provisioned.
    Failed(ApplyError),
}

/// Outcome without the error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    /// Applied.
    Applied,
    /// Already live.
    AlreadyExists,
    /// Failed.
    Failed,
}

impl std::fmt::Display for ApplyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyStatus::Applied => write!(f, "applied"),
            ApplyStatus::AlreadyExists => write!(f, "already_exists"),
            ApplyStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Per-object apply result. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    /// The object this result is for.
    pub object: ObjectId,
    /// What happened.
    #[serde(flatten)]
    pub outcome: ApplyOutcome,
}

impl ApplyResult {
    fn new(object: ObjectId, outcome: ApplyOutcome) -> Self {
        Self { object, outcome }
    }

    /// Status without the error.
    pub fn status(&self) -> ApplyStatus {
        match self.outcome {
            ApplyOutcome::Applied => ApplyStatus::Applied,
            ApplyOutcome::AlreadyExists => ApplyStatus::AlreadyExists,
            ApplyOutcome::Failed(_) => ApplyStatus::Failed,
        }
    }

    /// The error, present iff the object failed.
    pub fn error(&self) -> Option<&ApplyError> {
        match &self.outcome {
            ApplyOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Check if the object failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ApplyOutcome::Failed(_))
    }

    /// Check if the object is live after the run.
    pub fn is_live(&self) -> bool {
        !self.is_failed()
    }
}

/// Counts of apply outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    /// Objects applied.
    pub applied: usize,
    /// Objects already live.
    pub already_exists: usize,
    /// Objects failed.
    pub failed: usize,
}

impl ApplySummary {
    /// Count outcomes in a result list.
    pub fn of(results: &[ApplyResult]) -> Self {
        results
            .iter()
            .fold(Self::default(), |mut summary, result| {
                match result.status() {
                    ApplyStatus::Applied => summary.applied += 1,
                    ApplyStatus::AlreadyExists => summary.already_exists += 1,
                    ApplyStatus::Failed => summary.failed += 1,
                }
                summary
            })
    }

    /// Total number of results.
    pub fn total(&self) -> usize {
        self.applied + self.already_exists + self.failed
    }
}

/// Applies ordered schema objects through an executor.
#[derive(Debug, Clone, Default)]
pub struct ProvisioningEngine {
    cancel: CancellationToken,
}

/// Per-run bookkeeping.
#[derive(Default)]
struct RunState {
    satisfied: HashSet<ObjectId>,
    failed: HashSet<ObjectId>,
    /// Existence checks for dependencies outside the input.
    external: HashMap<ObjectId, bool>,
}

impl ProvisioningEngine {
    /// Create an engine with a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle for cancelling runs of this engine.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Apply objects in order. Returns one result per input object, in input
    /// order.
    pub fn apply<E>(&self, objects: &[SchemaObject], executor: &E) -> Vec<ApplyResult>
    where
        E: BackendExecutor + ?Sized,
    {
        let positions: HashMap<ObjectId, usize> = objects
            .iter()
            .enumerate()
            .map(|(idx, object)| (object.id(), idx))
            .collect();

        let mut state = RunState::default();
        let mut results = Vec::with_capacity(objects.len());
        let mut cancel_logged = false;

        for (idx, object) in objects.iter().enumerate() {
            let id = object.id();

            if self.cancel.is_cancelled() {
                if !cancel_logged {
                    warn!(remaining = objects.len() - idx, "provisioning cancelled");
                    cancel_logged = true;
                }
                state.failed.insert(id.clone());
                results.push(ApplyResult::new(id, ApplyOutcome::Failed(ApplyError::Cancelled)));
                continue;
            }

            let checked = Self::check_dependencies(object, idx, &positions, &mut state, executor);
            let outcome = match checked {
                Err(e) => {
                    warn!(object = %id, error = %e, "skipping object");
                    ApplyOutcome::Failed(e)
                }
                Ok(()) => Self::apply_one(object, &id, executor),
            };

            if matches!(outcome, ApplyOutcome::Failed(_)) {
                state.failed.insert(id.clone());
            } else {
                state.satisfied.insert(id.clone());
            }
            results.push(ApplyResult::new(id, outcome));
        }

        let summary = ApplySummary::of(&results);
        info!(
            applied = summary.applied,
            already_exists = summary.already_exists,
            failed = summary.failed,
            "provisioning finished"
        );

        results
    }

    fn apply_one<E>(object: &SchemaObject, id: &ObjectId, executor: &E) -> ApplyOutcome
    where
        E: BackendExecutor + ?Sized,
    {
        match executor.exists(object.kind(), &object.name) {
            Ok(true) => {
                info!(object = %id, "already exists, skipping");
                ApplyOutcome::AlreadyExists
            }
            Ok(false) => match executor.apply_unit(object) {
                Ok(()) => {
                    info!(object = %id, "applied");
                    ApplyOutcome::Applied
                }
                Err(e) => {
                    error!(object = %id, error = %e, status = ?e.status, "apply failed");
                    ApplyOutcome::Failed(e.into())
                }
            },
            Err(e) => {
                error!(object = %id, error = %e, "existence check failed");
                ApplyOutcome::Failed(e.into())
            }
        }
    }

    /// Failed dependencies are reported before unprovisioned ones, so a
    /// transitive skip always names a dependency that actually failed.
    fn check_dependencies<E>(
        object: &SchemaObject,
        idx: usize,
        positions: &HashMap<ObjectId, usize>,
        state: &mut RunState,
        executor: &E,
    ) -> Result<(), ApplyError>
    where
        E: BackendExecutor + ?Sized,
    {
        if let Some(dep) = object.depends_on.iter().find(|dep| state.failed.contains(*dep)) {
            return Err(ApplyError::DependencyFailed {
                dependency: dep.clone(),
                reason: BlockReason::Failed,
            });
        }

        for dep in &object.depends_on {
            if state.satisfied.contains(dep) {
                continue;
            }

            if positions.get(dep).is_some_and(|&pos| pos != idx) {
                return Err(ApplyError::DependencyFailed {
                    dependency: dep.clone(),
                    reason: BlockReason::NotYetProvisioned,
                });
            }

            let live = match state.external.get(dep) {
                Some(&live) => live,
                None => {
                    let live = executor.exists(dep.kind, &dep.name)?;
                    state.external.insert(dep.clone(), live);
                    live
                }
            };
            if !live {
                return Err(ApplyError::DependencyFailed {
                    dependency: dep.clone(),
                    reason: BlockReason::Missing,
                });
            }
        }

        Ok(())
    }
}
