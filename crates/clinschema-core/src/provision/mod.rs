//! Applying schema objects to a backend.
//!
//! The [`ProvisioningEngine`] walks a resolved object list and hands each
//! unit to a [`BackendExecutor`]. Two executors ship: [`SimulationExecutor`]
//! logs units without applying them, and [`MemoryExecutor`] is a stateful
//! in-memory backend for tests.

mod cancel;
mod engine;
mod error;
mod executor;
mod memory;

pub use cancel::CancellationToken;
pub use engine::{ApplyOutcome, ApplyResult, ApplyStatus, ApplySummary, ProvisioningEngine};
pub use error::{ApplyError, BlockReason, ExecutorError};
pub use executor::{BackendCapabilities, BackendExecutor, SimulationExecutor};
pub use memory::{MemoryExecutor, RowWriteError};
