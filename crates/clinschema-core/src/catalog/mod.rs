//! Declarative schema model.
//!
//! A [`SchemaModel`] holds the [`SchemaObject`]s to provision: tables,
//! indexes, row-level policies, functions, triggers and storage buckets.
//! Objects are pure data; applying them is the provisioning engine's job.

mod bucket;
mod error;
mod index;
mod model;
mod object;
mod policy;
mod routine;
mod table;

pub use bucket::BucketSpec;
pub use error::ModelError;
pub use index::IndexSpec;
pub use model::SchemaModel;
pub use object::{ObjectId, ObjectKind, ObjectSpec, SchemaObject};
pub use policy::{PolicyOperation, PolicySpec};
pub use routine::{FunctionSpec, TriggerEvent, TriggerSpec, TriggerTiming};
pub use table::{ColumnDef, ForeignKeyDef, OnDelete, TableSpec};
