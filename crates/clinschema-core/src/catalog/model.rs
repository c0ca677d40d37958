//! In-memory schema model.

use super::error::ModelError;
use super::object::{ObjectId, ObjectKind, SchemaObject};
use super::table::TableSpec;
use std::collections::HashMap;

/// The set of declared schema objects.
///
/// Objects keep their insertion order. Names are unique per kind.
#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
    objects: Vec<SchemaObject>,
    positions: HashMap<ObjectId, usize>,
}

impl SchemaModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object.
    ///
    /// Fails with [`ModelError::DuplicateName`] if an object of the same kind
    /// and name exists, and with [`ModelError::Validation`] if a dependency is
    /// not yet in the model or a foreign key / owning table is missing from
    /// `depends_on`.
    pub fn add_object(&mut self, object: SchemaObject) -> Result<(), ModelError> {
        self.check_insert(&object)?;
        self.check_references(&object)?;
        self.push(object);
        Ok(())
    }

    /// Add an object without checking that its dependencies are present.
    ///
    /// Duplicate and intrinsic checks still run. Use [`validate`] once all
    /// objects are in; the resolver repeats the reference check regardless.
    ///
    /// [`validate`]: SchemaModel::validate
    pub fn insert_deferred(&mut self, object: SchemaObject) -> Result<(), ModelError> {
        self.check_insert(&object)?;
        self.push(object);
        Ok(())
    }

    /// Builder form of [`add_object`](SchemaModel::add_object).
    pub fn with_object(mut self, object: SchemaObject) -> Result<Self, ModelError> {
        self.add_object(object)?;
        Ok(self)
    }

    /// Check that every dependency of every object is present.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.objects
            .iter()
            .try_for_each(|object| self.check_references(object))
    }

    /// Snapshot of all objects in insertion order.
    ///
    /// The returned iterator owns its items and can be consumed once.
    pub fn all_objects(&self) -> std::vec::IntoIter<SchemaObject> {
        self.objects.clone().into_iter()
    }

    /// Borrowing iterator over all objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaObject> {
        self.objects.iter()
    }

    /// Get an object by identifier.
    pub fn get(&self, id: &ObjectId) -> Option<&SchemaObject> {
        self.positions.get(id).map(|&idx| &self.objects[idx])
    }

    /// Check if an object is declared.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.positions.contains_key(id)
    }

    /// All objects of one kind, in insertion order.
    pub fn objects_of(&self, kind: ObjectKind) -> impl Iterator<Item = &SchemaObject> {
        self.objects.iter().filter(move |o| o.kind() == kind)
    }

    /// All tables with their attributes.
    pub fn tables(&self) -> impl Iterator<Item = (&SchemaObject, &TableSpec)> {
        self.objects
            .iter()
            .filter_map(|o| o.as_table().map(|spec| (o, spec)))
    }

    /// Number of declared objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the model is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn check_insert(&self, object: &SchemaObject) -> Result<(), ModelError> {
        if self.contains(&object.id()) {
            return Err(ModelError::DuplicateName {
                kind: object.kind(),
                name: object.name.clone(),
            });
        }
        object.check_intrinsic()
    }

    fn check_references(&self, object: &SchemaObject) -> Result<(), ModelError> {
        match object.depends_on.iter().find(|dep| !self.contains(dep)) {
            Some(missing) => Err(ModelError::Validation {
                object: object.id(),
                message: format!("depends on unknown object {}", missing),
            }),
            None => Ok(()),
        }
    }

    fn push(&mut self, object: SchemaObject) {
        self.positions.insert(object.id(), self.objects.len());
        self.objects.push(object);
    }
}
