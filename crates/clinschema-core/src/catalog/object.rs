//! Schema object identity and the common object envelope.

use super::bucket::BucketSpec;
use super::error::ModelError;
use super::index::IndexSpec;
use super::policy::PolicySpec;
use super::routine::{FunctionSpec, TriggerSpec};
use super::table::TableSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kind of a schema object.
///
/// The declaration order is the resolver's tie-break rank: tables and
/// functions come first because other objects reference them by name, buckets
/// last because nothing depends on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Relational table.
    Table,
    /// Stored function.
    Function,
    /// Secondary index.
    Index,
    /// Row trigger.
    Trigger,
    /// Row-level security policy.
    Policy,
    /// Object storage bucket.
    Bucket,
}

impl ObjectKind {
    /// All kinds in rank order.
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::Table,
        ObjectKind::Function,
        ObjectKind::Index,
        ObjectKind::Trigger,
        ObjectKind::Policy,
        ObjectKind::Bucket,
    ];

    /// Tie-break rank used by the dependency resolver.
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// Lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::Function => "function",
            ObjectKind::Index => "index",
            ObjectKind::Trigger => "trigger",
            ObjectKind::Policy => "policy",
            ObjectKind::Bucket => "bucket",
        }
    }

    /// Plural label, used for report stages.
    pub fn plural(&self) -> &'static str {
        match self {
            ObjectKind::Table => "tables",
            ObjectKind::Function => "functions",
            ObjectKind::Index => "indexes",
            ObjectKind::Trigger => "triggers",
            ObjectKind::Policy => "policies",
            ObjectKind::Bucket => "buckets",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(ObjectKind::Table),
            "function" => Ok(ObjectKind::Function),
            "index" => Ok(ObjectKind::Index),
            "trigger" => Ok(ObjectKind::Trigger),
            "policy" => Ok(ObjectKind::Policy),
            "bucket" => Ok(ObjectKind::Bucket),
            other => Err(ModelError::InvalidIdentifier(other.to_string())),
        }
    }
}

/// Identifier of a schema object: its kind plus its name.
///
/// Ordering is `(kind rank, name)`, which is exactly the resolver's
/// tie-break order. Written as `kind:name` in manifests and reports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId {
    /// Object kind.
    pub kind: ObjectKind,
    /// Object name, unique within its kind.
    pub name: String,
}

impl ObjectId {
    /// Create an identifier.
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Identifier of a table.
    pub fn table(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Table, name)
    }

    /// Identifier of a function.
    pub fn function(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Function, name)
    }

    /// Identifier of an index.
    pub fn index(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Index, name)
    }

    /// Identifier of a trigger.
    pub fn trigger(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Trigger, name)
    }

    /// Identifier of a policy.
    pub fn policy(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Policy, name)
    }

    /// Identifier of a bucket.
    pub fn bucket(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Bucket, name)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

impl FromStr for ObjectId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| ModelError::InvalidIdentifier(s.to_string()))?;
        if name.is_empty() {
            return Err(ModelError::InvalidIdentifier(s.to_string()));
        }
        Ok(Self::new(kind.parse()?, name))
    }
}

impl TryFrom<String> for ObjectId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_string()
    }
}

/// Kind-specific attributes of a schema object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectSpec {
    /// Table columns, keys and RLS flag.
    Table(TableSpec),
    /// Index target.
    Index(IndexSpec),
    /// Row-level policy.
    Policy(PolicySpec),
    /// Stored function.
    Function(FunctionSpec),
    /// Row trigger.
    Trigger(TriggerSpec),
    /// Storage bucket configuration.
    Bucket(BucketSpec),
}

impl ObjectSpec {
    /// Kind of object this spec describes.
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectSpec::Table(_) => ObjectKind::Table,
            ObjectSpec::Index(_) => ObjectKind::Index,
            ObjectSpec::Policy(_) => ObjectKind::Policy,
            ObjectSpec::Function(_) => ObjectKind::Function,
            ObjectSpec::Trigger(_) => ObjectKind::Trigger,
            ObjectSpec::Bucket(_) => ObjectKind::Bucket,
        }
    }

    /// Render the default backend unit for this spec.
    fn render(&self, name: &str) -> String {
        match self {
            ObjectSpec::Table(spec) => spec.render(name),
            ObjectSpec::Index(spec) => spec.render(name),
            ObjectSpec::Policy(spec) => spec.render(name),
            ObjectSpec::Function(spec) => spec.render(name),
            ObjectSpec::Trigger(spec) => spec.render(name),
            ObjectSpec::Bucket(spec) => spec.render(name),
        }
    }

    /// Objects this spec structurally requires to exist first.
    fn implied_dependencies(&self, name: &str) -> Vec<ObjectId> {
        match self {
            ObjectSpec::Table(spec) => spec
                .foreign_keys
                .iter()
                .filter(|fk| fk.referenced_table != name)
                .map(|fk| ObjectId::table(&fk.referenced_table))
                .collect(),
            ObjectSpec::Index(spec) => vec![ObjectId::table(&spec.table)],
            ObjectSpec::Policy(spec) => vec![ObjectId::table(&spec.table)],
            ObjectSpec::Trigger(spec) => vec![
                ObjectId::table(&spec.table),
                ObjectId::function(&spec.function),
            ],
            ObjectSpec::Function(_) | ObjectSpec::Bucket(_) => Vec::new(),
        }
    }
}

impl From<TableSpec> for ObjectSpec {
    fn from(spec: TableSpec) -> Self {
        ObjectSpec::Table(spec)
    }
}

impl From<IndexSpec> for ObjectSpec {
    fn from(spec: IndexSpec) -> Self {
        ObjectSpec::Index(spec)
    }
}

impl From<PolicySpec> for ObjectSpec {
    fn from(spec: PolicySpec) -> Self {
        ObjectSpec::Policy(spec)
    }
}

impl From<FunctionSpec> for ObjectSpec {
    fn from(spec: FunctionSpec) -> Self {
        ObjectSpec::Function(spec)
    }
}

impl From<TriggerSpec> for ObjectSpec {
    fn from(spec: TriggerSpec) -> Self {
        ObjectSpec::Trigger(spec)
    }
}

impl From<BucketSpec> for ObjectSpec {
    fn from(spec: BucketSpec) -> Self {
        ObjectSpec::Bucket(spec)
    }
}

/// One declarative unit of backend structure.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaObject {
    /// Object name, unique within its kind.
    pub name: String,
    /// Objects that must exist before this one is applied.
    pub depends_on: BTreeSet<ObjectId>,
    /// Opaque backend unit (DDL text, policy statement, bucket config).
    pub definition: String,
    /// Whether mutations on this object are captured in the audit trail.
    /// Only meaningful for tables.
    pub audit_enabled: bool,
    /// Whether a failed apply of this object fails the whole run.
    pub required: bool,
    /// Kind-specific attributes.
    pub spec: ObjectSpec,
}

impl SchemaObject {
    /// Create an object from a spec.
    ///
    /// Structural dependencies (foreign key targets, owning tables, trigger
    /// functions) are added to `depends_on` and the definition is rendered
    /// from the spec.
    pub fn new(name: impl Into<String>, spec: ObjectSpec) -> Self {
        let name = name.into();
        let depends_on = spec.implied_dependencies(&name).into_iter().collect();
        let definition = spec.render(&name);
        Self {
            name,
            depends_on,
            definition,
            audit_enabled: false,
            required: true,
            spec,
        }
    }

    /// Create a table.
    pub fn table(name: impl Into<String>, spec: TableSpec) -> Self {
        Self::new(name, ObjectSpec::Table(spec))
    }

    /// Create an index.
    pub fn index(name: impl Into<String>, spec: IndexSpec) -> Self {
        Self::new(name, ObjectSpec::Index(spec))
    }

    /// Create a row-level policy.
    pub fn policy(name: impl Into<String>, spec: PolicySpec) -> Self {
        Self::new(name, ObjectSpec::Policy(spec))
    }

    /// Create a function.
    pub fn function(name: impl Into<String>, spec: FunctionSpec) -> Self {
        Self::new(name, ObjectSpec::Function(spec))
    }

    /// Create a trigger.
    pub fn trigger(name: impl Into<String>, spec: TriggerSpec) -> Self {
        Self::new(name, ObjectSpec::Trigger(spec))
    }

    /// Create a storage bucket.
    pub fn bucket(name: impl Into<String>, spec: BucketSpec) -> Self {
        Self::new(name, ObjectSpec::Bucket(spec))
    }

    /// Add an explicit dependency.
    pub fn depends_on(mut self, id: ObjectId) -> Self {
        self.depends_on.insert(id);
        self
    }

    /// Add several explicit dependencies.
    pub fn depends_on_all(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.depends_on.extend(ids);
        self
    }

    /// Replace the rendered definition with an explicit one.
    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }

    /// Enable audit capture.
    pub fn with_audit(mut self) -> Self {
        self.audit_enabled = true;
        self
    }

    /// Mark the object as optional for the overall run status.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Identifier of this object.
    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.kind(), &self.name)
    }

    /// Kind of this object.
    pub fn kind(&self) -> ObjectKind {
        self.spec.kind()
    }

    /// Whether row-level security is enabled. Always false for non-tables.
    pub fn rls_enabled(&self) -> bool {
        match &self.spec {
            ObjectSpec::Table(spec) => spec.rls_enabled,
            _ => false,
        }
    }

    /// Table attributes, if this object is a table.
    pub fn as_table(&self) -> Option<&TableSpec> {
        match &self.spec {
            ObjectSpec::Table(spec) => Some(spec),
            _ => None,
        }
    }

    /// Index attributes, if this object is an index.
    pub fn as_index(&self) -> Option<&IndexSpec> {
        match &self.spec {
            ObjectSpec::Index(spec) => Some(spec),
            _ => None,
        }
    }

    /// Policy attributes, if this object is a policy.
    pub fn as_policy(&self) -> Option<&PolicySpec> {
        match &self.spec {
            ObjectSpec::Policy(spec) => Some(spec),
            _ => None,
        }
    }

    /// Trigger attributes, if this object is a trigger.
    pub fn as_trigger(&self) -> Option<&TriggerSpec> {
        match &self.spec {
            ObjectSpec::Trigger(spec) => Some(spec),
            _ => None,
        }
    }

    /// Bucket attributes, if this object is a bucket.
    pub fn as_bucket(&self) -> Option<&BucketSpec> {
        match &self.spec {
            ObjectSpec::Bucket(spec) => Some(spec),
            _ => None,
        }
    }

    /// The full unit handed to a SQL backend.
    ///
    /// For tables with row-level security this appends the statement that
    /// enables it, so RLS is never a separate, forgettable step.
    pub fn unit_text(&self) -> String {
        match &self.spec {
            ObjectSpec::Table(spec) if spec.rls_enabled => format!(
                "{}\nALTER TABLE {} ENABLE ROW LEVEL SECURITY;",
                self.definition.trim_end(),
                self.name
            ),
            _ => self.definition.clone(),
        }
    }

    /// Blake3 fingerprint of the unit text, hex encoded.
    pub fn definition_hash(&self) -> String {
        hex::encode(blake3::hash(self.unit_text().as_bytes()).as_bytes())
    }

    /// Check invariants that do not depend on the rest of the model.
    pub fn check_intrinsic(&self) -> Result<(), ModelError> {
        let fail = |message: String| {
            Err(ModelError::Validation {
                object: self.id(),
                message,
            })
        };

        if self.name.trim().is_empty() {
            return fail("name must not be empty".to_string());
        }
        if self.definition.trim().is_empty() {
            return fail("definition must not be empty".to_string());
        }
        if self.depends_on.contains(&self.id()) {
            return fail("object depends on itself".to_string());
        }

        match &self.spec {
            ObjectSpec::Table(spec) => {
                if let Err(message) = spec.check_columns() {
                    return fail(message);
                }
                for fk in &spec.foreign_keys {
                    if fk.referenced_table == self.name {
                        continue;
                    }
                    if !self.depends_on.contains(&ObjectId::table(&fk.referenced_table)) {
                        return fail(format!(
                            "foreign key {} references table {} which is not declared in depends_on",
                            fk.column, fk.referenced_table
                        ));
                    }
                }
            }
            ObjectSpec::Index(spec) => {
                if spec.columns.is_empty() {
                    return fail("index has no columns".to_string());
                }
                self.require_table(&spec.table)?;
            }
            ObjectSpec::Policy(spec) => self.require_table(&spec.table)?,
            ObjectSpec::Trigger(spec) => {
                self.require_table(&spec.table)?;
                if !self.depends_on.contains(&ObjectId::function(&spec.function)) {
                    return fail(format!(
                        "trigger function {} is not declared in depends_on",
                        spec.function
                    ));
                }
                if spec.events.is_empty() {
                    return fail("trigger has no events".to_string());
                }
            }
            ObjectSpec::Function(_) | ObjectSpec::Bucket(_) => {}
        }

        Ok(())
    }

    fn require_table(&self, table: &str) -> Result<(), ModelError> {
        if self.depends_on.contains(&ObjectId::table(table)) {
            Ok(())
        } else {
            Err(ModelError::Validation {
                object: self.id(),
                message: format!("owning table {} is not declared in depends_on", table),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDef, ForeignKeyDef, PolicyOperation};

    fn sessions() -> SchemaObject {
        SchemaObject::table(
            "treatment_sessions",
            TableSpec::new(vec![
                ColumnDef::new("id", "UUID").not_null(),
                ColumnDef::new("patient_id", "UUID"),
            ])
            .with_primary_key(["id"])
            .with_foreign_key(ForeignKeyDef::new("patient_id", "patients", "id")),
        )
    }

    #[test]
    fn test_kind_rank_order() {
        let mut kinds = vec![
            ObjectKind::Bucket,
            ObjectKind::Policy,
            ObjectKind::Table,
            ObjectKind::Trigger,
            ObjectKind::Index,
            ObjectKind::Function,
        ];
        kinds.sort();
        assert_eq!(kinds, ObjectKind::ALL.to_vec());
        assert!(ObjectKind::Table.rank() < ObjectKind::Bucket.rank());
    }

    #[test]
    fn test_object_id_display_and_parse() {
        let id = ObjectId::table("patients");
        assert_eq!(id.to_string(), "table:patients");
        assert_eq!("table:patients".parse::<ObjectId>().unwrap(), id);

        assert!("patients".parse::<ObjectId>().is_err());
        assert!("view:patients".parse::<ObjectId>().is_err());
        assert!("table:".parse::<ObjectId>().is_err());
    }

    #[test]
    fn test_object_id_serde_as_string() {
        let id = ObjectId::index("idx_patients_name");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"index:idx_patients_name\"");
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_foreign_key_implies_dependency() {
        let table = sessions();
        assert!(table.depends_on.contains(&ObjectId::table("patients")));
        assert!(table.check_intrinsic().is_ok());
    }

    #[test]
    fn test_self_reference_is_not_a_dependency() {
        let table = SchemaObject::table(
            "care_plans",
            TableSpec::new(vec![
                ColumnDef::new("id", "UUID").not_null(),
                ColumnDef::new("parent_id", "UUID"),
            ])
            .with_primary_key(["id"])
            .with_foreign_key(ForeignKeyDef::new("parent_id", "care_plans", "id")),
        );
        assert!(table.depends_on.is_empty());
        assert!(table.check_intrinsic().is_ok());
    }

    #[test]
    fn test_missing_fk_dependency_is_rejected() {
        let mut table = sessions();
        table.depends_on.clear();
        let err = table.check_intrinsic().unwrap_err();
        assert!(matches!(err, ModelError::Validation { .. }));
        assert!(err.to_string().contains("patients"));
    }

    #[test]
    fn test_policy_requires_owning_table() {
        let mut policy = SchemaObject::policy(
            "patients_view_own_data",
            PolicySpec::new("patients", PolicyOperation::Select, "auth.uid() = id"),
        );
        assert!(policy.check_intrinsic().is_ok());

        policy.depends_on.clear();
        assert!(policy.check_intrinsic().is_err());
    }

    #[test]
    fn test_unit_text_enables_rls() {
        let table = sessions();
        let unit = table.unit_text();
        assert!(unit.starts_with("CREATE TABLE treatment_sessions"));
        assert!(unit.ends_with("ALTER TABLE treatment_sessions ENABLE ROW LEVEL SECURITY;"));

        let mut open = sessions();
        if let ObjectSpec::Table(spec) = &mut open.spec {
            spec.rls_enabled = false;
        }
        assert!(!open.unit_text().contains("ROW LEVEL SECURITY"));
    }

    #[test]
    fn test_definition_hash_tracks_unit_text() {
        let a = sessions();
        let b = sessions().with_definition("CREATE TABLE treatment_sessions (id UUID);");
        assert_eq!(a.definition_hash(), sessions().definition_hash());
        assert_ne!(a.definition_hash(), b.definition_hash());
        assert_eq!(a.definition_hash().len(), 64);
    }
}
