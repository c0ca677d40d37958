//! Schema documentation.
//!
//! [`render`] turns a model, its apply results and the compliance report
//! into a [`SchemaDocument`]. Rendering is pure: the caller supplies the
//! timestamp and does the writing.

use crate::catalog::{ForeignKeyDef, ObjectId, ObjectKind, SchemaModel};
use crate::compliance::ComplianceReport;
use crate::provision::{ApplyResult, ApplyStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing a foreign key reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid foreign key reference '{0}', expected 'column -> table(column)'")]
pub struct ParseForeignKeyError(String);

/// A foreign key as written in documentation: `column -> table(column)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ForeignKeyRef {
    /// Referencing column.
    pub column: String,
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub referenced_column: String,
}

impl From<&ForeignKeyDef> for ForeignKeyRef {
    fn from(fk: &ForeignKeyDef) -> Self {
        Self {
            column: fk.column.clone(),
            table: fk.referenced_table.clone(),
            referenced_column: fk.referenced_column.clone(),
        }
    }
}

impl fmt::Display for ForeignKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}({})", self.column, self.table, self.referenced_column)
    }
}

impl FromStr for ForeignKeyRef {
    type Err = ParseForeignKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseForeignKeyError(s.to_string());

        let (column, target) = s.split_once("->").ok_or_else(invalid)?;
        let (table, rest) = target.trim().split_once('(').ok_or_else(invalid)?;
        let referenced_column = rest.strip_suffix(')').ok_or_else(invalid)?;

        let (column, table, referenced_column) =
            (column.trim(), table.trim(), referenced_column.trim());
        if column.is_empty() || table.is_empty() || referenced_column.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            column: column.to_string(),
            table: table.to_string(),
            referenced_column: referenced_column.to_string(),
        })
    }
}

impl TryFrom<String> for ForeignKeyRef {
    type Error = ParseForeignKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ForeignKeyRef> for String {
    fn from(fk: ForeignKeyRef) -> Self {
        fk.to_string()
    }
}

/// Per-table documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDoc {
    /// Table purpose.
    #[serde(default)]
    pub purpose: String,
    /// Primary key description, e.g. `id (UUID)`.
    pub primary_key: String,
    /// Foreign keys.
    pub foreign_keys: Vec<ForeignKeyRef>,
    /// Indexed columns, in index declaration order.
    pub indexes: Vec<String>,
    /// Row-level security.
    pub rls_enabled: bool,
    /// Audit capture.
    pub audit_enabled: bool,
    /// Apply status in this run, if the table was attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplyStatus>,
}

/// Condensed compliance outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    /// Whether every check passed.
    pub passed: bool,
    /// Check name to pass/fail.
    pub checks: BTreeMap<String, bool>,
}

/// Machine-readable schema summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Database name.
    pub database_name: String,
    /// Schema version.
    pub version: String,
    /// Compliance standard identifiers.
    pub compliance: Vec<String>,
    /// When the document was generated.
    pub generated_at: DateTime<Utc>,
    /// Tables by name.
    pub tables: BTreeMap<String, TableDoc>,
    /// Function names.
    pub functions: Vec<String>,
    /// Storage bucket names.
    pub storage_buckets: Vec<String>,
    /// Compliance outcome.
    pub compliance_summary: ComplianceSummary,
    /// Blake3 fingerprint of every object's unit, keyed by `kind:name`.
    #[serde(default)]
    pub definition_hashes: BTreeMap<String, String>,
}

impl SchemaDocument {
    /// Serialize as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a document previously written by [`to_json_pretty`].
    ///
    /// [`to_json_pretty`]: SchemaDocument::to_json_pretty
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Header fields the model does not carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    /// Database name.
    pub database_name: String,
    /// Schema version.
    pub version: String,
    /// Compliance standard identifiers.
    pub standards: Vec<String>,
    /// Generation timestamp.
    pub generated_at: DateTime<Utc>,
}

/// Render the documentation for a run.
pub fn render(
    model: &SchemaModel,
    results: &[ApplyResult],
    report: &ComplianceReport,
    meta: &DocumentMeta,
) -> SchemaDocument {
    let statuses: HashMap<&ObjectId, ApplyStatus> =
        results.iter().map(|r| (&r.object, r.status())).collect();

    let mut indexed: HashMap<&str, Vec<String>> = HashMap::new();
    for index in model.objects_of(ObjectKind::Index).filter_map(|o| o.as_index()) {
        let columns = indexed.entry(index.table.as_str()).or_default();
        for column in &index.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    }

    let tables = model
        .tables()
        .map(|(object, spec)| {
            let doc = TableDoc {
                purpose: spec.purpose.clone().unwrap_or_default(),
                primary_key: spec.primary_key_label(),
                foreign_keys: spec.foreign_keys.iter().map(ForeignKeyRef::from).collect(),
                indexes: indexed.remove(object.name.as_str()).unwrap_or_default(),
                rls_enabled: spec.rls_enabled,
                audit_enabled: object.audit_enabled,
                status: statuses.get(&object.id()).copied(),
            };
            (object.name.clone(), doc)
        })
        .collect();

    let names = |kind: ObjectKind| -> Vec<String> {
        model.objects_of(kind).map(|o| o.name.clone()).collect()
    };

    SchemaDocument {
        database_name: meta.database_name.clone(),
        version: meta.version.clone(),
        compliance: meta.standards.clone(),
        generated_at: meta.generated_at,
        tables,
        functions: names(ObjectKind::Function),
        storage_buckets: names(ObjectKind::Bucket),
        compliance_summary: ComplianceSummary {
            passed: report.passed(),
            checks: report
                .iter()
                .map(|(name, check)| (name.to_string(), check.passed))
                .collect(),
        },
        definition_hashes: model
            .iter()
            .map(|o| (o.id().to_string(), o.definition_hash()))
            .collect(),
    }
}
