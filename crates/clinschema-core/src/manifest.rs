//! JSON provisioning manifests.
//!
//! A manifest declares database metadata, the compliance posture and every
//! schema object, grouped by kind. Objects may reference each other in any
//! order; references are checked once everything is loaded.

use crate::audit::AuditTrail;
use crate::catalog::{
    BucketSpec, FunctionSpec, IndexSpec, ModelError, ObjectId, ObjectSpec, PolicySpec,
    SchemaModel, SchemaObject, TableSpec, TriggerSpec,
};
use crate::compliance::ComplianceSettings;
use crate::docs::DocumentMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Manifest loading errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest could not be read.
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest is not valid JSON or has the wrong shape.
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    /// The declared objects do not form a valid model.
    #[error("invalid manifest model: {0}")]
    Model(#[from] ModelError),
}

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Database metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Database name.
    pub name: String,
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: String,
}

/// Audit settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Generate the audit trail objects for audited tables.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// One declared object: common attributes plus its kind-specific spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry<T> {
    /// Object name.
    pub name: String,
    /// Extra dependencies beyond those implied by the spec.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ObjectId>,
    /// Explicit backend unit, replacing the rendered one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// Capture mutations in the audit trail (tables only).
    #[serde(default)]
    pub audit_enabled: bool,
    /// Whether a failure fails the run.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Kind-specific attributes.
    #[serde(flatten)]
    pub spec: T,
}

impl<T: Clone + Into<ObjectSpec>> ManifestEntry<T> {
    fn to_object(&self) -> SchemaObject {
        let mut object = SchemaObject::new(&self.name, self.spec.clone().into())
            .depends_on_all(self.depends_on.iter().cloned());
        if let Some(definition) = &self.definition {
            object = object.with_definition(definition);
        }
        object.audit_enabled = self.audit_enabled;
        object.required = self.required;
        object
    }
}

/// A provisioning manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningManifest {
    /// Database metadata.
    pub database: DatabaseInfo,
    /// Encryption posture and standards.
    #[serde(default)]
    pub compliance: ComplianceSettings,
    /// Audit settings.
    #[serde(default)]
    pub audit: AuditSettings,
    /// Tables.
    #[serde(default)]
    pub tables: Vec<ManifestEntry<TableSpec>>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<ManifestEntry<IndexSpec>>,
    /// Row-level policies.
    #[serde(default)]
    pub policies: Vec<ManifestEntry<PolicySpec>>,
    /// Functions.
    #[serde(default)]
    pub functions: Vec<ManifestEntry<FunctionSpec>>,
    /// Triggers.
    #[serde(default)]
    pub triggers: Vec<ManifestEntry<TriggerSpec>>,
    /// Storage buckets.
    #[serde(default)]
    pub buckets: Vec<ManifestEntry<BucketSpec>>,
}

impl ProvisioningManifest {
    /// Parse a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a manifest from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ManifestError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Build the schema model: all declared objects, plus the audit trail
    /// family when audit is enabled. References are validated last.
    pub fn to_model(&self) -> Result<SchemaModel, ManifestError> {
        let mut model = SchemaModel::new();

        let objects = self
            .tables
            .iter()
            .map(ManifestEntry::to_object)
            .chain(self.indexes.iter().map(ManifestEntry::to_object))
            .chain(self.policies.iter().map(ManifestEntry::to_object))
            .chain(self.functions.iter().map(ManifestEntry::to_object))
            .chain(self.triggers.iter().map(ManifestEntry::to_object))
            .chain(self.buckets.iter().map(ManifestEntry::to_object));

        for object in objects {
            model.insert_deferred(object)?;
        }

        if self.audit.enabled {
            let added = AuditTrail::install(&mut model)?;
            debug!(count = added.len(), "installed audit trail objects");
        }

        model.validate()?;
        Ok(model)
    }

    /// Documentation header for this manifest.
    pub fn document_meta(&self, generated_at: DateTime<Utc>) -> DocumentMeta {
        DocumentMeta {
            database_name: self.database.name.clone(),
            version: self.database.version.clone(),
            standards: self.compliance.standards.clone(),
            generated_at,
        }
    }
}
