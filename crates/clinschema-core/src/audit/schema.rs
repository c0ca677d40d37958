//! Schema objects generated for audited tables.

use super::{AUDIT_TABLE, CAPTURE_FUNCTION, STAMP_FUNCTION};
use crate::catalog::{
    ColumnDef, FunctionSpec, IndexSpec, ModelError, ObjectId, SchemaModel, SchemaObject,
    TableSpec, TriggerEvent, TriggerSpec, TriggerTiming,
};
use tracing::debug;

const CAPTURE_BODY: &str = r#"BEGIN
    INSERT INTO audit_trail (
        table_name, record_id, action, old_data, new_data,
        user_id, user_role, ip_address, user_agent
    ) VALUES (
        TG_TABLE_NAME,
        CASE WHEN TG_OP = 'DELETE' THEN OLD.id ELSE NEW.id END,
        TG_OP,
        CASE WHEN TG_OP IN ('UPDATE', 'DELETE') THEN to_jsonb(OLD) END,
        CASE WHEN TG_OP IN ('INSERT', 'UPDATE') THEN to_jsonb(NEW) END,
        auth.uid(),
        auth.role(),
        inet_client_addr(),
        current_setting('request.headers', true)::json->>'user-agent'
    );
    IF TG_OP = 'DELETE' THEN
        RETURN OLD;
    END IF;
    RETURN NEW;
END;"#;

const STAMP_BODY: &str = r#"BEGIN
    NEW.updated_at = NOW();
    NEW.updated_by = auth.uid();
    RETURN NEW;
END;"#;

/// Indexed columns of the audit trail table.
const INDEXED_COLUMNS: [&str; 5] = ["table_name", "record_id", "timestamp", "user_id", "action"];

/// Generator for the audit trail object family.
pub struct AuditTrail;

impl AuditTrail {
    /// The `audit_trail` table.
    pub fn table() -> SchemaObject {
        let spec = TableSpec::new(vec![
            ColumnDef::new("id", "UUID")
                .not_null()
                .with_constraint("DEFAULT gen_random_uuid()"),
            ColumnDef::new("table_name", "TEXT").not_null(),
            ColumnDef::new("record_id", "UUID").not_null(),
            ColumnDef::new("action", "TEXT")
                .not_null()
                .with_constraint("CHECK (action IN ('INSERT', 'UPDATE', 'DELETE'))"),
            ColumnDef::new("old_data", "JSONB"),
            ColumnDef::new("new_data", "JSONB"),
            ColumnDef::new("user_id", "UUID"),
            ColumnDef::new("user_role", "TEXT"),
            ColumnDef::new("ip_address", "INET"),
            ColumnDef::new("user_agent", "TEXT"),
            ColumnDef::new("timestamp", "TIMESTAMP WITH TIME ZONE")
                .with_constraint("DEFAULT NOW()"),
        ])
        .with_primary_key(["id"])
        .with_purpose("Audit trail for all database changes - IEC 62304 compliance");

        SchemaObject::table(AUDIT_TABLE, spec)
    }

    /// Lookup indexes on the audit trail table.
    pub fn indexes() -> Vec<SchemaObject> {
        INDEXED_COLUMNS
            .iter()
            .map(|column| {
                SchemaObject::index(
                    format!("idx_audit_{}", column),
                    IndexSpec::new(AUDIT_TABLE, [*column]),
                )
            })
            .collect()
    }

    /// The row trigger function that writes audit records.
    ///
    /// Depends on the audit table so the function is never live without
    /// somewhere to write.
    pub fn capture_function() -> SchemaObject {
        SchemaObject::function(
            CAPTURE_FUNCTION,
            FunctionSpec::new("TRIGGER", CAPTURE_BODY).security_definer(),
        )
        .depends_on(ObjectId::table(AUDIT_TABLE))
    }

    /// The BEFORE UPDATE function that stamps the acting user.
    pub fn stamp_function() -> SchemaObject {
        SchemaObject::function(
            STAMP_FUNCTION,
            FunctionSpec::new("TRIGGER", STAMP_BODY).security_definer(),
        )
    }

    /// Name of the capture trigger for a table.
    pub fn capture_trigger_name(table: &str) -> String {
        format!("audit_{}", table)
    }

    /// Name of the actor stamping trigger for a table.
    pub fn stamp_trigger_name(table: &str) -> String {
        format!("stamp_{}", table)
    }

    /// AFTER INSERT/UPDATE/DELETE capture trigger for a table.
    pub fn capture_trigger(table: &str) -> SchemaObject {
        SchemaObject::trigger(
            Self::capture_trigger_name(table),
            TriggerSpec::new(table, CAPTURE_FUNCTION, TriggerTiming::After, TriggerEvent::ALL)
                .capturing_audit(),
        )
    }

    /// BEFORE UPDATE stamping trigger for a table.
    pub fn stamp_trigger(table: &str) -> SchemaObject {
        SchemaObject::trigger(
            Self::stamp_trigger_name(table),
            TriggerSpec::new(table, STAMP_FUNCTION, TriggerTiming::Before, [TriggerEvent::Update]),
        )
    }

    /// Objects whose successful apply makes the audit hook on `table` live.
    pub fn hook_objects_for(table: &str) -> Vec<ObjectId> {
        vec![
            ObjectId::trigger(Self::capture_trigger_name(table)),
            ObjectId::function(CAPTURE_FUNCTION),
            ObjectId::table(AUDIT_TABLE),
        ]
    }

    /// Names of audited tables in the model, excluding the audit table.
    pub fn audited_tables(model: &SchemaModel) -> Vec<String> {
        model
            .tables()
            .filter(|(object, _)| object.audit_enabled && object.name != AUDIT_TABLE)
            .map(|(object, _)| object.name.clone())
            .collect()
    }

    /// Add the audit object family to a model.
    ///
    /// Objects already declared under the same identifier are left alone, so
    /// installing twice is a no-op. Returns the identifiers that were added.
    pub fn install(model: &mut SchemaModel) -> Result<Vec<ObjectId>, ModelError> {
        let mut stamped = Vec::new();
        let audited: Vec<String> = model
            .tables()
            .filter(|(object, _)| object.audit_enabled && object.name != AUDIT_TABLE)
            .map(|(object, spec)| {
                if spec.has_column("updated_at") && spec.has_column("updated_by") {
                    stamped.push(object.name.clone());
                }
                object.name.clone()
            })
            .collect();

        let mut objects = vec![Self::table()];
        objects.extend(Self::indexes());
        objects.push(Self::capture_function());
        if !stamped.is_empty() {
            objects.push(Self::stamp_function());
        }
        objects.extend(audited.iter().map(|table| Self::capture_trigger(table)));
        objects.extend(stamped.iter().map(|table| Self::stamp_trigger(table)));

        let mut added = Vec::new();
        for object in objects {
            let id = object.id();
            if model.contains(&id) {
                continue;
            }
            model.add_object(object)?;
            debug!(object = %id, "added audit object");
            added.push(id);
        }

        Ok(added)
    }
}
