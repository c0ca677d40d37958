//! Table definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

fn default_true() -> bool {
    true
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Backend type name (e.g. `UUID`, `TEXT`, `JSONB`).
    #[serde(rename = "type")]
    pub data_type: String,
    /// Whether the column accepts NULL.
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Extra column constraint, rendered verbatim (e.g. `DEFAULT NOW()`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl ColumnDef {
    /// Create a nullable column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            constraint: None,
        }
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Attach a constraint clause.
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    fn render(&self) -> String {
        let mut line = format!("{} {}", self.name, self.data_type);
        if !self.nullable {
            line.push_str(" NOT NULL");
        }
        if let Some(constraint) = &self.constraint {
            line.push(' ');
            line.push_str(constraint);
        }
        line
    }
}

/// Behavior when a referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnDelete {
    /// Leave dependents alone; the backend rejects the delete if they exist.
    #[default]
    NoAction,
    /// Delete dependent rows.
    Cascade,
    /// Prevent deletion if dependent rows exist.
    Restrict,
    /// Set the referencing column to NULL.
    SetNull,
}

impl OnDelete {
    /// SQL clause keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::NoAction => "NO ACTION",
            OnDelete::Cascade => "CASCADE",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::SetNull => "SET NULL",
        }
    }
}

impl fmt::Display for OnDelete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A foreign key from one column to a column of another table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    /// Referencing column on this table.
    pub column: String,
    /// Referenced table.
    pub referenced_table: String,
    /// Referenced column.
    pub referenced_column: String,
    /// Delete behavior.
    #[serde(default)]
    pub on_delete: OnDelete,
}

impl ForeignKeyDef {
    /// Create a foreign key with `NO ACTION` delete behavior.
    pub fn new(
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
            on_delete: OnDelete::NoAction,
        }
    }

    /// Set delete behavior.
    pub fn with_on_delete(mut self, on_delete: OnDelete) -> Self {
        self.on_delete = on_delete;
        self
    }
}

/// Table attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Human description, carried into the schema documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Ordered column definitions.
    pub columns: Vec<ColumnDef>,
    /// Primary key columns.
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Ordered foreign keys.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDef>,
    /// Whether row-level security is enabled.
    #[serde(default = "default_true")]
    pub rls_enabled: bool,
}

impl TableSpec {
    /// Create a table spec with RLS enabled and no keys.
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            purpose: None,
            columns,
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            rls_enabled: true,
        }
    }

    /// Set the purpose text.
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Set the primary key columns.
    pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add a foreign key.
    pub fn with_foreign_key(mut self, fk: ForeignKeyDef) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Disable row-level security.
    pub fn without_rls(mut self) -> Self {
        self.rls_enabled = false;
        self
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Primary key description, e.g. `id (UUID)`.
    pub fn primary_key_label(&self) -> String {
        self.primary_key
            .iter()
            .map(|name| match self.column(name) {
                Some(col) => format!("{} ({})", name, col.data_type),
                None => name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn check_columns(&self) -> Result<(), String> {
        if self.columns.is_empty() {
            return Err("table has no columns".to_string());
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(format!("duplicate column {}", col.name));
            }
        }

        for pk in &self.primary_key {
            if !seen.contains(pk.as_str()) {
                return Err(format!("primary key column {} is not defined", pk));
            }
        }

        for fk in &self.foreign_keys {
            if !seen.contains(fk.column.as_str()) {
                return Err(format!("foreign key column {} is not defined", fk.column));
            }
        }

        Ok(())
    }

    pub(crate) fn render(&self, name: &str) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {}", c.render()))
            .collect();

        if !self.primary_key.is_empty() {
            lines.push(format!("    PRIMARY KEY ({})", self.primary_key.join(", ")));
        }

        for fk in &self.foreign_keys {
            lines.push(format!(
                "    FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {}",
                fk.column, fk.referenced_table, fk.referenced_column, fk.on_delete
            ));
        }

        let mut sql = format!("CREATE TABLE {} (\n{}\n);", name, lines.join(",\n"));
        if let Some(purpose) = &self.purpose {
            sql.push_str(&format!(
                "\nCOMMENT ON TABLE {} IS '{}';",
                name,
                purpose.replace('\'', "''")
            ));
        }
        sql
    }
}
