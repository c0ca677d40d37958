//! Row-level security policy definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyOperation {
    /// Reads.
    Select,
    /// Inserts.
    Insert,
    /// Updates.
    Update,
    /// Deletes.
    Delete,
    /// Every operation.
    All,
}

impl PolicyOperation {
    /// Check if this operation covers the given one.
    pub fn covers(&self, other: PolicyOperation) -> bool {
        *self == PolicyOperation::All || *self == other
    }

    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            PolicyOperation::Select => "SELECT",
            PolicyOperation::Insert => "INSERT",
            PolicyOperation::Update => "UPDATE",
            PolicyOperation::Delete => "DELETE",
            PolicyOperation::All => "ALL",
        }
    }
}

impl fmt::Display for PolicyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Policy attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySpec {
    /// Owning table.
    pub table: String,
    /// Operation the policy gates.
    pub operation: PolicyOperation,
    /// Boolean expression over caller identity/role and row data.
    pub predicate: String,
    /// Optional `WITH CHECK` expression for writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
}

impl PolicySpec {
    /// Create a policy.
    pub fn new(
        table: impl Into<String>,
        operation: PolicyOperation,
        predicate: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            operation,
            predicate: predicate.into(),
            check: None,
        }
    }

    /// Attach a `WITH CHECK` expression.
    pub fn with_check(mut self, check: impl Into<String>) -> Self {
        self.check = Some(check.into());
        self
    }

    pub(crate) fn render(&self, name: &str) -> String {
        let mut sql = format!(
            "CREATE POLICY \"{}\" ON {}\nFOR {} USING ({})",
            name, self.table, self.operation, self.predicate
        );
        if let Some(check) = &self.check {
            sql.push_str(&format!(" WITH CHECK ({})", check));
        }
        sql.push(';');
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_covers() {
        assert!(PolicyOperation::All.covers(PolicyOperation::Delete));
        assert!(PolicyOperation::Select.covers(PolicyOperation::Select));
        assert!(!PolicyOperation::Select.covers(PolicyOperation::Update));
    }

    #[test]
    fn test_render() {
        let spec = PolicySpec::new(
            "device_logs",
            PolicyOperation::All,
            "auth.role() IN ('service_role', 'admin', 'system')",
        );
        assert_eq!(
            spec.render("system_can_manage_logs"),
            "CREATE POLICY \"system_can_manage_logs\" ON device_logs\nFOR ALL USING (auth.role() IN ('service_role', 'admin', 'system'));"
        );

        let with_check = spec.with_check("auth.role() = 'system'");
        assert!(with_check
            .render("p")
            .ends_with("WITH CHECK (auth.role() = 'system');"));
    }

    #[test]
    fn test_operation_serde() {
        let op: PolicyOperation = serde_json::from_str("\"SELECT\"").unwrap();
        assert_eq!(op, PolicyOperation::Select);
    }
}
