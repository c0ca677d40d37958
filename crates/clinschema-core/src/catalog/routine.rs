//! Stored functions and row triggers.

use serde::{Deserialize, Serialize};
use std::fmt;

fn default_language() -> String {
    "plpgsql".to_string()
}

/// Function attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Argument list, rendered verbatim between the parentheses.
    #[serde(default)]
    pub arguments: String,
    /// Return type clause.
    pub returns: String,
    /// Implementation language.
    #[serde(default = "default_language")]
    pub language: String,
    /// Run with the privileges of the function owner.
    #[serde(default)]
    pub security_definer: bool,
    /// Function body.
    pub body: String,
}

impl FunctionSpec {
    /// Create a plpgsql function.
    pub fn new(returns: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            arguments: String::new(),
            returns: returns.into(),
            language: default_language(),
            security_definer: false,
            body: body.into(),
        }
    }

    /// Set the argument list.
    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self
    }

    /// Run with owner privileges.
    pub fn security_definer(mut self) -> Self {
        self.security_definer = true;
        self
    }

    /// Whether this function can be attached to a trigger.
    pub fn is_trigger_function(&self) -> bool {
        self.returns.eq_ignore_ascii_case("trigger")
    }

    pub(crate) fn render(&self, name: &str) -> String {
        format!(
            "CREATE OR REPLACE FUNCTION {}({})\nRETURNS {} AS $$\n{}\n$$ LANGUAGE {}{};",
            name,
            self.arguments,
            self.returns,
            self.body.trim(),
            self.language,
            if self.security_definer {
                " SECURITY DEFINER"
            } else {
                ""
            }
        )
    }
}

/// When a trigger fires relative to the row write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerTiming {
    /// Before the row is written; may modify the row.
    Before,
    /// After the row is written, inside the same transaction.
    After,
}

impl fmt::Display for TriggerTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerTiming::Before => f.write_str("BEFORE"),
            TriggerTiming::After => f.write_str("AFTER"),
        }
    }
}

/// Row event a trigger fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerEvent {
    /// Row inserted.
    Insert,
    /// Row updated.
    Update,
    /// Row deleted.
    Delete,
}

impl TriggerEvent {
    /// All mutating events.
    pub const ALL: [TriggerEvent; 3] = [
        TriggerEvent::Insert,
        TriggerEvent::Update,
        TriggerEvent::Delete,
    ];
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::Insert => f.write_str("INSERT"),
            TriggerEvent::Update => f.write_str("UPDATE"),
            TriggerEvent::Delete => f.write_str("DELETE"),
        }
    }
}

/// Trigger attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Table the trigger is attached to.
    pub table: String,
    /// Trigger function to execute.
    pub function: String,
    /// Firing time.
    pub timing: TriggerTiming,
    /// Events the trigger fires on.
    pub events: Vec<TriggerEvent>,
    /// Whether the trigger writes audit trail records.
    #[serde(default)]
    pub captures_audit: bool,
}

impl TriggerSpec {
    /// Create a row trigger.
    pub fn new(
        table: impl Into<String>,
        function: impl Into<String>,
        timing: TriggerTiming,
        events: impl IntoIterator<Item = TriggerEvent>,
    ) -> Self {
        Self {
            table: table.into(),
            function: function.into(),
            timing,
            events: events.into_iter().collect(),
            captures_audit: false,
        }
    }

    /// Mark the trigger as an audit capture hook.
    pub fn capturing_audit(mut self) -> Self {
        self.captures_audit = true;
        self
    }

    /// Check if the trigger fires on an event.
    pub fn fires_on(&self, event: TriggerEvent) -> bool {
        self.events.contains(&event)
    }

    pub(crate) fn render(&self, name: &str) -> String {
        let events = self
            .events
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" OR ");
        format!(
            "DROP TRIGGER IF EXISTS {name} ON {table};\nCREATE TRIGGER {name}\n    {timing} {events} ON {table}\n    FOR EACH ROW EXECUTE FUNCTION {function}();",
            name = name,
            table = self.table,
            timing = self.timing,
            events = events,
            function = self.function,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_function() {
        let spec = FunctionSpec::new("TRIGGER", "BEGIN\n    RETURN NEW;\nEND;").security_definer();
        let sql = spec.render("noop");
        assert!(sql.starts_with("CREATE OR REPLACE FUNCTION noop()\nRETURNS TRIGGER AS $$"));
        assert!(sql.ends_with("$$ LANGUAGE plpgsql SECURITY DEFINER;"));
        assert!(spec.is_trigger_function());
    }

    #[test]
    fn test_render_trigger() {
        let spec = TriggerSpec::new(
            "patients",
            "update_patient_timestamp",
            TriggerTiming::Before,
            [TriggerEvent::Update],
        );
        let sql = spec.render("update_patient_timestamp");
        assert!(sql.contains("DROP TRIGGER IF EXISTS update_patient_timestamp ON patients;"));
        assert!(sql.contains("BEFORE UPDATE ON patients"));
        assert!(sql.ends_with("EXECUTE FUNCTION update_patient_timestamp();"));
    }

    #[test]
    fn test_trigger_events() {
        let spec = TriggerSpec::new(
            "patients",
            "audit_trail_capture",
            TriggerTiming::After,
            TriggerEvent::ALL,
        )
        .capturing_audit();
        assert!(spec.fires_on(TriggerEvent::Delete));
        assert!(spec.captures_audit);
        assert!(spec
            .render("audit_patients")
            .contains("AFTER INSERT OR UPDATE OR DELETE ON patients"));
    }

    #[test]
    fn test_function_manifest_defaults() {
        let spec: FunctionSpec =
            serde_json::from_str(r#"{"returns": "INTEGER", "body": "BEGIN RETURN 1; END;"}"#).unwrap();
        assert_eq!(spec.language, "plpgsql");
        assert!(!spec.security_definer);
        assert!(spec.arguments.is_empty());
    }
}
