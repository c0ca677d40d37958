//! Index definitions.

use serde::{Deserialize, Serialize};

/// Index attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Indexed table.
    pub table: String,
    /// Indexed columns, in key order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    /// Create a non-unique index.
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    /// Make the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub(crate) fn render(&self, name: &str) -> String {
        format!(
            "CREATE {}INDEX {} ON {}({});",
            if self.unique { "UNIQUE " } else { "" },
            name,
            self.table,
            self.columns.join(", ")
        )
    }
}
