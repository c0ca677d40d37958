//! Storage bucket definitions.

use serde::{Deserialize, Serialize};

/// Bucket attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BucketSpec {
    /// Whether objects are readable without authentication.
    #[serde(default)]
    pub public: bool,
    /// Human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Maximum object size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_limit: Option<u64>,
    /// Allowed MIME types. Empty means any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_mime_types: Vec<String>,
}

impl BucketSpec {
    /// Create a private bucket.
    pub fn private() -> Self {
        Self::default()
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the object size limit.
    pub fn with_file_size_limit(mut self, bytes: u64) -> Self {
        self.file_size_limit = Some(bytes);
        self
    }

    /// Restrict uploads to the given MIME types.
    pub fn with_allowed_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Bucket creation payload for the storage API.
    pub(crate) fn render(&self, name: &str) -> String {
        let mut payload = serde_json::json!({
            "name": name,
            "public": self.public,
        });
        if let Some(limit) = self.file_size_limit {
            payload["file_size_limit"] = limit.into();
        }
        if !self.allowed_mime_types.is_empty() {
            payload["allowed_mime_types"] = self.allowed_mime_types.clone().into();
        }
        payload.to_string()
    }
}
