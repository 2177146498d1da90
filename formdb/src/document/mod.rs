// Submission record - the unit persisted by the store

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One stored form response. `id` and `created_at` are fixed at creation;
/// `data` is replaced wholesale on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Submission {
    /// Case-insensitive substring match against the id and the serialized data.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        if self.id.to_lowercase().contains(needle) {
            return true;
        }
        serde_json::to_string(&self.data)
            .map(|s| s.to_lowercase().contains(needle))
            .unwrap_or(false)
    }
}
