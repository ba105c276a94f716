use serde::{Deserialize, Serialize};

/// Saved shell snippet. `id` is unique within its owner's sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Command {
    pub id: i64,
    pub command: String,
    #[serde(default)]
    pub description: String,
    pub last_used: String, // YYYY-MM-DD
}

/// Partial field set for a positional update; absent fields are left alone.
#[derive(Debug, Default, Serialize)]
pub struct CommandPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<String>,
}

impl CommandPatch {
    pub fn is_empty(&self) -> bool {
        self.command.is_none() && self.description.is_none() && self.last_used.is_none()
    }
}
