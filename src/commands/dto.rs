use serde::{Deserialize, Serialize};

use crate::{collection::RawId, commands::repo_types::Command};

#[derive(Debug, Default, Deserialize)]
pub struct AddCommandRequest {
    pub command: Option<String>,
    pub description: Option<String>,
    pub last_used: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCommandRequest {
    pub id: Option<RawId>,
    pub command: Option<String>,
    pub description: Option<String>,
    pub last_used: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveCommandRequest {
    pub id: Option<RawId>,
}

/// One entry of an import batch; same fields as a single add.
pub type ImportItem = AddCommandRequest;

#[derive(Debug, Default, Deserialize)]
pub struct ImportCommandsRequest {
    pub commands: Option<Vec<ImportItem>>,
}

#[derive(Debug, Serialize)]
pub struct CommandListResponse {
    pub success: bool,
    pub commands: Vec<Command>,
}

#[derive(Debug, Serialize)]
pub struct CommandCreatedResponse {
    pub success: bool,
    pub message: &'static str,
    pub command: Command,
}

#[derive(Debug, Serialize)]
pub struct CommandsImportedResponse {
    pub success: bool,
    pub message: String,
    pub commands: Vec<Command>,
}
