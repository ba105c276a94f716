use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{commands::repo_types::Command, devices::repo_types::Device};

/// Body for both `/signup` and `/login`. Fields are optional so that a
/// missing value is reported as a validation error rather than a decode error.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Response returned after signup.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub success: bool,
    pub message: &'static str,
    pub username: String,
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}

/// Response returned after login: the token plus the user's collections.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub username: String,
    pub token: String,
    pub commands: Vec<Command>,
    pub devices: Vec<Device>,
}
