use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{commands::repo_types::Command, devices::repo_types::Device};

/// User document as held by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,                   // store-assigned id
    pub username: String,           // unique, >= 3 chars
    #[serde(skip_serializing, default)]
    pub password_hash: String,      // Argon2 hash, not exposed in JSON
    pub token: String,              // opaque bearer credential
    pub commands: Vec<Command>,
    pub devices: Vec<Device>,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields needed to create a user; sequences start empty.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub token: String,
}
