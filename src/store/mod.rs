//! Identity store: user documents with atomic per-document array operators.

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User},
    error::StoreError,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

/// Array field of a user document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Commands,
    Devices,
}

impl Collection {
    pub fn field(self) -> &'static str {
        match self {
            Collection::Commands => "commands",
            Collection::Devices => "devices",
        }
    }
}

/// Every mutator is a single atomic update of one user document and returns
/// the number of documents it modified (0 or 1).
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the username or token is taken.
    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn list(&self) -> Result<Vec<User>, StoreError>;

    /// Append `items` to the end of `collection`, in order.
    async fn push(
        &self,
        user_id: Uuid,
        collection: Collection,
        items: Vec<Value>,
    ) -> Result<u64, StoreError>;

    /// Remove every element whose `id` equals `id`.
    async fn pull(&self, user_id: Uuid, collection: Collection, id: Value)
        -> Result<u64, StoreError>;

    /// Merge `fields` into the first element whose `id` equals `id`.
    /// Reports 0 when nothing matched or the element already held those values.
    async fn set_fields(
        &self,
        user_id: Uuid,
        collection: Collection,
        id: Value,
        fields: Map<String, Value>,
    ) -> Result<u64, StoreError>;
}

pub(crate) fn apply_push(elems: &mut Vec<Value>, items: Vec<Value>) -> u64 {
    elems.extend(items);
    1
}

pub(crate) fn apply_pull(elems: &mut Vec<Value>, id: &Value) -> u64 {
    let before = elems.len();
    elems.retain(|e| e.get("id") != Some(id));
    u64::from(elems.len() != before)
}

pub(crate) fn apply_set(elems: &mut [Value], id: &Value, fields: &Map<String, Value>) -> u64 {
    let Some(Value::Object(target)) = elems.iter_mut().find(|e| e.get("id") == Some(id)) else {
        return 0;
    };
    let mut modified = 0;
    for (k, v) in fields {
        if target.get(k) != Some(v) {
            target.insert(k.clone(), v.clone());
            modified = 1;
        }
    }
    modified
}
