use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{apply_pull, apply_push, apply_set, Collection, UserStore};
use crate::{
    auth::repo_types::{NewUser, User},
    error::StoreError,
};

/// In-process store. Each operator runs under the write lock, so it is atomic
/// with respect to every other operator on the same store.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, user_id: Uuid, collection: Collection, op: F) -> Result<u64, StoreError>
    where
        F: FnOnce(&mut Vec<Value>) -> u64 + Send,
    {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.id == user_id) else {
            return Ok(0);
        };

        let mut elems = match collection {
            Collection::Commands => to_values(&user.commands)?,
            Collection::Devices => to_values(&user.devices)?,
        };
        let modified = op(&mut elems);
        if modified > 0 {
            // decode before assigning so a bad element leaves the user untouched
            match collection {
                Collection::Commands => user.commands = from_values(elems)?,
                Collection::Devices => user.devices = from_values(elems)?,
            }
        }
        Ok(modified)
    }
}

fn to_values<T: Serialize>(items: &[T]) -> Result<Vec<Value>, StoreError> {
    items
        .iter()
        .map(|i| serde_json::to_value(i).map_err(StoreError::from))
        .collect()
}

fn from_values<T: DeserializeOwned>(elems: Vec<Value>) -> Result<Vec<T>, StoreError> {
    Ok(serde_json::from_value(Value::Array(elems))?)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.token == token).cloned())
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == new_user.username) {
            return Err(StoreError::Duplicate("username"));
        }
        if users.iter().any(|u| u.token == new_user.token) {
            return Err(StoreError::Duplicate("token"));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            password_hash: new_user.password_hash,
            token: new_user.token,
            commands: Vec::new(),
            devices: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.clone())
    }

    async fn push(
        &self,
        user_id: Uuid,
        collection: Collection,
        items: Vec<Value>,
    ) -> Result<u64, StoreError> {
        self.update(user_id, collection, |elems| apply_push(elems, items))
            .await
    }

    async fn pull(
        &self,
        user_id: Uuid,
        collection: Collection,
        id: Value,
    ) -> Result<u64, StoreError> {
        self.update(user_id, collection, |elems| apply_pull(elems, &id))
            .await
    }

    async fn set_fields(
        &self,
        user_id: Uuid,
        collection: Collection,
        id: Value,
        fields: Map<String, Value>,
    ) -> Result<u64, StoreError> {
        self.update(user_id, collection, |elems| apply_set(elems, &id, &fields))
            .await
    }
}
