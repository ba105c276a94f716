use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{Collection, UserStore};
use crate::{
    auth::repo_types::{NewUser, User},
    commands::repo_types::Command,
    devices::repo_types::Device,
    error::StoreError,
};

const USER_COLUMNS: &str = "id, username, password_hash, token, commands, devices, created_at";

/// Row shape of the `users` table; sequences live in `jsonb` arrays.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    token: String,
    commands: Json<Vec<Command>>,
    devices: Json<Vec<Device>>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            token: r.token,
            commands: r.commands.0,
            devices: r.devices.0,
            created_at: r.created_at,
        }
    }
}

/// Postgres-backed store. Every operator is one `UPDATE` on one row.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")
    }

    async fn find_one(&self, column: &'static str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }
}

fn id_filter(id: &Value) -> Json<Value> {
    Json(Value::Array(vec![serde_json::json!({ "id": id })]))
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return if db.constraint() == Some("users_token_key") {
                StoreError::Duplicate("token")
            } else {
                StoreError::Duplicate("username")
            };
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one("username", username).await
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        self.find_one("token", token).await
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, password_hash, token)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.username)
            .bind(&new_user.password_hash)
            .bind(&new_user.token)
            .fetch_one(&self.pool)
            .await
            .map_err(map_insert_error)?;
        Ok(row.into())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn push(
        &self,
        user_id: Uuid,
        collection: Collection,
        items: Vec<Value>,
    ) -> Result<u64, StoreError> {
        let col = collection.field();
        let sql = format!("UPDATE users SET {col} = {col} || $2 WHERE id = $1");
        let res = sqlx::query(&sql)
            .bind(user_id)
            .bind(Json(Value::Array(items)))
            .execute(&self.pool)
            .await?;
        debug!(%user_id, collection = col, rows = res.rows_affected(), "push");
        Ok(res.rows_affected())
    }

    async fn pull(
        &self,
        user_id: Uuid,
        collection: Collection,
        id: Value,
    ) -> Result<u64, StoreError> {
        let col = collection.field();
        let sql = format!(
            r#"
            UPDATE users
               SET {col} = COALESCE(
                       (SELECT jsonb_agg(elem ORDER BY pos)
                          FROM jsonb_array_elements({col}) WITH ORDINALITY AS t(elem, pos)
                         WHERE elem -> 'id' <> $2),
                       '[]'::jsonb)
             WHERE id = $1 AND {col} @> $3
            "#
        );
        let res = sqlx::query(&sql)
            .bind(user_id)
            .bind(Json(&id))
            .bind(id_filter(&id))
            .execute(&self.pool)
            .await?;
        debug!(%user_id, collection = col, rows = res.rows_affected(), "pull");
        Ok(res.rows_affected())
    }

    async fn set_fields(
        &self,
        user_id: Uuid,
        collection: Collection,
        id: Value,
        fields: Map<String, Value>,
    ) -> Result<u64, StoreError> {
        let col = collection.field();
        // Only the first element carrying the id is rewritten; the row is left
        // alone when that element already holds every value.
        let sql = format!(
            r#"
            WITH target AS (
                SELECT t.pos, t.elem
                  FROM users u,
                       jsonb_array_elements(u.{col}) WITH ORDINALITY AS t(elem, pos)
                 WHERE u.id = $1 AND t.elem -> 'id' = $2
                 ORDER BY t.pos
                 LIMIT 1
            )
            UPDATE users
               SET {col} = (SELECT jsonb_agg(
                                     CASE WHEN e.pos = target.pos THEN e.elem || $3 ELSE e.elem END
                                     ORDER BY e.pos)
                              FROM jsonb_array_elements(users.{col}) WITH ORDINALITY AS e(elem, pos))
              FROM target
             WHERE users.id = $1 AND NOT target.elem @> $3
            "#
        );
        let res = sqlx::query(&sql)
            .bind(user_id)
            .bind(Json(&id))
            .bind(Json(Value::Object(fields)))
            .execute(&self.pool)
            .await?;
        debug!(%user_id, collection = col, rows = res.rows_affected(), "set_fields");
        Ok(res.rows_affected())
    }
}
