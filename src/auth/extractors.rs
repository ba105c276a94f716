use std::collections::HashMap;

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequest, Query, Request},
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    Form,
};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};

use super::gate::{self, TokenSources};
use crate::{
    auth::repo_types::User,
    error::{AppError, AppResult},
    state::AppState,
};

pub const TOKEN_HEADER: &str = "x-access-token";

const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Request whose token has been resolved to its owner, plus the decoded body.
///
/// The token is looked up exactly once; handlers receive the resulting user
/// and never query the store for it again.
pub struct Authorized<T = NoBody> {
    pub user: User,
    pub body: T,
}

/// Body type for routes that only need the caller.
#[derive(Debug, Default, Deserialize)]
pub struct NoBody {}

#[async_trait]
impl<T> FromRequest<AppState> for Authorized<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();

        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        let bytes = axum::body::to_bytes(body, BODY_LIMIT)
            .await
            .map_err(|_| AppError::validation("Request body is too large or unreadable"))?;
        let fields = parse_body(parts.headers.get(CONTENT_TYPE), bytes).await?;

        let sources = TokenSources {
            body: fields.get("token").and_then(Value::as_str),
            query: query.get("token").map(String::as_str),
            header: parts.headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()),
        };
        let user = gate::resolve(state.tokens.as_ref(), sources.pick()).await?;

        let body = serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))?;
        Ok(Self { user, body })
    }
}

/// Decoded JSON or form body for routes that do not need a token.
pub struct Payload<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, BODY_LIMIT)
            .await
            .map_err(|_| AppError::validation("Request body is too large or unreadable"))?;
        let fields = parse_body(parts.headers.get(CONTENT_TYPE), bytes).await?;
        serde_json::from_value(Value::Object(fields))
            .map(Payload)
            .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))
    }
}

/// Decode a JSON object or URL-encoded form into a field map.
pub(crate) async fn parse_body(
    content_type: Option<&HeaderValue>,
    bytes: Bytes,
) -> AppResult<Map<String, Value>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    let ct = content_type.and_then(|v| v.to_str().ok()).unwrap_or_default();
    if ct.starts_with("application/x-www-form-urlencoded") {
        return parse_form(bytes).await;
    }
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::validation("Request body must be a JSON object")),
        Err(e) => Err(AppError::validation(format!("Malformed JSON body: {e}"))),
    }
}

async fn parse_form(bytes: Bytes) -> AppResult<Map<String, Value>> {
    let req = Request::builder()
        .method(Method::POST)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(bytes))
        .map_err(|e| AppError::server("Server error while reading request", e))?;
    let Form(pairs) = Form::<HashMap<String, String>>::from_request(req, &())
        .await
        .map_err(|e| AppError::validation(format!("Malformed form body: {e}")))?;
    Ok(pairs
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect())
}
