use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    auth::repo_types::User,
    error::{AppError, AppResult, StoreError},
    store::UserStore,
};

/// Strategy that turns a bearer token into its owner. Expiry or rotation
/// checks belong in an implementation of this trait, not in handlers.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `token` is already trimmed and non-empty.
    async fn verify(&self, token: &str) -> Result<Option<User>, StoreError>;
}

/// Tokens are opaque and never expire: a token is valid while a user holds it.
pub struct StoreTokenVerifier {
    store: Arc<dyn UserStore>,
}

impl StoreTokenVerifier {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TokenVerifier for StoreTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Option<User>, StoreError> {
        self.store.find_by_token(token).await
    }
}

/// Places a token may arrive, highest priority first.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenSources<'a> {
    pub body: Option<&'a str>,
    pub query: Option<&'a str>,
    pub header: Option<&'a str>,
}

impl<'a> TokenSources<'a> {
    /// First non-empty source, trimmed. A whitespace-only value still wins
    /// and trims to empty, which [`resolve`] reports as a missing token.
    pub fn pick(&self) -> Option<&'a str> {
        [self.body, self.query, self.header]
            .into_iter()
            .flatten()
            .find(|t| !t.is_empty())
            .map(str::trim)
    }
}

/// Resolve a request's token to the full user record.
pub async fn resolve(verifier: &dyn TokenVerifier, token: Option<&str>) -> AppResult<User> {
    let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
        warn!("request without access token");
        return Err(AppError::MissingToken);
    };
    match verifier.verify(token).await {
        Ok(Some(user)) => {
            debug!(user_id = %user.id, "token resolved");
            Ok(user)
        }
        Ok(None) => {
            warn!("unknown access token");
            Err(AppError::UnknownToken)
        }
        Err(e) => Err(AppError::server("Server error during token validation", e)),
    }
}
