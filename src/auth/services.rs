use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        password::{hash_password, verify_password},
        repo_types::{NewUser, User},
    },
    error::{AppError, AppResult, StoreError},
    store::UserStore,
};

pub const MIN_USERNAME_LEN: usize = 3;

/// Fresh tokens that collide with a stored one are redrawn this many times.
const TOKEN_ATTEMPTS: usize = 3;

/// Outcome of a successful signup.
#[derive(Debug)]
pub struct SignedUp {
    pub id: Uuid,
    pub username: String,
    pub token: String,
}

/// Opaque bearer credential.
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

fn trimmed(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

/// Create an account. Exactly one store write on success.
pub async fn signup(
    store: &dyn UserStore,
    username: Option<&str>,
    password: Option<&str>,
) -> AppResult<SignedUp> {
    let (Some(username), Some(password)) = (trimmed(username), trimmed(password)) else {
        warn!("signup without username or password");
        return Err(AppError::validation("Username and password required"));
    };
    if username.chars().count() < MIN_USERNAME_LEN {
        warn!(%username, "signup username too short");
        return Err(AppError::validation(
            "Username must be at least 3 characters long",
        ));
    }

    match store.find_by_username(username).await {
        Ok(Some(_)) => {
            warn!(%username, "username already taken");
            return Err(AppError::Conflict("Username already taken".into()));
        }
        Ok(None) => {}
        Err(e) => return Err(AppError::server("Server error during registration", e)),
    }

    let password_hash = hash_password(password)
        .map_err(|e| AppError::server("Server error during registration", e))?;

    for _ in 0..TOKEN_ATTEMPTS {
        let new_user = NewUser {
            username: username.to_string(),
            password_hash: password_hash.clone(),
            token: generate_token(),
        };
        match store.insert(new_user).await {
            Ok(user) => {
                info!(user_id = %user.id, username = %user.username, "user registered");
                return Ok(SignedUp {
                    id: user.id,
                    username: user.username,
                    token: user.token,
                });
            }
            Err(StoreError::Duplicate("token")) => {
                warn!("generated token collided; retrying");
            }
            // lost a race against a concurrent signup for the same name
            Err(StoreError::Duplicate(_)) => {
                return Err(AppError::Conflict("Username already taken".into()));
            }
            Err(e) => return Err(AppError::server("Server error during registration", e)),
        }
    }
    Err(AppError::server(
        "Server error during registration",
        anyhow::anyhow!("could not allocate a unique token"),
    ))
}

/// Check credentials; performs no writes. An unknown user and a wrong
/// password are reported identically.
pub async fn login(
    store: &dyn UserStore,
    username: Option<&str>,
    password: Option<&str>,
) -> AppResult<User> {
    let (Some(username), Some(password)) = (trimmed(username), trimmed(password)) else {
        warn!("login without username or password");
        return Err(AppError::validation("Username and password required"));
    };

    let user = match store.find_by_username(username).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%username, "login unknown username");
            return Err(AppError::Authentication);
        }
        Err(e) => return Err(AppError::server("Server error during login", e)),
    };

    match verify_password(password, &user.password_hash) {
        Ok(true) => {
            info!(user_id = %user.id, "user logged in");
            Ok(user)
        }
        Ok(false) => {
            warn!(user_id = %user.id, "login invalid password");
            Err(AppError::Authentication)
        }
        Err(e) => {
            error!(error = %e, user_id = %user.id, "stored password hash is unreadable");
            Err(AppError::Authentication)
        }
    }
}
