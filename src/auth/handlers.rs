use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{CredentialsRequest, LoginResponse, SignupResponse},
        extractors::Payload,
        repo_types::User,
        services,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

/// Debug listing of every user.
pub fn user_list_routes() -> Router<AppState> {
    Router::new().route("/users", get(list_users))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Payload(payload): Payload<CredentialsRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let out = services::signup(
        state.store.as_ref(),
        payload.username.as_deref(),
        payload.password.as_deref(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            success: true,
            message: "User registered successfully",
            username: out.username,
            token: out.token,
            user_id: out.id,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Payload(payload): Payload<CredentialsRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = services::login(
        state.store.as_ref(),
        payload.username.as_deref(),
        payload.password.as_deref(),
    )
    .await?;

    Ok(Json(LoginResponse {
        success: true,
        username: user.username,
        token: user.token,
        commands: user.commands,
        devices: user.devices,
    }))
}

/// Password hashes are never serialized; see [`User`].
#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    let users = state
        .store
        .list()
        .await
        .map_err(|e| AppError::server("Failed to fetch users", e))?;
    Ok(Json(users))
}
