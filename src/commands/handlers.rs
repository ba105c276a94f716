use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        AddCommandRequest, CommandCreatedResponse, CommandListResponse, CommandsImportedResponse,
        ImportCommandsRequest, RemoveCommandRequest, UpdateCommandRequest,
    },
    repo_types::CommandPatch,
    services,
};
use crate::{
    auth::extractors::Authorized,
    collection::MessageResponse,
    error::AppResult,
    state::AppState,
};

pub fn command_routes() -> Router<AppState> {
    Router::new()
        .route("/commands", get(list_commands))
        .route("/commands/add", post(add_command))
        .route("/commands/update", put(update_command))
        .route("/commands/remove", delete(remove_command))
        .route("/commands/import", post(import_commands))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn list_commands(auth: Authorized) -> Json<CommandListResponse> {
    Json(CommandListResponse {
        success: true,
        commands: auth.user.commands,
    })
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn add_command(
    State(state): State<AppState>,
    auth: Authorized<AddCommandRequest>,
) -> AppResult<Json<CommandCreatedResponse>> {
    let command = services::add_command(state.store.as_ref(), &auth.user, auth.body).await?;
    Ok(Json(CommandCreatedResponse {
        success: true,
        message: "Command added",
        command,
    }))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn update_command(
    State(state): State<AppState>,
    auth: Authorized<UpdateCommandRequest>,
) -> AppResult<Json<MessageResponse>> {
    let Authorized { user, body } = auth;
    let patch = CommandPatch {
        command: body.command,
        description: body.description,
        last_used: body.last_used,
    };
    let id = services::update_command(state.store.as_ref(), &user, body.id.as_ref(), patch).await?;
    Ok(Json(MessageResponse::ok(format!(
        "Command ID {id} updated successfully"
    ))))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn remove_command(
    State(state): State<AppState>,
    auth: Authorized<RemoveCommandRequest>,
) -> AppResult<Json<MessageResponse>> {
    let id = services::remove_command(state.store.as_ref(), &auth.user, auth.body.id.as_ref())
        .await?;
    Ok(Json(MessageResponse::ok(format!(
        "Command ID {id} removed successfully"
    ))))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn import_commands(
    State(state): State<AppState>,
    auth: Authorized<ImportCommandsRequest>,
) -> AppResult<Json<CommandsImportedResponse>> {
    let commands =
        services::import_commands(state.store.as_ref(), &auth.user, auth.body.commands).await?;
    Ok(Json(CommandsImportedResponse {
        success: true,
        message: format!("{} commands imported", commands.len()),
        commands,
    }))
}
