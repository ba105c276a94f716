use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        AddDeviceRequest, DeviceCreatedResponse, DeviceListResponse, RemoveDeviceRequest,
        UpdateDeviceRequest,
    },
    repo_types::DevicePatch,
    services,
};
use crate::{
    auth::extractors::Authorized,
    collection::MessageResponse,
    error::AppResult,
    state::AppState,
};

pub fn device_routes() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices))
        .route("/devices/add", post(add_device))
        .route("/devices/update", put(update_device))
        .route("/devices/remove", delete(remove_device))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn list_devices(auth: Authorized) -> Json<DeviceListResponse> {
    Json(DeviceListResponse {
        success: true,
        devices: auth.user.devices,
    })
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn add_device(
    State(state): State<AppState>,
    auth: Authorized<AddDeviceRequest>,
) -> AppResult<Json<DeviceCreatedResponse>> {
    let device = services::add_device(state.store.as_ref(), &auth.user, auth.body).await?;
    Ok(Json(DeviceCreatedResponse {
        success: true,
        message: "Device added",
        device,
    }))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn update_device(
    State(state): State<AppState>,
    auth: Authorized<UpdateDeviceRequest>,
) -> AppResult<Json<MessageResponse>> {
    let Authorized { user, body } = auth;
    let patch = DevicePatch {
        device: body.device,
        ip: body.ip,
    };
    let id = services::update_device(state.store.as_ref(), &user, body.id.as_ref(), patch).await?;
    Ok(Json(MessageResponse::ok(format!(
        "Device ID {id} updated successfully"
    ))))
}

#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn remove_device(
    State(state): State<AppState>,
    auth: Authorized<RemoveDeviceRequest>,
) -> AppResult<Json<MessageResponse>> {
    let id =
        services::remove_device(state.store.as_ref(), &auth.user, auth.body.id.as_ref()).await?;
    Ok(Json(MessageResponse::ok(format!(
        "Device ID {id} removed successfully"
    ))))
}
