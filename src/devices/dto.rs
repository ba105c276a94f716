use serde::{Deserialize, Serialize};

use crate::{collection::RawId, devices::repo_types::Device};

#[derive(Debug, Default, Deserialize)]
pub struct AddDeviceRequest {
    pub device: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDeviceRequest {
    pub id: Option<RawId>,
    pub device: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveDeviceRequest {
    pub id: Option<RawId>,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub success: bool,
    pub devices: Vec<Device>,
}

#[derive(Debug, Serialize)]
pub struct DeviceCreatedResponse {
    pub success: bool,
    pub message: &'static str,
    pub device: Device,
}
