use serde::{Deserialize, Serialize};

/// Named network endpoint. Ids are integers encoded as strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub device: String,
    pub ip: String,
}

#[derive(Debug, Default, Serialize)]
pub struct DevicePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl DevicePatch {
    pub fn is_empty(&self) -> bool {
        self.device.is_none() && self.ip.is_none()
    }
}
