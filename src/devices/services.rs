use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::{
    auth::repo_types::User,
    collection::{next_after, present, RawId},
    devices::{
        dto::AddDeviceRequest,
        repo_types::{Device, DevicePatch},
    },
    error::{AppError, AppResult, StoreError},
    store::{Collection, UserStore},
};

/// Max-of-tail over string ids: parse the tail, add one, stringify.
pub fn next_device_id(devices: &[Device]) -> Result<String, StoreError> {
    let tail = devices
        .last()
        .map(|d| {
            d.id.trim()
                .parse::<i64>()
                .map_err(|_| StoreError::Corrupt(format!("device id {:?}", d.id)))
        })
        .transpose()?;
    Ok(next_after(tail)?.to_string())
}

fn device_id(raw: Option<&RawId>, action: &str) -> AppResult<String> {
    raw.and_then(RawId::as_text)
        .ok_or_else(|| AppError::validation(format!("Device ID is required for {action}")))
}

pub async fn add_device(
    store: &dyn UserStore,
    user: &User,
    req: AddDeviceRequest,
) -> AppResult<Device> {
    let (Some(name), Some(ip)) = (present(req.device), present(req.ip)) else {
        return Err(AppError::validation("Device name and IP are required"));
    };
    let id = next_device_id(&user.devices)
        .map_err(|e| AppError::server("Server error during device addition", e))?;
    let device = Device {
        id,
        device: name,
        ip,
    };

    let elem = serde_json::to_value(&device)
        .map_err(|e| AppError::server("Server error during device addition", e))?;
    let modified = store
        .push(user.id, Collection::Devices, vec![elem])
        .await
        .map_err(|e| AppError::server("Server error during device addition", e))?;
    if modified == 0 {
        return Err(AppError::server(
            "Server error during device addition",
            anyhow::anyhow!("user {} vanished before push", user.id),
        ));
    }

    info!(user_id = %user.id, device_id = %device.id, "device added");
    Ok(device)
}

pub async fn update_device(
    store: &dyn UserStore,
    user: &User,
    id: Option<&RawId>,
    patch: DevicePatch,
) -> AppResult<String> {
    let id = device_id(id, "update")?;
    let patch = DevicePatch {
        device: present(patch.device),
        ip: present(patch.ip),
    };
    if patch.is_empty() {
        return Err(AppError::validation("No fields provided for update"));
    }

    let fields = match serde_json::to_value(&patch) {
        Ok(Value::Object(m)) => m,
        Ok(_) => Map::new(),
        Err(e) => return Err(AppError::server("Server error during device update", e)),
    };
    let modified = store
        .set_fields(user.id, Collection::Devices, json!(id), fields)
        .await
        .map_err(|e| AppError::server("Server error during device update", e))?;
    if modified == 0 {
        warn!(user_id = %user.id, device_id = %id, "device update matched nothing");
        return Err(AppError::not_found("Device not found or no change applied"));
    }

    info!(user_id = %user.id, device_id = %id, "device updated");
    Ok(id)
}

pub async fn remove_device(
    store: &dyn UserStore,
    user: &User,
    id: Option<&RawId>,
) -> AppResult<String> {
    let id = device_id(id, "removal")?;
    let modified = store
        .pull(user.id, Collection::Devices, json!(id))
        .await
        .map_err(|e| AppError::server("Server error during device removal", e))?;
    if modified == 0 {
        warn!(user_id = %user.id, device_id = %id, "device removal matched nothing");
        return Err(AppError::not_found("Device not found or already removed"));
    }

    info!(user_id = %user.id, device_id = %id, "device removed");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::repo_types::NewUser, store::MemoryUserStore};

    async fn user(store: &MemoryUserStore) -> User {
        store
            .insert(NewUser {
                username: "alice".into(),
                password_hash: "x".into(),
                token: "tok".into(),
            })
            .await
            .unwrap()
    }

    async fn reload(store: &MemoryUserStore) -> User {
        store.find_by_token("tok").await.unwrap().unwrap()
    }

    fn add(name: &str, ip: &str) -> AddDeviceRequest {
        AddDeviceRequest {
            device: Some(name.into()),
            ip: Some(ip.into()),
        }
    }

    fn dev(id: &str) -> Device {
        Device {
            id: id.into(),
            device: "d".into(),
            ip: "10.0.0.1".into(),
        }
    }

    #[test]
    fn next_id_is_stringified_tail_plus_one() {
        assert_eq!(next_device_id(&[]).unwrap(), "1");
        assert_eq!(next_device_id(&[dev("1"), dev("2")]).unwrap(), "3");
        assert_eq!(next_device_id(&[dev("10"), dev("4")]).unwrap(), "5");
        assert!(matches!(
            next_device_id(&[dev("router")]),
            Err(StoreError::Corrupt(_))
        ));
        let max = i64::MAX.to_string();
        assert!(matches!(
            next_device_id(&[dev(&max)]),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn add_assigns_string_ids() {
        let store = MemoryUserStore::new();
        let u = user(&store).await;
        let d = add_device(&store, &u, add("router", "192.168.0.1")).await.unwrap();
        assert_eq!(d.id, "1");
        let u = reload(&store).await;
        let d = add_device(&store, &u, add("nas", "192.168.0.2")).await.unwrap();
        assert_eq!(d.id, "2");
        assert_eq!(reload(&store).await.devices.len(), 2);
    }

    #[tokio::test]
    async fn add_requires_name_and_ip() {
        let store = MemoryUserStore::new();
        let u = user(&store).await;
        for req in [
            AddDeviceRequest::default(),
            add("router", ""),
            add("", "10.0.0.1"),
        ] {
            let err = add_device(&store, &u, req).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert!(reload(&store).await.devices.is_empty());
    }

    #[tokio::test]
    async fn update_accepts_numeric_id_and_matches_string() {
        let store = MemoryUserStore::new();
        let u = user(&store).await;
        add_device(&store, &u, add("router", "10.0.0.1")).await.unwrap();
        let u = reload(&store).await;

        let id = update_device(
            &store,
            &u,
            Some(&RawId::Int(1)),
            DevicePatch {
                ip: Some("10.0.0.9".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(id, "1");
        let d = &reload(&store).await.devices[0];
        assert_eq!(d.device, "router");
        assert_eq!(d.ip, "10.0.0.9");
    }

    #[tokio::test]
    async fn update_and_remove_unknown_are_not_found() {
        let store = MemoryUserStore::new();
        let u = user(&store).await;
        add_device(&store, &u, add("router", "10.0.0.1")).await.unwrap();
        let u = reload(&store).await;

        let err = update_device(
            &store,
            &u,
            Some(&RawId::Text("5".into())),
            DevicePatch {
                device: Some("x".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = remove_device(&store, &u, Some(&RawId::Int(5))).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(reload(&store).await.devices, u.devices);
    }

    #[tokio::test]
    async fn update_validation() {
        let store = MemoryUserStore::new();
        let u = user(&store).await;
        let err = update_device(&store, &u, None, DevicePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = update_device(&store, &u, Some(&RawId::Int(1)), DevicePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = remove_device(&store, &u, Some(&RawId::Text(" ".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn remove_then_add_follows_the_tail() {
        let store = MemoryUserStore::new();
        let u = user(&store).await;
        for (n, ip) in [("a", "1.1.1.1"), ("b", "2.2.2.2"), ("c", "3.3.3.3")] {
            let fresh = reload(&store).await;
            add_device(&store, &fresh, add(n, ip)).await.unwrap();
        }
        remove_device(&store, &u, Some(&RawId::Text("2".into())))
            .await
            .unwrap();
        let u = reload(&store).await;
        let ids: Vec<_> = u.devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert_eq!(add_device(&store, &u, add("d", "4.4.4.4")).await.unwrap().id, "4");
    }
}
