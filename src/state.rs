use std::sync::Arc;

use tracing::info;

use crate::auth::gate::{StoreTokenVerifier, TokenVerifier};
use crate::config::{AppConfig, StoreBackend};
use crate::store::{MemoryUserStore, PgUserStore, UserStore};

/// Shared per-process handles, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenVerifier>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Opens the store; must succeed before the listener is bound.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn UserStore> = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
                let pg = PgUserStore::connect(url, config.max_connections).await?;
                pg.migrate().await?;
                info!("connected to postgres");
                Arc::new(pg)
            }
            StoreBackend::Memory => {
                info!("using in-memory store");
                Arc::new(MemoryUserStore::new())
            }
        };
        Ok(Self::from_parts(store, Arc::new(config)))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        let tokens = Arc::new(StoreTokenVerifier::new(store.clone())) as Arc<dyn TokenVerifier>;
        Self {
            store,
            tokens,
            config,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            store: StoreBackend::Memory,
            database_url: None,
            max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            expose_user_list: true,
        });
        Self::from_parts(Arc::new(MemoryUserStore::new()), config)
    }
}
