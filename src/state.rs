use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::{
    jwt::JwtKeys,
    memory::MemoryUserStore,
    repo::{PgUserStore, UserStore},
};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
    pub keys: JwtKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = if config.uses_memory_store() {
            warn!("using in-memory user store; accounts are lost on restart");
            Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
        } else {
            let db = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&config.database_url)
                .await
                .context("connect to database")?;
            sqlx::migrate!("./migrations")
                .run(&db)
                .await
                .context("run migrations")?;
            info!("database ready");
            Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>
        };

        let state = Self::from_parts(config, store);
        info!(token_ttl_secs = state.keys.ttl().as_secs(), "auth state ready");
        Ok(state)
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> Self {
        let keys = JwtKeys::new(&config.jwt);
        Self {
            config,
            store,
            keys,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: crate::config::MEMORY_DATABASE_URL.into(),
            database_max_connections: 1,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            password_min_length: 6,
        });
        Self::from_parts(config, Arc::new(MemoryUserStore::new()))
    }
}
