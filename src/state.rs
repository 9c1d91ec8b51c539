use std::sync::Arc;

use crate::auth::{jwt::TokenService, password::CredentialHasher};
use crate::cache::{RedisUserCache, UserCache};
use crate::config::AppConfig;
use crate::contacts::repo::{ContactRepository, PgContactRepository};
use crate::db;
use crate::mail::{build_mailer, Mailer};
use crate::storage::{Storage, StorageClient};
use crate::users::repo::{PgUserRepository, UserRepository};

/// Everything a handler needs, built once at startup and shared by reference.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub contacts: Arc<dyn ContactRepository>,
    pub cache: Arc<dyn UserCache>,
    pub tokens: Arc<TokenService>,
    pub hasher: CredentialHasher,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let pool = db::connect(&config.database_url).await?;
        if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let cache = RedisUserCache::connect(&config.redis_url, config.user_cache_ttl_seconds).await?;
        let storage = Storage::new(&config.storage, "us-east-1").await?;

        Ok(Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            contacts: Arc::new(PgContactRepository::new(pool)),
            cache: Arc::new(cache),
            tokens: Arc::new(TokenService::new(&config.jwt)),
            hasher: CredentialHasher::new(config.salt_length),
            storage: Arc::new(storage),
            mailer: build_mailer(&config.mail),
            config,
        })
    }
}
