use anyhow::Context;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::debug;

use crate::users::repo_types::User;

pub fn user_key(email: &str) -> String {
    format!("user:{email}")
}

/// Cache value: the full user row as JSON, timestamps in RFC 3339.
pub fn encode_user(user: &User) -> anyhow::Result<String> {
    serde_json::to_string(user).context("encode user for cache")
}

pub fn decode_user(raw: &str) -> anyhow::Result<User> {
    serde_json::from_str(raw).context("decode cached user")
}

/// Short-lived, non-authoritative user snapshots keyed by email.
#[async_trait]
pub trait UserCache: Send + Sync {
    async fn lookup(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn store(&self, email: &str, user: &User) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct RedisUserCache {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisUserCache {
    pub async fn connect(redis_url: &str, ttl_seconds: u64) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)
            .with_context(|| format!("invalid REDIS_URL {redis_url}"))?;
        let conn = client
            .get_connection_manager()
            .await
            .context("connect to redis")?;
        Ok(Self { conn, ttl_seconds })
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn lookup(&self, email: &str) -> anyhow::Result<Option<User>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(user_key(email))
            .await
            .context("redis get user")?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let user = decode_user(&raw)?;
        debug!(email = %email, "user cache hit");
        Ok(Some(user))
    }

    async fn store(&self, email: &str, user: &User) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let raw = encode_user(user)?;
        let _: () = conn
            .set_ex(user_key(email), raw, self.ttl_seconds)
            .await
            .context("redis set user")?;
        Ok(())
    }
}
