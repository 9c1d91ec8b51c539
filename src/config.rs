use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;
use jsonwebtoken::Algorithm;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    pub email_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Base URL under which uploaded objects are publicly reachable.
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// HTTP relay endpoint; `None` means emails are only logged.
    pub api_url: Option<String>,
    pub api_key: String,
    pub from: String,
    pub from_name: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub base_url: String,
    pub bind_addr: SocketAddr,
    pub salt_length: usize,
    pub user_cache_ttl_seconds: u64,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub mail: MailConfig,
}

/// Key lookup with defaults; `from_env` reads the process environment through it.
struct Source<F> {
    get: F,
}

impl<F: Fn(&str) -> Option<String>> Source<F> {
    fn required(&self, key: &str) -> anyhow::Result<String> {
        (self.get)(key).with_context(|| format!("{key} is not set"))
    }

    fn or(&self, key: &str, default: &str) -> String {
        (self.get)(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> T {
        (self.get)(key)
            .and_then(|v| v.parse::<T>().ok())
            .unwrap_or(default)
    }
}

/// Tokens are signed with the shared secret, so only HMAC algorithms are usable.
fn hmac_algorithm(name: &str) -> anyhow::Result<Algorithm> {
    let algorithm = Algorithm::from_str(name)
        .with_context(|| format!("unsupported JWT_ALGORITHM {name}"))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => anyhow::bail!("JWT_ALGORITHM {other:?} needs a key pair; use HS256, HS384 or HS512"),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    pub fn from_source<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let src = Source { get };
        let jwt = JwtConfig {
            secret: src.required("JWT_SECRET")?,
            algorithm: hmac_algorithm(&src.or("JWT_ALGORITHM", "HS256"))?,
            access_ttl_minutes: src.parse("JWT_ACCESS_TTL_MINUTES", 15),
            refresh_ttl_minutes: src.parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 7),
            email_ttl_minutes: src.parse("JWT_EMAIL_TTL_MINUTES", 60 * 24),
        };
        let storage = StorageConfig {
            endpoint: src.or("MINIO_ENDPOINT", "http://localhost:9000"),
            bucket: src.or("MINIO_BUCKET", "contacts"),
            access_key: src.or("MINIO_ACCESS_KEY", "minioadmin"),
            secret_key: src.or("MINIO_SECRET_KEY", "minioadmin"),
            public_url: src.or("MINIO_PUBLIC_URL", "http://localhost:9000/contacts"),
        };
        let mail = MailConfig {
            api_url: (src.get)("MAIL_API_URL").filter(|v| !v.is_empty()),
            api_key: src.or("MAIL_API_KEY", ""),
            from: src.or("MAIL_FROM", "no-reply@contacts.local"),
            from_name: src.or("MAIL_FROM_NAME", "Contacts App"),
        };
        let bind_addr = format!(
            "{}:{}",
            src.or("APP_HOST", "0.0.0.0"),
            src.or("APP_PORT", "8080")
        );
        Ok(Self {
            database_url: src.required("DATABASE_URL")?,
            redis_url: src.or("REDIS_URL", "redis://127.0.0.1:6379/0"),
            base_url: src.or("APP_BASE_URL", "http://localhost:8080"),
            bind_addr: bind_addr
                .parse()
                .with_context(|| format!("invalid APP_HOST/APP_PORT {bind_addr}"))?,
            salt_length: src.parse("SALT_LENGTH", 16),
            user_cache_ttl_seconds: src.parse("USER_CACHE_TTL_SECONDS", 900),
            jwt,
            storage,
            mail,
        })
    }
}
