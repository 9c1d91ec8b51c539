use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{NewUser, User};
use crate::db::classify;

const USER_COLUMNS: &str =
    "id, username, email, password, salt, created_at, refresh_token, confirmed, avatar";

/// Persistence operations on users, keyed by email.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, user: NewUser) -> anyhow::Result<User>;
    async fn update_token(&self, email: &str, token: Option<&str>) -> anyhow::Result<()>;
    async fn confirm_email(&self, email: &str) -> anyhow::Result<()>;
    async fn update_avatar(&self, email: &str, avatar_url: &str) -> anyhow::Result<User>;
    async fn update_password(&self, email: &str, password_hash: &str, salt: &str)
        -> anyhow::Result<User>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password, salt)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.salt)
        .fetch_one(&self.db)
        .await
        .map_err(classify)?;
        Ok(created)
    }

    async fn update_token(&self, email: &str, token: Option<&str>) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET refresh_token = $1 WHERE email = $2")
            .bind(token)
            .bind(email)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn confirm_email(&self, email: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET confirmed = TRUE WHERE email = $1")
            .bind(email)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_avatar(&self, email: &str, avatar_url: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $1 WHERE email = $2 RETURNING {USER_COLUMNS}"
        ))
        .bind(avatar_url)
        .bind(email)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_password(
        &self,
        email: &str,
        password_hash: &str,
        salt: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password = $1, salt = $2 WHERE email = $3 RETURNING {USER_COLUMNS}"
        ))
        .bind(password_hash)
        .bind(salt)
        .bind(email)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}
