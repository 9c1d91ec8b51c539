use async_trait::async_trait;
use sqlx::{types::Json, PgPool};

use super::repo_types::{Contact, ContactFields};
use crate::db::classify;

const CONTACT_COLUMNS: &str =
    "id, first_name, last_name, email, phone, birth_date, additional_info, user_id";

/// Row selection pushed down to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactFilter {
    All,
    /// Case-insensitive substring of first or last name.
    Name(String),
    /// Case-insensitive substring of email.
    Email(String),
}

/// Contact persistence. Every call is scoped to the owning user; rows of
/// other users behave as if they did not exist.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn list(&self, user_id: i64, filter: ContactFilter) -> anyhow::Result<Vec<Contact>>;
    async fn get(&self, user_id: i64, contact_id: i64) -> anyhow::Result<Option<Contact>>;
    async fn create(&self, user_id: i64, fields: ContactFields) -> anyhow::Result<Contact>;
    async fn update(
        &self,
        user_id: i64,
        contact_id: i64,
        fields: ContactFields,
    ) -> anyhow::Result<Option<Contact>>;
    async fn delete(&self, user_id: i64, contact_id: i64) -> anyhow::Result<Option<Contact>>;
}

#[derive(Clone)]
pub struct PgContactRepository {
    db: PgPool,
}

impl PgContactRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl ContactRepository for PgContactRepository {
    async fn list(&self, user_id: i64, filter: ContactFilter) -> anyhow::Result<Vec<Contact>> {
        let rows = match filter {
            ContactFilter::All => {
                sqlx::query_as::<_, Contact>(&format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts WHERE user_id = $1 ORDER BY id"
                ))
                .bind(user_id)
                .fetch_all(&self.db)
                .await?
            }
            ContactFilter::Name(term) => {
                sqlx::query_as::<_, Contact>(&format!(
                    r#"
                    SELECT {CONTACT_COLUMNS}
                      FROM contacts
                     WHERE user_id = $1
                       AND (first_name ILIKE $2 OR last_name ILIKE $2)
                     ORDER BY id
                    "#
                ))
                .bind(user_id)
                .bind(like_pattern(&term))
                .fetch_all(&self.db)
                .await?
            }
            ContactFilter::Email(term) => {
                sqlx::query_as::<_, Contact>(&format!(
                    r#"
                    SELECT {CONTACT_COLUMNS}
                      FROM contacts
                     WHERE user_id = $1 AND email ILIKE $2
                     ORDER BY id
                    "#
                ))
                .bind(user_id)
                .bind(like_pattern(&term))
                .fetch_all(&self.db)
                .await?
            }
        };
        Ok(rows)
    }

    async fn get(&self, user_id: i64, contact_id: i64) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND user_id = $2"
        ))
        .bind(contact_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create(&self, user_id: i64, fields: ContactFields) -> anyhow::Result<Contact> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            r#"
            INSERT INTO contacts
                (first_name, last_name, email, phone, birth_date, additional_info, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(fields.birth_date)
        .bind(fields.additional_info.map(Json))
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .map_err(classify)?;
        Ok(row)
    }

    async fn update(
        &self,
        user_id: i64,
        contact_id: i64,
        fields: ContactFields,
    ) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            r#"
            UPDATE contacts
               SET first_name = $1, last_name = $2, email = $3, phone = $4,
                   birth_date = $5, additional_info = $6
             WHERE id = $7 AND user_id = $8
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(fields.birth_date)
        .bind(fields.additional_info.map(Json))
        .bind(contact_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(classify)?;
        Ok(row)
    }

    async fn delete(&self, user_id: i64, contact_id: i64) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            "DELETE FROM contacts WHERE id = $1 AND user_id = $2 RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(contact_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }
}
