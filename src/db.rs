use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

const UNIQUE_VIOLATION: &str = "23505";

/// Marker error for inserts/updates that hit a unique constraint.
#[derive(Debug, thiserror::Error)]
#[error("unique constraint violated: {0}")]
pub struct UniqueViolation(pub String);

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}

/// Converts a unique-constraint failure into [`UniqueViolation`]; other errors pass through.
pub fn classify(err: sqlx::Error) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            return anyhow::Error::new(UniqueViolation(constraint));
        }
    }
    anyhow::Error::new(err)
}

pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<UniqueViolation>().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_detected_through_anyhow() {
        let err = anyhow::Error::new(UniqueViolation("users_email_key".into()));
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&classify(sqlx::Error::RowNotFound)));
    }
}
