use serde::Serialize;
use time::OffsetDateTime;

use super::repo_types::User;

/// Public part of the user returned to the client.
#[derive(Debug, Serialize, PartialEq)]
pub struct UserOut {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserOut {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            avatar: u.avatar,
            created_at: u.created_at,
        }
    }
}
