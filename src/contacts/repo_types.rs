use sqlx::{types::Json, FromRow};
use std::collections::BTreeMap;
use time::Date;

pub type AdditionalInfo = BTreeMap<String, String>;

/// Contact record in the database, owned by `user_id`.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Contact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Date,
    pub additional_info: Option<Json<AdditionalInfo>>,
    pub user_id: i64,
}

/// Validated, owner-independent contact fields used for create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Date,
    pub additional_info: Option<AdditionalInfo>,
}

impl ContactFields {
    pub fn into_contact(self, id: i64, user_id: i64) -> Contact {
        Contact {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            birth_date: self.birth_date,
            additional_info: self.additional_info.map(Json),
            user_id,
        }
    }
}
