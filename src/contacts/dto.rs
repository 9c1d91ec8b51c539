use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::Date;

use super::repo_types::{AdditionalInfo, Contact, ContactFields};
use crate::errors::{AppError, AppResult};
use crate::validation::is_valid_email;

const MAX_NAME_LEN: usize = 150;

fn is_valid_phone(phone: &str) -> bool {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{7,15}$").unwrap();
    }
    PHONE_RE.is_match(phone)
}

/// Request body for create and update.
#[derive(Debug, Deserialize)]
pub struct ContactIn {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Date,
    #[serde(default)]
    pub additional_info: Option<AdditionalInfo>,
}

impl ContactIn {
    /// Trims and checks every field, normalizing email case and phone separators.
    pub fn validate(self) -> AppResult<ContactFields> {
        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        for (field, value) in [("first_name", &first_name), ("last_name", &last_name)] {
            if value.is_empty() || value.chars().count() > MAX_NAME_LEN {
                return Err(AppError::bad_request(format!(
                    "{field} must be between 1 and {MAX_NAME_LEN} characters"
                )));
            }
        }

        let email = self.email.trim().to_lowercase();
        if email.len() > MAX_NAME_LEN || !is_valid_email(&email) {
            return Err(AppError::bad_request("Invalid email"));
        }

        let phone: String = self
            .phone
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();
        if !is_valid_phone(&phone) {
            return Err(AppError::bad_request("Invalid phone number"));
        }

        Ok(ContactFields {
            first_name,
            last_name,
            email,
            phone,
            birth_date: self.birth_date,
            additional_info: self.additional_info,
        })
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ContactOut {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Date,
    pub additional_info: Option<AdditionalInfo>,
}

impl From<Contact> for ContactOut {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
            phone: c.phone,
            birth_date: c.birth_date,
            additional_info: c.additional_info.map(|j| j.0),
        }
    }
}

/// Query string of `GET /contacts`; at most one may be present.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search_name: Option<String>,
    pub search_email: Option<String>,
    pub upcoming_birthdays: Option<bool>,
}
