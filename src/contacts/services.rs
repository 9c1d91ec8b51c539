use time::{Date, Duration, Month, OffsetDateTime};
use tracing::{info, warn};

use super::dto::{ContactIn, SearchParams};
use super::repo::{ContactFilter, ContactRepository};
use super::repo_types::Contact;
use crate::db::is_unique_violation;
use crate::errors::{AppError, AppResult};

pub const ONE_PARAMETER_ONLY: &str = "You can only search by one parameter at a time.";
const NOT_FOUND: &str = "Contact not found";
const DUPLICATE: &str = "A contact with this email or phone already exists";
const BIRTHDAY_WINDOW_DAYS: i64 = 7;

/// Anniversary of `birth` in `year`; Feb 29 falls back to Feb 28 in common years.
fn anniversary(birth: Date, year: i32) -> Date {
    Date::from_calendar_date(year, birth.month(), birth.day())
        .or_else(|_| Date::from_calendar_date(year, Month::February, 28))
        .unwrap_or(birth)
}

/// True when the next birthday falls within `[today, today + 7 days]`, across year ends too.
pub fn is_upcoming_birthday(birth: Date, today: Date) -> bool {
    let until = today + Duration::days(BIRTHDAY_WINDOW_DAYS);
    [today.year(), today.year() + 1]
        .into_iter()
        .map(|y| anniversary(birth, y))
        .any(|d| today <= d && d <= until)
}

pub async fn list_contacts(
    repo: &dyn ContactRepository,
    user_id: i64,
    params: SearchParams,
    today: Date,
) -> AppResult<Vec<Contact>> {
    let supplied = [
        params.search_name.is_some(),
        params.search_email.is_some(),
        params.upcoming_birthdays.is_some(),
    ]
    .into_iter()
    .filter(|p| *p)
    .count();
    if supplied > 1 {
        warn!(user_id, "more than one search parameter");
        return Err(AppError::bad_request(ONE_PARAMETER_ONLY));
    }

    let contacts = match params {
        SearchParams {
            search_name: Some(name),
            ..
        } if !name.is_empty() => repo.list(user_id, ContactFilter::Name(name)).await?,
        SearchParams {
            search_email: Some(email),
            ..
        } if !email.is_empty() => repo.list(user_id, ContactFilter::Email(email)).await?,
        SearchParams {
            upcoming_birthdays: Some(true),
            ..
        } => repo
            .list(user_id, ContactFilter::All)
            .await?
            .into_iter()
            .filter(|c| is_upcoming_birthday(c.birth_date, today))
            .collect(),
        _ => repo.list(user_id, ContactFilter::All).await?,
    };
    Ok(contacts)
}

pub fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

pub async fn get_contact(
    repo: &dyn ContactRepository,
    user_id: i64,
    contact_id: i64,
) -> AppResult<Contact> {
    repo.get(user_id, contact_id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

fn map_write_error(e: anyhow::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict(DUPLICATE.into())
    } else {
        AppError::Internal(e)
    }
}

pub async fn create_contact(
    repo: &dyn ContactRepository,
    user_id: i64,
    body: ContactIn,
) -> AppResult<Contact> {
    let fields = body.validate()?;
    let contact = repo
        .create(user_id, fields)
        .await
        .map_err(map_write_error)?;
    info!(user_id, contact_id = contact.id, "contact created");
    Ok(contact)
}

pub async fn update_contact(
    repo: &dyn ContactRepository,
    user_id: i64,
    contact_id: i64,
    body: ContactIn,
) -> AppResult<Contact> {
    let fields = body.validate()?;
    repo.update(user_id, contact_id, fields)
        .await
        .map_err(map_write_error)?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

pub async fn delete_contact(
    repo: &dyn ContactRepository,
    user_id: i64,
    contact_id: i64,
) -> AppResult<Contact> {
    let deleted = repo
        .delete(user_id, contact_id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
    info!(user_id, contact_id, "contact deleted");
    Ok(deleted)
}
