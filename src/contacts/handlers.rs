use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{ContactIn, ContactOut, SearchParams};
use super::services;
use crate::{
    auth::extractors::CurrentUser,
    errors::AppResult,
    extract::{JsonBody, PathParam, QueryParams},
    state::AppState,
};

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route(
            "/contacts/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_contacts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(params): QueryParams<SearchParams>,
) -> AppResult<Json<Vec<ContactOut>>> {
    let contacts =
        services::list_contacts(state.contacts.as_ref(), user.id, params, services::today_utc())
            .await?;
    Ok(Json(contacts.into_iter().map(ContactOut::from).collect()))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    PathParam(id): PathParam<i64>,
) -> AppResult<Json<ContactOut>> {
    let contact = services::get_contact(state.contacts.as_ref(), user.id, id).await?;
    Ok(Json(contact.into()))
}

#[instrument(skip(state, user, body), fields(user_id = user.id))]
pub async fn create_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<ContactIn>,
) -> AppResult<(StatusCode, Json<ContactOut>)> {
    let contact = services::create_contact(state.contacts.as_ref(), user.id, body).await?;
    Ok((StatusCode::CREATED, Json(contact.into())))
}

#[instrument(skip(state, user, body), fields(user_id = user.id))]
pub async fn update_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    PathParam(id): PathParam<i64>,
    JsonBody(body): JsonBody<ContactIn>,
) -> AppResult<Json<ContactOut>> {
    let contact = services::update_contact(state.contacts.as_ref(), user.id, id, body).await?;
    Ok(Json(contact.into()))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    PathParam(id): PathParam<i64>,
) -> AppResult<Json<ContactOut>> {
    let contact = services::delete_contact(state.contacts.as_ref(), user.id, id).await?;
    Ok(Json(contact.into()))
}
