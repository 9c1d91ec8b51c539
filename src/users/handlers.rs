use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::UserOut;
use crate::{
    auth::extractors::CurrentUser,
    errors::{AppError, AppResult},
    state::AppState,
    storage::avatar_key,
};

const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route(
            "/users/me/avatar",
            patch(update_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES)),
        )
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserOut> {
    Json(user.into())
}

/// PATCH /users/me/avatar (multipart field `file`)
#[instrument(skip(state, user, mp), fields(user_id = user.id))]
pub async fn update_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut mp: Multipart,
) -> AppResult<Json<UserOut>> {
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.to_string()))?
    {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(e.to_string()))?;
            upload = Some((data, content_type));
            break;
        }
    }
    let Some((data, content_type)) = upload else {
        warn!("avatar upload without file field");
        return Err(AppError::bad_request("file is required"));
    };
    if !content_type.starts_with("image/") {
        return Err(AppError::bad_request("Avatar must be an image"));
    }

    let key = avatar_key(&user.username, &content_type);
    state.storage.put_object(&key, data, &content_type).await?;
    let url = state.storage.object_url(&key);
    let updated = state.users.update_avatar(&user.email, &url).await?;

    info!(email = %user.email, %url, "avatar updated");
    Ok(Json(updated.into()))
}
