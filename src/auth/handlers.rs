use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        EmailRequest, LoginForm, MessageResponse, NewPasswordRequest, SignupRequest,
        SignupResponse, TokenResponse,
    },
    extractors::BearerToken,
    services,
};
use crate::{
    errors::AppResult,
    extract::{FormBody, JsonBody, PathParam},
    state::AppState,
    users::dto::UserOut,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh_token", get(refresh_token))
        .route("/auth/confirmed_email/:token", get(confirmed_email))
        .route("/auth/request_email", post(request_email))
        .route("/auth/password-reset", post(request_password_reset))
        .route("/auth/password-reset/:token", post(reset_password))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SignupRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let user = services::signup(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: UserOut::from(user),
            detail: "User successfully created",
        }),
    ))
}

#[instrument(skip(state, form), fields(email = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    FormBody(form): FormBody<LoginForm>,
) -> AppResult<Json<TokenResponse>> {
    let pair = services::login(&state, &form.username, &form.password).await?;
    Ok(Json(pair))
}

#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<TokenResponse>> {
    let pair = services::refresh(&state, &token).await?;
    Ok(Json(pair))
}

#[instrument(skip_all)]
pub async fn confirmed_email(
    State(state): State<AppState>,
    PathParam(token): PathParam<String>,
) -> AppResult<Json<MessageResponse>> {
    services::confirm_email(&state, &token).await?;
    Ok(Json(MessageResponse {
        message: "Email confirmed",
    }))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn request_email(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    let message = services::request_email(&state, &payload.email).await?;
    Ok(Json(MessageResponse { message }))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::request_password_reset(&state, &payload.email).await?;
    Ok(Json(MessageResponse {
        message: "Check your email to reset password.",
    }))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    PathParam(token): PathParam<String>,
    JsonBody(payload): JsonBody<NewPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::reset_password(&state, &token, &payload.password).await?;
    Ok(Json(MessageResponse {
        message: "Password successfully changed",
    }))
}
