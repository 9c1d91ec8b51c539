use tracing::{info, warn};

use super::dto::{SignupRequest, TokenResponse};
use super::jwt::TokenError;
use crate::db::is_unique_violation;
use crate::errors::{AppError, AppResult};
use crate::mail::{send_email, EmailPurpose};
use crate::state::AppState;
use crate::users::repo_types::{NewUser, User};
use crate::validation::{is_valid_email, normalize_email};

pub const INCORRECT_CREDENTIALS: &str = "Incorrect email or password";
pub const EMAIL_NOT_CONFIRMED: &str = "Email not confirmed";
pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";
pub const INVALID_SCOPE: &str = "Invalid scope for token";
pub const INVALID_EMAIL_TOKEN: &str = "Invalid token for email verification";
pub const VERIFICATION_ERROR: &str = "Verification error";
pub const ALREADY_CONFIRMED: &str = "Your email is already confirmed";
pub const CHECK_CONFIRMATION: &str = "Check your email for confirmation.";

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 150;

fn check_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::bad_request("Password too short"));
    }
    Ok(())
}

/// Sends the email on a detached task; the caller never waits for delivery.
pub fn dispatch_email(state: &AppState, to: String, username: String, purpose: EmailPurpose) {
    let mailer = state.mailer.clone();
    let tokens = state.tokens.clone();
    let base_url = state.config.base_url.clone();
    tokio::spawn(async move {
        send_email(mailer.as_ref(), &tokens, &to, &username, purpose, &base_url).await;
    });
}

pub async fn signup(state: &AppState, req: SignupRequest) -> AppResult<User> {
    let email = normalize_email(&req.email);
    let username = req.username.trim().to_string();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::bad_request("Invalid email"));
    }
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::bad_request("Invalid username"));
    }
    check_password(&req.password)?;

    if state.users.get_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict(format!(
            "User with email: {email} already exists"
        )));
    }

    let (password_hash, salt) = state.hasher.hash(&req.password)?;
    let user = state
        .users
        .create(NewUser {
            username,
            email,
            password_hash,
            salt,
        })
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Username or email already taken".into())
            } else {
                AppError::Internal(e)
            }
        })?;

    dispatch_email(
        state,
        user.email.clone(),
        user.username.clone(),
        EmailPurpose::Registration,
    );
    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

async fn issue_pair(state: &AppState, email: &str) -> AppResult<TokenResponse> {
    let access_token = state.tokens.create_access_token(email, None)?;
    let refresh_token = state.tokens.create_refresh_token(email, None)?;
    state.users.update_token(email, Some(&refresh_token)).await?;
    Ok(TokenResponse::bearer(access_token, refresh_token))
}

/// Unknown email and wrong password produce the same error. An unconfirmed
/// account is reported as such before the password is checked.
pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<TokenResponse> {
    let email = normalize_email(email);
    let Some(user) = state.users.get_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::unauthorized(INCORRECT_CREDENTIALS));
    };
    if !user.confirmed {
        warn!(user_id = user.id, "login with unconfirmed email");
        return Err(AppError::unauthorized(EMAIL_NOT_CONFIRMED));
    }
    if !state.hasher.verify(password, &user.password, &user.salt) {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::unauthorized(INCORRECT_CREDENTIALS));
    }

    let pair = issue_pair(state, &user.email).await?;
    info!(user_id = user.id, "user logged in");
    Ok(pair)
}

/// Exchanges the user's current refresh token for a new pair; superseded tokens are refused.
pub async fn refresh(state: &AppState, token: &str) -> AppResult<TokenResponse> {
    let email = state.tokens.decode_refresh_token(token).map_err(|e| match e {
        TokenError::InvalidScope => AppError::unauthorized(INVALID_SCOPE),
        TokenError::InvalidToken => AppError::unauthorized(super::session::CREDENTIALS_ERROR),
    })?;
    let user = state
        .users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AppError::unauthorized(super::session::CREDENTIALS_ERROR))?;
    if user.refresh_token.as_deref() != Some(token) {
        warn!(user_id = user.id, "stale refresh token presented");
        return Err(AppError::unauthorized(INVALID_REFRESH_TOKEN));
    }

    let pair = issue_pair(state, &user.email).await?;
    info!(user_id = user.id, "tokens refreshed");
    Ok(pair)
}

fn email_from_link(state: &AppState, token: &str) -> AppResult<String> {
    state.tokens.get_email_from_token(token).map_err(|_| {
        warn!("invalid email link token");
        AppError::Unprocessable(INVALID_EMAIL_TOKEN.into())
    })
}

pub async fn confirm_email(state: &AppState, token: &str) -> AppResult<()> {
    let email = email_from_link(state, token)?;
    let user = state
        .users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AppError::bad_request(VERIFICATION_ERROR))?;
    if user.confirmed {
        return Err(AppError::bad_request(ALREADY_CONFIRMED));
    }
    state.users.confirm_email(&email).await?;
    info!(user_id = user.id, "email confirmed");
    Ok(())
}

/// Re-sends the confirmation link. Unknown addresses get the same answer as pending ones.
pub async fn request_email(state: &AppState, email: &str) -> AppResult<&'static str> {
    let email = normalize_email(email);
    match state.users.get_by_email(&email).await? {
        Some(user) if user.confirmed => Ok(ALREADY_CONFIRMED),
        Some(user) => {
            dispatch_email(state, user.email, user.username, EmailPurpose::Registration);
            Ok(CHECK_CONFIRMATION)
        }
        None => Ok(CHECK_CONFIRMATION),
    }
}

pub async fn request_password_reset(state: &AppState, email: &str) -> AppResult<()> {
    let email = normalize_email(email);
    let user = match state.users.get_by_email(&email).await? {
        Some(u) if u.confirmed => u,
        Some(_) => return Err(AppError::bad_request(EMAIL_NOT_CONFIRMED)),
        None => return Err(AppError::bad_request(VERIFICATION_ERROR)),
    };
    dispatch_email(state, user.email, user.username, EmailPurpose::PasswordReset);
    Ok(())
}

pub async fn reset_password(state: &AppState, token: &str, new_password: &str) -> AppResult<()> {
    let email = email_from_link(state, token)?;
    let user = state
        .users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AppError::bad_request(VERIFICATION_ERROR))?;
    check_password(new_password)?;

    let (password_hash, salt) = state.hasher.hash(new_password)?;
    state
        .users
        .update_password(&user.email, &password_hash, &salt)
        .await?;
    info!(user_id = user.id, "password reset");
    Ok(())
}
