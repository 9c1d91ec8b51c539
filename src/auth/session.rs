use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{debug, warn};

use super::{claims::TokenScope, jwt::TokenService};
use crate::cache::UserCache;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;
use crate::users::{repo::UserRepository, repo_types::User};

pub const CREDENTIALS_ERROR: &str = "Could not validate credentials";

/// Turns a bearer access token into the caller's user record, consulting the
/// cache before the user store. Concurrent misses may both populate the cache;
/// the writes are idempotent.
#[derive(Clone)]
pub struct SessionResolver {
    tokens: Arc<TokenService>,
    cache: Arc<dyn UserCache>,
    users: Arc<dyn UserRepository>,
}

impl FromRef<AppState> for SessionResolver {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.tokens.clone(), state.cache.clone(), state.users.clone())
    }
}

impl SessionResolver {
    pub fn new(
        tokens: Arc<TokenService>,
        cache: Arc<dyn UserCache>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            tokens,
            cache,
            users,
        }
    }

    pub async fn resolve(&self, token: &str) -> AppResult<User> {
        let claims = self.tokens.verify(token).map_err(|_| {
            warn!("invalid or expired access token");
            AppError::unauthorized(CREDENTIALS_ERROR)
        })?;
        if claims.scope != Some(TokenScope::Access) {
            warn!(scope = ?claims.scope, "access token required");
            return Err(AppError::unauthorized(CREDENTIALS_ERROR));
        }
        let email = claims
            .sub
            .ok_or_else(|| AppError::unauthorized(CREDENTIALS_ERROR))?;

        if let Some(user) = self.cache.lookup(&email).await? {
            return Ok(user);
        }

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or_else(|| {
                warn!(email = %email, "token subject has no account");
                AppError::unauthorized(CREDENTIALS_ERROR)
            })?;
        self.cache.store(&email, &user).await?;
        debug!(email = %email, "user cached");
        Ok(user)
    }
}
