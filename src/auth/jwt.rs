use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{format_description::FormatItem, macros::format_description, Duration, OffsetDateTime};
use tracing::debug;

use super::claims::{Claims, TokenScope};
use crate::config::JwtConfig;

const EXPIRY_DISPLAY: &[FormatItem<'static>] =
    format_description!("[day]-[month]-[year] [hour]:[minute]");

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    /// Bad signature, malformed payload or expired.
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid scope for token")]
    InvalidScope,
}

/// Issues and verifies every JWT the service hands out, under one shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
    email_ttl: Duration,
}

impl TokenService {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm: cfg.algorithm,
            access_ttl: Duration::minutes(cfg.access_ttl_minutes),
            refresh_ttl: Duration::minutes(cfg.refresh_ttl_minutes),
            email_ttl: Duration::minutes(cfg.email_ttl_minutes),
        }
    }

    fn sign(
        &self,
        email: &str,
        ttl: Duration,
        scope: Option<TokenScope>,
    ) -> anyhow::Result<(String, OffsetDateTime)> {
        let now = OffsetDateTime::now_utc();
        let exp = now + ttl;
        let claims = Claims {
            sub: Some(email.to_string()),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            scope,
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(email = %email, scope = ?scope, "jwt signed");
        Ok((token, exp))
    }

    /// Access token; `expires_in` overrides the configured lifetime.
    pub fn create_access_token(
        &self,
        email: &str,
        expires_in: Option<Duration>,
    ) -> anyhow::Result<String> {
        let ttl = expires_in.unwrap_or(self.access_ttl);
        Ok(self.sign(email, ttl, Some(TokenScope::Access))?.0)
    }

    pub fn create_refresh_token(
        &self,
        email: &str,
        expires_in: Option<Duration>,
    ) -> anyhow::Result<String> {
        let ttl = expires_in.unwrap_or(self.refresh_ttl);
        Ok(self.sign(email, ttl, Some(TokenScope::Refresh))?.0)
    }

    /// Unscoped token for confirmation and reset links, plus its expiry
    /// rendered as `dd-mm-YYYY HH:MM` for the email body.
    pub fn create_email_token(&self, email: &str) -> anyhow::Result<(String, String)> {
        let (token, exp) = self.sign(email, self.email_ttl, None)?;
        Ok((token, exp.format(EXPIRY_DISPLAY)?))
    }

    /// Verifies signature and expiry only.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            TokenError::InvalidToken
        })?;
        Ok(data.claims)
    }

    pub fn decode_refresh_token(&self, token: &str) -> Result<String, TokenError> {
        let claims = self.verify(token)?;
        if claims.scope != Some(TokenScope::Refresh) {
            return Err(TokenError::InvalidScope);
        }
        claims.sub.ok_or(TokenError::InvalidToken)
    }

    pub fn get_email_from_token(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token)?.sub.ok_or(TokenError::InvalidToken)
    }
}
