use serde::{Deserialize, Serialize};

/// Purpose tag of a session JWT. Email-link tokens carry no scope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenScope {
    #[serde(rename = "access_token")]
    Access,
    #[serde(rename = "refresh_token")]
    Refresh,
}

/// JWT payload shared by access, refresh and email tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Option<String>, // user email
    pub iat: i64,            // issued at (unix timestamp)
    pub exp: i64,            // expires at (unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<TokenScope>,
}
