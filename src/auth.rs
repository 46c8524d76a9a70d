//! Bearer-token authentication against a Supabase-compatible user endpoint.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use reqwest::StatusCode;

use crate::config::{http_client, require_http_url, ConfigError, Timeouts};
use crate::models::Principal;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("authentication service unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// True when the caller is at fault rather than the auth service.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AuthError::MissingToken | AuthError::InvalidToken)
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError>;
}

/// Token following a case-insensitive `Bearer ` scheme. Empty tokens count as absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// ── HTTP implementation ──────────────────────────────────────────────────────

pub struct HttpAuthenticator {
    client: reqwest::Client,
    user_url: String,
    api_key: String,
}

impl HttpAuthenticator {
    pub fn new(auth_url: &str, api_key: &str, timeouts: Timeouts) -> Result<Self, ConfigError> {
        require_http_url("auth URL", auth_url)?;
        Ok(Self {
            client: http_client(timeouts)?,
            user_url: format!("{}/auth/v1/user", auth_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;

        let response = self
            .client
            .get(&self.user_url)
            .bearer_auth(token)
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable(format!(
                "auth service returned {status}"
            )));
        }

        response
            .json::<Principal>()
            .await
            .map_err(|e| AuthError::Unavailable(format!("undecodable user payload: {e}")))
    }
}
