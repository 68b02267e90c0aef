use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::core::docs::DocsError;

/// Scope needed to create and edit documents.
pub const DOCUMENTS_SCOPE: &str = "https://www.googleapis.com/auth/documents";

/// Errors raised while obtaining an access token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to read credentials file {path}: {source}")]
    CredentialsFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Authorization was denied: {0}")]
    Denied(String),
    #[error("OAuth callback state did not match the request")]
    StateMismatch,
    #[error("Local redirect server failed: {0}")]
    Callback(String),
    #[error("Token exchange failed ({status}): {body}")]
    TokenExchange { status: u16, body: String },
    #[error("HTTP error during authentication: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to sign JWT assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl From<AuthError> for DocsError {
    fn from(err: AuthError) -> Self {
        DocsError::Auth(err.to_string())
    }
}

/// Anything that can hand out a bearer token for the Docs API.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Access token kept in memory until shortly before it expires.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn from_response(response: &TokenResponse) -> Self {
        let lifetime = response.expires_in.unwrap_or(3600);
        Self {
            token: response.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime),
        }
    }

    /// Still valid for at least another minute.
    pub fn is_fresh(&self) -> bool {
        self.expires_at > Utc::now() + Duration::seconds(60)
    }
}

/// Turns a non-2xx token endpoint answer into an error.
pub async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse, AuthError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await?;
        return Err(AuthError::TokenExchange { status, body });
    }

    Ok(response.json().await?)
}
