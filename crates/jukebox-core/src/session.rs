//! Access-token holder shared by the dispatcher and the media controller.
//!
//! Obtaining and refreshing tokens (the OAuth code exchange) happens outside
//! this crate; the session only stores whatever token was last installed.
//! `install` is last-writer-wins and does not wait for requests that already
//! read the previous token. Two refreshers racing each other are not
//! coordinated either; this is a known open race.

use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AuthError;

pub const ACCESS_TOKEN_ENV: &str = "SPOTIFY_ACCESS_TOKEN";

/// Token cache entry, in the layout OAuth helper libraries write to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds; tokens without an expiry never expire locally.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl AccessToken {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: token.into(),
            refresh_token: None,
            expires_at: None,
            scope: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct AuthSession {
    token: Arc<RwLock<Option<AccessToken>>>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: AccessToken) -> Self {
        let session = Self::new();
        session.install(token);
        session
    }

    /// Build a session from the token cache file, then let
    /// `SPOTIFY_ACCESS_TOKEN` override it. An absent or unreadable cache yields
    /// an empty session; the dispatcher refuses to start on one.
    pub fn from_cache_and_env(cache: &Path) -> Self {
        let session = Self::new();
        match load_token_cache(cache) {
            Ok(Some(token)) => {
                info!("session: loaded token cache {}", cache.display());
                session.install(token);
            }
            Ok(None) => info!("session: no token cache at {}", cache.display()),
            Err(e) => warn!("session: ignoring token cache {}: {}", cache.display(), e),
        }
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                info!("session: using token from {}", ACCESS_TOKEN_ENV);
                session.install(AccessToken::bearer(token.trim()));
            }
        }
        session
    }

    pub fn install(&self, token: AccessToken) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(token);
    }

    /// Current bearer token, or why there is none usable.
    pub fn bearer(&self) -> Result<String, AuthError> {
        let guard = self.token.read().unwrap_or_else(|e| e.into_inner());
        let token = guard.as_ref().ok_or(AuthError::Missing)?;
        if let Some(expires_at) = token.expires_at {
            if expires_at <= Utc::now().timestamp() {
                return Err(AuthError::Expired(expires_at));
            }
        }
        Ok(token.access_token.clone())
    }
}

pub fn load_token_cache(path: &Path) -> anyhow::Result<Option<AccessToken>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let token: AccessToken = serde_json::from_str(&content)?;
    Ok(Some(token))
}
