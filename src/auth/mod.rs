//! Credential handling
//!
//! The backend issues a signed JWT on login. The client persists it as-is in
//! the state directory, sends it back as a bearer header, and decodes (never
//! verifies) the payload once to extract the owner identifier that scopes
//! push-channel events. Expiry is detected reactively through 401 responses,
//! not by inspecting claims.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::{Path, PathBuf};

const TOKEN_FILE: &str = "token";

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no stored credential; log in first")]
    MissingToken,

    #[error("stored credential is malformed: {0}")]
    MalformedToken(String),

    #[error("failed to access credential storage: {0}")]
    Storage(#[from] std::io::Error),
}

/// Durable storage for the bearer token.
///
/// Writes are visible to subsequently issued operations; there is no
/// client-side expiry. `clear` is invoked by the API layer whenever a
/// bearer-authenticated call answers 401.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    cache: Mutex<Option<String>>,
}

impl TokenStore {
    /// Create a store rooted at the given state directory.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(TOKEN_FILE),
            cache: Mutex::new(None),
        }
    }

    /// Read the stored token, if any.
    pub fn load(&self) -> Option<String> {
        let mut cache = self.cache.lock();
        if cache.is_none() {
            *cache = std::fs::read_to_string(&self.path)
                .ok()
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty());
        }
        cache.clone()
    }

    /// Persist a freshly issued token.
    pub fn save(&self, token: &str) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)?;
        *self.cache.lock() = Some(token.to_string());
        Ok(())
    }

    /// Remove the stored token (sign-out or detected expiry).
    pub fn clear(&self) {
        *self.cache.lock() = None;
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, "failed to remove stored credential");
            }
        }
    }
}

/// Owner identity derived once from the stored credential and passed
/// explicitly to every component that needs it.
#[derive(Debug, Clone)]
pub struct AuthContext {
    token: String,
    owner_id: String,
}

impl AuthContext {
    /// Build a context from a raw token string.
    pub fn from_token(token: impl Into<String>) -> Result<Self, AuthError> {
        let token = token.into();
        let owner_id = decode_owner_id(&token)?;
        Ok(Self { token, owner_id })
    }

    /// Build a context from the stored credential.
    pub fn from_store(store: &TokenStore) -> Result<Self, AuthError> {
        let token = store.load().ok_or(AuthError::MissingToken)?;
        Self::from_token(token)
    }

    /// The raw bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The owner identifier claim.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Extract the `id` claim from a JWT payload without verifying the signature.
fn decode_owner_id(token: &str) -> Result<String, AuthError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::MalformedToken("not a JWT".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(format!("payload is not base64url: {e}")))?;

    let claims: Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("payload is not JSON: {e}")))?;

    match claims.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(AuthError::MalformedToken("missing id claim".to_string())),
    }
}
