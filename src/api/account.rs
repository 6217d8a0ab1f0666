//! Account endpoints (login/register)
//!
//! The only calls issued without a bearer credential.

use super::{ApiClient, Result};
use reqwest::Method;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Client for the account endpoints.
#[derive(Debug, Clone)]
pub struct AccountApi {
    client: ApiClient,
}

impl AccountApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Exchange email/password for a signed token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response: LoginResponse = self
            .client
            .request(Method::POST, "/api/auth/login", Some(&body))
            .await?;
        Ok(response.token)
    }

    /// Create a new account. Returns the backend welcome message, if any.
    pub async fn register(&self, email: &str, password: &str) -> Result<Option<String>> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response: RegisterResponse = self
            .client
            .request(Method::POST, "/api/auth/register", Some(&body))
            .await?;
        Ok(response.message)
    }
}
