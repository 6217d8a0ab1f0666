//! REST API clients
//!
//! Typed wrappers over the two product backends. All calls go through one
//! request helper so the cross-cutting rules live in a single place: bearer
//! authentication, the 401 sign-out rule (clear the stored credential and
//! surface [`ApiError::Unauthorized`]), and the mapping of non-2xx bodies to
//! the error taxonomy.

pub mod account;
pub mod bot;
pub mod payments;
pub mod referral;
pub mod withdrawal;

use crate::auth::TokenStore;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Backend error code for the pairing-attempt limit.
pub const LIMIT_REACHED_CODE: &str = "LIMITE_ATINGIDO";

/// Errors from REST calls, split by how the caller must react.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The bearer credential was rejected; it has already been cleared
    /// from storage and the user must log in again.
    #[error("session expired; log in again")]
    Unauthorized,

    /// Business rejection with a backend-provided message, surfaced verbatim.
    #[error("{message}")]
    Rejected { message: String },

    /// The pairing-attempt limit was reached (dedicated terminal outcome,
    /// not a generic failure).
    #[error("{message}")]
    LimitReached { message: String },

    /// Network-level failure; no retry is attempted.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered 2xx with a body this client cannot interpret.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// Shared HTTP client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<TokenStore>,
}

impl ApiClient {
    /// Build a client for the given backend.
    pub fn new(base_url: Url, tokens: Arc<TokenStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, base_url, tokens })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }

    /// Issue an unauthenticated request (login/register only).
    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        self.dispatch(method, path, None, body).await
    }

    /// Issue a bearer-authenticated request.
    pub(crate) async fn request_with_bearer<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        self.dispatch(method, path, Some(token), body).await
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<T> {
        let url = self.endpoint(path);
        tracing::debug!(%method, %url, "issuing API request");

        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let payload: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if status == reqwest::StatusCode::UNAUTHORIZED && token.is_some() {
            // Cross-cutting expiry rule: every page applies it uniformly.
            tracing::info!("credential rejected with 401, clearing stored token");
            self.tokens.clear();
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            return Err(rejection(status, &payload));
        }

        serde_json::from_value(payload).map_err(ApiError::Decode)
    }
}

/// Map a non-2xx body to the error taxonomy. The backend reports either
/// `{message}` or `{error}`; the limit code arrives in `error` with the
/// human-readable text in `message`.
pub(crate) fn rejection(status: reqwest::StatusCode, payload: &Value) -> ApiError {
    let error_code = payload.get("error").and_then(Value::as_str);
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .or(error_code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed with HTTP {status}"));

    if error_code == Some(LIMIT_REACHED_CODE) {
        ApiError::LimitReached { message }
    } else {
        ApiError::Rejected { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one HTTP request with a canned response.
    async fn stub_server(status: &'static str, body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let Ok(n) = socket.read(&mut buf).await else {
                    return;
                };
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if let Some(header_end) =
                    request.windows(4).position(|w| w == b"\r\n\r\n")
                {
                    let headers = String::from_utf8_lossy(&request[..header_end]);
                    let content_length = headers
                        .lines()
                        .filter_map(|l| l.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    #[tokio::test]
    async fn bearer_call_answering_401_clears_the_stored_credential() {
        let dir = tempfile::tempdir().unwrap();
        let tokens = Arc::new(TokenStore::new(dir.path()));
        tokens.save("tok.en.x").unwrap();

        let base = stub_server("401 Unauthorized", r#"{"message":"Token inválido"}"#).await;
        let client = ApiClient::new(base, tokens.clone()).unwrap();

        let result: Result<Value> = client
            .request_with_bearer(Method::GET, "/api/bot/status", "tok.en.x", None)
            .await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert!(tokens.load().is_none());
    }

    #[tokio::test]
    async fn unauthenticated_401_leaves_the_stored_credential_alone() {
        let dir = tempfile::tempdir().unwrap();
        let tokens = Arc::new(TokenStore::new(dir.path()));
        tokens.save("tok.en.x").unwrap();

        let base = stub_server("401 Unauthorized", r#"{"message":"Senha incorreta"}"#).await;
        let client = ApiClient::new(base, tokens.clone()).unwrap();

        let body = serde_json::json!({ "email": "a@b.com", "password": "nope" });
        let result: Result<Value> = client
            .request(Method::POST, "/api/auth/login", Some(&body))
            .await;
        assert!(
            matches!(result, Err(ApiError::Rejected { ref message }) if message == "Senha incorreta")
        );
        assert_eq!(tokens.load().as_deref(), Some("tok.en.x"));
    }

    #[test]
    fn limit_code_maps_to_dedicated_error() {
        let payload = serde_json::json!({
            "error": "LIMITE_ATINGIDO",
            "message": "Limite atingido",
        });
        let err = rejection(reqwest::StatusCode::FORBIDDEN, &payload);
        assert!(matches!(err, ApiError::LimitReached { message } if message == "Limite atingido"));
    }

    #[test]
    fn message_body_surfaces_verbatim() {
        let payload = serde_json::json!({ "message": "Senha incorreta" });
        let err = rejection(reqwest::StatusCode::BAD_REQUEST, &payload);
        assert!(matches!(err, ApiError::Rejected { message } if message == "Senha incorreta"));
    }

    #[test]
    fn error_field_used_when_message_missing() {
        let payload = serde_json::json!({ "error": "Código inválido" });
        let err = rejection(reqwest::StatusCode::BAD_REQUEST, &payload);
        assert!(matches!(err, ApiError::Rejected { message } if message == "Código inválido"));
    }

    #[test]
    fn empty_body_yields_generic_message() {
        let err = rejection(reqwest::StatusCode::INTERNAL_SERVER_ERROR, &Value::Null);
        assert!(matches!(err, ApiError::Rejected { message } if message.contains("500")));
    }
}
