//! Withdrawal endpoints
//!
//! User-facing balance/request/history calls plus the privileged review
//! surface. The review endpoints authenticate with a static `x-api-key`
//! header instead of the per-user bearer token; a 401 there means a bad key,
//! not an expired session, so it must not clear the stored credential.

use super::{ApiClient, ApiError, Result};
use crate::auth::AuthContext;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Withdrawal request state as reported by the backend ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

/// One entry of the backend withdrawal ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalRecord {
    /// Backend identifier, present on the admin listing.
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "flexible_amount")]
    pub amount: f64,
    #[serde(rename = "pixKey", default)]
    pub pix_key: Option<String>,
    pub status: WithdrawalStatus,
    #[serde(rename = "rejectionReason", default)]
    pub rejection_reason: Option<String>,
}

/// Decision taken on a pending withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject { reason: String },
}

#[derive(Debug, Deserialize)]
struct WithdrawalListResponse {
    withdrawals: Vec<WithdrawalRecord>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[serde(rename = "availableBalance", deserialize_with = "flexible_amount")]
    available_balance: f64,
}

/// The backend reports money either as a JSON number or a decimal string.
fn flexible_amount<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Client for the user withdrawal endpoints.
#[derive(Debug, Clone)]
pub struct WithdrawalApi {
    client: ApiClient,
    auth: AuthContext,
}

impl WithdrawalApi {
    pub fn new(client: ApiClient, auth: AuthContext) -> Self {
        Self { client, auth }
    }

    /// Request a withdrawal of the full available balance to a PIX key.
    pub async fn request(&self, pix_key: &str) -> Result<()> {
        let body = serde_json::json!({ "pixKey": pix_key });
        let _: Value = self
            .client
            .request_with_bearer(
                Method::POST,
                "/api/withdrawal/request",
                self.auth.token(),
                Some(&body),
            )
            .await?;
        Ok(())
    }

    /// Fetch this account's withdrawal history.
    pub async fn history(&self) -> Result<Vec<WithdrawalRecord>> {
        let response: WithdrawalListResponse = self
            .client
            .request_with_bearer(
                Method::GET,
                "/api/withdrawal/withdrawals",
                self.auth.token(),
                None,
            )
            .await?;
        Ok(response.withdrawals)
    }

    /// Fetch the balance available for withdrawal.
    pub async fn available_balance(&self) -> Result<f64> {
        let response: BalanceResponse = self
            .client
            .request_with_bearer(
                Method::GET,
                "/api/withdrawal/check-balance",
                self.auth.token(),
                None,
            )
            .await?;
        Ok(response.available_balance)
    }
}

/// Client for the privileged withdrawal-review endpoints, keyed by a static
/// API key rather than a user credential.
#[derive(Debug, Clone)]
pub struct AdminWithdrawalApi {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl AdminWithdrawalApi {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let mut url = self.base_url.clone();
        url.set_path(path);

        let mut request = self.http.request(method, url).header("x-api-key", &self.api_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let payload: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Rejected {
                message: "invalid or expired API key".to_string(),
            });
        }
        if !status.is_success() {
            return Err(super::rejection(status, &payload));
        }
        serde_json::from_value(payload).map_err(ApiError::Decode)
    }

    /// List every pending and settled withdrawal across all accounts.
    pub async fn withdrawals(&self) -> Result<Vec<WithdrawalRecord>> {
        let response: WithdrawalListResponse = self
            .send(Method::GET, "/api/withdrawal/admin/withdrawals", None)
            .await?;
        Ok(response.withdrawals)
    }

    /// Approve or reject one withdrawal by backend id.
    pub async fn review(&self, withdrawal_id: &str, decision: ReviewDecision) -> Result<()> {
        let body = match decision {
            ReviewDecision::Approve => serde_json::json!({ "status": "approved" }),
            ReviewDecision::Reject { reason } => serde_json::json!({
                "status": "rejected",
                "rejectionReason": reason,
            }),
        };
        let path = format!("/api/withdrawal/admin/withdrawal/{withdrawal_id}");
        let _: Value = self.send(Method::PUT, &path, Some(&body)).await?;
        Ok(())
    }
}
