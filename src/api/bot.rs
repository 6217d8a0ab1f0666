//! Bot endpoints
//!
//! Payment gating, connection status, activation, canned responses, group
//! monitoring, and the pairing-session lifecycle. Status strings are
//! normalized into [`BotStatus`] exactly once at this boundary; the backend
//! has been observed answering `"connected"`, `"conectado"` and
//! `"Conectado"` for the same state.

use super::{ApiClient, ApiError, Result};
use crate::auth::AuthContext;
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Normalized bot connection/activity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Connected,
    Disconnected,
}

impl BotStatus {
    /// Decode a raw backend status string, case-insensitively.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "connected" | "conectado" => BotStatus::Connected,
            _ => BotStatus::Disconnected,
        }
    }

    pub fn is_connected(self) -> bool {
        self == BotStatus::Connected
    }
}

/// Normalized subscription payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
}

/// One monitored group conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMonitor {
    pub conversation_id: String,
    pub name: String,
    pub enabled: bool,
}

/// Result of `POST /api/bot/start`: the backend either issues the pairing
/// artifact synchronously or will deliver it later over the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Artifact issued in the synchronous response.
    ArtifactIssued(String),
    /// No artifact yet; wait for the push event.
    Pending,
}

#[derive(Debug, Deserialize)]
struct PaymentStatusResponse {
    #[serde(rename = "paymentStatus")]
    payment_status: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ActivityResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupListResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    groups: Option<Vec<GroupMonitor>>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    #[serde(rename = "qrCode", default)]
    qr_code: Option<String>,
}

/// Client for the bot endpoints, bound to one authenticated owner.
#[derive(Debug, Clone)]
pub struct BotApi {
    client: ApiClient,
    auth: AuthContext,
}

impl BotApi {
    pub fn new(client: ApiClient, auth: AuthContext) -> Self {
        Self { client, auth }
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.client
            .request_with_bearer(Method::GET, path, self.auth.token(), None)
            .await
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        self.client
            .request_with_bearer(Method::POST, path, self.auth.token(), body)
            .await
    }

    /// Whether the subscription is paid (gates everything past login).
    pub async fn check_payment_status(&self) -> Result<PaymentStatus> {
        let response: PaymentStatusResponse = self.get("/api/bot/check-payment-status").await?;
        Ok(if response.payment_status.eq_ignore_ascii_case("paid") {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        })
    }

    /// Device connection status (drives post-login navigation).
    pub async fn connection_status(&self) -> Result<BotStatus> {
        let response: StatusResponse = self.get("/api/bot/status").await?;
        Ok(BotStatus::parse(&response.status))
    }

    /// Assistant activity status shown on the assistant page.
    pub async fn activity_status(&self) -> Result<BotStatus> {
        let response: ActivityResponse = self.post("/api/bot/bot-status", None).await?;
        if !response.success {
            return Err(ApiError::Rejected {
                message: "could not check bot status".to_string(),
            });
        }
        Ok(BotStatus::parse(response.status.as_deref().unwrap_or("")))
    }

    /// Turn the assistant on. Returns the backend confirmation message.
    pub async fn activate(&self) -> Result<Option<String>> {
        let response: MessageResponse = self.post("/api/bot/activate", None).await?;
        Ok(response.message)
    }

    /// Turn the assistant off.
    pub async fn deactivate(&self) -> Result<Option<String>> {
        let response: MessageResponse = self.post("/api/bot/deactivate", None).await?;
        Ok(response.message)
    }

    /// Store a custom canned reply for a trigger word.
    pub async fn save_response(&self, trigger_word: &str, response_text: &str) -> Result<()> {
        let body = serde_json::json!({
            "userId": self.auth.owner_id(),
            "triggerWord": trigger_word,
            "responseText": response_text,
        });
        let _: MessageResponse = self.post("/api/bot/responses", Some(&body)).await?;
        Ok(())
    }

    /// Fetch the full set of monitored groups.
    pub async fn list_groups(&self) -> Result<Vec<GroupMonitor>> {
        let response: GroupListResponse = self.get("/api/bot/groups/list").await?;
        match (response.success, response.groups) {
            (true, Some(groups)) => Ok(groups),
            _ => Err(ApiError::Rejected {
                message: response
                    .message
                    .unwrap_or_else(|| "could not list groups".to_string()),
            }),
        }
    }

    /// Toggle whether the assistant responds in one group. The backend's
    /// answer is authoritative; callers flip local state only on success.
    pub async fn toggle_group(&self, conversation_id: &str) -> Result<()> {
        let body = serde_json::json!({ "conversationId": conversation_id });
        let _: MessageResponse = self
            .post("/api/bot/groups/toggle-response", Some(&body))
            .await?;
        Ok(())
    }

    /// Begin a pairing session. The artifact may arrive synchronously here
    /// or later over the event channel.
    pub async fn start_session(&self) -> Result<StartOutcome> {
        let response: StartResponse = self.post("/api/bot/start", None).await?;
        Ok(match response.qr_code {
            Some(code) => StartOutcome::ArtifactIssued(code),
            None => StartOutcome::Pending,
        })
    }

    /// Tear down the backend-side pairing session.
    pub async fn delete_session(&self) -> Result<()> {
        let _: MessageResponse = self
            .client
            .request_with_bearer(Method::DELETE, "/api/bot/session", self.auth.token(), None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_every_observed_spelling() {
        assert_eq!(BotStatus::parse("connected"), BotStatus::Connected);
        assert_eq!(BotStatus::parse("conectado"), BotStatus::Connected);
        assert_eq!(BotStatus::parse("Conectado"), BotStatus::Connected);
        assert_eq!(BotStatus::parse(" Conectado "), BotStatus::Connected);
    }

    #[test]
    fn status_defaults_to_disconnected() {
        assert_eq!(BotStatus::parse("desconectado"), BotStatus::Disconnected);
        assert_eq!(BotStatus::parse(""), BotStatus::Disconnected);
        assert_eq!(BotStatus::parse("error"), BotStatus::Disconnected);
    }

    #[test]
    fn start_response_distinguishes_sync_and_pending() {
        let with_code: StartResponse =
            serde_json::from_str(r#"{"qrCode":"ABC123"}"#).unwrap();
        assert_eq!(with_code.qr_code.as_deref(), Some("ABC123"));

        let pending: StartResponse = serde_json::from_str("{}").unwrap();
        assert!(pending.qr_code.is_none());
    }

    #[test]
    fn group_list_uses_backend_field_names() {
        let raw = r#"{
            "success": true,
            "groups": [
                {"conversation_id": "123@g.us", "name": "Entregas Centro", "enabled": true}
            ]
        }"#;
        let response: GroupListResponse = serde_json::from_str(raw).unwrap();
        let groups = response.groups.unwrap();
        assert_eq!(groups[0].conversation_id, "123@g.us");
        assert!(groups[0].enabled);
    }
}
