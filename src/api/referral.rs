//! Referral endpoints
//!
//! Code generation, usage stats and verification. Commission math follows
//! the product rule of a flat R$ 10 per referral.

use super::{ApiClient, Result};
use crate::auth::AuthContext;
use reqwest::Method;
use serde::Deserialize;

/// Commission earned per referral, in BRL.
pub const COMMISSION_PER_REFERRAL: f64 = 10.0;

/// A generated referral code plus the backend message shown to the user.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedCode {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Referral usage statistics.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReferralStats {
    pub uses: u64,
}

impl ReferralStats {
    /// Total earnings implied by the usage count.
    pub fn earnings(&self) -> f64 {
        self.uses as f64 * COMMISSION_PER_REFERRAL
    }
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    valid: bool,
}

/// Client for the referral endpoints.
#[derive(Debug, Clone)]
pub struct ReferralApi {
    client: ApiClient,
    auth: AuthContext,
}

impl ReferralApi {
    pub fn new(client: ApiClient, auth: AuthContext) -> Self {
        Self { client, auth }
    }

    /// Generate (or fetch) this account's referral code.
    pub async fn generate(&self) -> Result<GeneratedCode> {
        self.client
            .request_with_bearer(Method::GET, "/api/referral/generate", self.auth.token(), None)
            .await
    }

    /// Fetch how many times this account's code was used.
    pub async fn stats(&self) -> Result<ReferralStats> {
        self.client
            .request_with_bearer(Method::GET, "/api/referral/stats", self.auth.token(), None)
            .await
    }

    /// Check whether someone else's code is valid for a discount.
    pub async fn verify(&self, code: &str) -> Result<bool> {
        let body = serde_json::json!({ "code": code });
        let response: VerifyResponse = self
            .client
            .request_with_bearer(
                Method::POST,
                "/api/referral/verify",
                self.auth.token(),
                Some(&body),
            )
            .await?;
        Ok(response.valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earnings_follow_flat_commission() {
        assert_eq!(ReferralStats { uses: 0 }.earnings(), 0.0);
        assert_eq!(ReferralStats { uses: 3 }.earnings(), 30.0);
    }
}
