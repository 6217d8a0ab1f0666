//! Payment endpoint
//!
//! Creates a checkout on the external payment gateway and returns the
//! redirect URL. Pricing is displayed client-side: the beta price with an
//! optional 10% referral discount.

use super::{ApiClient, ApiError, Result};
use crate::auth::AuthContext;
use reqwest::Method;
use serde::Deserialize;
use url::Url;

/// Regular monthly price, in BRL.
pub const ORIGINAL_PRICE: f64 = 79.97;
/// Discounted beta price, in BRL.
pub const BETA_PRICE: f64 = 49.97;
/// Discount fraction applied when a valid referral code is supplied.
pub const REFERRAL_DISCOUNT: f64 = 0.10;

/// Price breakdown shown before checkout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub original: f64,
    pub base: f64,
    pub discount: f64,
    pub total: f64,
}

/// Compute the checkout quote, applying the referral discount when a valid
/// code was verified.
pub fn quote(referral_code_valid: bool) -> PriceQuote {
    let discount = if referral_code_valid {
        BETA_PRICE * REFERRAL_DISCOUNT
    } else {
        0.0
    };
    PriceQuote {
        original: ORIGINAL_PRICE,
        base: BETA_PRICE,
        discount,
        total: BETA_PRICE - discount,
    }
}

#[derive(Debug, Deserialize)]
struct CreatePaymentResponse {
    #[serde(default)]
    init_point: Option<String>,
}

/// Client for the payment endpoint.
#[derive(Debug, Clone)]
pub struct PaymentsApi {
    client: ApiClient,
    auth: AuthContext,
}

impl PaymentsApi {
    pub fn new(client: ApiClient, auth: AuthContext) -> Self {
        Self { client, auth }
    }

    /// Create a payment and return the gateway redirect URL.
    pub async fn create_payment(&self, referral_code: Option<&str>) -> Result<Url> {
        let body = serde_json::json!({ "referralCode": referral_code });
        let response: CreatePaymentResponse = self
            .client
            .request_with_bearer(
                Method::POST,
                "/api/payments/create-payment",
                self.auth.token(),
                Some(&body),
            )
            .await?;

        let init_point = response.init_point.ok_or_else(|| ApiError::Rejected {
            message: "payment link missing from response".to_string(),
        })?;
        Url::parse(&init_point).map_err(|_| ApiError::Rejected {
            message: "payment link is not a valid URL".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_without_code_is_beta_price() {
        let q = quote(false);
        assert_eq!(q.discount, 0.0);
        assert_eq!(q.total, BETA_PRICE);
    }

    #[test]
    fn quote_with_code_applies_ten_percent() {
        let q = quote(true);
        assert!((q.discount - 4.997).abs() < 1e-9);
        assert!((q.total - (BETA_PRICE - q.discount)).abs() < 1e-9);
    }
}
