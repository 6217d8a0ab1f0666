//! Withdrawal flow
//!
//! Client-side checks and the local ledger around the withdrawal request.
//! A submission is recorded in two phases: provisional when the request
//! leaves, then settled to confirmed or failed once the backend answers.
//! The ledger therefore never shows a request as accepted before the
//! backend said so, and a failed request stays visible with its reason
//! instead of silently disappearing.

use crate::api::withdrawal::{WithdrawalApi, WithdrawalRecord};
use crate::api::{self, ApiError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Smallest balance the backend accepts for withdrawal, in BRL.
pub const MINIMUM_WITHDRAWAL: f64 = 50.0;

/// Withdrawal flow errors
#[derive(Debug, thiserror::Error)]
pub enum WithdrawalError {
    #[error("a PIX key is required")]
    MissingPixKey,

    #[error("no balance available for withdrawal")]
    NoBalance,

    #[error("available balance R${available:.2} is below the R${MINIMUM_WITHDRAWAL:.2} minimum")]
    BelowMinimum { available: f64 },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Settlement phase of one local ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Request sent, backend answer outstanding.
    Provisional,
    /// Backend accepted the request.
    Confirmed,
    /// Backend rejected the request.
    Failed { reason: String },
}

/// One locally tracked submission.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub pix_key: String,
    pub amount: f64,
    pub requested_at: DateTime<Utc>,
    pub phase: Phase,
}

/// Backend surface the ledger drives.
#[async_trait]
pub trait WithdrawalBackend: Send {
    async fn available_balance(&self) -> api::Result<f64>;
    async fn request(&self, pix_key: &str) -> api::Result<()>;
    async fn history(&self) -> api::Result<Vec<WithdrawalRecord>>;
}

#[async_trait]
impl WithdrawalBackend for WithdrawalApi {
    async fn available_balance(&self) -> api::Result<f64> {
        WithdrawalApi::available_balance(self).await
    }

    async fn request(&self, pix_key: &str) -> api::Result<()> {
        WithdrawalApi::request(self, pix_key).await
    }

    async fn history(&self) -> api::Result<Vec<WithdrawalRecord>> {
        WithdrawalApi::history(self).await
    }
}

/// Local withdrawal ledger over the backend request endpoint.
pub struct WithdrawalLedger<B> {
    backend: B,
    entries: Vec<LedgerEntry>,
}

impl<B: WithdrawalBackend> WithdrawalLedger<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            entries: Vec::new(),
        }
    }

    /// Local submissions from this session, oldest first.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Submit a withdrawal of the full available balance. Preconditions are
    /// checked here so the obvious rejections never hit the backend; the
    /// entry is provisional until the backend answers.
    pub async fn submit(&mut self, pix_key: &str) -> Result<f64, WithdrawalError> {
        let pix_key = pix_key.trim();
        if pix_key.is_empty() {
            return Err(WithdrawalError::MissingPixKey);
        }

        let available = self.backend.available_balance().await?;
        if available <= 0.0 {
            return Err(WithdrawalError::NoBalance);
        }
        if available < MINIMUM_WITHDRAWAL {
            return Err(WithdrawalError::BelowMinimum { available });
        }

        self.entries.push(LedgerEntry {
            pix_key: pix_key.to_string(),
            amount: available,
            requested_at: Utc::now(),
            phase: Phase::Provisional,
        });
        let index = self.entries.len() - 1;

        match self.backend.request(pix_key).await {
            Ok(()) => {
                self.entries[index].phase = Phase::Confirmed;
                tracing::info!(amount = available, "withdrawal request accepted");
                Ok(available)
            }
            Err(e) => {
                self.entries[index].phase = Phase::Failed {
                    reason: e.to_string(),
                };
                tracing::warn!(error = %e, "withdrawal request rejected");
                Err(e.into())
            }
        }
    }

    /// Fetch the backend-side history for this account.
    pub async fn history(&self) -> Result<Vec<WithdrawalRecord>, WithdrawalError> {
        Ok(self.backend.history().await?)
    }
}
