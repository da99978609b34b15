//! Payment-triggered application assignment.
//!
//! ```text
//! Notification ──screen──▶ memo = tx hash ──▶ LedgerLookup
//!                                               │ extra
//!                                               ▼
//!                         CustodyRegistry ◀── PayloadVerifier
//!                         assign_application
//! ```
//!
//! Payments that are not fee payments are ignored, not rejected. Failures
//! are returned to the caller, which logs them; nothing is retried here.

use std::sync::Arc;

use custody_registry::CustodyRegistry;
use custody_types::{
    CustodyError, CustodyNode, FeeConfig, LedgerLookup, Notification, Result, TxHash,
};
use custody_verifier::{PayloadVerifier, decode_ledger_extra};

/// Why a notification was not acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    OwnPayment,
    AssetMismatch,
    AmountMismatch,
    EmptyMemo,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OwnPayment => write!(f, "OWN_PAYMENT"),
            Self::AssetMismatch => write!(f, "ASSET_MISMATCH"),
            Self::AmountMismatch => write!(f, "AMOUNT_MISMATCH"),
            Self::EmptyMemo => write!(f, "EMPTY_MEMO"),
        }
    }
}

/// Result of handling one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    /// The row after assignment (or unchanged, if it was already assigned).
    Assigned(CustodyNode),
}

/// Turns qualifying fee payments into application assignments.
#[derive(Clone)]
pub struct PaymentFlow {
    fee: FeeConfig,
    client_id: String,
    ledger: Arc<dyn LedgerLookup>,
    verifier: PayloadVerifier,
    registry: CustodyRegistry,
}

impl PaymentFlow {
    #[must_use]
    pub fn new(
        fee: FeeConfig,
        client_id: impl Into<String>,
        ledger: Arc<dyn LedgerLookup>,
        verifier: PayloadVerifier,
        registry: CustodyRegistry,
    ) -> Self {
        Self {
            fee,
            client_id: client_id.into(),
            ledger,
            verifier,
            registry,
        }
    }

    fn screen(&self, notification: &Notification) -> Option<IgnoreReason> {
        if notification.sender_id == self.client_id {
            Some(IgnoreReason::OwnPayment)
        } else if notification.asset_id != self.fee.asset_id {
            Some(IgnoreReason::AssetMismatch)
        } else if notification.amount != self.fee.amount {
            Some(IgnoreReason::AmountMismatch)
        } else if notification.memo.trim().is_empty() {
            Some(IgnoreReason::EmptyMemo)
        } else {
            None
        }
    }

    /// Handle one notification end to end.
    pub async fn handle(&self, notification: &Notification) -> Result<Outcome> {
        if let Some(reason) = self.screen(notification) {
            tracing::debug!(sender = %notification.sender_id, %reason, "notification ignored");
            return Ok(Outcome::Ignored(reason));
        }

        let hash: TxHash = notification
            .memo
            .trim()
            .parse()
            .map_err(|_| CustodyError::invalid_payload("hash", "invalid"))?;
        let transaction = self
            .ledger
            .read_transaction(&hash)
            .await?
            .ok_or_else(|| CustodyError::invalid_payload("hash", "invalid"))?;

        let raw = decode_ledger_extra(&transaction.extra_hex)?;
        let key = self.verifier.verify(&raw).await?;
        let node = self.registry.assign_application(key, hash).await?;
        Ok(Outcome::Assigned(node))
    }
}

impl std::fmt::Debug for PaymentFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentFlow")
            .field("fee", &self.fee)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
