//! Inbound payment notifications and ledger lookups.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::TxHash;

/// A confirmed payment reported by the message bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub asset_id: String,
    pub amount: Decimal,
    /// Account that sent the payment.
    pub sender_id: String,
    /// Expected to carry the acknowledgement transaction hash.
    #[serde(default)]
    pub memo: String,
}

/// A transaction returned by the ledger lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub hash: TxHash,
    #[serde(rename = "asset")]
    pub asset_id: String,
    /// Hex-encoded extra field.
    #[serde(rename = "extra")]
    pub extra_hex: String,
}

/// What the publication service needs to create an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRequest {
    pub amount: Decimal,
    pub trace_id: crate::TraceId,
    pub memo: String,
}
