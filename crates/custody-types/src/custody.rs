//! # CustodyNode: the persisted custody relationship
//!
//! ## Lifecycle
//!
//! ```text
//!   petition / admin       qualifying payment
//!   ───────────────▶ UNASSIGNED ─────────────▶ ASSIGNED
//! ```
//!
//! - At most one row exists per `(custodian, payee, kernel_id)`.
//! - The transition to ASSIGNED happens exactly once; afterwards the
//!   application id, credential blob and service public key never change.
//! - Rows are never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, AppId, KernelId, TxHash};

/// The natural deduplication key of a custody row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CustodyKey {
    pub custodian: Address,
    pub payee: Address,
    pub kernel_id: KernelId,
}

impl CustodyKey {
    #[must_use]
    pub fn new(custodian: Address, payee: Address, kernel_id: KernelId) -> Self {
        Self {
            custodian,
            payee,
            kernel_id,
        }
    }
}

impl std::fmt::Display for CustodyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "custody:{}:{}:{}",
            hex::encode(&self.custodian.spend_key[..4]),
            hex::encode(&self.payee.spend_key[..4]),
            self.kernel_id.short()
        )
    }
}

/// A custody row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyNode {
    pub custodian: Address,
    pub payee: Address,
    pub kernel_id: KernelId,
    /// Assigned application, `None` until a qualifying payment is processed.
    pub app_id: Option<AppId>,
    /// Hash of the acknowledgement transaction carrying the petition.
    pub transaction_hash: Option<TxHash>,
    /// Sealed credential bundle (unpadded URL-safe base64).
    pub encrypted_credentials: Option<String>,
    /// Service public key the bundle was sealed with (hex).
    pub service_public_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustodyNode {
    /// A fresh unassigned row.
    #[must_use]
    pub fn unassigned(key: CustodyKey, now: DateTime<Utc>) -> Self {
        Self {
            custodian: key.custodian,
            payee: key.payee,
            kernel_id: key.kernel_id,
            app_id: None,
            transaction_hash: None,
            encrypted_credentials: None,
            service_public_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn key(&self) -> CustodyKey {
        CustodyKey::new(self.custodian, self.payee, self.kernel_id)
    }

    /// Whether an application has been handed over for this row.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.app_id.is_some()
    }
}
