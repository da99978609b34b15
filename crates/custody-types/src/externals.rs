//! Async transport abstractions for the external collaborators.
//!
//! Implementations perform blocking network I/O; callers must tolerate
//! multi-second latency and hold no in-process lock across these calls.
//!
//! ## Contract
//!
//! - Implementations MUST NOT retry internally.
//! - Implementations MUST NOT panic.
//! - Failures are reported as [`CustodyError::UpstreamUnavailable`].
//!
//! [`CustodyError::UpstreamUnavailable`]: crate::CustodyError::UpstreamUnavailable

use async_trait::async_trait;

use crate::{LedgerTransaction, NetworkNode, ObjectRequest, Result, TxHash};

/// Supplies the current network node directory.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    /// The full directory, in the order the network reports it.
    async fn list_nodes(&self) -> Result<Vec<NetworkNode>>;
}

/// Reads transactions from the ledger.
#[async_trait]
pub trait LedgerLookup: Send + Sync {
    /// `Ok(None)` if the ledger does not know the hash.
    async fn read_transaction(&self, hash: &TxHash) -> Result<Option<LedgerTransaction>>;
}

/// Publishes acknowledgement transactions.
#[async_trait]
pub trait ObjectPublisher: Send + Sync {
    /// Returns the hash of the published transaction. Publishing the same
    /// trace id twice yields the same transaction.
    async fn publish(&self, request: &ObjectRequest) -> Result<TxHash>;
}
