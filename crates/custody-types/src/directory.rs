//! Network membership directory entries, as reported by the consensus
//! network. Never persisted locally.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{KernelId, constants::REMOVED_NODE_GRACE_SECS};

/// Lifecycle state of a kernel node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    Pledging,
    Accepted,
    Resigning,
    Removed,
    Cancelled,
    /// Any state this service does not act on.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pledging => write!(f, "PLEDGING"),
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Resigning => write!(f, "RESIGNING"),
            Self::Removed => write!(f, "REMOVED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// One entry of the membership directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkNode {
    /// Kernel node id.
    pub id: KernelId,
    /// Signer address in hex text form.
    pub signer: String,
    /// Payee address in hex text form.
    pub payee: String,
    pub state: NodeState,
    /// State change time in nanoseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

impl NetworkNode {
    /// When the node entered its current state.
    #[must_use]
    pub fn state_changed_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp)
    }

    /// Whether this node may authorize custody at `now`.
    ///
    /// ACCEPTED nodes always may. REMOVED nodes may until the grace window
    /// after removal has passed. Every other state may not.
    #[must_use]
    pub fn is_authoritative_at(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            NodeState::Accepted => true,
            NodeState::Removed => {
                now < self.state_changed_at() + Duration::seconds(REMOVED_NODE_GRACE_SECS)
            }
            _ => false,
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl NetworkNode {
    /// Directory entry for tests. **Never use in production.**
    pub fn dummy(id: KernelId, signer: &str, payee: &str, state: NodeState) -> Self {
        Self {
            id,
            signer: signer.to_string(),
            payee: payee.to_string(),
            state,
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        }
    }
}
