//! Pooled application identities handed over to new custodians.

use serde::{Deserialize, Serialize};

use crate::AppId;

/// An externally provisioned application identity with its session
/// credentials. Serialized as JSON this is the credential bundle.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub app_id: AppId,
    pub session_id: String,
    pub private_key: String,
    pub pin_token: String,
    pub pin: String,
}

// Credentials must not end up in logs.
impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("app_id", &self.app_id)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Serialized credential bundle.
    pub fn to_bundle(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a decrypted credential bundle.
    pub fn from_bundle(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Application {
    /// Pool entry for tests. **Never use in production.**
    pub fn dummy(n: u128) -> Self {
        Self {
            app_id: AppId(uuid::Uuid::from_u128(n)),
            session_id: format!("session-{n}"),
            private_key: format!("private-{n}"),
            pin_token: format!("pin-token-{n}"),
            pin: format!("{:06}", n % 1_000_000),
        }
    }
}
