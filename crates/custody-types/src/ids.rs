//! Identifiers used throughout the custody service.
//!
//! Addresses use the kernel's `XIN` base58check text form. Node ids and
//! hashes are fixed-size byte arrays rendered as lowercase hex. Application
//! ids are UUIDs, trace ids are UUIDs derived deterministically from the
//! custody triple.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::{
    CustodyError,
    constants::{ADDRESS_CHECKSUM_LEN, ADDRESS_LEN, ADDRESS_PREFIX},
};

fn decode_fixed<const N: usize>(s: &str, what: &str) -> crate::Result<[u8; N]> {
    let bytes = hex::decode(s).map_err(|e| CustodyError::Serialization(format!("{what}: {e}")))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        CustodyError::Serialization(format!("{what}: expected {N} bytes, got {}", b.len()))
    })
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A network address: a public spend key followed by a public view key,
/// both compressed Edwards25519 points.
///
/// Text form: `XIN` followed by base58 of `spend || view || checksum`, where
/// the checksum is the first 4 bytes of SHA3-256(`XIN || spend || view`).
///
/// Signatures are always checked against the spend key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Address {
    pub spend_key: [u8; 32],
    pub view_key: [u8; 32],
}

impl Address {
    #[must_use]
    pub fn new(spend_key: [u8; 32], view_key: [u8; 32]) -> Self {
        Self {
            spend_key,
            view_key,
        }
    }

    /// Parse the 64-byte wire form (`spend || view`).
    ///
    /// # Errors
    /// Returns `Serialization` if `bytes` is not exactly 64 bytes long.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() != ADDRESS_LEN {
            return Err(CustodyError::Serialization(format!(
                "address: expected {ADDRESS_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut spend_key = [0u8; 32];
        let mut view_key = [0u8; 32];
        spend_key.copy_from_slice(&bytes[..32]);
        view_key.copy_from_slice(&bytes[32..]);
        Ok(Self::new(spend_key, view_key))
    }

    /// The 64-byte wire form (`spend || view`).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; ADDRESS_LEN] {
        let mut out = [0u8; ADDRESS_LEN];
        out[..32].copy_from_slice(&self.spend_key);
        out[32..].copy_from_slice(&self.view_key);
        out
    }

    fn checksum(bytes: &[u8]) -> [u8; ADDRESS_CHECKSUM_LEN] {
        use sha3::{Digest, Sha3_256};
        let mut hasher = Sha3_256::new();
        hasher.update(ADDRESS_PREFIX.as_bytes());
        hasher.update(bytes);
        let hash = hasher.finalize();
        let mut out = [0u8; ADDRESS_CHECKSUM_LEN];
        out.copy_from_slice(&hash[..ADDRESS_CHECKSUM_LEN]);
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        let mut data = Vec::with_capacity(ADDRESS_LEN + ADDRESS_CHECKSUM_LEN);
        data.extend_from_slice(&bytes);
        data.extend_from_slice(&Self::checksum(&bytes));
        write!(f, "{ADDRESS_PREFIX}{}", bs58::encode(data).into_string())
    }
}

impl FromStr for Address {
    type Err = CustodyError;

    fn from_str(s: &str) -> crate::Result<Self> {
        let invalid = |reason: String| CustodyError::Serialization(format!("address: {reason}"));
        let body = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or_else(|| invalid(format!("missing {ADDRESS_PREFIX} prefix")))?;
        let data = bs58::decode(body)
            .into_vec()
            .map_err(|e| invalid(e.to_string()))?;
        let expected = ADDRESS_LEN + ADDRESS_CHECKSUM_LEN;
        if data.len() != expected {
            return Err(invalid(format!(
                "expected {expected} bytes, got {}",
                data.len()
            )));
        }
        let (bytes, checksum) = data.split_at(ADDRESS_LEN);
        if checksum != Self::checksum(bytes) {
            return Err(invalid("checksum mismatch".into()));
        }
        Self::from_slice(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Random key material for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Address {
    pub fn random() -> Self {
        Self::new(rand::random(), rand::random())
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl KernelId {
    pub fn random() -> Self {
        Self(rand::random())
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl TxHash {
    pub fn random() -> Self {
        Self(rand::random())
    }
}

// ---------------------------------------------------------------------------
// KernelId
// ---------------------------------------------------------------------------

/// Identifier of a kernel node in the consensus network (a 32-byte hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct KernelId(pub [u8; 32]);

impl KernelId {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for KernelId {
    type Err = CustodyError;

    fn from_str(s: &str) -> crate::Result<Self> {
        decode_fixed(s, "kernel id").map(Self)
    }
}

impl Serialize for KernelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KernelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// TxHash
// ---------------------------------------------------------------------------

/// Hash of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = CustodyError;

    fn from_str(s: &str) -> crate::Result<Self> {
        decode_fixed(s, "transaction hash").map(Self)
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// AppId
// ---------------------------------------------------------------------------

/// Identifier of a pooled application identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub Uuid);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AppId {
    type Err = CustodyError;

    fn from_str(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| CustodyError::Serialization(format!("app id: {e}")))
    }
}

// ---------------------------------------------------------------------------
// TraceId
// ---------------------------------------------------------------------------

/// Idempotency key handed to the publication service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(pub Uuid);

impl TraceId {
    /// Deterministic `TraceId` for a custody triple.
    ///
    /// Republishing the acknowledgement for the same triple always carries
    /// the same trace id, so the upstream service deduplicates it.
    #[must_use]
    pub fn for_custody(custodian: &Address, payee: &Address, kernel: &KernelId) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"custody:trace_id:v1:");
        hasher.update(custodian.to_bytes());
        hasher.update(payee.to_bytes());
        hasher.update(kernel.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
