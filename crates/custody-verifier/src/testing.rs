//! Signed petition fixtures. **Never use in production.**

use custody_types::{
    Address, KernelId, NetworkNode, NodeState, TraceId,
    constants::{PAYLOAD_VERSION, SIGNED_PREFIX_LEN},
};
use ed25519_dalek::{Signer, SigningKey};

use crate::payload::ExtraPack;

/// The extra bytes the publisher attaches to an acknowledgement carrying
/// `memo`.
#[must_use]
pub fn ledger_extra(trace_id: &TraceId, memo: &str) -> Vec<u8> {
    let pack = ExtraPack {
        trace: trace_id.0.as_bytes().to_vec(),
        memo: memo.to_string(),
    };
    rmp_serde::to_vec_named(&pack).expect("in-memory msgpack encoding")
}

/// Holds the three signing keys of a petition and builds payloads.
pub struct PetitionBuilder {
    pub signer: SigningKey,
    pub payee: SigningKey,
    pub custodian: SigningKey,
    pub kernel_id: KernelId,
}

fn address_of(key: &SigningKey) -> Address {
    // The view key plays no part in verification; derive something stable.
    let spend = key.verifying_key().to_bytes();
    let mut view = spend;
    view.reverse();
    Address::new(spend, view)
}

impl PetitionBuilder {
    /// Fresh random keys and kernel id.
    #[must_use]
    pub fn random() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signer: SigningKey::generate(&mut rng),
            payee: SigningKey::generate(&mut rng),
            custodian: SigningKey::generate(&mut rng),
            kernel_id: KernelId(rand::random()),
        }
    }

    /// Keys from fixed seeds.
    #[must_use]
    pub fn from_seeds(signer: [u8; 32], payee: [u8; 32], custodian: [u8; 32], kernel: [u8; 32]) -> Self {
        Self {
            signer: SigningKey::from_bytes(&signer),
            payee: SigningKey::from_bytes(&payee),
            custodian: SigningKey::from_bytes(&custodian),
            kernel_id: KernelId(kernel),
        }
    }

    #[must_use]
    pub fn signer_address(&self) -> Address {
        address_of(&self.signer)
    }

    #[must_use]
    pub fn payee_address(&self) -> Address {
        address_of(&self.payee)
    }

    #[must_use]
    pub fn custodian_address(&self) -> Address {
        address_of(&self.custodian)
    }

    /// The directory entry that makes this petition's signer authoritative.
    #[must_use]
    pub fn directory_entry(&self, state: NodeState) -> NetworkNode {
        NetworkNode::dummy(
            self.kernel_id,
            &self.signer_address().to_string(),
            &self.payee_address().to_string(),
            state,
        )
    }

    /// The 161-byte signed prefix.
    #[must_use]
    pub fn prefix(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(SIGNED_PREFIX_LEN);
        raw.push(PAYLOAD_VERSION);
        raw.extend_from_slice(&self.custodian_address().to_bytes());
        raw.extend_from_slice(&self.payee_address().to_bytes());
        raw.extend_from_slice(self.kernel_id.as_bytes());
        raw
    }

    /// A fully signed 353-byte payload.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        self.build_with(&self.signer, &self.payee, &self.custodian)
    }

    /// A payload whose signatures come from the given keys, which may
    /// differ from the ones encoded in the prefix.
    #[must_use]
    pub fn build_with(&self, signer: &SigningKey, payee: &SigningKey, custodian: &SigningKey) -> Vec<u8> {
        let mut raw = self.prefix();
        let prefix = raw.clone();
        for key in [signer, payee, custodian] {
            raw.extend_from_slice(&key.sign(&prefix).to_bytes());
        }
        raw
    }
}
