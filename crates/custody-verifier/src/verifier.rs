//! Authenticates a custody petition against the membership directory.
//!
//! 1. Parse and check length/version (no I/O before this passes)
//! 2. Query the membership oracle once
//! 3. Resolve the authoritative signer for the kernel node
//! 4. Verify signer, payee and custodian signatures over the 161-byte prefix
//!
//! Nothing is persisted; the only side effect is the oracle query.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use custody_types::{
    Address, CustodyError, CustodyKey, KernelId, MembershipOracle, NetworkNode, Result,
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::payload::AuthorizationPayload;

/// Find the signer allowed to authorize custody of `kernel` for `payee`.
///
/// The first entry with a matching id that is ACCEPTED, or REMOVED within
/// the grace window, decides: its signer counts only if its payee equals
/// `payee`. Entries in any other state are skipped.
///
/// # Errors
/// `InvalidPayload` on field `signer` with reason `not existing` when no
/// entry qualifies, or `invalid` when the signer text is malformed.
pub fn resolve_signer(
    nodes: &[NetworkNode],
    kernel: &KernelId,
    payee: &Address,
    now: DateTime<Utc>,
) -> Result<Address> {
    let decisive = nodes
        .iter()
        .find(|n| n.id == *kernel && n.is_authoritative_at(now));

    let Some(node) = decisive else {
        return Err(CustodyError::invalid_payload("signer", "not existing"));
    };
    if node.payee.parse::<Address>().ok().as_ref() != Some(payee) {
        tracing::debug!(kernel = %kernel.short(), state = %node.state, "directory payee mismatch");
        return Err(CustodyError::invalid_payload("signer", "not existing"));
    }
    node.signer
        .parse()
        .map_err(|_| CustodyError::invalid_payload("signer", "invalid"))
}

fn verify_signature(
    key: &[u8; 32],
    message: &[u8],
    signature: &[u8; 64],
    field: &str,
) -> Result<()> {
    let verifying_key =
        VerifyingKey::from_bytes(key).map_err(|_| CustodyError::invalid_payload(field, "invalid"))?;
    verifying_key
        .verify(message, &Signature::from_bytes(signature))
        .map_err(|_| CustodyError::invalid_payload(field, "invalid"))
}

/// Verifies petitions using a shared membership oracle.
#[derive(Clone)]
pub struct PayloadVerifier {
    oracle: Arc<dyn MembershipOracle>,
}

impl PayloadVerifier {
    #[must_use]
    pub fn new(oracle: Arc<dyn MembershipOracle>) -> Self {
        Self { oracle }
    }

    /// Verify `raw` at the current time.
    pub async fn verify(&self, raw: &[u8]) -> Result<CustodyKey> {
        self.verify_at(raw, Utc::now()).await
    }

    /// Verify `raw` as of `now`; returns the custodian, payee and kernel
    /// exactly as encoded.
    pub async fn verify_at(&self, raw: &[u8], now: DateTime<Utc>) -> Result<CustodyKey> {
        let payload = AuthorizationPayload::parse(raw)?;
        let nodes = self.oracle.list_nodes().await?;
        let signer = resolve_signer(&nodes, &payload.kernel_id, &payload.payee, now)?;

        let prefix = payload.signed_prefix();
        verify_signature(
            &signer.spend_key,
            prefix,
            &payload.signer_signature(),
            "signer signature",
        )?;
        verify_signature(
            &payload.payee.spend_key,
            prefix,
            &payload.payee_signature(),
            "payee signature",
        )?;
        verify_signature(
            &payload.custodian.spend_key,
            prefix,
            &payload.custodian_signature(),
            "custodian signature",
        )?;

        let key = payload.key();
        tracing::debug!(custody = %key, "petition authenticated");
        Ok(key)
    }
}

impl std::fmt::Debug for PayloadVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadVerifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration;
    use custody_types::NodeState;
    use ed25519_dalek::SigningKey;

    use super::*;
    use crate::testing::PetitionBuilder;

    /// Serves a fixed list and counts queries.
    struct Directory {
        nodes: Vec<NetworkNode>,
        calls: AtomicUsize,
    }

    impl Directory {
        fn new(nodes: Vec<NetworkNode>) -> Arc<Self> {
            Arc::new(Self {
                nodes,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MembershipOracle for Directory {
        async fn list_nodes(&self) -> Result<Vec<NetworkNode>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.nodes.clone())
        }
    }

    fn assert_field(err: &CustodyError, expected_field: &str, expected_reason: &str) {
        match err {
            CustodyError::InvalidPayload { field, reason } => {
                assert_eq!(field, expected_field);
                assert_eq!(reason, expected_reason);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn entry(id: KernelId, signer: &Address, payee: &Address, state: NodeState) -> NetworkNode {
        NetworkNode::dummy(id, &signer.to_string(), &payee.to_string(), state)
    }

    #[test]
    fn accepted_node_resolves() {
        let (k, s, p) = (KernelId::random(), Address::random(), Address::random());
        let nodes = vec![entry(k, &s, &p, NodeState::Accepted)];
        assert_eq!(resolve_signer(&nodes, &k, &p, Utc::now()).unwrap(), s);
    }

    #[test]
    fn payee_mismatch_is_not_existing() {
        let (k, s, p) = (KernelId::random(), Address::random(), Address::random());
        let nodes = vec![entry(k, &s, &p, NodeState::Accepted)];
        let err = resolve_signer(&nodes, &k, &Address::random(), Utc::now()).unwrap_err();
        assert!(
            matches!(err, CustodyError::InvalidPayload { ref field, ref reason } if field == "signer" && reason == "not existing")
        );
    }

    #[test]
    fn stale_removed_entry_skipped_for_later_match() {
        let (k, p) = (KernelId::random(), Address::random());
        let old_signer = Address::random();
        let new_signer = Address::random();
        let now = Utc::now();
        let mut stale = entry(k, &old_signer, &p, NodeState::Removed);
        stale.timestamp = (now - Duration::days(30)).timestamp_nanos_opt().unwrap();
        let nodes = vec![stale, entry(k, &new_signer, &p, NodeState::Accepted)];
        assert_eq!(resolve_signer(&nodes, &k, &p, now).unwrap(), new_signer);
    }

    #[test]
    fn pledging_node_not_authoritative() {
        let (k, s, p) = (KernelId::random(), Address::random(), Address::random());
        let nodes = vec![entry(k, &s, &p, NodeState::Pledging)];
        assert!(resolve_signer(&nodes, &k, &p, Utc::now()).is_err());
    }

    #[test]
    fn kernel_directory_entry_resolves() {
        let id: KernelId = "394e7b2131b7d0a996bb094e30d05ac7d51f5a09156e5f7349cac55d2179a144"
            .parse()
            .unwrap();
        let signer = "XIN4qtYcAuAsJFnHp61waUheVsiK1byouLqbhrA8VpSQwxHs4z8LPjpFRrx3zdmiXZuFSwJ8CAMCwLkxap1LbRWHk2iVsLyx";
        let payee = "XINYvDWLAqoa1PxNxAaJcecrrehHVaaqqT4owg7ST1Yt2Gs5VUX62ArnVW7rx3vBMxfRdA5Y6kEg1Y5jSdQDFF3msunpmED4";
        let nodes = vec![NetworkNode::dummy(id, signer, payee, NodeState::Accepted)];

        let resolved = resolve_signer(&nodes, &id, &payee.parse().unwrap(), Utc::now()).unwrap();
        assert_eq!(resolved.to_string(), signer);
    }

    #[test]
    fn malformed_signer_text() {
        let (k, p) = (KernelId::random(), Address::random());
        let mut n = entry(k, &Address::random(), &p, NodeState::Accepted);
        n.signer = "XIN-not-hex".into();
        let err = resolve_signer(&[n], &k, &p, Utc::now()).unwrap_err();
        assert!(
            matches!(err, CustodyError::InvalidPayload { ref reason, .. } if reason == "invalid")
        );
    }

    // ------------------------------------------------------------------
    // Full petition verification
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn valid_petition_returns_encoded_key() {
        let petition = PetitionBuilder::random();
        let directory = Directory::new(vec![petition.directory_entry(NodeState::Accepted)]);
        let verifier = PayloadVerifier::new(directory.clone());

        let key = verifier.verify(&petition.build()).await.unwrap();
        assert_eq!(key.custodian, petition.custodian_address());
        assert_eq!(key.payee, petition.payee_address());
        assert_eq!(key.kernel_id, petition.kernel_id);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_payload_never_queries_directory() {
        let petition = PetitionBuilder::random();
        let directory = Directory::new(vec![petition.directory_entry(NodeState::Accepted)]);
        let verifier = PayloadVerifier::new(directory.clone());

        let mut raw = petition.build();
        raw.pop();
        assert_field(&verifier.verify(&raw).await.unwrap_err(), "extra", "length 352 != 353");

        let mut raw = petition.build();
        raw[0] = 0;
        let err = verifier.verify(&raw).await.unwrap_err();
        assert!(matches!(err, CustodyError::InvalidPayload { ref field, .. } if field == "extra head"));

        assert_eq!(directory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn removed_past_grace_is_rejected_despite_valid_signatures() {
        let petition = PetitionBuilder::random();
        let now = Utc::now();
        let mut entry = petition.directory_entry(NodeState::Removed);
        entry.timestamp = (now - Duration::days(8)).timestamp_nanos_opt().unwrap();
        let verifier = PayloadVerifier::new(Directory::new(vec![entry]));

        let err = verifier.verify_at(&petition.build(), now).await.unwrap_err();
        assert_field(&err, "signer", "not existing");
    }

    #[tokio::test]
    async fn removed_within_grace_still_authorizes() {
        let petition = PetitionBuilder::random();
        let now = Utc::now();
        let mut entry = petition.directory_entry(NodeState::Removed);
        entry.timestamp = (now - Duration::days(6)).timestamp_nanos_opt().unwrap();
        let verifier = PayloadVerifier::new(Directory::new(vec![entry]));

        assert!(verifier.verify_at(&petition.build(), now).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_kernel_is_not_existing() {
        let petition = PetitionBuilder::random();
        let other = PetitionBuilder::random();
        let verifier =
            PayloadVerifier::new(Directory::new(vec![other.directory_entry(NodeState::Accepted)]));

        let err = verifier.verify(&petition.build()).await.unwrap_err();
        assert_field(&err, "signer", "not existing");
    }

    #[tokio::test]
    async fn each_forged_signature_names_its_field() {
        let petition = PetitionBuilder::random();
        let verifier = PayloadVerifier::new(Directory::new(vec![
            petition.directory_entry(NodeState::Accepted),
        ]));
        let intruder = SigningKey::generate(&mut rand::rngs::OsRng);

        let raw = petition.build_with(&intruder, &petition.payee, &petition.custodian);
        assert_field(&verifier.verify(&raw).await.unwrap_err(), "signer signature", "invalid");

        let raw = petition.build_with(&petition.signer, &intruder, &petition.custodian);
        assert_field(&verifier.verify(&raw).await.unwrap_err(), "payee signature", "invalid");

        let raw = petition.build_with(&petition.signer, &petition.payee, &intruder);
        assert_field(&verifier.verify(&raw).await.unwrap_err(), "custodian signature", "invalid");
    }

    #[tokio::test]
    async fn flipped_prefix_bit_breaks_signer_signature() {
        let petition = PetitionBuilder::random();
        let verifier = PayloadVerifier::new(Directory::new(vec![
            petition.directory_entry(NodeState::Accepted),
        ]));
        let mut raw = petition.build();
        // Last byte of the custodian view key: the directory lookup still
        // succeeds, only the signed bytes change.
        raw[64] ^= 0x01;
        assert_field(&verifier.verify(&raw).await.unwrap_err(), "signer signature", "invalid");
    }
}
