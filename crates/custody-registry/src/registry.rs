//! Async custody registry.
//!
//! Each store call runs on the blocking pool. Publication of the
//! acknowledgement happens between two store transactions, never inside
//! one, so no database lock is held across outbound I/O.

use std::sync::Arc;

use chrono::Utc;
use custody_crypto::CredentialSealer;
use custody_types::{
    Address, AppId, CustodyError, CustodyKey, CustodyNode, ObjectPublisher, ObjectRequest,
    Result, TraceId, TxHash,
    constants::{DEFAULT_LIST_LIMIT, PUBLICATION_UNIT_PRICE},
};
use rust_decimal::Decimal;

use crate::{pool::ApplicationPool, store::NodeStore};

/// Amount paid to publish an acknowledgement carrying `memo`:
/// `(len / 1024 + 2) * 0.001`.
#[must_use]
pub fn publication_amount(memo: &str) -> Decimal {
    Decimal::from(memo.len() / 1024 + 2) * PUBLICATION_UNIT_PRICE
}

/// The custody registry shared by the petition path and the payment flow.
#[derive(Clone)]
pub struct CustodyRegistry {
    store: Arc<NodeStore>,
    pool: Arc<ApplicationPool>,
    sealer: Arc<CredentialSealer>,
    publisher: Arc<dyn ObjectPublisher>,
}

impl CustodyRegistry {
    #[must_use]
    pub fn new(
        store: NodeStore,
        pool: ApplicationPool,
        sealer: CredentialSealer,
        publisher: Arc<dyn ObjectPublisher>,
    ) -> Self {
        Self {
            store: Arc::new(store),
            pool: Arc::new(pool),
            sealer: Arc::new(sealer),
            publisher,
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&NodeStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| CustodyError::Internal(format!("registry task failed: {e}")))?
    }

    /// Administrative insert; no deduplication beyond the storage
    /// constraints.
    pub async fn create(
        &self,
        key: CustodyKey,
        app_id: Option<AppId>,
        transaction_hash: Option<TxHash>,
    ) -> Result<CustodyNode> {
        let mut node = CustodyNode::unassigned(key, Utc::now());
        node.app_id = app_id;
        node.transaction_hash = transaction_hash;
        let node = self.blocking(move |store| store.create(&node)).await?;
        tracing::info!(custody = %key, "custody node created administratively");
        Ok(node)
    }

    /// Record a verified petition and make sure its acknowledgement is
    /// published.
    ///
    /// A row that already carries a transaction hash is returned unchanged.
    /// A row without one (new, or left behind by a failed publication) is
    /// published with the trace id derived from its triple, then the hash
    /// is attached.
    pub async fn get_or_create_by_petition(
        &self,
        key: CustodyKey,
        extra: &str,
    ) -> Result<CustodyNode> {
        let (node, created) = self
            .blocking(move |store| store.find_or_insert(&key, Utc::now()))
            .await?;
        if node.transaction_hash.is_some() {
            tracing::debug!(custody = %key, "petition already recorded");
            return Ok(node);
        }
        if created {
            tracing::info!(custody = %key, "petition recorded");
        } else {
            tracing::warn!(custody = %key, "petition row has no acknowledgement, republishing");
        }

        let request = ObjectRequest {
            amount: publication_amount(extra),
            trace_id: TraceId::for_custody(&key.custodian, &key.payee, &key.kernel_id),
            memo: extra.to_owned(),
        };
        let hash = self.publisher.publish(&request).await?;
        tracing::info!(custody = %key, trace_id = %request.trace_id, hash = %hash, "acknowledgement published");

        self.blocking(move |store| store.attach_transaction_hash(&key, &hash, Utc::now()))
            .await
    }

    /// Hand an application to the custodian of the row acknowledged by
    /// `hash`. Idempotent for rows that are already assigned.
    pub async fn assign_application(
        &self,
        key: CustodyKey,
        hash: TxHash,
    ) -> Result<CustodyNode> {
        let pool = Arc::clone(&self.pool);
        let sealer = Arc::clone(&self.sealer);
        self.blocking(move |store| store.assign(&hash, &key, &pool, &sealer, Utc::now()))
            .await
    }

    /// Assigned rows, oldest first.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<CustodyNode>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        self.blocking(move |store| store.list(limit)).await
    }

    pub async fn find_by_natural_key(&self, key: CustodyKey) -> Result<Option<CustodyNode>> {
        self.blocking(move |store| store.find_by_natural_key(&key)).await
    }

    pub async fn find_by_transaction_hash(&self, hash: TxHash) -> Result<Option<CustodyNode>> {
        self.blocking(move |store| store.find_by_transaction_hash(&hash)).await
    }

    pub async fn find_by_custodian(&self, custodian: Address) -> Result<Vec<CustodyNode>> {
        self.blocking(move |store| store.find_by_custodian(&custodian)).await
    }

    pub async fn assigned_app_ids(&self) -> Result<Vec<AppId>> {
        self.blocking(NodeStore::assigned_app_ids).await
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    #[must_use]
    pub fn service_public_key(&self) -> String {
        self.sealer.public_key().to_hex()
    }
}

impl std::fmt::Debug for CustodyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyRegistry")
            .field("store", &self.store)
            .field("pool_size", &self.pool.len())
            .finish_non_exhaustive()
    }
}
