//! HTTP adapters for the external collaborators.
//!
//! - [`KernelRpc`]: JSON-RPC client for the kernel node; serves the
//!   membership directory (`listallnodes`) and transaction lookups
//!   (`gettransaction`)
//! - [`HttpPublisher`]: posts acknowledgement requests to the publication
//!   service
//!
//! Both answer with a `{"data": …}` / `{"error": …}` envelope. Neither
//! retries; failures surface as `UpstreamUnavailable`.

use std::time::Duration;

use async_trait::async_trait;
use custody_types::{
    CustodyError, EndpointConfig, LedgerLookup, LedgerTransaction, MembershipOracle,
    NetworkNode, ObjectPublisher, ObjectRequest, Result, TxHash,
};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl Envelope {
    /// `Ok(None)` for a missing or null `data`.
    fn into_data<T: DeserializeOwned>(self, service: &str) -> Result<Option<T>> {
        if let Some(err) = self.error {
            return Err(CustodyError::upstream(service, err));
        }
        match self.data {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| CustodyError::upstream(service, format!("malformed data: {e}"))),
        }
    }
}

fn build_client(config: &EndpointConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .build()
        .map_err(|e| CustodyError::Configuration(format!("http client for {}: {e}", config.url)))
}

// ---------------------------------------------------------------------------
// KernelRpc
// ---------------------------------------------------------------------------

/// JSON-RPC client for a kernel node.
#[derive(Debug, Clone)]
pub struct KernelRpc {
    client: Client,
    url: String,
}

impl KernelRpc {
    const SERVICE: &'static str = "kernel rpc";

    pub fn new(config: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            url: config.url.clone(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let body = json!({ "method": method, "params": params });
        let envelope: Envelope = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CustodyError::upstream(Self::SERVICE, format!("{method}: {e}")))?
            .json()
            .await
            .map_err(|e| CustodyError::upstream(Self::SERVICE, format!("{method}: {e}")))?;
        envelope.into_data(Self::SERVICE)
    }
}

#[async_trait]
impl MembershipOracle for KernelRpc {
    async fn list_nodes(&self) -> Result<Vec<NetworkNode>> {
        let nodes: Option<Vec<NetworkNode>> = self.call("listallnodes", json!([0, false])).await?;
        Ok(nodes.unwrap_or_default())
    }
}

#[async_trait]
impl LedgerLookup for KernelRpc {
    async fn read_transaction(&self, hash: &TxHash) -> Result<Option<LedgerTransaction>> {
        self.call("gettransaction", json!([hash.to_string()])).await
    }
}

// ---------------------------------------------------------------------------
// HttpPublisher
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Published {
    transaction_hash: TxHash,
}

/// Publishes acknowledgement transactions through an HTTP service that
/// deduplicates on the trace id.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: Client,
    url: String,
}

impl HttpPublisher {
    const SERVICE: &'static str = "publisher";

    pub fn new(config: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl ObjectPublisher for HttpPublisher {
    async fn publish(&self, request: &ObjectRequest) -> Result<TxHash> {
        let envelope: Envelope = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| CustodyError::upstream(Self::SERVICE, e))?
            .json()
            .await
            .map_err(|e| CustodyError::upstream(Self::SERVICE, e))?;
        let published: Option<Published> = envelope.into_data(Self::SERVICE)?;
        published.map(|p| p.transaction_hash).ok_or_else(|| {
            CustodyError::upstream(
                Self::SERVICE,
                format!("no transaction for trace {}", request.trace_id),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use custody_types::NodeState;

    use super::*;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn error_member_wins() {
        let err = envelope(json!({ "error": { "code": 1 } }))
            .into_data::<Vec<NetworkNode>>("kernel rpc")
            .unwrap_err();
        assert!(matches!(err, CustodyError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn null_data_is_none() {
        let out: Option<LedgerTransaction> =
            envelope(json!({ "data": null })).into_data("kernel rpc").unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn directory_entries_decode() {
        let id = "ab".repeat(32);
        let nodes: Option<Vec<NetworkNode>> = envelope(json!({
            "data": [{
                "id": id,
                "signer": "s",
                "payee": "p",
                "state": "REMOVED",
                "timestamp": 1_700_000_000_000_000_000_i64,
                "transaction": "ignored"
            }]
        }))
        .into_data("kernel rpc")
        .unwrap();
        let nodes = nodes.unwrap();
        assert_eq!(nodes[0].state, NodeState::Removed);
        assert_eq!(nodes[0].id.to_string(), id);
    }

    #[test]
    fn published_hash_decodes() {
        let hash = "cd".repeat(32);
        let out: Option<Published> = envelope(json!({ "data": { "transaction_hash": hash } }))
            .into_data("publisher")
            .unwrap();
        assert_eq!(out.unwrap().transaction_hash.to_string(), hash);
    }
}
