//! Administrative handlers, independent of any HTTP framework.
//!
//! Each handler returns a [`ResponseView`]; the transport only needs to
//! serialize it and answer with [`ResponseView::status`].

use chrono::{DateTime, Utc};
use custody_registry::CustodyRegistry;
use custody_types::{
    AppId, CustodyError, CustodyNode, ResponseView, Result,
    constants::{SERVICE_NAME, VERSION},
};
use custody_verifier::{PayloadVerifier, decode_extra, encode_extra};
use serde::{Deserialize, Serialize};

/// Body of a petition submission.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNodeRequest {
    /// URL-safe base64 authorization payload.
    pub extra: String,
}

/// Public rendering of a custody row. Absent values render as empty
/// strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub custodian: String,
    pub payee: String,
    pub kernel_id: String,
    pub app_id: String,
    pub transaction_hash: String,
    pub keystore: String,
    pub public_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CustodyNode> for NodeView {
    fn from(node: &CustodyNode) -> Self {
        Self {
            custodian: node.custodian.to_string(),
            payee: node.payee.to_string(),
            kernel_id: node.kernel_id.to_string(),
            app_id: node.app_id.map(|id| id.to_string()).unwrap_or_default(),
            transaction_hash: node
                .transaction_hash
                .map(|h| h.to_string())
                .unwrap_or_default(),
            keystore: node.encrypted_credentials.clone().unwrap_or_default(),
            public_key: node.service_public_key.clone().unwrap_or_default(),
            created_at: node.created_at,
            updated_at: node.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthView {
    pub build: String,
}

fn respond<T>(result: Result<T>, operation: &str) -> ResponseView<T> {
    match result {
        Ok(data) => ResponseView::data(data),
        Err(err) => {
            if err.is_caller_correctable() {
                tracing::debug!(operation, error = %err, "request rejected");
            } else {
                tracing::error!(operation, error = %err, "request failed");
            }
            ResponseView::error(&err)
        }
    }
}

/// Handlers for the administrative surface.
#[derive(Debug, Clone)]
pub struct AdminApi {
    verifier: PayloadVerifier,
    registry: CustodyRegistry,
}

impl AdminApi {
    #[must_use]
    pub fn new(verifier: PayloadVerifier, registry: CustodyRegistry) -> Self {
        Self { verifier, registry }
    }

    /// `POST /nodes` with `{"extra": "<base64>"}`.
    pub async fn create_node(&self, body: &[u8]) -> ResponseView<NodeView> {
        respond(self.petition(body).await, "create_node")
    }

    async fn petition(&self, body: &[u8]) -> Result<NodeView> {
        let request: CreateNodeRequest =
            serde_json::from_slice(body).map_err(|e| CustodyError::BadRequest {
                reason: e.to_string(),
            })?;
        let raw = decode_extra(&request.extra)?;
        let key = self.verifier.verify(&raw).await?;
        let node = self
            .registry
            .get_or_create_by_petition(key, &encode_extra(&raw))
            .await?;
        Ok(NodeView::from(&node))
    }

    /// `GET /nodes`: assigned rows only.
    pub async fn list_nodes(&self) -> ResponseView<Vec<NodeView>> {
        let result = self
            .registry
            .list(None)
            .await
            .map(|nodes| nodes.iter().map(NodeView::from).collect());
        respond(result, "list_nodes")
    }

    /// `GET /template`: ids of every assigned application.
    pub async fn assigned_app_ids(&self) -> ResponseView<Vec<AppId>> {
        respond(self.registry.assigned_app_ids().await, "assigned_app_ids")
    }

    /// `GET /_hc`.
    #[must_use]
    pub fn health(&self) -> ResponseView<HealthView> {
        ResponseView::data(HealthView {
            build: format!("{SERVICE_NAME}-{VERSION}"),
        })
    }
}
