//! Membership oracle decorators.
//!
//! - [`StaticDirectory`]: a fixed node list
//! - [`CachedMembership`]: bounded-TTL cache in front of any oracle
//! - [`FallbackMembership`]: serves a fixed list when the upstream fails,
//!   outside production only

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use custody_types::{Environment, MembershipOracle, NetworkNode, Result};
use tokio::sync::RwLock;

/// An oracle answering from a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    nodes: Vec<NetworkNode>,
}

impl StaticDirectory {
    #[must_use]
    pub fn new(nodes: Vec<NetworkNode>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl MembershipOracle for StaticDirectory {
    async fn list_nodes(&self) -> Result<Vec<NetworkNode>> {
        Ok(self.nodes.clone())
    }
}

/// Caches the directory for at most `ttl`, so ACCEPTED/REMOVED transitions
/// become visible within one TTL window. A zero TTL disables caching.
///
/// The lock is never held while the inner oracle is being queried.
pub struct CachedMembership {
    inner: Arc<dyn MembershipOracle>,
    ttl: Duration,
    cached: RwLock<Option<(Instant, Arc<Vec<NetworkNode>>)>>,
}

impl CachedMembership {
    #[must_use]
    pub fn new(inner: Arc<dyn MembershipOracle>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: RwLock::new(None),
        }
    }

    async fn fresh(&self) -> Option<Arc<Vec<NetworkNode>>> {
        let guard = self.cached.read().await;
        guard
            .as_ref()
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, nodes)| Arc::clone(nodes))
    }
}

#[async_trait]
impl MembershipOracle for CachedMembership {
    async fn list_nodes(&self) -> Result<Vec<NetworkNode>> {
        if let Some(nodes) = self.fresh().await {
            return Ok(nodes.as_ref().clone());
        }

        let nodes = self.inner.list_nodes().await?;
        if !self.ttl.is_zero() {
            *self.cached.write().await = Some((Instant::now(), Arc::new(nodes.clone())));
        }
        Ok(nodes)
    }
}

/// Falls back to a fixed directory when the upstream call fails, unless
/// running in production.
pub struct FallbackMembership {
    primary: Arc<dyn MembershipOracle>,
    fallback: Vec<NetworkNode>,
    environment: Environment,
}

impl FallbackMembership {
    #[must_use]
    pub fn new(
        primary: Arc<dyn MembershipOracle>,
        fallback: Vec<NetworkNode>,
        environment: Environment,
    ) -> Self {
        Self {
            primary,
            fallback,
            environment,
        }
    }
}

#[async_trait]
impl MembershipOracle for FallbackMembership {
    async fn list_nodes(&self) -> Result<Vec<NetworkNode>> {
        match self.primary.list_nodes().await {
            Ok(nodes) => Ok(nodes),
            Err(err) if !self.environment.is_production() && !self.fallback.is_empty() => {
                tracing::warn!(error = %err, "membership upstream failed, serving fallback directory");
                Ok(self.fallback.clone())
            }
            Err(err) => Err(err),
        }
    }
}
