//! Configuration types for the custody service.
//!
//! Loaded once at startup and injected into components; nothing reads
//! configuration from global state.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CustodyError, NetworkNode, Result, constants};

/// Deployment environment. Only `Production` forbids the fallback
/// membership directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub service: ServiceIdentity,
    pub fee: FeeConfig,
    pub rpc: EndpointConfig,
    pub publisher: EndpointConfig,
    /// Path of the JSON application pool.
    pub apps_path: String,
    #[serde(default = "default_membership_ttl")]
    pub membership_cache_ttl_ms: u64,
    /// Directory served outside production when the RPC call fails.
    #[serde(default)]
    pub fallback_nodes: Vec<NetworkNode>,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_membership_ttl() -> u64 {
    constants::DEFAULT_MEMBERSHIP_TTL_MS
}

/// SQLite database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout() -> u64 {
    constants::DEFAULT_BUSY_TIMEOUT_MS
}

/// The service's own account and keypair.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Account id used to recognise (and ignore) our own payments.
    pub client_id: String,
    /// 32-byte key seed, hex encoded.
    pub private_key: String,
}

impl std::fmt::Debug for ServiceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceIdentity")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// The payment that triggers application assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub asset_id: String,
    pub amount: Decimal,
}

/// An outbound HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default = "default_rpc_timeout")]
    pub timeout_ms: u64,
}

fn default_rpc_timeout() -> u64 {
    constants::DEFAULT_RPC_TIMEOUT_MS
}

/// Log output options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl ServiceConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CustodyError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| CustodyError::Configuration(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.service.client_id.trim().is_empty() {
            return Err(CustodyError::Configuration("service.client_id is empty".into()));
        }
        match hex::decode(&self.service.private_key) {
            Ok(seed) if seed.len() == 32 => {}
            _ => {
                return Err(CustodyError::Configuration(
                    "service.private_key must be a 32-byte hex seed".into(),
                ));
            }
        }
        if self.fee.amount <= Decimal::ZERO {
            return Err(CustodyError::Configuration(format!(
                "fee.amount must be positive, got {}",
                self.fee.amount
            )));
        }
        if self.apps_path.trim().is_empty() {
            return Err(CustodyError::Configuration("apps_path is empty".into()));
        }
        Ok(())
    }
}
