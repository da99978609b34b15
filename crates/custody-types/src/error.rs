//! Error types for the custody service.
//!
//! All errors use the `CG_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Payload errors
//! - 2xx: Registry / capacity errors
//! - 3xx: Crypto errors
//! - 4xx: Upstream errors
//! - 9xx: General / internal errors

use std::fmt::Display;

use thiserror::Error;

/// Central error enum for all custody operations.
#[derive(Debug, Error)]
pub enum CustodyError {
    // =================================================================
    // Payload Errors (1xx)
    // =================================================================
    /// The petition is malformed or one of its signatures is not authentic.
    #[error("CG_ERR_100: Invalid payload field `{field}`: {reason}")]
    InvalidPayload { field: String, reason: String },

    /// The request body could not be parsed.
    #[error("CG_ERR_101: Bad request: {reason}")]
    BadRequest { reason: String },

    // =================================================================
    // Registry Errors (2xx)
    // =================================================================
    /// Every application in the pool is already assigned.
    #[error("CG_ERR_200: Out of capacity: no unassigned application remains")]
    OutOfCapacity,

    /// A storage transaction failed and was rolled back.
    #[error("CG_ERR_201: Transaction failed: {0}")]
    Transaction(String),

    /// No custody row matched the lookup.
    #[error("CG_ERR_202: Custody node not found by {field}: {value}")]
    NodeNotFound { field: String, value: String },

    // =================================================================
    // Crypto Errors (3xx)
    // =================================================================
    /// Ciphertext has an impossible length or padding.
    #[error("CG_ERR_300: Invalid ciphertext: {reason}")]
    InvalidCiphertext { reason: String },

    /// Key material could not be decoded into a curve element.
    #[error("CG_ERR_301: Invalid key: {reason}")]
    InvalidKey { reason: String },

    // =================================================================
    // Upstream Errors (4xx)
    // =================================================================
    /// The membership oracle, ledger lookup or publisher failed.
    #[error("CG_ERR_400: Upstream {service} unavailable: {reason}")]
    UpstreamUnavailable { service: String, reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("CG_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("CG_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("CG_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, CustodyError>;

impl CustodyError {
    /// Shorthand for [`CustodyError::InvalidPayload`].
    pub fn invalid_payload(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a storage error. The enclosing transaction has been rolled back.
    pub fn transaction(err: impl Display) -> Self {
        Self::Transaction(err.to_string())
    }

    /// Wrap an outbound call failure.
    pub fn upstream(service: impl Into<String>, err: impl Display) -> Self {
        Self::UpstreamUnavailable {
            service: service.into(),
            reason: err.to_string(),
        }
    }

    /// Whether the caller can fix the request and try again.
    #[must_use]
    pub fn is_caller_correctable(&self) -> bool {
        matches!(self, Self::InvalidPayload { .. } | Self::BadRequest { .. })
    }
}

impl From<std::io::Error> for CustodyError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for CustodyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_payload_names_field() {
        let err = CustodyError::invalid_payload("payee signature", "invalid");
        let msg = format!("{err}");
        assert!(msg.starts_with("CG_ERR_100"), "Got: {msg}");
        assert!(msg.contains("payee signature"));
    }

    #[test]
    fn upstream_display() {
        let err = CustodyError::upstream("membership", "connection refused");
        let msg = format!("{err}");
        assert!(msg.contains("CG_ERR_400"));
        assert!(msg.contains("membership"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn caller_correctable_split() {
        assert!(CustodyError::invalid_payload("extra", "length").is_caller_correctable());
        assert!(!CustodyError::OutOfCapacity.is_caller_correctable());
        assert!(!CustodyError::transaction("locked").is_caller_correctable());
    }

    #[test]
    fn all_errors_have_cg_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(CustodyError::OutOfCapacity),
            Box::new(CustodyError::transaction("busy")),
            Box::new(CustodyError::InvalidCiphertext {
                reason: "short".into(),
            }),
            Box::new(CustodyError::Internal("test".into())),
            Box::new(CustodyError::NodeNotFound {
                field: "hash".into(),
                value: "00".into(),
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("CG_ERR_"),
                "Error missing CG_ERR_ prefix: {msg}"
            );
        }
    }
}
