//! # custody-verifier
//!
//! Parses the fixed binary custody petition and authenticates its three
//! embedded signatures against the live membership directory.
//!
//! ## Flow
//!
//! ```text
//! raw bytes → AuthorizationPayload::parse() → MembershipOracle::list_nodes()
//!           → resolve_signer() → verify signer / payee / custodian
//!           → CustodyKey
//! ```
//!
//! Authorization is all-or-nothing: the first failing check names the
//! offending field and nothing is retried.

pub mod membership;
pub mod payload;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
pub mod verifier;

pub use membership::{CachedMembership, FallbackMembership, StaticDirectory};
pub use payload::{AuthorizationPayload, decode_extra, decode_ledger_extra, encode_extra};
pub use verifier::{PayloadVerifier, resolve_signer};
