//! # custody-crypto
//!
//! Symmetric cipher and key-agreement primitives protecting the credential
//! bundle handed to a newly authorized custodian.
//!
//! - [`cipher`]: AES-256-CBC with PKCS7 padding, random IV prepended
//! - [`handoff`]: Edwards25519 shared secret and [`CredentialSealer`]

pub mod cipher;
pub mod handoff;

pub use handoff::{
    CredentialSealer, PrivateKey, PublicKey, SealedCredentials, SharedSecret,
    derive_shared_secret, open_credentials,
};
