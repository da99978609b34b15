//! Credential handoff: seal an application bundle so only the custodian
//! can open it.
//!
//! ## Key agreement
//!
//! ```text
//!   service:   secret = service_scalar   · custodian_spend_point
//!   custodian: secret = custodian_scalar · service_public_point
//! ```
//!
//! Both sides compute the same compressed Edwards25519 point, which is used
//! directly as the AES-256 key. No private key ever leaves its owner.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use curve25519_dalek::{
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::Scalar,
};
use custody_types::{Address, Application, CustodyError, Result};
use sha2::{Digest, Sha512};

use crate::cipher;

/// A 32-byte shared secret, usable as an AES-256 key.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(pub [u8; 32]);

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// A private scalar.
#[derive(Clone)]
pub struct PrivateKey(Scalar);

impl PrivateKey {
    /// Expand a 32-byte seed the Ed25519 way (SHA-512, clamp, reduce), so
    /// the public key matches the Ed25519 verifying key of the same seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let digest = Sha512::digest(seed);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest[..32]);
        bytes[0] &= 248;
        bytes[31] &= 127;
        bytes[31] |= 64;
        Self(Scalar::from_bytes_mod_order(bytes))
    }

    /// Use 32 bytes as a scalar directly (reduced mod the group order).
    #[must_use]
    pub fn from_scalar_bytes(bytes: [u8; 32]) -> Self {
        Self(Scalar::from_bytes_mod_order(bytes))
    }

    /// Parse a hex-encoded seed.
    pub fn from_seed_hex(hex_seed: &str) -> Result<Self> {
        let seed: [u8; 32] = hex::decode(hex_seed)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| CustodyError::InvalidKey {
                reason: "seed must be 32 hex-encoded bytes".into(),
            })?;
        Ok(Self::from_seed(&seed))
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(EdwardsPoint::mul_base(&self.0))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// A public curve point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(EdwardsPoint);

impl PublicKey {
    /// Decompress a 32-byte point.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        CompressedEdwardsY(*bytes)
            .decompress()
            .map(Self)
            .ok_or_else(|| CustodyError::InvalidKey {
                reason: format!("{} is not a curve point", hex::encode(bytes)),
            })
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes: [u8; 32] = hex::decode(text)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| CustodyError::InvalidKey {
                reason: "public key must be 32 hex-encoded bytes".into(),
            })?;
        Self::from_bytes(&bytes)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

/// Scalar multiplication of `ours` with `theirs`. Symmetric: swapping the
/// roles of the two keypairs yields the same secret.
#[must_use]
pub fn derive_shared_secret(ours: &PrivateKey, theirs: &PublicKey) -> SharedSecret {
    SharedSecret((ours.0 * theirs.0).compress().to_bytes())
}

/// Encrypt `plaintext` under a shared secret.
#[must_use]
pub fn encrypt(secret: &SharedSecret, plaintext: &[u8]) -> Vec<u8> {
    cipher::encrypt(&secret.0, plaintext)
}

/// Decrypt data sealed with [`encrypt`].
pub fn decrypt(secret: &SharedSecret, ciphertext: &[u8]) -> Result<Vec<u8>> {
    cipher::decrypt(&secret.0, ciphertext)
}

/// The sealed credential fields persisted with an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedCredentials {
    /// Unpadded URL-safe base64 of `iv || ciphertext`.
    pub keystore: String,
    /// Hex of the service public key.
    pub public_key: String,
}

/// Seals application bundles with the service's immutable keypair.
#[derive(Debug, Clone)]
pub struct CredentialSealer {
    private_key: PrivateKey,
    public_key: PublicKey,
}

impl CredentialSealer {
    #[must_use]
    pub fn new(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        Self {
            private_key,
            public_key,
        }
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Seal `app` for the holder of `custodian`'s spend key.
    ///
    /// # Errors
    /// `InvalidKey` if the custodian spend key is not a curve point.
    pub fn seal(&self, custodian: &Address, app: &Application) -> Result<SealedCredentials> {
        let custodian_key = PublicKey::from_bytes(&custodian.spend_key)?;
        let secret = derive_shared_secret(&self.private_key, &custodian_key);
        let sealed = encrypt(&secret, &app.to_bundle()?);
        tracing::debug!(app_id = %app.app_id, bytes = sealed.len(), "credential bundle sealed");
        Ok(SealedCredentials {
            keystore: URL_SAFE_NO_PAD.encode(sealed),
            public_key: self.public_key.to_hex(),
        })
    }
}

/// Custodian side: recover the application from a sealed keystore.
pub fn open_credentials(
    custodian: &PrivateKey,
    service_public_hex: &str,
    keystore: &str,
) -> Result<Application> {
    let service_key = PublicKey::from_hex(service_public_hex)?;
    let sealed = URL_SAFE_NO_PAD
        .decode(keystore)
        .map_err(|e| CustodyError::InvalidCiphertext {
            reason: format!("keystore encoding: {e}"),
        })?;
    let secret = derive_shared_secret(custodian, &service_key);
    let plain = decrypt(&secret, &sealed)?;
    Application::from_bundle(&plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    fn custodian_address(seed: &[u8; 32]) -> Address {
        let spend = SigningKey::from_bytes(seed).verifying_key().to_bytes();
        Address::new(spend, [0x42; 32])
    }

    #[test]
    fn public_key_matches_ed25519() {
        let seed = [3u8; 32];
        let ours = PrivateKey::from_seed(&seed).public_key().to_bytes();
        let theirs = SigningKey::from_bytes(&seed).verifying_key().to_bytes();
        assert_eq!(ours, theirs);
    }

    #[test]
    fn shared_secret_is_symmetric() {
        let a = PrivateKey::from_seed(&[1u8; 32]);
        let b = PrivateKey::from_seed(&[2u8; 32]);
        let ab = derive_shared_secret(&a, &b.public_key());
        let ba = derive_shared_secret(&b, &a.public_key());
        assert_eq!(ab, ba);

        let c = PrivateKey::from_seed(&[3u8; 32]);
        assert_ne!(ab, derive_shared_secret(&c, &b.public_key()));
    }

    #[test]
    fn seal_then_open() {
        let service = CredentialSealer::new(PrivateKey::from_seed(&[9u8; 32]));
        let custodian_seed = [5u8; 32];
        let app = Application::dummy(1);

        let sealed = service.seal(&custodian_address(&custodian_seed), &app).unwrap();
        assert_eq!(sealed.public_key, service.public_key().to_hex());

        let opened = open_credentials(
            &PrivateKey::from_seed(&custodian_seed),
            &sealed.public_key,
            &sealed.keystore,
        )
        .unwrap();
        assert_eq!(opened, app);
    }

    #[test]
    fn other_custodian_cannot_open() {
        let service = CredentialSealer::new(PrivateKey::from_seed(&[9u8; 32]));
        let app = Application::dummy(2);
        let sealed = service.seal(&custodian_address(&[5u8; 32]), &app).unwrap();

        let intruder = PrivateKey::from_seed(&[6u8; 32]);
        if let Ok(opened) = open_credentials(&intruder, &sealed.public_key, &sealed.keystore) {
            assert_ne!(opened, app);
        }
    }

    #[test]
    fn seal_rejects_non_point_spend_key() {
        let service = CredentialSealer::new(PrivateKey::from_seed(&[9u8; 32]));
        let spend = (2u8..)
            .map(|y| {
                let mut bytes = [0u8; 32];
                bytes[0] = y;
                bytes
            })
            .find(|bytes| CompressedEdwardsY(*bytes).decompress().is_none())
            .unwrap();
        let err = service
            .seal(&Address::new(spend, [0u8; 32]), &Application::dummy(3))
            .unwrap_err();
        assert!(matches!(err, CustodyError::InvalidKey { .. }));
    }

    #[test]
    fn seed_hex_validation() {
        assert!(PrivateKey::from_seed_hex(&"ab".repeat(32)).is_ok());
        assert!(PrivateKey::from_seed_hex("abcd").is_err());
        assert!(PrivateKey::from_seed_hex("not hex").is_err());
    }
}
