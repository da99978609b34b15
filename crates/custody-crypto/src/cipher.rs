//! AES-256-CBC with PKCS7 padding.
//!
//! Wire format: `iv (16 bytes) || ciphertext`. A fresh random IV is drawn
//! for every encryption.
//!
//! Unpadding only checks that the trailing pad-length byte fits inside the
//! decrypted buffer. A wrong key therefore either fails or yields garbage;
//! it never reproduces the plaintext.

use aes::Aes256;
use aes::cipher::{
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
    block_padding::{NoPadding, Pkcs7},
};
use custody_types::{CustodyError, Result, constants::AES_BLOCK_SIZE};
use rand::RngCore;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypt `plaintext` under a 32-byte key.
#[must_use]
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; AES_BLOCK_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let body = Aes256CbcEnc::new(key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(AES_BLOCK_SIZE + body.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&body);
    out
}

/// Decrypt data produced by [`encrypt`].
///
/// # Errors
/// [`CustodyError::InvalidCiphertext`] if the input is not at least two
/// blocks, is not a whole number of blocks, or the pad-length byte exceeds
/// the decrypted length.
pub fn decrypt(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let len = ciphertext.len();
    if len < 2 * AES_BLOCK_SIZE || len % AES_BLOCK_SIZE != 0 {
        return Err(CustodyError::InvalidCiphertext {
            reason: format!("invalid length {len}"),
        });
    }

    let (iv, body) = ciphertext.split_at(AES_BLOCK_SIZE);
    let mut iv_block = [0u8; AES_BLOCK_SIZE];
    iv_block.copy_from_slice(iv);

    let mut plain = Aes256CbcDec::new(key.into(), &iv_block.into())
        .decrypt_padded_vec_mut::<NoPadding>(body)
        .map_err(|e| CustodyError::InvalidCiphertext {
            reason: e.to_string(),
        })?;

    let length = plain.len();
    let unpadding = usize::from(plain[length - 1]);
    if unpadding > length {
        return Err(CustodyError::InvalidCiphertext {
            reason: format!("padding invalid {unpadding} {length}"),
        });
    }
    plain.truncate(length - unpadding);
    Ok(plain)
}
