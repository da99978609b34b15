//! The binary authorization payload.
//!
//! ```text
//!   offset  len  field
//!   0       1    version (must be 1)
//!   1       64   custodian address (spend || view)
//!   65      64   payee address
//!   129     32   kernel node id
//!   161     64   signature by the directory signer   ┐
//!   225     64   signature by the payee              ├ each over [0, 161)
//!   289     64   signature by the custodian          ┘
//! ```

use base64::{
    Engine as _,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use custody_types::{
    Address, CustodyError, CustodyKey, KernelId, Result,
    constants::{PAYLOAD_LEN, PAYLOAD_VERSION, SIGNATURE_LEN, SIGNED_PREFIX_LEN},
};
use serde::{Deserialize, Serialize};

const CUSTODIAN_AT: usize = 1;
const PAYEE_AT: usize = 65;
const KERNEL_AT: usize = 129;
const SIGNER_SIG_AT: usize = 161;
const PAYEE_SIG_AT: usize = 225;
const CUSTODIAN_SIG_AT: usize = 289;

/// A parsed, not yet authenticated, custody petition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPayload {
    raw: Vec<u8>,
    pub custodian: Address,
    pub payee: Address,
    pub kernel_id: KernelId,
}

fn signature_at(raw: &[u8], at: usize) -> [u8; SIGNATURE_LEN] {
    let mut sig = [0u8; SIGNATURE_LEN];
    sig.copy_from_slice(&raw[at..at + SIGNATURE_LEN]);
    sig
}

impl AuthorizationPayload {
    /// Check length and version, then split the fields. No signature is
    /// looked at here.
    ///
    /// # Errors
    /// `InvalidPayload` on field `extra` (length) or `extra head` (version).
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() != PAYLOAD_LEN {
            return Err(CustodyError::invalid_payload(
                "extra",
                format!("length {} != {PAYLOAD_LEN}", raw.len()),
            ));
        }
        if raw[0] != PAYLOAD_VERSION {
            return Err(CustodyError::invalid_payload(
                "extra head",
                format!("version {}", raw[0]),
            ));
        }

        let custodian = Address::from_slice(&raw[CUSTODIAN_AT..PAYEE_AT])?;
        let payee = Address::from_slice(&raw[PAYEE_AT..KERNEL_AT])?;
        let mut kernel = [0u8; 32];
        kernel.copy_from_slice(&raw[KERNEL_AT..SIGNER_SIG_AT]);

        Ok(Self {
            raw: raw.to_vec(),
            custodian,
            payee,
            kernel_id: KernelId(kernel),
        })
    }

    /// The bytes all three signatures cover.
    #[must_use]
    pub fn signed_prefix(&self) -> &[u8] {
        &self.raw[..SIGNED_PREFIX_LEN]
    }

    #[must_use]
    pub fn signer_signature(&self) -> [u8; SIGNATURE_LEN] {
        signature_at(&self.raw, SIGNER_SIG_AT)
    }

    #[must_use]
    pub fn payee_signature(&self) -> [u8; SIGNATURE_LEN] {
        signature_at(&self.raw, PAYEE_SIG_AT)
    }

    #[must_use]
    pub fn custodian_signature(&self) -> [u8; SIGNATURE_LEN] {
        signature_at(&self.raw, CUSTODIAN_SIG_AT)
    }

    #[must_use]
    pub fn key(&self) -> CustodyKey {
        CustodyKey::new(self.custodian, self.payee, self.kernel_id)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

/// Text form used by the administrative surface and as publication memo.
#[must_use]
pub fn encode_extra(raw: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(raw)
}

/// Decode the administrative `extra` text. Padded input is tolerated.
pub fn decode_extra(text: &str) -> Result<Vec<u8>> {
    let trimmed = text.trim();
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| URL_SAFE.decode(trimmed))
        .map_err(|e| CustodyError::invalid_payload("extra", format!("encoding: {e}")))
}

/// The msgpack map the publisher stores as a transaction's extra:
/// `{"T": <16-byte trace id>, "M": <memo>}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ExtraPack {
    #[serde(rename = "T", with = "serde_bytes", default)]
    pub(crate) trace: Vec<u8>,
    #[serde(rename = "M", default, skip_serializing_if = "String::is_empty")]
    pub(crate) memo: String,
}

impl ExtraPack {
    /// The memo of a well-formed pack. Anything else, including a pack
    /// with a nil trace and no memo, is not a pack.
    fn unpack(bytes: &[u8]) -> Option<String> {
        let pack: Self = rmp_serde::from_slice(bytes).ok()?;
        (!pack.memo.is_empty() || pack.trace.iter().any(|b| *b != 0)).then_some(pack.memo)
    }
}

/// Decode a ledger transaction's hex extra field.
///
/// The acknowledgement's extra is a msgpack pack whose memo is the base64
/// payload text. Extras that are not a pack are read directly, either as
/// the base64 text or as a bare 353-byte payload.
pub fn decode_ledger_extra(extra_hex: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(extra_hex)
        .map_err(|e| CustodyError::invalid_payload("extra", format!("hex: {e}")))?;
    if let Some(memo) = ExtraPack::unpack(&bytes) {
        return decode_extra(&memo);
    }
    if bytes.len() == PAYLOAD_LEN {
        return Ok(bytes);
    }
    let text = std::str::from_utf8(&bytes)
        .map_err(|_| CustodyError::invalid_payload("extra", "not utf-8 text"))?;
    decode_extra(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut raw = vec![PAYLOAD_VERSION];
        raw.extend_from_slice(&[0x11; 32]); // custodian spend
        raw.extend_from_slice(&[0x12; 32]); // custodian view
        raw.extend_from_slice(&[0x21; 32]); // payee spend
        raw.extend_from_slice(&[0x22; 32]); // payee view
        raw.extend_from_slice(&[0x33; 32]); // kernel
        raw.extend_from_slice(&[0xa1; 64]);
        raw.extend_from_slice(&[0xa2; 64]);
        raw.extend_from_slice(&[0xa3; 64]);
        raw
    }

    #[test]
    fn layout_offsets() {
        let raw = sample();
        assert_eq!(raw.len(), PAYLOAD_LEN);
        let p = AuthorizationPayload::parse(&raw).unwrap();
        assert_eq!(p.custodian, Address::new([0x11; 32], [0x12; 32]));
        assert_eq!(p.payee, Address::new([0x21; 32], [0x22; 32]));
        assert_eq!(p.kernel_id, KernelId([0x33; 32]));
        assert_eq!(p.signer_signature(), [0xa1; 64]);
        assert_eq!(p.payee_signature(), [0xa2; 64]);
        assert_eq!(p.custodian_signature(), [0xa3; 64]);
        assert_eq!(p.signed_prefix(), &raw[..161]);
    }

    #[test]
    fn wrong_length_rejected() {
        let mut raw = sample();
        raw.push(0);
        let err = AuthorizationPayload::parse(&raw).unwrap_err();
        assert!(matches!(err, CustodyError::InvalidPayload { ref field, .. } if field == "extra"));
        let err = AuthorizationPayload::parse(&raw[..352]).unwrap_err();
        assert!(matches!(err, CustodyError::InvalidPayload { ref field, .. } if field == "extra"));
    }

    #[test]
    fn wrong_version_rejected() {
        let mut raw = sample();
        raw[0] = 2;
        let err = AuthorizationPayload::parse(&raw).unwrap_err();
        assert!(
            matches!(err, CustodyError::InvalidPayload { ref field, .. } if field == "extra head")
        );
    }

    #[test]
    fn extra_text_roundtrip() {
        let raw = sample();
        let text = encode_extra(&raw);
        assert!(!text.contains('='));
        assert_eq!(decode_extra(&text).unwrap(), raw);
    }

    #[test]
    fn ledger_extra_accepts_text_and_raw() {
        let raw = sample();
        let text_hex = hex::encode(encode_extra(&raw));
        assert_eq!(decode_ledger_extra(&text_hex).unwrap(), raw);
        assert_eq!(decode_ledger_extra(&hex::encode(&raw)).unwrap(), raw);
        assert!(decode_ledger_extra("zz").is_err());
    }

    #[test]
    fn ledger_extra_unwraps_publisher_pack() {
        let raw = sample();
        let pack = ExtraPack {
            trace: vec![0x5a; 16],
            memo: encode_extra(&raw),
        };
        let bytes = rmp_serde::to_vec_named(&pack).unwrap();
        // fixmap(2), "T", bin8(16)
        assert_eq!(&bytes[..5], &[0x82, 0xa1, b'T', 0xc4, 0x10]);
        assert_eq!(decode_ledger_extra(&hex::encode(bytes)).unwrap(), raw);
    }

    #[test]
    fn empty_publisher_pack_is_not_a_payload() {
        // Nil trace id, no memo, as seen on ordinary kernel transactions.
        let err = decode_ledger_extra("81a154c41000000000000000000000000000000000").unwrap_err();
        assert!(matches!(err, CustodyError::InvalidPayload { ref field, .. } if field == "extra"));
    }
}
