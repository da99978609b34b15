//! System-wide constants for the custody service.

use rust_decimal::Decimal;

/// Version byte every authorization payload must start with.
pub const PAYLOAD_VERSION: u8 = 1;

/// Exact length of an authorization payload in bytes.
pub const PAYLOAD_LEN: usize = 353;

/// Length of the signed prefix (version, custodian, payee, kernel id).
pub const SIGNED_PREFIX_LEN: usize = 161;

/// Wire length of an address (spend key + view key).
pub const ADDRESS_LEN: usize = 64;

/// Network prefix of the address text form.
pub const ADDRESS_PREFIX: &str = "XIN";

/// Checksum bytes appended to an address before base58 encoding.
pub const ADDRESS_CHECKSUM_LEN: usize = 4;

/// Length of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// How long a REMOVED kernel node may still authorize custody (7 days).
pub const REMOVED_NODE_GRACE_SECS: i64 = 7 * 24 * 60 * 60;

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// Default page size for listing assigned custody rows.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// SQLite busy timeout for contended transactions (milliseconds).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default timeout for outbound RPC calls (milliseconds).
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 20_000;

/// Default membership cache TTL (milliseconds).
pub const DEFAULT_MEMBERSHIP_TTL_MS: u64 = 30_000;

/// Publication amount charged per started KiB of memo (plus a base of 2).
pub const PUBLICATION_UNIT_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name.
pub const SERVICE_NAME: &str = "node-custody";
