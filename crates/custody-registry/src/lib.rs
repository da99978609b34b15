//! # custody-registry
//!
//! Durable store of custody rows keyed by `(custodian, payee, kernel_id)`.
//!
//! - [`NodeStore`]: synchronous `SQLite` store, one connection per
//!   operation, writers serialized with `BEGIN IMMEDIATE`
//! - [`ApplicationPool`]: the finite, ordered set of application identities
//! - [`CustodyRegistry`]: the async facade used by the service, which also
//!   publishes petition acknowledgements
//!
//! ## Guarantees
//!
//! 1. At most one row per natural key, enforced by a unique index and a
//!    find-or-insert inside one write transaction.
//! 2. An application id is assigned to at most one row. The claim reads
//!    the full assigned set and updates the row in the same transaction,
//!    and a partial unique index backs it up.
//! 3. Assigned rows are never modified again.

pub mod pool;
pub mod registry;
pub mod store;

pub use pool::ApplicationPool;
pub use registry::{CustodyRegistry, publication_amount};
pub use store::NodeStore;
