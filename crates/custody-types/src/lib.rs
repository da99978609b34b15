//! # custody-types
//!
//! Shared types, errors, and configuration for the **node custody** service.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`KernelId`], [`TxHash`], [`AppId`], [`TraceId`]
//! - **Custody model**: [`CustodyNode`], [`CustodyKey`]
//! - **Application pool**: [`Application`]
//! - **Membership directory**: [`NetworkNode`], [`NodeState`]
//! - **Payments**: [`Notification`], [`LedgerTransaction`], [`ObjectRequest`]
//! - **Collaborators**: [`MembershipOracle`], [`LedgerLookup`], [`ObjectPublisher`]
//! - **Configuration**: [`ServiceConfig`], [`FeeConfig`], [`Environment`]
//! - **Errors**: [`CustodyError`] with `CG_ERR_` prefix codes, and the
//!   [`ResponseView`] envelope
//! - **Constants**: payload layout and defaults

pub mod application;
pub mod config;
pub mod constants;
pub mod custody;
pub mod directory;
pub mod envelope;
pub mod error;
pub mod externals;
pub mod ids;
pub mod notification;

pub use application::*;
pub use config::*;
pub use custody::*;
pub use directory::*;
pub use envelope::*;
pub use error::*;
pub use externals::*;
pub use ids::*;
pub use notification::*;

// Constants are accessed via `custody_types::constants::FOO`
// (not re-exported to avoid name collisions).
