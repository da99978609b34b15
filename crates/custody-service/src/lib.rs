//! # custody-service
//!
//! Wires the verifier and the registry to the outside world:
//!
//! - [`PaymentFlow`]: a fee payment whose memo names an acknowledgement
//!   transaction leads to application assignment
//! - [`NotificationListener`]: feeds notifications to the flow one at a time
//! - [`AdminApi`]: petition submission and listing, as transport-agnostic
//!   handlers returning the `{data}` / `{error}` envelope
//! - [`KernelRpc`], [`HttpPublisher`]: HTTP adapters for the collaborators

pub mod api;
pub mod externals;
pub mod listener;
pub mod payment;

pub use api::{AdminApi, CreateNodeRequest, HealthView, NodeView};
pub use externals::{HttpPublisher, KernelRpc};
pub use listener::{ListenerStats, NotificationListener};
pub use payment::{IgnoreReason, Outcome, PaymentFlow};
