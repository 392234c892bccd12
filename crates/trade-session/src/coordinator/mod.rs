//! Session coordination: the connection registry, the per-connection state
//! gate, and the wiring from manager callbacks to peer notifications.
//!
//! [`SessionCoordinator`] is the single entry point the transport layer
//! drives: it owns the [`registry::ConnectionRegistry`], holds the two
//! managers from [`crate::invite`] and [`crate::trade`], and enforces the
//! allowed-state table for every inbound action behind one process-wide
//! lock.

mod coordinator;
pub mod events;
pub mod registry;

pub use coordinator::{Connection, InboundAction, SessionCoordinator};
pub use events::{AckError, PeerSink, ServerEvent, SettlementClient, TokenVerifier};
