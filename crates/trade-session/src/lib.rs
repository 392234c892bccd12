//! # trade-session-core
//!
//! State-machine coordination for two-party inventory trade sessions:
//! invites, mirrored trade pairs, and the per-connection dispatch gate that
//! serializes everything behind a single action lock.
//!
//! The transport layer (WebSocket gateway, auth, settlement HTTP client)
//! lives in separate crates; this one depends on nothing but the traits in
//! [`coordinator::events`] for the outside world.

pub mod coordinator;
pub mod errors;
pub mod invite;
pub mod trade;
pub mod types;

pub use coordinator::{AckError, Connection, InboundAction, PeerSink, ServerEvent, SessionCoordinator, SettlementClient, TokenVerifier};
pub use errors::{ManagerError, ManagerResult, UserError};
pub use trade::CompletedTrade;
pub use types::{Inventory, UserId, UserState};
