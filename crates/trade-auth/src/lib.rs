//! # trade-auth
//!
//! RS256 JWT verification for inbound auth tokens, RS256 signing for
//! outbound settlement tokens, and the HTTP client that posts completed
//! trades to the external settlement endpoint. Everything here implements
//! a trait from `trade-session-core`; the coordination layer never depends
//! on this crate directly.

pub mod error;
pub mod jwt;
pub mod settlement;
pub mod types;
pub mod verifier;

pub use error::{AuthError, Result};
pub use jwt::{AuthVerifier, SettlementSigner};
pub use settlement::HttpSettlementClient;
pub use types::{AuthClaims, SettlementClaims};
pub use verifier::TokenVerifierImpl;
