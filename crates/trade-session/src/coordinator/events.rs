//! Wire-facing contracts the coordinator depends on but does not implement:
//! the outbound event shapes, and the two collaborators (token verification,
//! settlement dispatch) that the transport crate wires up to a real network
//! call. Keeping them as traits here — rather than a concrete HTTP client —
//! is what lets the coordinator and the two managers be unit-tested with
//! stub transports.

use async_trait::async_trait;

use crate::trade::CompletedTrade;
use crate::types::{Inventory, UserId};

/// Server → client push events. Tagged for a clean `{"event": "...", ...}`
/// wire encoding.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    InviteReceived { from_user_id: UserId },
    InviteCancelled { from_user_id: UserId },
    InviteAccepted { to_user_id: UserId },
    InviteRejected { to_user_id: UserId },
    TradeStarted { peer_user_id: UserId },
    InventoryUpdated { inventory: Inventory },
    LockedIn { self_inventory: Inventory, other_inventory: Inventory },
    Unlocked,
    TradeCancelled,
    TradeCompleted,
}

/// The ack payload for a classified error: `{errorName,
/// errorMessage}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckError {
    pub error_name: String,
    pub error_message: String,
}

impl From<&crate::errors::UserError> for AckError {
    fn from(err: &crate::errors::UserError) -> Self {
        AckError {
            error_name: err.error_name().to_string(),
            error_message: err.to_string(),
        }
    }
}

/// A connection's outbound half. Implemented by the transport crate over
/// whatever per-connection send channel it uses; the coordinator and
/// managers never see a socket directly.
#[async_trait]
pub trait PeerSink: Send + Sync {
    async fn emit(&self, event: ServerEvent);
}

/// Credential verification, injected so the core never depends on a
/// particular token format or crypto library. Consumes a bearer token,
/// returns the user id it authenticates, or fails.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<UserId, ()>;
}

/// Fire-and-report dispatch to the external settlement endpoint. Invoked
/// after `onTradeCompleted` has already mutated state and notified both
/// peers; its outcome affects only logging, never trade state.
#[async_trait]
pub trait SettlementClient: Send + Sync {
    async fn submit(&self, trade: &CompletedTrade);
}
