//! Wire shapes for the client-facing WebSocket protocol.
//!
//! Inbound frames carry a correlation id (`cid`) alongside the action
//! payload so the server can ack the specific request that triggered it.
//! Outbound frames are one of two self-describing shapes on the same
//! socket: an ack (keyed by `cid`) or a push event (keyed by `event`, see
//! [`trade_session_core::ServerEvent`]) — the client tells them apart by
//! which key is present.

use serde::{Deserialize, Serialize};

use trade_session_core::{AckError, Inventory, ServerEvent, UserId};

/// One inbound action, tagged by `action` per the client → server events in
/// the inbound action table.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientAction {
    Authenticate { token: String },
    LogOut,
    SendInvite { to: UserId },
    CancelInvite,
    AcceptInvite { from: UserId },
    RejectInvite { from: UserId },
    UpdateInventory { inventory: Inventory },
    LockIn {
        self_inventory: Inventory,
        other_inventory: Inventory,
    },
    Unlock,
    CancelTrade,
    CompleteTrade,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    pub cid: String,
    #[serde(flatten)]
    pub action: ClientAction,
}

impl From<ClientAction> for trade_session_core::InboundAction {
    fn from(action: ClientAction) -> Self {
        use trade_session_core::InboundAction as A;
        match action {
            ClientAction::Authenticate { token } => A::Authenticate { token },
            ClientAction::LogOut => A::LogOut,
            ClientAction::SendInvite { to } => A::SendInvite { to },
            ClientAction::CancelInvite => A::CancelInvite,
            ClientAction::AcceptInvite { from } => A::AcceptInvite { from },
            ClientAction::RejectInvite { from } => A::RejectInvite { from },
            ClientAction::UpdateInventory { inventory } => A::UpdateInventory { inventory },
            ClientAction::LockIn { self_inventory, other_inventory } => {
                A::LockIn { self_inventory, other_inventory }
            }
            ClientAction::Unlock => A::Unlock,
            ClientAction::CancelTrade => A::CancelTrade,
            ClientAction::CompleteTrade => A::CompleteTrade,
        }
    }
}

/// One outbound frame: either the ack for a specific `cid`, or an
/// unprompted push event to the connection.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Ack { cid: String, error: Option<AckError> },
    Event(ServerEvent),
}

impl OutboundFrame {
    pub fn ack_ok(cid: String) -> Self {
        OutboundFrame::Ack { cid, error: None }
    }

    pub fn ack_err(cid: String, error: AckError) -> Self {
        OutboundFrame::Ack { cid, error: Some(error) }
    }
}
