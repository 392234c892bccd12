//! Core `SessionCoordinator`: the connection registry, the per-connection
//! state gate, and the wiring from manager callbacks to peer notifications
//! and state transitions.
//!
//! `SessionCoordinator` is the only component that ever writes a
//! [`UserState`]. Everything it does to the two managers and back is
//! funneled through [`SessionCoordinator::dispatch`], which holds a single
//! process-wide action lock for the whole call — managers, their callbacks,
//! and the resulting state transition all run inside that one critical
//! section, the whole action runs inside one critical section. The external settlement POST
//! is the one thing allowed to run after the lock is released.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::errors::{ManagerError, UserError};
use crate::invite::{InviteCallbacks, InviteManager};
use crate::trade::{CompletedTrade, TradeCallbacks, TradeManager};
use crate::types::{Inventory, UserId, UserState};

use super::events::{AckError, PeerSink, ServerEvent, SettlementClient, TokenVerifier};
use super::registry::{ConnectionEntry, ConnectionRegistry};

/// A connection before — and after — authentication. The gateway crate
/// creates one of these per socket and drives [`SessionCoordinator::dispatch`]
/// with whatever the client sends.
pub struct Connection {
    state: Arc<RwLock<UserState>>,
    user_id: RwLock<Option<UserId>>,
    sink: Arc<dyn PeerSink>,
}

impl Connection {
    pub fn new(sink: Arc<dyn PeerSink>) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(RwLock::new(UserState::NoUserId)),
            user_id: RwLock::new(None),
            sink,
        })
    }

    pub async fn state(&self) -> UserState {
        *self.state.read().await
    }

    pub async fn user_id(&self) -> Option<UserId> {
        self.user_id.read().await.clone()
    }
}

/// Every inbound action the coordinator accepts, carrying its argument.
#[derive(Debug, Clone)]
pub enum InboundAction {
    Authenticate { token: String },
    LogOut,
    SendInvite { to: UserId },
    CancelInvite,
    AcceptInvite { from: UserId },
    RejectInvite { from: UserId },
    UpdateInventory { inventory: Inventory },
    LockIn { self_inventory: Inventory, other_inventory: Inventory },
    Unlock,
    CancelTrade,
    CompleteTrade,
}

impl InboundAction {
    fn name(&self) -> &'static str {
        match self {
            InboundAction::Authenticate { .. } => "authenticate",
            InboundAction::LogOut => "logOut",
            InboundAction::SendInvite { .. } => "sendInvite",
            InboundAction::CancelInvite => "cancelInvite",
            InboundAction::AcceptInvite { .. } => "acceptInvite",
            InboundAction::RejectInvite { .. } => "rejectInvite",
            InboundAction::UpdateInventory { .. } => "updateInventory",
            InboundAction::LockIn { .. } => "lockIn",
            InboundAction::Unlock => "unlock",
            InboundAction::CancelTrade => "cancelTrade",
            InboundAction::CompleteTrade => "completeTrade",
        }
    }

    /// The state-gate allow-set for this action. `acceptInvite` is
    /// deliberately narrowed to `InLobby` only, per the open question in
    /// DESIGN.md: accepting while `SentInvite` would implicitly cancel the
    /// caller's own outbound invite; treat as not
    /// allowed absent a product requirement. `rejectInvite` carries no such
    /// ambiguity — rejecting an inbound invite never touches the caller's
    /// own outbound one — so it keeps the table's full `InLobby,
    /// SentInvite` allow-set.
    fn allowed_in(&self, state: UserState) -> bool {
        use UserState::*;
        match self {
            InboundAction::Authenticate { .. } => state == NoUserId,
            InboundAction::LogOut => state == InLobby,
            InboundAction::SendInvite { .. } => state == InLobby,
            InboundAction::CancelInvite => state == SentInvite,
            InboundAction::AcceptInvite { .. } => state == InLobby,
            InboundAction::RejectInvite { .. } => matches!(state, InLobby | SentInvite),
            InboundAction::UpdateInventory { .. } => state == InTrade,
            InboundAction::LockIn { .. } => state == InTrade,
            InboundAction::Unlock => state == LockedIn,
            InboundAction::CancelTrade => state == InTrade,
            InboundAction::CompleteTrade => state == LockedIn,
        }
    }
}

/// Translates manager callbacks into registry state transitions and peer
/// notifications. Holds only the registry — never the coordinator itself —
/// so constructing it doesn't require an `Arc` cycle back to
/// `SessionCoordinator`.
struct NotificationHub {
    registry: Arc<ConnectionRegistry>,
    settlement: Arc<dyn SettlementClient>,
}

#[async_trait]
impl InviteCallbacks for NotificationHub {
    async fn on_invite_sent(&self, from: &UserId, to: &UserId) {
        self.registry.set_state(from, UserState::SentInvite).await;
        self.registry
            .notify(to, ServerEvent::InviteReceived { from_user_id: from.clone() })
            .await;
    }

    async fn on_invite_cancelled(&self, from: &UserId, to: &UserId) {
        self.registry.set_state(from, UserState::InLobby).await;
        self.registry
            .notify(to, ServerEvent::InviteCancelled { from_user_id: from.clone() })
            .await;
    }

    async fn on_invite_accepted(&self, from: &UserId, to: &UserId) {
        // State for both sides is set by on_trade_started, invoked by the
        // coordinator's acceptInvite handler right after this fires.
        self.registry
            .notify(from, ServerEvent::InviteAccepted { to_user_id: to.clone() })
            .await;
    }

    async fn on_invite_rejected(&self, from: &UserId, to: &UserId) {
        self.registry.set_state(from, UserState::InLobby).await;
        self.registry
            .notify(from, ServerEvent::InviteRejected { to_user_id: to.clone() })
            .await;
    }
}

#[async_trait]
impl TradeCallbacks for NotificationHub {
    async fn on_trade_started(&self, u1: &UserId, u2: &UserId) {
        self.registry.set_state(u1, UserState::InTrade).await;
        self.registry.set_state(u2, UserState::InTrade).await;
        self.registry
            .notify(u1, ServerEvent::TradeStarted { peer_user_id: u2.clone() })
            .await;
        self.registry
            .notify(u2, ServerEvent::TradeStarted { peer_user_id: u1.clone() })
            .await;
    }

    async fn on_inventory_updated(&self, recipient: &UserId, inventory: &Inventory) {
        self.registry
            .notify(recipient, ServerEvent::InventoryUpdated { inventory: inventory.clone() })
            .await;
    }

    async fn on_locked_in(&self, user: &UserId, peer: &UserId, self_inv: &Inventory, other_inv: &Inventory) {
        self.registry.set_state(user, UserState::LockedIn).await;
        self.registry
            .notify(
                peer,
                ServerEvent::LockedIn {
                    self_inventory: self_inv.clone(),
                    other_inventory: other_inv.clone(),
                },
            )
            .await;
    }

    async fn on_unlocked(&self, user: &UserId, peer: &UserId) {
        self.registry.set_state(user, UserState::InTrade).await;
        self.registry.notify(peer, ServerEvent::Unlocked).await;
    }

    async fn on_trade_cancelled(&self, user: &UserId, peer: &UserId) {
        self.registry.set_state(user, UserState::InLobby).await;
        self.registry.set_state(peer, UserState::InLobby).await;
        self.registry.notify(peer, ServerEvent::TradeCancelled).await;
    }

    async fn on_trade_completed(&self, pair: CompletedTrade) {
        for side in &pair {
            self.registry.set_state(&side.user_id, UserState::InLobby).await;
        }
        for side in &pair {
            self.registry.notify(&side.user_id, ServerEvent::TradeCompleted).await;
        }
        let settlement = self.settlement.clone();
        tokio::spawn(async move {
            settlement.submit(&pair).await;
        });
    }
}

/// The session coordination layer: owns the connection
/// registry, dispatches inbound actions through the state gate, and wires
/// the two managers' callbacks to peer notifications.
pub struct SessionCoordinator {
    registry: Arc<ConnectionRegistry>,
    invites: InviteManager,
    trades: TradeManager,
    verifier: Arc<dyn TokenVerifier>,
    action_lock: Mutex<()>,
}

impl SessionCoordinator {
    pub fn new(verifier: Arc<dyn TokenVerifier>, settlement: Arc<dyn SettlementClient>) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = Arc::new(NotificationHub {
            registry: registry.clone(),
            settlement,
        });
        Arc::new(Self {
            registry,
            invites: InviteManager::new(hub.clone()),
            trades: TradeManager::new(hub),
            verifier,
            action_lock: Mutex::new(()),
        })
    }

    /// Create a fresh, unauthenticated connection handle.
    pub fn new_connection(&self, sink: Arc<dyn PeerSink>) -> Arc<Connection> {
        Connection::new(sink)
    }

    /// Dispatch one inbound action for `conn`. Returns `Ok(())` for a
    /// successful ack, `Err(AckError)` for a classified user error to relay
    /// to the caller. Internal errors are logged and acked as a generic
    /// failure with no details — the connection stays open.
    pub async fn dispatch(&self, conn: &Arc<Connection>, action: InboundAction) -> Result<(), AckError> {
        let _guard = self.action_lock.lock().await;

        let state = conn.state().await;
        if !action.allowed_in(state) {
            let err = UserError::InvalidAction { state: state.to_string() };
            return Err(AckError::from(&err));
        }

        let result = self.handle(conn, action).await;
        match result {
            Ok(()) => Ok(()),
            Err(ManagerError::User(user_err)) => Err(AckError::from(&user_err)),
            Err(ManagerError::Internal(internal_err)) => {
                warn!(error = %internal_err, "internal error handling action");
                Err(AckError {
                    error_name: "InternalError".to_string(),
                    error_message: "internal server error".to_string(),
                })
            }
        }
    }

    async fn handle(&self, conn: &Arc<Connection>, action: InboundAction) -> Result<(), ManagerError> {
        match action {
            InboundAction::Authenticate { token } => self.authenticate(conn, token).await,
            InboundAction::LogOut => {
                // `handle` already runs under `action_lock` (held by `dispatch`), so this
                // takes the lock-already-held path rather than calling the public
                // `disconnect`, which would deadlock re-acquiring the same mutex.
                self.disconnect_locked(conn).await;
                Ok(())
            }
            InboundAction::SendInvite { to } => {
                let user = self.require_user(conn).await?;
                self.invites.send_invite(&user, &to).await
            }
            InboundAction::CancelInvite => {
                let user = self.require_user(conn).await?;
                self.invites.cancel_invite(&user).await
            }
            InboundAction::AcceptInvite { from } => {
                let user = self.require_user(conn).await?;
                self.invites.accept_invite(&from, &user).await?;
                self.trades.start_trade(&from, &user).await
            }
            InboundAction::RejectInvite { from } => {
                let user = self.require_user(conn).await?;
                self.invites.reject_invite(&from, &user).await
            }
            InboundAction::UpdateInventory { inventory } => {
                let user = self.require_user(conn).await?;
                self.trades.update_inventory(&user, inventory).await
            }
            InboundAction::LockIn { self_inventory, other_inventory } => {
                let user = self.require_user(conn).await?;
                self.trades.lock_in(&user, self_inventory, other_inventory).await
            }
            InboundAction::Unlock => {
                let user = self.require_user(conn).await?;
                self.trades.unlock(&user).await
            }
            InboundAction::CancelTrade => {
                let user = self.require_user(conn).await?;
                self.trades.cancel_trade(&user).await
            }
            InboundAction::CompleteTrade => {
                let user = self.require_user(conn).await?;
                self.trades.complete_trade(&user).await
            }
        }
    }

    async fn require_user(&self, conn: &Arc<Connection>) -> Result<UserId, ManagerError> {
        conn.user_id().await.ok_or_else(|| {
            crate::errors::InternalError::Precondition(
                "dispatch reached a manager call with no authenticated user".into(),
            )
            .into()
        })
    }

    async fn authenticate(&self, conn: &Arc<Connection>, token: String) -> Result<(), ManagerError> {
        let user_id = self
            .verifier
            .verify_token(&token)
            .await
            .map_err(|_| UserError::Auth)?;

        if self.registry.contains(&user_id) {
            return Err(UserError::UserAlreadyAuthenticated.into());
        }

        *conn.user_id.write().await = Some(user_id.clone());
        let entry = ConnectionEntry::new(user_id.clone(), conn.state.clone(), conn.sink.clone());
        self.registry.insert(entry);
        self.registry.set_state(&user_id, UserState::InLobby).await;
        self.invites.user_connected(&user_id).await?;
        info!(user = %user_id, "authenticated");
        Ok(())
    }

    /// Entry point for connection loss: the transport calls this directly,
    /// with no `dispatch` call in progress, so it must take the action lock
    /// itself. Explicit `logOut` reaches the same cleanup through
    /// `disconnect_locked`, from inside `dispatch`'s own critical section —
    /// cleanup must be identical either way.
    pub async fn disconnect(&self, conn: &Arc<Connection>) {
        let _guard = self.action_lock.lock().await;
        self.disconnect_locked(conn).await;
    }

    /// Cleanup shared by `disconnect` and the `logOut` action handler.
    /// Callers must already hold `action_lock`.
    async fn disconnect_locked(&self, conn: &Arc<Connection>) {
        let Some(user_id) = conn.user_id().await else {
            return;
        };
        if let Err(e) = self.invites.user_disconnected(&user_id).await {
            warn!(user = %user_id, error = %e, "invite cleanup failed on disconnect");
        }
        if let Err(e) = self.trades.user_disconnected(&user_id).await {
            warn!(user = %user_id, error = %e, "trade cleanup failed on disconnect");
        }
        self.registry.remove(&user_id);
        *conn.state.write().await = UserState::NoUserId;
        *conn.user_id.write().await = None;
        debug!(user = %user_id, "disconnected");
    }
}
