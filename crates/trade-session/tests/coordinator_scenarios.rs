//! End-to-end scenarios against `SessionCoordinator` itself, exercising the
//! dispatch gate, both managers, and the notification wiring together — the
//! per-manager unit tests in `src/invite` and `src/trade` stub out the
//! coordinator entirely, so none of them catch a wiring mistake between the
//! gate, the managers, and the registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use trade_session_core::{
    AckError, CompletedTrade, Connection, InboundAction, PeerSink, ServerEvent,
    SessionCoordinator, SettlementClient, TokenVerifier, UserState,
};

/// Verifies tokens by treating them as the literal user id — the same
/// contract as the gateway crate's development-mode passthrough.
struct PassthroughVerifier;

#[async_trait]
impl TokenVerifier for PassthroughVerifier {
    async fn verify_token(&self, token: &str) -> Result<String, ()> {
        Ok(token.to_string())
    }
}

#[derive(Default)]
struct RecordingSettlement {
    trades: Mutex<Vec<CompletedTrade>>,
}

#[async_trait]
impl SettlementClient for RecordingSettlement {
    async fn submit(&self, trade: &CompletedTrade) {
        self.trades.lock().await.push(trade.clone());
    }
}

/// Captures every event pushed to one connection, in arrival order.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ServerEvent>>,
}

#[async_trait]
impl PeerSink for RecordingSink {
    async fn emit(&self, event: ServerEvent) {
        self.events.lock().await.push(event);
    }
}

/// One simulated client: its connection handle plus the sink it was built
/// with, so a test can both drive actions and inspect what it received.
struct Client {
    conn: Arc<Connection>,
    sink: Arc<RecordingSink>,
}

impl Client {
    async fn events(&self) -> Vec<ServerEvent> {
        self.sink.events.lock().await.clone()
    }

    async fn state(&self) -> UserState {
        self.conn.state().await
    }
}

struct Harness {
    coordinator: Arc<SessionCoordinator>,
    settlement: Arc<RecordingSettlement>,
    clients: HashMap<String, Client>,
}

impl Harness {
    fn new() -> Self {
        let settlement = Arc::new(RecordingSettlement::default());
        let coordinator = SessionCoordinator::new(Arc::new(PassthroughVerifier), settlement.clone());
        Self {
            coordinator,
            settlement,
            clients: HashMap::new(),
        }
    }

    /// Connects and authenticates a fresh client as `user_id`.
    async fn login(&mut self, user_id: &str) {
        let sink = Arc::new(RecordingSink::default());
        let conn = self.coordinator.new_connection(sink.clone());
        let ack = self
            .coordinator
            .dispatch(&conn, InboundAction::Authenticate { token: user_id.to_string() })
            .await;
        assert!(ack.is_ok(), "authenticate should succeed for a fresh user");
        self.clients.insert(user_id.to_string(), Client { conn, sink });
    }

    async fn dispatch(&self, user_id: &str, action: InboundAction) -> Result<(), AckError> {
        let client = &self.clients[user_id];
        self.coordinator.dispatch(&client.conn, action).await
    }

    async fn disconnect(&self, user_id: &str) {
        let client = &self.clients[user_id];
        self.coordinator.disconnect(&client.conn).await;
    }

    fn client(&self, user_id: &str) -> &Client {
        &self.clients[user_id]
    }
}

#[tokio::test]
async fn scenario_1_auth_and_lobby() {
    let mut h = Harness::new();
    h.login("alice").await;
    assert_eq!(h.client("alice").state().await, UserState::InLobby);
}

#[tokio::test]
async fn scenario_2_invite_round_trip_then_cancel() {
    let mut h = Harness::new();
    h.login("alice").await;
    h.login("bob").await;

    h.dispatch("alice", InboundAction::SendInvite { to: "bob".into() })
        .await
        .unwrap();
    assert_eq!(h.client("alice").state().await, UserState::SentInvite);
    assert!(matches!(
        h.client("bob").events().await.as_slice(),
        [ServerEvent::InviteReceived { from_user_id }] if from_user_id == "alice"
    ));

    h.dispatch("bob", InboundAction::AcceptInvite { from: "alice".into() })
        .await
        .unwrap();
    assert_eq!(h.client("alice").state().await, UserState::InTrade);
    assert_eq!(h.client("bob").state().await, UserState::InTrade);
    assert!(h
        .client("alice")
        .events()
        .await
        .iter()
        .any(|e| matches!(e, ServerEvent::InviteAccepted { to_user_id } if to_user_id == "bob")));
    assert!(h
        .client("alice")
        .events()
        .await
        .iter()
        .any(|e| matches!(e, ServerEvent::TradeStarted { peer_user_id } if peer_user_id == "bob")));

    h.dispatch("alice", InboundAction::CancelTrade).await.unwrap();
    assert_eq!(h.client("alice").state().await, UserState::InLobby);
    assert_eq!(h.client("bob").state().await, UserState::InLobby);
    assert!(h
        .client("bob")
        .events()
        .await
        .iter()
        .any(|e| matches!(e, ServerEvent::TradeCancelled)));
}

#[tokio::test]
async fn scenario_3_offline_invite_is_deferred_then_delivered_on_connect() {
    let mut h = Harness::new();
    h.login("alice").await;

    h.dispatch("alice", InboundAction::SendInvite { to: "bob".into() })
        .await
        .unwrap();
    assert_eq!(h.client("alice").state().await, UserState::SentInvite);

    h.login("bob").await;
    assert!(h
        .client("bob")
        .events()
        .await
        .iter()
        .any(|e| matches!(e, ServerEvent::InviteReceived { from_user_id } if from_user_id == "alice")));
}

#[tokio::test]
async fn scenario_4_lock_in_mirror_and_auto_unlock() {
    let mut h = Harness::new();
    h.login("alice").await;
    h.login("bob").await;
    h.dispatch("alice", InboundAction::SendInvite { to: "bob".into() })
        .await
        .unwrap();
    h.dispatch("bob", InboundAction::AcceptInvite { from: "alice".into() })
        .await
        .unwrap();

    h.dispatch("alice", InboundAction::UpdateInventory { inventory: vec!["A".into()] })
        .await
        .unwrap();
    h.dispatch("bob", InboundAction::UpdateInventory { inventory: vec!["B".into()] })
        .await
        .unwrap();

    h.dispatch(
        "alice",
        InboundAction::LockIn {
            self_inventory: vec!["A".into()],
            other_inventory: vec!["B".into()],
        },
    )
    .await
    .unwrap();
    assert_eq!(h.client("alice").state().await, UserState::LockedIn);
    assert!(h.client("bob").events().await.iter().any(|e| matches!(
        e,
        ServerEvent::LockedIn { self_inventory, other_inventory }
            if self_inventory == &vec!["A".to_string()] && other_inventory == &vec!["B".to_string()]
    )));

    h.dispatch("bob", InboundAction::UpdateInventory { inventory: vec!["C".into()] })
        .await
        .unwrap();
    assert_eq!(h.client("alice").state().await, UserState::InTrade);
    assert!(h
        .client("alice")
        .events()
        .await
        .iter()
        .any(|e| matches!(e, ServerEvent::Unlocked)));
    assert!(h.client("bob").events().await.iter().any(
        |e| matches!(e, ServerEvent::InventoryUpdated { inventory } if inventory == &vec!["C".to_string()])
    ));
}

#[tokio::test]
async fn scenario_5_two_phase_complete_fires_settlement() {
    let mut h = Harness::new();
    h.login("alice").await;
    h.login("bob").await;
    h.dispatch("alice", InboundAction::SendInvite { to: "bob".into() })
        .await
        .unwrap();
    h.dispatch("bob", InboundAction::AcceptInvite { from: "alice".into() })
        .await
        .unwrap();
    h.dispatch("alice", InboundAction::UpdateInventory { inventory: vec!["A".into()] })
        .await
        .unwrap();
    h.dispatch("bob", InboundAction::UpdateInventory { inventory: vec!["B".into()] })
        .await
        .unwrap();
    h.dispatch(
        "alice",
        InboundAction::LockIn { self_inventory: vec!["A".into()], other_inventory: vec!["B".into()] },
    )
    .await
    .unwrap();
    h.dispatch(
        "bob",
        InboundAction::LockIn { self_inventory: vec!["B".into()], other_inventory: vec!["A".into()] },
    )
    .await
    .unwrap();

    h.dispatch("alice", InboundAction::CompleteTrade).await.unwrap();
    assert!(!h
        .client("bob")
        .events()
        .await
        .iter()
        .any(|e| matches!(e, ServerEvent::TradeCompleted)));
    assert!(h.settlement.trades.lock().await.is_empty());

    h.dispatch("bob", InboundAction::CompleteTrade).await.unwrap();
    assert_eq!(h.client("alice").state().await, UserState::InLobby);
    assert_eq!(h.client("bob").state().await, UserState::InLobby);
    assert!(h
        .client("alice")
        .events()
        .await
        .iter()
        .any(|e| matches!(e, ServerEvent::TradeCompleted)));
    assert!(h
        .client("bob")
        .events()
        .await
        .iter()
        .any(|e| matches!(e, ServerEvent::TradeCompleted)));

    // Settlement dispatch is fired from inside the callback via `tokio::spawn`,
    // off the action-lock critical section — yield so it gets a chance to run.
    tokio::task::yield_now().await;
    for _ in 0..10 {
        if !h.settlement.trades.lock().await.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(h.settlement.trades.lock().await.len(), 1);
}

#[tokio::test]
async fn scenario_6_mismatched_lock_in_rejected() {
    let mut h = Harness::new();
    h.login("alice").await;
    h.login("bob").await;
    h.dispatch("alice", InboundAction::SendInvite { to: "bob".into() })
        .await
        .unwrap();
    h.dispatch("bob", InboundAction::AcceptInvite { from: "alice".into() })
        .await
        .unwrap();
    h.dispatch("alice", InboundAction::UpdateInventory { inventory: vec!["A".into()] })
        .await
        .unwrap();
    h.dispatch("bob", InboundAction::UpdateInventory { inventory: vec!["B".into()] })
        .await
        .unwrap();

    let err = h
        .dispatch(
            "alice",
            InboundAction::LockIn { self_inventory: vec!["X".into()], other_inventory: vec!["B".into()] },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_name, "InventoryMismatchError");
    assert_eq!(h.client("alice").state().await, UserState::InTrade);
}

#[tokio::test]
async fn scenario_7_disconnect_during_trade_cancels_it() {
    let mut h = Harness::new();
    h.login("alice").await;
    h.login("bob").await;
    h.dispatch("alice", InboundAction::SendInvite { to: "bob".into() })
        .await
        .unwrap();
    h.dispatch("bob", InboundAction::AcceptInvite { from: "alice".into() })
        .await
        .unwrap();

    h.disconnect("alice").await;
    assert_eq!(h.client("bob").state().await, UserState::InLobby);
    assert!(h
        .client("bob")
        .events()
        .await
        .iter()
        .any(|e| matches!(e, ServerEvent::TradeCancelled)));
}

#[tokio::test]
async fn scenario_8_reject_while_own_outbound_invite_still_pending() {
    let mut h = Harness::new();
    h.login("alice").await;
    h.login("bob").await;
    h.login("carol").await;

    h.dispatch("alice", InboundAction::SendInvite { to: "bob".into() })
        .await
        .unwrap();
    assert_eq!(h.client("alice").state().await, UserState::SentInvite);

    h.dispatch("carol", InboundAction::SendInvite { to: "alice".into() })
        .await
        .unwrap();

    h.dispatch("alice", InboundAction::RejectInvite { from: "carol".into() })
        .await
        .unwrap();
    assert_eq!(
        h.client("alice").state().await,
        UserState::SentInvite,
        "rejecting an inbound invite must not disturb the caller's own outbound invite"
    );
    assert_eq!(h.client("carol").state().await, UserState::InLobby);
    assert!(h
        .client("carol")
        .events()
        .await
        .iter()
        .any(|e| matches!(e, ServerEvent::InviteRejected { to_user_id } if to_user_id == "alice")));
}

#[tokio::test]
async fn invalid_action_in_current_state_is_rejected_without_side_effects() {
    let mut h = Harness::new();
    h.login("alice").await;

    let err = h.dispatch("alice", InboundAction::CancelInvite).await.unwrap_err();
    assert_eq!(err.error_name, "InvalidActionError");
    assert_eq!(h.client("alice").state().await, UserState::InLobby);
}

#[tokio::test]
async fn second_authentication_for_the_same_user_is_rejected() {
    let mut h = Harness::new();
    h.login("alice").await;

    let sink = Arc::new(RecordingSink::default());
    let second_conn = h.coordinator.new_connection(sink);
    let err = h
        .coordinator
        .dispatch(&second_conn, InboundAction::Authenticate { token: "alice".into() })
        .await
        .unwrap_err();
    assert_eq!(err.error_name, "UserAlreadyAuthenticatedError");
}

#[tokio::test]
async fn log_out_does_not_deadlock_and_returns_to_no_user_id() {
    let mut h = Harness::new();
    h.login("alice").await;

    h.dispatch("alice", InboundAction::LogOut).await.unwrap();
    assert_eq!(h.client("alice").state().await, UserState::NoUserId);

    // The freed user id can be authenticated again on a fresh connection.
    h.login("alice").await;
    assert_eq!(h.client("alice").state().await, UserState::InLobby);
}
