//! Active trade pairs: mirrored per-user inventory views, atomic lock/unlock
//! on updates, and two-phase completion.
//!
//! Both users in a pair map to the *same* `Arc<Mutex<TradePair>>` so a lock
//! taken to mutate one side's view sees the other side's view in the same
//! critical section, which is what gives the mirrored-consistency property. As with [`crate::invite::InviteManager`], callers are
//! expected to already hold the coordinator-wide action lock; the `Mutex`
//! here exists for the two-key-same-value aliasing, not as the primary
//! concurrency control.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::errors::{InternalError, ManagerResult, UserError};
use crate::types::{inventories_match, Inventory, UserId};

/// One side of an active trade.
#[derive(Debug, Clone, Default)]
pub struct UserTradeInfo {
    pub user_id: UserId,
    pub inventory: Inventory,
    pub locked_in: bool,
    pub accepted: bool,
}

/// The mutual session created when an invite is accepted.
#[derive(Debug, Clone)]
pub struct TradePair {
    pub sides: [UserTradeInfo; 2],
}

impl TradePair {
    fn new(a: UserId, b: UserId) -> Self {
        Self {
            sides: [
                UserTradeInfo {
                    user_id: a,
                    ..Default::default()
                },
                UserTradeInfo {
                    user_id: b,
                    ..Default::default()
                },
            ],
        }
    }

    /// Returns `(self, other)` by identity of `user`, regardless of which
    /// side of the pair `user` occupies.
    fn sides_for_mut(&mut self, user: &UserId) -> (&mut UserTradeInfo, &mut UserTradeInfo) {
        if self.sides[0].user_id == *user {
            let (a, b) = self.sides.split_at_mut(1);
            (&mut a[0], &mut b[0])
        } else {
            let (a, b) = self.sides.split_at_mut(1);
            (&mut b[0], &mut a[0])
        }
    }

    fn other_of(&self, user: &UserId) -> &UserId {
        if self.sides[0].user_id == *user {
            &self.sides[1].user_id
        } else {
            &self.sides[0].user_id
        }
    }
}

/// A trade pair at the moment both sides accepted, handed to
/// [`TradeCallbacks::on_trade_completed`] for settlement dispatch.
pub type CompletedTrade = [UserTradeInfo; 2];

#[async_trait]
pub trait TradeCallbacks: Send + Sync {
    async fn on_trade_started(&self, u1: &UserId, u2: &UserId);
    async fn on_inventory_updated(&self, recipient: &UserId, inventory: &Inventory);
    async fn on_locked_in(&self, user: &UserId, peer: &UserId, self_inv: &Inventory, other_inv: &Inventory);
    async fn on_unlocked(&self, user: &UserId, peer: &UserId);
    async fn on_trade_cancelled(&self, user: &UserId, peer: &UserId);
    async fn on_trade_completed(&self, pair: CompletedTrade);
}

/// Owns every active `TradePair`, keyed from both participants' user ids.
pub struct TradeManager {
    pairs: DashMap<UserId, Arc<Mutex<TradePair>>>,
    callbacks: Arc<dyn TradeCallbacks>,
}

impl TradeManager {
    pub fn new(callbacks: Arc<dyn TradeCallbacks>) -> Self {
        Self {
            pairs: DashMap::new(),
            callbacks,
        }
    }

    pub fn is_in_trade(&self, user: &UserId) -> bool {
        self.pairs.contains_key(user)
    }

    pub async fn start_trade(&self, u1: &UserId, u2: &UserId) -> ManagerResult<()> {
        let pair = Arc::new(Mutex::new(TradePair::new(u1.clone(), u2.clone())));
        self.pairs.insert(u1.clone(), pair.clone());
        self.pairs.insert(u2.clone(), pair);
        self.callbacks.on_trade_started(u1, u2).await;
        Ok(())
    }

    fn pair_for(&self, user: &UserId) -> ManagerResult<Arc<Mutex<TradePair>>> {
        self.pairs.get(user).map(|p| p.clone()).ok_or_else(|| {
            InternalError::Precondition(format!("{user} is not in an active trade")).into()
        })
    }

    pub async fn update_inventory(&self, user: &UserId, inventory: Inventory) -> ManagerResult<()> {
        let pair = self.pair_for(user)?;
        let (peer, unlocked_self, unlocked_peer) = {
            let mut guard = pair.lock().await;
            let peer = guard.other_of(user).clone();
            let (me, other) = guard.sides_for_mut(user);
            me.inventory = inventory.clone();
            let unlocked_self = me.locked_in;
            if unlocked_self {
                me.locked_in = false;
                me.accepted = false;
            }
            let unlocked_peer = other.locked_in;
            if unlocked_peer {
                other.locked_in = false;
                other.accepted = false;
            }
            (peer, unlocked_self, unlocked_peer)
        };
        if unlocked_self {
            self.callbacks.on_unlocked(user, &peer).await;
        }
        if unlocked_peer {
            // `peer`'s own lock broke out from under them as a side effect of
            // `user`'s update, not by their own action, so `peer` is told
            // directly rather than through the usual notify-the-other-side
            // path (compare the `unlocked_self` arm above and `unlock()`).
            self.callbacks.on_unlocked(&peer, &peer).await;
        }
        self.callbacks.on_inventory_updated(user, &inventory).await;
        Ok(())
    }

    pub async fn lock_in(
        &self,
        user: &UserId,
        self_claim: Inventory,
        other_claim: Inventory,
    ) -> ManagerResult<()> {
        let pair = self.pair_for(user)?;
        let (peer, self_inv, other_inv) = {
            let mut guard = pair.lock().await;
            let (me, other) = guard.sides_for_mut(user);
            if !inventories_match(&self_claim, &me.inventory) || !inventories_match(&other_claim, &other.inventory) {
                return Err(UserError::InventoryMismatch.into());
            }
            me.locked_in = true;
            (other.user_id.clone(), me.inventory.clone(), other.inventory.clone())
        };
        self.callbacks.on_locked_in(user, &peer, &self_inv, &other_inv).await;
        Ok(())
    }

    pub async fn unlock(&self, user: &UserId) -> ManagerResult<()> {
        let pair = self.pair_for(user)?;
        let peer = {
            let mut guard = pair.lock().await;
            let (me, other) = guard.sides_for_mut(user);
            me.locked_in = false;
            me.accepted = false;
            other.user_id.clone()
        };
        self.callbacks.on_unlocked(user, &peer).await;
        Ok(())
    }

    pub async fn cancel_trade(&self, user: &UserId) -> ManagerResult<()> {
        let pair = self.pair_for(user)?;
        let peer = pair.lock().await.other_of(user).clone();
        self.pairs.remove(user);
        self.pairs.remove(&peer);
        self.callbacks.on_trade_cancelled(user, &peer).await;
        Ok(())
    }

    /// Marks `user` as having confirmed the trade. Fires `onTradeCompleted`
    /// (and removes the pair) only once both sides have accepted.
    pub async fn complete_trade(&self, user: &UserId) -> ManagerResult<()> {
        let pair = self.pair_for(user)?;
        let completed = {
            let mut guard = pair.lock().await;
            let (me, other) = guard.sides_for_mut(user);
            if !me.locked_in || !other.locked_in {
                return Err(UserError::CantCompleteEitherUnlocked.into());
            }
            me.accepted = true;
            if me.accepted && other.accepted {
                Some(guard.sides.clone())
            } else {
                None
            }
        };
        if let Some(sides) = completed {
            let peer = if sides[0].user_id == *user { &sides[1].user_id } else { &sides[0].user_id };
            self.pairs.remove(user);
            self.pairs.remove(peer);
            self.callbacks.on_trade_completed(sides).await;
        }
        Ok(())
    }

    pub async fn user_disconnected(&self, user: &UserId) -> ManagerResult<()> {
        if self.is_in_trade(user) {
            self.cancel_trade(user).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Default)]
    struct RecordingCallbacks {
        events: TokioMutex<Vec<String>>,
    }

    #[async_trait]
    impl TradeCallbacks for RecordingCallbacks {
        async fn on_trade_started(&self, u1: &UserId, u2: &UserId) {
            self.events.lock().await.push(format!("started:{u1},{u2}"));
        }
        async fn on_inventory_updated(&self, recipient: &UserId, inventory: &Inventory) {
            self.events
                .lock()
                .await
                .push(format!("updated:{recipient}:{:?}", inventory));
        }
        async fn on_locked_in(&self, user: &UserId, peer: &UserId, self_inv: &Inventory, other_inv: &Inventory) {
            self.events
                .lock()
                .await
                .push(format!("locked:{user}->{peer}:{:?}/{:?}", self_inv, other_inv));
        }
        async fn on_unlocked(&self, user: &UserId, _peer: &UserId) {
            self.events.lock().await.push(format!("unlocked:{user}"));
        }
        async fn on_trade_cancelled(&self, user: &UserId, peer: &UserId) {
            self.events.lock().await.push(format!("cancelled:{user},{peer}"));
        }
        async fn on_trade_completed(&self, pair: CompletedTrade) {
            self.events
                .lock()
                .await
                .push(format!("completed:{},{}", pair[0].user_id, pair[1].user_id));
        }
    }

    fn manager() -> (Arc<RecordingCallbacks>, TradeManager) {
        let cb = Arc::new(RecordingCallbacks::default());
        let mgr = TradeManager::new(cb.clone());
        (cb, mgr)
    }

    #[tokio::test]
    async fn lock_in_any_permutation_of_same_multiset_succeeds() {
        let (_cb, mgr) = manager();
        mgr.start_trade(&"alice".into(), &"bob".into()).await.unwrap();
        mgr.update_inventory(&"alice".into(), vec!["a".into(), "b".into()])
            .await
            .unwrap();
        mgr.update_inventory(&"bob".into(), vec!["c".into()]).await.unwrap();

        mgr.lock_in(&"alice".into(), vec!["b".into(), "a".into()], vec!["c".into()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mismatched_lock_in_rejected_and_state_unchanged() {
        let (_cb, mgr) = manager();
        mgr.start_trade(&"alice".into(), &"bob".into()).await.unwrap();
        mgr.update_inventory(&"alice".into(), vec!["a".into()]).await.unwrap();
        mgr.update_inventory(&"bob".into(), vec!["b".into()]).await.unwrap();

        let err = mgr
            .lock_in(&"alice".into(), vec!["x".into()], vec!["b".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, crate::errors::ManagerError::User(UserError::InventoryMismatch)));
    }

    #[tokio::test]
    async fn update_while_locked_unlocks_both_sides() {
        let (cb, mgr) = manager();
        mgr.start_trade(&"alice".into(), &"bob".into()).await.unwrap();
        mgr.update_inventory(&"alice".into(), vec!["a".into()]).await.unwrap();
        mgr.update_inventory(&"bob".into(), vec!["b".into()]).await.unwrap();
        mgr.lock_in(&"alice".into(), vec!["a".into()], vec!["b".into()])
            .await
            .unwrap();

        mgr.update_inventory(&"bob".into(), vec!["c".into()]).await.unwrap();

        let events = cb.events.lock().await;
        assert!(events.contains(&"unlocked:alice".to_string()));
    }

    #[tokio::test]
    async fn two_phase_complete_requires_both_sides() {
        let (cb, mgr) = manager();
        mgr.start_trade(&"alice".into(), &"bob".into()).await.unwrap();
        mgr.update_inventory(&"alice".into(), vec!["a".into()]).await.unwrap();
        mgr.update_inventory(&"bob".into(), vec!["b".into()]).await.unwrap();
        mgr.lock_in(&"alice".into(), vec!["a".into()], vec!["b".into()])
            .await
            .unwrap();
        mgr.lock_in(&"bob".into(), vec!["b".into()], vec!["a".into()])
            .await
            .unwrap();

        mgr.complete_trade(&"alice".into()).await.unwrap();
        assert!(mgr.is_in_trade(&"alice".into()));
        {
            let events = cb.events.lock().await;
            assert!(!events.iter().any(|e| e.starts_with("completed")));
        }

        mgr.complete_trade(&"bob".into()).await.unwrap();
        assert!(!mgr.is_in_trade(&"alice".into()));
        assert!(!mgr.is_in_trade(&"bob".into()));
        let events = cb.events.lock().await;
        assert!(events.iter().any(|e| e.starts_with("completed")));
    }

    #[tokio::test]
    async fn complete_with_either_unlocked_fails() {
        let (_cb, mgr) = manager();
        mgr.start_trade(&"alice".into(), &"bob".into()).await.unwrap();
        let err = mgr.complete_trade(&"alice".into()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::errors::ManagerError::User(UserError::CantCompleteEitherUnlocked)
        ));
    }

    #[tokio::test]
    async fn disconnect_during_trade_cancels_it() {
        let (cb, mgr) = manager();
        mgr.start_trade(&"alice".into(), &"bob".into()).await.unwrap();
        mgr.user_disconnected(&"alice".into()).await.unwrap();
        assert!(!mgr.is_in_trade(&"bob".into()));
        let events = cb.events.lock().await;
        assert!(events.iter().any(|e| e.starts_with("cancelled:alice,bob")));
    }
}
