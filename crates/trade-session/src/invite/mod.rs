//! Invite graph: at most one outbound invite per user, delivery-on-reconnect
//! for invites that arrived while the recipient was offline.
//!
//! `InviteManager` owns [`InviteInfo`] exclusively. It never touches the
//! connection registry or `UserState` directly — every observable effect is
//! reported through the injected [`InviteCallbacks`], which the
//! `SessionCoordinator` implements to translate into state transitions and
//! peer notifications. This mirrors the callback-injection split documented
//! for the SIP dialog/session layers this crate is descended from: the
//! manager is unit-testable against a stub callback set with no transport in
//! the loop at all.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::{InternalError, ManagerError, ManagerResult, UserError};
use crate::types::UserId;

/// Per-user invite bookkeeping. Lazily created on first touch and kept for
/// the process lifetime — small and bounded per user.
#[derive(Debug, Clone, Default)]
pub struct InviteInfo {
    /// At most one outbound invite.
    pub invite_sent_to: Option<UserId>,
    /// Invites received (from → this user). Authoritative; never cleared on
    /// offline.
    pub pending_invites: HashSet<UserId>,
    /// Subset of inbound invites that arrived while this user was offline;
    /// replayed as `onInviteSent` callbacks on reconnect, then drained.
    pub pending_notifications: HashSet<UserId>,
    /// Whether this user currently has a registered connection.
    pub connected: bool,
}

/// Outbound notifications the coordinator receives as invite state changes.
/// Every method corresponds 1:1 to an `on*` callback documented in the
/// manager's docs below.
#[async_trait]
pub trait InviteCallbacks: Send + Sync {
    async fn on_invite_sent(&self, from: &UserId, to: &UserId);
    async fn on_invite_cancelled(&self, from: &UserId, to: &UserId);
    async fn on_invite_accepted(&self, from: &UserId, to: &UserId);
    async fn on_invite_rejected(&self, from: &UserId, to: &UserId);
}

/// Tracks the invite graph for every user that has touched it.
///
/// Callers (the `SessionCoordinator`) are required to serialize calls into
/// this manager. `DashMap` here is a
/// convenient concurrent map, not a substitute for that external lock: the
/// invariant `from.inviteSentTo == to ⟺ from ∈ to.pendingInvites` spans two
/// different map entries and is only atomic because the caller never lets
/// two invite operations interleave.
pub struct InviteManager {
    infos: DashMap<UserId, InviteInfo>,
    callbacks: Arc<dyn InviteCallbacks>,
}

impl InviteManager {
    pub fn new(callbacks: Arc<dyn InviteCallbacks>) -> Self {
        Self {
            infos: DashMap::new(),
            callbacks,
        }
    }

    fn info_mut(&self, user: &UserId) -> dashmap::mapref::one::RefMut<'_, UserId, InviteInfo> {
        self.infos.entry(user.clone()).or_default()
    }

    /// A user's connection came online (fresh connect or reconnect). Marks
    /// them connected and replays any invite notifications that were
    /// deferred while they were offline.
    pub async fn user_connected(&self, user: &UserId) -> ManagerResult<()> {
        let deferred: Vec<UserId> = {
            let mut info = self.info_mut(user);
            info.connected = true;
            info.pending_notifications.drain().collect()
        };
        for from in deferred {
            self.callbacks.on_invite_sent(&from, user).await;
        }
        Ok(())
    }

    /// A user's connection went away. Cancels their outbound invite (as
    /// sender) and rejects every invite they had received (as recipient),
    /// through the same callbacks a live cancel/reject would use.
    pub async fn user_disconnected(&self, user: &UserId) -> ManagerResult<()> {
        let outbound = self.infos.get(user).and_then(|i| i.invite_sent_to.clone());
        if let Some(to) = outbound {
            self.cancel_invite_internal(user, &to)?;
            self.callbacks.on_invite_cancelled(user, &to).await;
        }

        let inbound: Vec<UserId> = self
            .infos
            .get(user)
            .map(|i| i.pending_invites.iter().cloned().collect())
            .unwrap_or_default();
        for from in inbound {
            // Reject from `from`'s side: clears `from.inviteSentTo` and drops
            // `user` out of `user.pendingInvites`.
            if let Some(mut from_info) = self.infos.get_mut(&from) {
                if from_info.invite_sent_to.as_ref() == Some(user) {
                    from_info.invite_sent_to = None;
                }
            }
            self.callbacks.on_invite_rejected(&from, user).await;
        }
        if let Some(mut info) = self.infos.get_mut(user) {
            info.pending_invites.clear();
            info.connected = false;
        }
        Ok(())
    }

    /// `from` proposes a trade to `to`.
    pub async fn send_invite(&self, from: &UserId, to: &UserId) -> ManagerResult<()> {
        if from == to {
            return Err(UserError::SelfInvite.into());
        }
        {
            let from_info = self.info_mut(from);
            if from_info.invite_sent_to.is_some() {
                return Err(InternalError::Precondition(
                    "sendInvite called with an outbound invite already outstanding".into(),
                )
                .into());
            }
        }
        self.info_mut(from).invite_sent_to = Some(to.clone());
        let to_connected = {
            let mut to_info = self.info_mut(to);
            to_info.pending_invites.insert(from.clone());
            if !to_info.connected {
                to_info.pending_notifications.insert(from.clone());
            }
            to_info.connected
        };
        let _ = to_connected; // recipient notification is deferred to user_connected when offline
        self.callbacks.on_invite_sent(from, to).await;
        Ok(())
    }

    fn cancel_invite_internal(&self, from: &UserId, to: &UserId) -> ManagerResult<()> {
        self.info_mut(from).invite_sent_to = None;
        if let Some(mut to_info) = self.infos.get_mut(to) {
            to_info.pending_invites.remove(from);
            to_info.pending_notifications.remove(from);
        }
        Ok(())
    }

    pub async fn cancel_invite(&self, from: &UserId) -> ManagerResult<()> {
        let to = self
            .infos
            .get(from)
            .and_then(|i| i.invite_sent_to.clone())
            .ok_or(UserError::InvalidInvite)?;
        self.cancel_invite_internal(from, &to)?;
        self.callbacks.on_invite_cancelled(from, &to).await;
        Ok(())
    }

    pub async fn accept_invite(&self, from: &UserId, to: &UserId) -> ManagerResult<()> {
        self.remove_pairing_or_invalid(from, to)?;
        self.callbacks.on_invite_accepted(from, to).await;
        Ok(())
    }

    pub async fn reject_invite(&self, from: &UserId, to: &UserId) -> ManagerResult<()> {
        self.remove_pairing_or_invalid(from, to)?;
        self.callbacks.on_invite_rejected(from, to).await;
        Ok(())
    }

    fn remove_pairing_or_invalid(&self, from: &UserId, to: &UserId) -> ManagerResult<()> {
        let matches = self
            .infos
            .get(from)
            .map(|i| i.invite_sent_to.as_ref() == Some(to))
            .unwrap_or(false);
        if !matches {
            return Err(UserError::InvalidInvite.into());
        }
        self.info_mut(from).invite_sent_to = None;
        if let Some(mut to_info) = self.infos.get_mut(to) {
            to_info.pending_invites.remove(from);
            to_info.pending_notifications.remove(from);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self, user: &UserId) -> InviteInfo {
        self.infos.entry(user.clone()).or_default().clone()
    }
}
