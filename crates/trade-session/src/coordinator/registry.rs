//! Connection registry: `userId → ConnectionEntry` for every authenticated
//! connection. SessionCoordinator is the exclusive owner — managers never
//! read connection handles directly, only through the callback traits in
//! [`super::events`].

use std::sync::Arc;

use tokio::sync::RwLock;

use super::events::{PeerSink, ServerEvent};
use crate::types::{UserId, UserState};

/// An authenticated connection: its current state machine cell and its
/// outbound sink. Created on authenticate, destroyed on logOut or
/// disconnect.
///
/// `state` is the *same* cell the pre-auth `Connection` handle was created
/// with, so a transition the coordinator makes through the registry is
/// immediately visible to the next `dispatch` call on that connection.
pub struct ConnectionEntry {
    pub user_id: UserId,
    pub state: Arc<RwLock<UserState>>,
    pub sink: Arc<dyn PeerSink>,
}

impl ConnectionEntry {
    pub fn new(user_id: UserId, state: Arc<RwLock<UserState>>, sink: Arc<dyn PeerSink>) -> Arc<Self> {
        Arc::new(Self { user_id, state, sink })
    }
}

/// Registry of live, authenticated connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    by_user: dashmap::DashMap<UserId, Arc<ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: Arc<ConnectionEntry>) {
        self.by_user.insert(entry.user_id.clone(), entry);
    }

    pub fn remove(&self, user_id: &UserId) -> Option<Arc<ConnectionEntry>> {
        self.by_user.remove(user_id).map(|(_, entry)| entry)
    }

    pub fn get(&self, user_id: &UserId) -> Option<Arc<ConnectionEntry>> {
        self.by_user.get(user_id).map(|e| e.clone())
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.by_user.contains_key(user_id)
    }

    pub async fn set_state(&self, user_id: &UserId, state: UserState) {
        if let Some(entry) = self.get(user_id) {
            *entry.state.write().await = state;
        }
    }

    pub async fn state_of(&self, user_id: &UserId) -> Option<UserState> {
        match self.get(user_id) {
            Some(entry) => Some(*entry.state.read().await),
            None => None,
        }
    }

    /// Best-effort notification. If the peer's connection is already gone it
    /// has already run through disconnect cleanup; the event is silently
    /// discarded rather than retried.
    pub async fn notify(&self, user_id: &UserId, event: ServerEvent) {
        if let Some(entry) = self.get(user_id) {
            entry.sink.emit(event).await;
        }
    }
}
