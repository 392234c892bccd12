//! Shared data types for the trade session core.
//!
//! See the module docs on [`crate::invite`] and [`crate::trade`] for the
//! state machines built on top of these types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque identifier for an authenticated user.
///
/// Globally unique among authenticated users at any instant; carries no
/// further structure (the settlement backend owns identity semantics).
pub type UserId = String;

/// Ordered sequence of item identifiers.
///
/// Order is never semantically significant — equality throughout this crate
/// is always [`inventories_match`], not `Vec::eq`.
pub type Inventory = Vec<String>;

/// Multiset equality over two inventories: same length, same contents
/// irrespective of order or input ordering of duplicates.
pub fn inventories_match(a: &Inventory, b: &Inventory) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut counts: HashMap<&str, i32> = HashMap::new();
    for item in a {
        *counts.entry(item.as_str()).or_insert(0) += 1;
    }
    for item in b {
        *counts.entry(item.as_str()).or_insert(0) -= 1;
    }
    counts.values().all(|&c| c == 0)
}

/// Per-connection state machine. SessionCoordinator is the sole owner and
/// mutator of this value; managers never write it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserState {
    /// Connection exists but has not authenticated yet. Initial on connect.
    NoUserId,
    /// Authenticated, idle in the lobby.
    InLobby,
    /// Exactly one outbound invite outstanding.
    SentInvite,
    /// In an active trade pair, not locked in.
    InTrade,
    /// In an active trade pair, locked in.
    LockedIn,
}

impl std::fmt::Display for UserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserState::NoUserId => "NoUserId",
            UserState::InLobby => "InLobby",
            UserState::SentInvite => "SentInvite",
            UserState::InTrade => "InTrade",
            UserState::LockedIn => "LockedIn",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiset_equality_ignores_order() {
        let a = vec!["sword".to_string(), "shield".to_string(), "shield".to_string()];
        let b = vec!["shield".to_string(), "sword".to_string(), "shield".to_string()];
        assert!(inventories_match(&a, &b));
    }

    #[test]
    fn multiset_equality_catches_count_mismatch() {
        let a = vec!["sword".to_string(), "shield".to_string()];
        let b = vec!["sword".to_string(), "sword".to_string()];
        assert!(!inventories_match(&a, &b));
    }

    #[test]
    fn multiset_equality_catches_length_mismatch() {
        let a = vec!["sword".to_string()];
        let b = vec!["sword".to_string(), "shield".to_string()];
        assert!(!inventories_match(&a, &b));
    }
}
