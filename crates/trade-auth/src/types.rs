//! Claim shapes for the two JWTs this crate handles: the inbound auth token
//! the client presents on `authenticate`, and the outbound settlement token
//! this service mints for the trade endpoint.

use serde::{Deserialize, Serialize};

/// Claims for the client-presented auth token. The only contract is that
/// the payload is an object with a string `id` field; any other shape is an
/// `AuthError`. `exp` is optional — tokens without one never expire on
/// their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    pub id: String,
    #[serde(default)]
    pub exp: Option<u64>,
}

/// Claims for the settlement JWT this service signs: the two user ids
/// involved in a completed trade, one hour expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementClaims {
    #[serde(rename = "userIds")]
    pub user_ids: Vec<String>,
    pub exp: u64,
}
