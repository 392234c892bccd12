//! HTTP settlement client: posts a completed trade to the external
//! settlement endpoint with a signed bearer token. Implements
//! [`trade_session_core::SettlementClient`] so the coordinator never
//! depends on `reqwest` directly.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

use trade_session_core::{CompletedTrade, SettlementClient};

use crate::jwt::SettlementSigner;

#[derive(Debug, Serialize)]
struct TradeInfoDto {
    #[serde(rename = "userId")]
    user_id: String,
    inventory: Vec<String>,
    #[serde(rename = "lockedIn")]
    locked_in: bool,
    accepted: bool,
}

#[derive(Debug, Serialize)]
struct SettlementBody {
    #[serde(rename = "tradeInfo")]
    trade_info: Vec<TradeInfoDto>,
}

/// Fires the settlement POST. Failure is logged only — the
/// trade pair has already been torn down by the time this runs.
pub struct HttpSettlementClient {
    http: reqwest::Client,
    endpoint: String,
    signer: SettlementSigner,
}

impl HttpSettlementClient {
    pub fn new(endpoint: String, signer: SettlementSigner) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            signer,
        }
    }
}

#[async_trait]
impl SettlementClient for HttpSettlementClient {
    async fn submit(&self, trade: &CompletedTrade) {
        let user_ids: Vec<String> = trade.iter().map(|side| side.user_id.clone()).collect();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let token = match self.signer.sign(&user_ids, now) {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "failed to sign settlement token, dropping settlement request");
                return;
            }
        };

        let body = SettlementBody {
            trade_info: trade
                .iter()
                .map(|side| TradeInfoDto {
                    user_id: side.user_id.clone(),
                    inventory: side.inventory.clone(),
                    locked_in: side.locked_in,
                    accepted: side.accepted,
                })
                .collect(),
        };

        let result = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                info!(user_ids = ?user_ids, "settlement accepted");
            }
            Ok(resp) => {
                warn!(user_ids = ?user_ids, status = %resp.status(), "settlement endpoint returned an error status");
            }
            Err(e) => {
                warn!(user_ids = ?user_ids, error = %e, "settlement request failed");
            }
        }
    }
}
