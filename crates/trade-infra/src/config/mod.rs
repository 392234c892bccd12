//! Process configuration, loaded entirely from environment variables per
//! the external interfaces.

use crate::errors::{Error, Result};

/// Resolved process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listening port for the event transport.
    pub port: u16,
    /// PEM RS256 public key used to verify incoming auth tokens. Absent
    /// means authentication is disabled (development mode): the
    /// `authenticate` argument is taken directly as the user id.
    pub backend_public_key: Option<String>,
    /// PEM RS256 private key used to sign settlement JWTs.
    pub private_key: Option<String>,
    /// URL of the external settlement endpoint.
    pub perform_trade_endpoint: Option<String>,
    /// `NODE_ENV` value, defaulting to `"development"`.
    pub node_env: String,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.node_env == "development"
    }

    /// Whether incoming auth tokens are verified at all, vs. taken as a
    /// literal user id.
    pub fn auth_enabled(&self) -> bool {
        self.backend_public_key.is_some()
    }

    /// Load from the process environment and apply the startup validation
    /// rules: outside development, required variables must be present;
    /// regardless of environment, a settlement endpoint with a signing key
    /// but no verification key is always fatal.
    pub fn from_env() -> Result<Self> {
        let node_env = std::env::var("NODE_ENV").unwrap_or_else(|_| "development".to_string());
        let is_dev = node_env == "development";

        let port_var = std::env::var("PORT").ok();
        let backend_public_key = non_empty(std::env::var("BACKEND_PUBLIC_KEY").ok());
        let private_key = non_empty(std::env::var("PRIVATE_KEY").ok());
        let perform_trade_endpoint = non_empty(std::env::var("PERFORM_TRADE_ENDPOINT").ok());

        if !is_dev && port_var.is_none() {
            return Err(Error::Config("PORT is required outside development".into()));
        }
        let port = match port_var {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT is not a valid port number: {raw}")))?,
            None => 0,
        };

        if private_key.is_some() && perform_trade_endpoint.is_some() && backend_public_key.is_none() {
            return Err(Error::Config(
                "settlement is configured (PRIVATE_KEY, PERFORM_TRADE_ENDPOINT) but \
                 BACKEND_PUBLIC_KEY is absent: settlement without authentication is forbidden"
                    .into(),
            ));
        }

        Ok(AppConfig {
            port,
            backend_public_key,
            private_key,
            perform_trade_endpoint,
            node_env,
        })
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}
