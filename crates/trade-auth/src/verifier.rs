//! Bridges [`AuthVerifier`] to [`trade_session_core::TokenVerifier`], and
//! implements the development-mode passthrough: with no
//! `BACKEND_PUBLIC_KEY` configured, the `authenticate` argument is taken
//! directly as the user id.

use async_trait::async_trait;
use tracing::warn;
use trade_session_core::{TokenVerifier, UserId};

use crate::jwt::AuthVerifier;

pub enum TokenVerifierImpl {
    Jwt(AuthVerifier),
    DevPassthrough,
}

impl TokenVerifierImpl {
    pub fn jwt(verifier: AuthVerifier) -> Self {
        Self::Jwt(verifier)
    }

    pub fn dev_passthrough() -> Self {
        warn!("BACKEND_PUBLIC_KEY not set: running with authentication disabled");
        Self::DevPassthrough
    }
}

#[async_trait]
impl TokenVerifier for TokenVerifierImpl {
    async fn verify_token(&self, token: &str) -> Result<UserId, ()> {
        match self {
            TokenVerifierImpl::Jwt(verifier) => verifier.verify(token).map_err(|_| ()),
            TokenVerifierImpl::DevPassthrough => Ok(token.to_string()),
        }
    }
}
