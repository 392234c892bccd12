//! RS256 JWT verification and signing.
//!
//! Two independent keys are involved:
//! `BACKEND_PUBLIC_KEY` verifies tokens clients present on `authenticate`;
//! `PRIVATE_KEY` signs the settlement bearer token this service presents to
//! the external trade endpoint. Neither direction shares key material with
//! the other.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::error::{AuthError, Result};
use crate::types::{AuthClaims, SettlementClaims};

/// Verifies client-presented auth tokens against a configured RS256 public
/// key. Rejects any payload that doesn't carry a string `id` field.
pub struct AuthVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl AuthVerifier {
    pub fn from_pem(public_key_pem: &str) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| AuthError::ConfigError(format!("invalid BACKEND_PUBLIC_KEY: {e}")))?;
        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.validate_exp = true;
        // The payload's only required shape is `id`; there is no fixed
        // issuer/audience to pin.
        validation.required_spec_claims.clear();
        Ok(Self { key, validation })
    }

    pub fn verify(&self, token: &str) -> Result<String> {
        let data = decode::<AuthClaims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(data.claims.id)
    }
}

/// Signs settlement bearer tokens with the service's RS256 private key.
pub struct SettlementSigner {
    key: EncodingKey,
}

const SETTLEMENT_TOKEN_TTL_SECS: u64 = 3600;

impl SettlementSigner {
    pub fn from_pem(private_key_pem: &str) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| AuthError::ConfigError(format!("invalid PRIVATE_KEY: {e}")))?;
        Ok(Self { key })
    }

    /// Produces a one-hour-expiry JWT carrying both trading user ids.
    pub fn sign(&self, user_ids: &[String], now_unix: u64) -> Result<String> {
        let claims = SettlementClaims {
            user_ids: user_ids.to_vec(),
            exp: now_unix + SETTLEMENT_TOKEN_TTL_SECS,
        };
        encode(&Header::new(jsonwebtoken::Algorithm::RS256), &claims, &self.key)
            .map_err(|e| AuthError::InternalError(format!("failed to sign settlement token: {e}")))
    }
}
