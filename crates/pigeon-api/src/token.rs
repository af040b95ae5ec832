use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::debug;

use pigeon_types::api::Claims;

use crate::ApiError;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(_) => ApiError::Unauthorized("Invalid or expired token".into()),
            TokenError::Signing(msg) => ApiError::Internal(msg),
        }
    }
}

/// Mints and checks HS256 bearer tokens carrying a username.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, username: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Signing("token lifetime out of range".into()))?;
        let claims = Claims {
            username: username.to_string(),
            iat: now.timestamp() as usize,
            exp: expires.timestamp().max(0) as usize,
        };

        debug!("Issuing token for {}, valid for {}h", username, self.ttl.num_hours());

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Signature, expiry and claim shape are all checked.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        if data.claims.username.is_empty() {
            return Err(TokenError::Invalid("empty username claim".into()));
        }
        Ok(data.claims)
    }
}
