//! Signed access tokens (HS256 JWT).

use crate::error::AuthError;
use crate::models::TokenUser;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user: TokenUser,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

/// A freshly issued token with the data the login response echoes back.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64,
    pub user: TokenUser,
}

/// Issues and verifies tokens with a shared secret.
pub struct TokenHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl TokenHandler {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against the caller's clock in verify_at
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
        }
    }

    /// Issue a token for `user` valid from now.
    pub fn issue(&self, user: TokenUser) -> Result<IssuedToken, AuthError> {
        self.issue_at(user, Utc::now().timestamp())
    }

    /// Issue a token for `user` valid on `[now, now + ttl)`.
    pub fn issue_at(&self, user: TokenUser, now: i64) -> Result<IssuedToken, AuthError> {
        let ttl = i64::try_from(self.ttl_secs)
            .map_err(|_| AuthError::Signing("token TTL out of range".to_string()))?;
        let claims = Claims {
            user,
            iat: now,
            exp: now.saturating_add(ttl),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )
        .map_err(|e| AuthError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_in: self.ttl_secs,
            user: claims.user,
        })
    }

    /// Verify a token against the wall clock.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify signature and expiry as of `now`. A token is rejected from the
    /// second it expires.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AuthError::InvalidOrExpiredToken)?;

        if now >= data.claims.exp {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        Ok(data.claims)
    }
}
