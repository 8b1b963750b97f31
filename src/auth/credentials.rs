//! Login credential lookup.

use crate::config::Config;
use crate::error::AuthError;
use crate::models::TokenUser;
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

struct Credential {
    secret: Zeroizing<String>,
    role: String,
}

/// Valid login credentials keyed by identity.
///
/// Built once at startup and shared read-only between requests.
#[derive(Default)]
pub struct CredentialStore {
    entries: HashMap<String, Credential>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut identities: Vec<&String> = self.entries.keys().collect();
        identities.sort();
        f.debug_struct("CredentialStore")
            .field("identities", &identities)
            .finish()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the single login configured through `AUTH_*`.
    pub fn from_config(config: &Config) -> Self {
        let mut store = Self::new();
        store.insert(
            &config.auth_username,
            &config.auth_password,
            &config.auth_role,
        );
        store
    }

    /// Add or replace the credential for `identity`.
    pub fn insert(&mut self, identity: &str, secret: &str, role: &str) {
        self.entries.insert(
            identity.to_string(),
            Credential {
                secret: Zeroizing::new(secret.to_string()),
                role: role.to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check an identity/secret pair.
    ///
    /// Identity lookup is case-sensitive and the secret is compared in
    /// constant time. Unknown identity and wrong secret both yield
    /// `InvalidCredentials`.
    pub fn authenticate(&self, identity: &str, secret: &str) -> Result<TokenUser, AuthError> {
        let credential = self
            .entries
            .get(identity)
            .ok_or(AuthError::InvalidCredentials)?;

        if !bool::from(credential.secret.as_bytes().ct_eq(secret.as_bytes())) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(TokenUser {
            username: identity.to_string(),
            role: credential.role.clone(),
        })
    }
}
