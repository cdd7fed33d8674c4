//! Session manager.
//!
//! Exchanges Basic credentials for an opaque bearer token, resolves tokens back to user ids,
//! and revokes them. Tokens are stored in the [`TokenStore`] under `auth_<token>` with the
//! user's id as the value and a fixed TTL; resolving a token never extends it.

use crate::constants::{TOKEN_BYTES, TOKEN_KEY_PREFIX};
use crate::credentials::{CredentialStore, User};
use crate::tokens::TokenStore;
use crate::{DriveError, DriveResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Duration;
use drive_uuid::ShardableUuid;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;

#[derive(Clone)]
pub struct SessionManager {
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenStore>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            credentials,
            tokens,
            ttl,
        }
    }

    /// Issues a token for base64-encoded `email:password` credentials.
    ///
    /// Every failure (bad encoding, missing separator, unknown email, wrong password) is
    /// reported as [`DriveError::InvalidCredentials`].
    pub fn authenticate(&self, basic_credentials: &str) -> DriveResult<String> {
        let (email, password) =
            decode_basic(basic_credentials).ok_or(DriveError::InvalidCredentials)?;

        let Some(user) = self.credentials.authenticate(&email, &password) else {
            tracing::debug!("rejected credentials");
            return Err(DriveError::InvalidCredentials);
        };

        let token = generate_token();
        self.tokens
            .set(&token_key(&token), &user.id.to_string(), self.ttl)?;

        tracing::info!(user_id = %user.id, "session opened");
        Ok(token)
    }

    /// Resolves a token to the id of the user it was issued to.
    pub fn resolve(&self, token: &str) -> DriveResult<ShardableUuid> {
        if token.trim().is_empty() {
            return Err(DriveError::Unauthenticated);
        }

        let value = self
            .tokens
            .get(&token_key(token))?
            .ok_or(DriveError::Unauthenticated)?;

        ShardableUuid::parse(&value).map_err(|_| {
            tracing::warn!("token store holds an unreadable user id");
            DriveError::Unauthenticated
        })
    }

    /// Deletes the token. Revoking an unknown or expired token succeeds.
    pub fn revoke(&self, token: &str) -> DriveResult<()> {
        self.tokens.del(&token_key(token))
    }

    /// Resolves a token and loads its user.
    pub fn current_user(&self, token: &str) -> DriveResult<User> {
        let id = self.resolve(token)?;
        self.credentials
            .find(&id)
            .ok_or(DriveError::Unauthenticated)
    }
}

fn token_key(token: &str) -> String {
    format!("{TOKEN_KEY_PREFIX}{token}")
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn decode_basic(encoded: &str) -> Option<(String, String)> {
    let bytes = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (email, password) = decoded.split_once(':')?;
    Some((email.to_owned(), password.to_owned()))
}
