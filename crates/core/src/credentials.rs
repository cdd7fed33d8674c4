//! Credential store.
//!
//! Holds user identities: a case-normalised email and an Argon2id password hash (PHC string
//! with an embedded random salt). Raw passwords are never stored or returned.
//!
//! Lookups by email and by id are served from memory. When opened on a directory, every
//! registration is also written as `users/<s1>/<s2>/<id>/user.json` and all users are loaded
//! back on open.

use crate::constants::USER_RECORD_FILENAME;
use crate::records::RecordDir;
use crate::{DriveError, DriveResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use drive_types::EmailAddress;
use drive_uuid::ShardableUuid;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// Hash checked when the email is unknown, so that path costs the same as a wrong password.
static DUMMY_PASSWORD_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("drive-dummy-password").ok());

#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: ShardableUuid,
    pub email: EmailAddress,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

pub trait CredentialStore: Send + Sync {
    /// Registers a new user.
    ///
    /// Fails with `DuplicateEmail` if the (normalised) email is taken and with `Validation`
    /// for a malformed email or an empty password.
    fn register(&self, email: &str, raw_password: &str) -> DriveResult<User>;

    /// Returns the user when the email is known and the password matches.
    ///
    /// Unknown email and wrong password both yield `None` after the same amount of hashing
    /// work.
    fn authenticate(&self, email: &str, raw_password: &str) -> Option<User>;

    fn find(&self, id: &ShardableUuid) -> Option<User>;

    /// Looks a user up by (normalised) email without checking a password.
    fn find_by_email(&self, email: &str) -> Option<User>;

    fn verify(&self, email: &str, raw_password: &str) -> bool {
        self.authenticate(email, raw_password).is_some()
    }
}

/// In-memory user index with optional on-disk records.
#[derive(Debug, Default)]
pub struct UserRegistry {
    by_email: DashMap<EmailAddress, User>,
    emails_by_id: DashMap<ShardableUuid, EmailAddress>,
    records: Option<RecordDir>,
}

impl UserRegistry {
    /// A registry that keeps users in memory only.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a registry persisted under `dir`, loading existing users.
    pub fn open(dir: &Path) -> DriveResult<Self> {
        let records = RecordDir::open(dir, USER_RECORD_FILENAME)?;
        let registry = Self {
            records: Some(records.clone()),
            ..Self::default()
        };

        for user in records.load_all::<User>()? {
            registry.emails_by_id.insert(user.id, user.email.clone());
            registry.by_email.insert(user.email.clone(), user);
        }

        tracing::debug!("loaded {} users from {}", registry.len(), dir.display());
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

impl CredentialStore for UserRegistry {
    fn register(&self, email: &str, raw_password: &str) -> DriveResult<User> {
        let email = EmailAddress::parse(email)
            .map_err(|_| DriveError::Validation("Missing or invalid email".into()))?;
        if raw_password.is_empty() {
            return Err(DriveError::Validation("Missing password".into()));
        }

        // Hash before taking the entry lock.
        let password_hash = hash_password(raw_password)?;

        match self.by_email.entry(email.clone()) {
            Entry::Occupied(_) => Err(DriveError::DuplicateEmail),
            Entry::Vacant(slot) => {
                let user = User {
                    id: ShardableUuid::new(),
                    email,
                    password_hash,
                    created_at: Utc::now(),
                };

                if let Some(records) = &self.records {
                    records.write(&user.id, &user)?;
                }

                self.emails_by_id.insert(user.id, user.email.clone());
                slot.insert(user.clone());
                tracing::info!(user_id = %user.id, "registered user");
                Ok(user)
            }
        }
    }

    fn authenticate(&self, email: &str, raw_password: &str) -> Option<User> {
        let user = EmailAddress::parse(email)
            .ok()
            .and_then(|email| self.by_email.get(&email).map(|u| u.clone()));

        match user {
            Some(user) => verify_password(raw_password, &user.password_hash).then_some(user),
            None => {
                if let Some(dummy) = DUMMY_PASSWORD_HASH.as_deref() {
                    let _ = verify_password(raw_password, dummy);
                }
                None
            }
        }
    }

    fn find(&self, id: &ShardableUuid) -> Option<User> {
        let email = self.emails_by_id.get(id)?.clone();
        self.by_email.get(&email).map(|u| u.clone())
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        let email = EmailAddress::parse(email).ok()?;
        self.by_email.get(&email).map(|u| u.clone())
    }
}

fn hash_password(raw_password: &str) -> DriveResult<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| DriveError::PasswordHash(e.to_string()))?;

    Argon2::default()
        .hash_password(raw_password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DriveError::PasswordHash(e.to_string()))
}

fn verify_password(raw_password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(raw_password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("stored password hash is unreadable: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_register_then_verify() {
        let registry = UserRegistry::in_memory();
        let user = registry.register("alice@example.com", "secret123").unwrap();

        assert_eq!(user.email.as_str(), "alice@example.com");
        assert!(registry.verify("alice@example.com", "secret123"));
        assert!(!registry.verify("alice@example.com", "wrong"));
        assert!(!registry.verify("nobody@example.com", "secret123"));
    }

    #[test]
    fn test_password_is_hashed_with_salt() {
        let registry = UserRegistry::in_memory();
        let a = registry.register("a@example.com", "same-password").unwrap();
        let b = registry.register("b@example.com", "same-password").unwrap();

        assert!(a.password_hash.starts_with("$argon2id$"));
        assert!(!a.password_hash.contains("same-password"));
        assert_ne!(a.password_hash, b.password_hash);
        assert!(!format!("{a:?}").contains(&a.password_hash));
    }

    #[test]
    fn test_duplicate_email_is_case_insensitive() {
        let registry = UserRegistry::in_memory();
        registry.register("alice@example.com", "secret123").unwrap();

        let err = registry
            .register("  ALICE@Example.com", "other")
            .unwrap_err();
        assert!(matches!(err, DriveError::DuplicateEmail));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_validates_input() {
        let registry = UserRegistry::in_memory();

        assert!(matches!(
            registry.register("", "pw"),
            Err(DriveError::Validation(_))
        ));
        assert!(matches!(
            registry.register("not-an-email", "pw"),
            Err(DriveError::Validation(_))
        ));
        assert!(matches!(
            registry.register("a@example.com", ""),
            Err(DriveError::Validation(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_authenticate_normalises_email() {
        let registry = UserRegistry::in_memory();
        let user = registry.register("alice@example.com", "secret123").unwrap();

        let found = registry.authenticate("Alice@Example.com", "secret123").unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(registry.find(&user.id).unwrap().email, user.email);
        assert!(registry.find(&ShardableUuid::new()).is_none());
        assert_eq!(registry.find_by_email(" ALICE@example.com").unwrap().id, user.id);
        assert!(registry.find_by_email("bob@example.com").is_none());
    }

    #[test]
    fn test_open_reloads_persisted_users() {
        let temp = TempDir::new().unwrap();
        let users_dir = temp.path().join("users");

        let id = {
            let registry = UserRegistry::open(&users_dir).unwrap();
            registry.register("alice@example.com", "secret123").unwrap().id
        };

        let reopened = UserRegistry::open(&users_dir).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.find(&id).unwrap().email.as_str(), "alice@example.com");
        assert!(reopened.verify("alice@example.com", "secret123"));
        assert!(matches!(
            reopened.register("alice@example.com", "x"),
            Err(DriveError::DuplicateEmail)
        ));
    }
}
