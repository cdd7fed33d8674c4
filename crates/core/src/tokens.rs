//! Token store.
//!
//! An ephemeral key-value store with per-entry time-to-live, shaped like the small subset of a
//! Redis client the session layer needs: `get`, `set` with expiry, and `del`, plus an explicit
//! connect/disconnect lifecycle. [`InMemoryTokenStore`] is the in-process implementation.

use crate::clock::{Clock, SystemClock};
use crate::{DriveError, DriveResult};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait TokenStore: Send + Sync {
    fn connect(&self) -> DriveResult<()>;

    fn disconnect(&self);

    fn is_alive(&self) -> bool;

    /// Returns the value for `key`, treating expired entries as absent.
    fn get(&self, key: &str) -> DriveResult<Option<String>>;

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> DriveResult<()>;

    /// Deletes `key`. Deleting an absent key succeeds.
    fn del(&self, key: &str) -> DriveResult<()>;
}

#[derive(Debug, Clone)]
struct TokenEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct InMemoryTokenStore {
    entries: DashMap<String, TokenEntry>,
    connected: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl InMemoryTokenStore {
    /// A disconnected store using wall-clock time.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            connected: AtomicBool::new(false),
            clock,
        }
    }

    /// Drops every expired entry. Lookups already ignore them; this only reclaims memory.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    fn ensure_connected(&self) -> DriveResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(DriveError::TokenStoreUnavailable)
        }
    }
}

impl Default for InMemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn connect(&self) -> DriveResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_alive(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn get(&self, key: &str) -> DriveResult<Option<String>> {
        self.ensure_connected()?;
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }

        // Reap lazily; the guard above is released before taking the write lock.
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> DriveResult<()> {
        self.ensure_connected()?;
        let entry = TokenEntry {
            value: value.to_owned(),
            expires_at: self.clock.now() + ttl,
        };
        self.entries.insert(key.to_owned(), entry);
        Ok(())
    }

    fn del(&self, key: &str) -> DriveResult<()> {
        self.ensure_connected()?;
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn connected_store() -> (Arc<ManualClock>, InMemoryTokenStore) {
        let clock = Arc::new(ManualClock::default());
        let store = InMemoryTokenStore::with_clock(clock.clone());
        store.connect().unwrap();
        (clock, store)
    }

    #[test]
    fn operations_fail_until_connected() {
        let store = InMemoryTokenStore::new();

        assert!(!store.is_alive());
        assert!(matches!(
            store.get("k"),
            Err(DriveError::TokenStoreUnavailable)
        ));

        store.connect().unwrap();
        assert!(store.is_alive());
        assert_eq!(store.get("k").unwrap(), None);

        store.disconnect();
        assert!(matches!(
            store.set("k", "v", Duration::seconds(1)),
            Err(DriveError::TokenStoreUnavailable)
        ));
    }

    #[test]
    fn entries_expire_at_ttl() {
        let (clock, store) = connected_store();
        store.set("auth_t", "user", Duration::seconds(10)).unwrap();

        clock.advance(Duration::seconds(9));
        assert_eq!(store.get("auth_t").unwrap().as_deref(), Some("user"));

        clock.advance(Duration::seconds(1));
        assert_eq!(store.get("auth_t").unwrap(), None);
    }

    #[test]
    fn get_does_not_extend_ttl() {
        let (clock, store) = connected_store();
        store.set("k", "v", Duration::seconds(10)).unwrap();

        for _ in 0..3 {
            clock.advance(Duration::seconds(3));
            assert!(store.get("k").unwrap().is_some());
        }
        clock.advance(Duration::seconds(1));
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn del_is_idempotent() {
        let (_clock, store) = connected_store();
        store.set("k", "v", Duration::hours(1)).unwrap();

        store.del("k").unwrap();
        store.del("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn purge_expired_reclaims_only_dead_entries() {
        let (clock, store) = connected_store();
        store.set("short", "a", Duration::seconds(1)).unwrap();
        store.set("long", "b", Duration::hours(1)).unwrap();

        clock.advance(Duration::seconds(2));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.get("long").unwrap().as_deref(), Some("b"));
    }
}
