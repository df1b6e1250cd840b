//! Shared low-latency store for location history, counters, cooldown
//! markers, and idempotency records
//!
//! The interface mirrors what a networked KV store provides: capped list
//! pushes, atomic increments with TTL, set-if-not-exists, get/delete. The
//! in-memory implementation is the deployment default for a single node
//! and the test double for everything built on top.

use geodrop_core::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Operations the engine requires from the shared store.
///
/// All methods are async because the production store is a network hop;
/// every value carries a TTL.
#[allow(async_fn_in_trait)]
pub trait SharedStore: Send + Sync {
    /// Push to the front of a list, trim to `cap` entries, refresh the TTL
    async fn list_push_front(
        &self,
        key: &str,
        value: String,
        cap: usize,
        ttl: Duration,
    ) -> Result<()>;

    /// Read a full list, most-recent-first
    async fn list_all(&self, key: &str) -> Result<Vec<String>>;

    /// Atomically increment a counter, creating it with the given TTL.
    /// The TTL is only set on creation so the window does not slide on
    /// every increment.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64>;

    /// Set a value only if the key does not exist; returns whether the
    /// write happened
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Set a value unconditionally with a fresh TTL
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remaining TTL for a live key, if any
    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>>;
}

/// Value slot for one key
#[derive(Debug, Clone)]
enum Slot {
    Text(String),
    Counter(i64),
    List(VecDeque<String>),
}

impl Slot {
    fn kind(&self) -> &'static str {
        match self {
            Slot::Text(_) => "text",
            Slot::Counter(_) => "counter",
            Slot::List(_) => "list",
        }
    }
}

/// Stored entry with expiration
#[derive(Debug, Clone)]
struct Entry {
    slot: Slot,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Thread-safe in-memory implementation of [`SharedStore`].
///
/// Expired entries are dropped lazily on access; `cleanup` sweeps the rest.
pub struct MemoryKv {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Remove all expired entries
    pub fn cleanup(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, entry| !entry.is_expired());
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|e| e.values().filter(|entry| !entry.is_expired()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn wrong_kind(key: &str, found: &Slot) -> Error {
        Error::StoreError(format!(
            "key {} holds a {} value, operation expects another kind",
            key,
            found.kind()
        ))
    }

    fn lock_err() -> Error {
        Error::StoreError("store lock poisoned".to_string())
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore for MemoryKv {
    async fn list_push_front(
        &self,
        key: &str,
        value: String,
        cap: usize,
        ttl: Duration,
    ) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;
        let expires_at = Instant::now() + ttl;

        match entries.get_mut(key).filter(|e| !e.is_expired()) {
            Some(entry) => match &mut entry.slot {
                Slot::List(list) => {
                    list.push_front(value);
                    list.truncate(cap);
                    // TTL refreshed on every write
                    entry.expires_at = expires_at;
                }
                other => return Err(Self::wrong_kind(key, other)),
            },
            None => {
                let mut list = VecDeque::new();
                list.push_front(value);
                entries.insert(
                    key.to_string(),
                    Entry {
                        slot: Slot::List(list),
                        expires_at,
                    },
                );
            }
        }
        Ok(())
    }

    async fn list_all(&self, key: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;
        match entries.get(key).filter(|e| !e.is_expired()) {
            Some(entry) => match &entry.slot {
                Slot::List(list) => Ok(list.iter().cloned().collect()),
                other => Err(Self::wrong_kind(key, other)),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64> {
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;
        match entries.get_mut(key).filter(|e| !e.is_expired()) {
            Some(entry) => match &mut entry.slot {
                Slot::Counter(count) => {
                    *count += 1;
                    Ok(*count)
                }
                other => Err(Self::wrong_kind(key, other)),
            },
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        slot: Slot::Counter(1),
                        expires_at: Instant::now() + ttl,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;
        if entries.get(key).filter(|e| !e.is_expired()).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                slot: Slot::Text(value.to_string()),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;
        entries.insert(
            key.to_string(),
            Entry {
                slot: Slot::Text(value.to_string()),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;
        match entries.get(key).filter(|e| !e.is_expired()) {
            Some(entry) => match &entry.slot {
                Slot::Text(value) => Ok(Some(value.clone())),
                Slot::Counter(count) => Ok(Some(count.to_string())),
                other => Err(Self::wrong_kind(key, other)),
            },
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Self::lock_err())?;
        entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;
        Ok(entries.get(key).filter(|e| !e.is_expired()).is_some())
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>> {
        let entries = self.entries.read().map_err(|_| Self::lock_err())?;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.expires_at.saturating_duration_since(Instant::now())))
    }
}
