//! Bounded per-key history of read values.
//!
//! Each key keeps at most `limit` entries; recording into a full key evicts
//! the oldest entry. Keys live in a fixed set of mutex-guarded shards so
//! concurrent reads of different keys rarely contend, while the
//! read-modify-evict sequence for one key always runs under its shard lock.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::trace;

/// Tracing target for history events.
const HISTORY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::history");

const SHARD_COUNT: usize = 16;

/// Source of timestamps for recorded entries.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Wall-clock time in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        i64::try_from(millis).unwrap_or(i64::MAX)
    }
}

/// Identifies a monitored value: object, member and extra path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HistoryKey {
    /// Canonical object name.
    pub identity: String,
    /// Attribute or operation name; `None` for all-attribute reads.
    pub member: Option<String>,
    /// Extra path joined with `/`.
    pub path: String,
}

impl HistoryKey {
    /// Builds a key, joining the extra path.
    #[must_use]
    pub fn new(identity: impl Into<String>, member: Option<&str>, path: &[String]) -> Self {
        Self {
            identity: identity.into(),
            member: member.map(str::to_owned),
            path: path.join("/"),
        }
    }
}

impl fmt::Display for HistoryKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.identity)?;
        if let Some(member) = &self.member {
            write!(formatter, "#{member}")?;
        }
        if !self.path.is_empty() {
            write!(formatter, "/{}", self.path)?;
        }
        Ok(())
    }
}

/// One recorded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// JSON form of the value.
    pub value: Value,
    /// Recording time in milliseconds since the Unix epoch.
    pub timestamp_millis: i64,
}

/// Failures of the history store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// A shard lock was poisoned by a panicking writer.
    #[error("history shard lock poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
struct Shard {
    entries: HashMap<HistoryKey, VecDeque<HistoryEntry>>,
    limits: HashMap<HistoryKey, usize>,
}

/// Sharded, bounded history store.
pub struct HistoryStore {
    shards: Vec<Mutex<Shard>>,
    default_limit: usize,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for HistoryStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HistoryStore")
            .field("shards", &self.shards.len())
            .field("default_limit", &self.default_limit)
            .finish_non_exhaustive()
    }
}

impl HistoryStore {
    /// Creates a store keeping `default_limit` entries per key; `0` disables
    /// recording for keys without an explicit limit.
    #[must_use]
    pub fn new(default_limit: usize) -> Self {
        Self::with_clock(default_limit, Arc::new(SystemClock))
    }

    /// Creates a store stamping entries with the given clock.
    #[must_use]
    pub fn with_clock(default_limit: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(Shard::default())).collect(),
            default_limit,
            clock,
        }
    }

    /// Default per-key bound.
    #[must_use]
    pub const fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Records `value` at `timestamp_millis`, evicting the oldest entries
    /// beyond the key's bound.
    ///
    /// Timestamps within one key strictly increase: a stamp that does not
    /// advance past the newest entry is bumped to one millisecond after it.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Poisoned`] if the shard lock is poisoned.
    pub fn record(
        &self,
        key: HistoryKey,
        value: Value,
        timestamp_millis: i64,
    ) -> Result<(), HistoryError> {
        let mut shard = self.shard(&key)?;
        let limit = shard.limits.get(&key).copied().unwrap_or(self.default_limit);
        if limit == 0 {
            return Ok(());
        }
        trace!(target: HISTORY_TARGET, key = %key, "recording value");
        let entries = shard.entries.entry(key).or_default();
        let timestamp_millis = entries
            .back()
            .map_or(timestamp_millis, |last| {
                timestamp_millis.max(last.timestamp_millis.saturating_add(1))
            });
        entries.push_back(HistoryEntry {
            value,
            timestamp_millis,
        });
        while entries.len() > limit {
            entries.pop_front();
        }
        Ok(())
    }

    /// Records `value` stamped with the store's clock.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Poisoned`] if the shard lock is poisoned.
    pub fn record_now(&self, key: HistoryKey, value: Value) -> Result<(), HistoryError> {
        let now = self.clock.now_millis();
        self.record(key, value, now)
    }

    /// Most recently recorded entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Poisoned`] if the shard lock is poisoned.
    pub fn last_value(&self, key: &HistoryKey) -> Result<Option<HistoryEntry>, HistoryError> {
        let shard = self.shard(key)?;
        Ok(shard
            .entries
            .get(key)
            .and_then(|entries| entries.back())
            .cloned())
    }

    /// All entries for `key`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Poisoned`] if the shard lock is poisoned.
    pub fn entries(&self, key: &HistoryKey) -> Result<Vec<HistoryEntry>, HistoryError> {
        let shard = self.shard(key)?;
        Ok(shard
            .entries
            .get(key)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Overrides the bound for one key, trimming entries already recorded.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Poisoned`] if the shard lock is poisoned.
    pub fn set_limit(&self, key: HistoryKey, limit: usize) -> Result<(), HistoryError> {
        let mut shard = self.shard(&key)?;
        let emptied = shard.entries.get_mut(&key).is_some_and(|entries| {
            while entries.len() > limit {
                entries.pop_front();
            }
            entries.is_empty()
        });
        if emptied {
            shard.entries.remove(&key);
        }
        shard.limits.insert(key, limit);
        Ok(())
    }

    /// Drops every recorded entry; per-key limits are kept.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Poisoned`] if any shard lock is poisoned.
    pub fn reset(&self) -> Result<(), HistoryError> {
        for shard in &self.shards {
            shard
                .lock()
                .map_err(|_| HistoryError::Poisoned)?
                .entries
                .clear();
        }
        Ok(())
    }

    fn shard(&self, key: &HistoryKey) -> Result<MutexGuard<'_, Shard>, HistoryError> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = usize::try_from(hasher.finish() % SHARD_COUNT as u64).unwrap_or(0);
        self.shards
            .get(index)
            .ok_or(HistoryError::Poisoned)?
            .lock()
            .map_err(|_| HistoryError::Poisoned)
    }
}
