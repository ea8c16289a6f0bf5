//! Process-wide row cache for spreadsheet reads.
//!
//! Entries are keyed by `(sheet, purpose)` so independent readers of the same
//! sheet never share a slot. An entry dies on TTL expiry or explicit
//! invalidation, never at job boundaries.

use crate::clock::Clock;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

pub type RowMatrix = Vec<Vec<String>>;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub sheet: String,
    pub purpose: String,
}

impl CacheKey {
    pub fn new(sheet: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            purpose: purpose.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.purpose, self.sheet)
    }
}

struct CacheEntry {
    rows: Arc<RowMatrix>,
    stored_at: DateTime<Local>,
}

pub struct RowCache {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl RowCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached rows when the entry is younger than the TTL.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<RowMatrix>> {
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        let age = now.signed_duration_since(entry.stored_at);
        let fresh = age
            .to_std()
            .map(|age| age < self.ttl)
            // stored in the future (clock moved back): treat as fresh
            .unwrap_or(true);
        if fresh {
            debug!("Cache hit: {key}");
            Some(entry.rows.clone())
        } else {
            None
        }
    }

    pub fn put(&self, key: CacheKey, rows: RowMatrix) -> Arc<RowMatrix> {
        let rows = Arc::new(rows);
        let entry = CacheEntry {
            rows: rows.clone(),
            stored_at: self.clock.now(),
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, entry);
        rows
    }

    /// Drops every purpose slot that belongs to `sheet`.
    pub fn invalidate_sheet(&self, sheet: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|key, _| key.sheet != sheet);
    }
}
