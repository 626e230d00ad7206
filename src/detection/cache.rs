//! Content-hash keyed memo of detection results.
//!
//! Expired entries are invisible to readers immediately and reclaimed lazily:
//! a reader that finds a stale entry removes it only if the write lock is
//! free, and a writer at capacity purges every stale entry before evicting
//! the oldest live one. Nothing runs in the background.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::DetectionResult;

type Key = [u8; 32];

struct Entry {
    result: DetectionResult,
    created: Instant,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries currently stored, including expired ones not yet reclaimed
    pub entries: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing live
    pub misses: u64,
}

pub(crate) struct DetectionCache {
    capacity: usize,
    ttl: Duration,
    entries: RwLock<HashMap<Key, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DetectionCache {
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: RwLock::new(HashMap::with_capacity(capacity.min(4096))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A sample cut from longer input may end mid-character, which changes
    /// how it is judged, so the cut flag is part of the key.
    pub(crate) fn key(sample: &[u8], truncated: bool) -> Key {
        let mut hasher = Sha256::new();
        hasher.update([u8::from(truncated)]);
        hasher.update(sample);
        hasher.finalize().into()
    }

    pub(crate) fn get(&self, key: &Key) -> Option<DetectionResult> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn put(&self, key: Key, result: DetectionResult) {
        self.put_at(key, result, Instant::now());
    }

    fn is_live(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.created) < self.ttl
    }

    fn get_at(&self, key: &Key, now: Instant) -> Option<DetectionResult> {
        let stale = {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if self.is_live(entry, now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.result.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if stale {
            // Never wait on writers or other readers for cleanup.
            if let Some(mut entries) = self.entries.try_write() {
                let still_stale = entries
                    .get(key)
                    .is_some_and(|entry| !self.is_live(entry, now));
                if still_stale {
                    entries.remove(key);
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn put_at(&self, key: Key, result: DetectionResult, now: Instant) {
        let mut entries = self.entries.write();

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.retain(|_, entry| now.saturating_duration_since(entry.created) < self.ttl);

            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.created)
                    .map(|(key, _)| *key);
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            Entry {
                result,
                created: now,
            },
        );
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
