// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-lived per-topic cache of reconstructed message sets.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use licensa_core::{DecodedMessage, TopicId};
use tokio::time::Instant;
use tracing::debug;

/// Default lifetime of a cached message set.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct CacheEntry {
    messages: Arc<[DecodedMessage]>,
    expires_at: Instant,
}

/// Topic id -> last successfully reconstructed message set, with expiry.
///
/// Expiry uses `tokio::time::Instant`, so paused-clock tests control it.
#[derive(Debug)]
pub struct MessageCache {
    ttl: Duration,
    entries: RwLock<HashMap<TopicId, CacheEntry>>,
}

impl MessageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached set if present and not yet expired.
    pub fn get(&self, topic: &TopicId) -> Option<Arc<[DecodedMessage]>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(topic) {
                Some(entry) if entry.expires_at > now => return Some(Arc::clone(&entry.messages)),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: evict so the map does not grow with dead topics.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.get(topic).is_some_and(|e| e.expires_at <= now) {
            entries.remove(topic);
            debug!(topic = %topic, "cache entry expired");
        }
        None
    }

    pub fn insert(&self, topic: TopicId, messages: Arc<[DecodedMessage]>) {
        let entry = CacheEntry {
            messages,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic, entry);
    }

    /// Drops the entry for `topic`. Returns true if one was present.
    pub fn invalidate(&self, topic: &TopicId) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic)
            .is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
