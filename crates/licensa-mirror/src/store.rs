// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cached reconstruction pipeline: fetch, reassemble, decode.

use std::sync::Arc;
use std::time::Duration;

use licensa_config::model::{CacheConfig, MirrorConfig};
use licensa_core::{DecodedMessage, LicensaError, MirrorReader, SortOrder, TopicId};
use tracing::{debug, info};

use crate::cache::MessageCache;
use crate::chunk::reassemble;
use crate::client::MAX_PAGE_SIZE;
use crate::decode::decode_all;

/// Per-topic message source used by projections and workflows.
///
/// A cache hit skips the whole pipeline. Only successful reconstructions are
/// cached; a failed fetch leaves any previous entry untouched.
#[derive(Clone)]
pub struct TopicMessageStore {
    reader: Arc<dyn MirrorReader>,
    cache: Arc<MessageCache>,
    page_size: u32,
}

impl TopicMessageStore {
    pub fn new(reader: Arc<dyn MirrorReader>, cache: Arc<MessageCache>, page_size: u32) -> Self {
        Self {
            reader,
            cache,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Builds a store with a fresh cache sized from the `[mirror]` and `[cache]` sections.
    pub fn from_config(
        reader: Arc<dyn MirrorReader>,
        mirror: &MirrorConfig,
        cache: &CacheConfig,
    ) -> Self {
        let cache = MessageCache::new(Duration::from_secs(cache.ttl_secs));
        Self::new(reader, Arc::new(cache), mirror.page_size)
    }

    /// The underlying reader, for the sibling association/ownership queries.
    pub fn reader(&self) -> &Arc<dyn MirrorReader> {
        &self.reader
    }

    pub fn cache(&self) -> &Arc<MessageCache> {
        &self.cache
    }

    /// Decoded messages of `topic` in consensus order.
    pub async fn messages(&self, topic: &TopicId) -> Result<Arc<[DecodedMessage]>, LicensaError> {
        if let Some(hit) = self.cache.get(topic) {
            debug!(topic = %topic, count = hit.len(), "message cache hit");
            return Ok(hit);
        }
        let messages = self.reconstruct(topic).await?;
        self.cache.insert(*topic, Arc::clone(&messages));
        Ok(messages)
    }

    /// Drops any cached set for `topic` and reconstructs it from the mirror.
    pub async fn refresh(&self, topic: &TopicId) -> Result<Arc<[DecodedMessage]>, LicensaError> {
        self.cache.invalidate(topic);
        self.messages(topic).await
    }

    /// Reconstructs `topic` from the mirror and drops any cached set, without
    /// caching the result.
    ///
    /// For reads that confirm a fresh write: a set that does not show the write
    /// yet should not be served to other readers for a whole TTL.
    pub async fn fetch_uncached(
        &self,
        topic: &TopicId,
    ) -> Result<Arc<[DecodedMessage]>, LicensaError> {
        self.cache.invalidate(topic);
        self.reconstruct(topic).await
    }

    /// Caches a set obtained from [`Self::fetch_uncached`].
    pub fn remember(&self, topic: TopicId, messages: Arc<[DecodedMessage]>) {
        self.cache.insert(topic, messages);
    }

    /// Drops the cached set so the next read refetches.
    pub fn invalidate(&self, topic: &TopicId) {
        if self.cache.invalidate(topic) {
            debug!(topic = %topic, "message cache invalidated");
        }
    }

    async fn reconstruct(&self, topic: &TopicId) -> Result<Arc<[DecodedMessage]>, LicensaError> {
        let page = self
            .reader
            .fetch_messages(topic, self.page_size, SortOrder::Asc)
            .await?;
        if page.has_more() {
            // Only the first page is read; later entries stay invisible until paging lands.
            debug!(topic = %topic, page_size = self.page_size, "topic has more entries than one page");
        }

        let payloads = reassemble(&page.entries);
        let messages = decode_all(&payloads);
        info!(
            topic = %topic,
            entries = page.entries.len(),
            payloads = payloads.len(),
            messages = messages.len(),
            "topic messages reconstructed"
        );
        Ok(Arc::from(messages))
    }
}
