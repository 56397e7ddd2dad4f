// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory read replica over a [`LedgerState`].

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use licensa_core::{
    AccountId, LicensaError, MessagePage, MirrorReader, SortOrder, TokenId, TopicId,
};
use tokio::sync::Mutex;

use crate::ledger::{LedgerState, SharedLedgerState};

/// Serves what the shared ledger holds, optionally lagging behind it.
pub struct MockMirror {
    state: SharedLedgerState,
    fetches: AtomicUsize,
    lag: AtomicUsize,
    failing_fetches: Mutex<usize>,
}

impl MockMirror {
    pub fn new(state: SharedLedgerState) -> Self {
        Self {
            state,
            fetches: AtomicUsize::new(0),
            lag: AtomicUsize::new(0),
            failing_fetches: Mutex::new(0),
        }
    }

    /// Number of `fetch_messages` calls so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Hides the newest `entries` log entries of every topic from fetches.
    pub fn set_lag(&self, entries: usize) {
        self.lag.store(entries, Ordering::SeqCst);
    }

    /// Makes the next `count` fetches fail with a transient error.
    pub async fn fail_fetches(&self, count: usize) {
        *self.failing_fetches.lock().await = count;
    }

    fn page(&self, state: &LedgerState, topic: &TopicId, page_size: u32, order: SortOrder) -> MessagePage {
        let Some(log) = state.topics.get(topic) else {
            return MessagePage::default();
        };
        let visible = log.len().saturating_sub(self.lag.load(Ordering::SeqCst));
        let mut entries = log[..visible].to_vec();
        if order == SortOrder::Desc {
            entries.reverse();
        }

        let limit = page_size.max(1) as usize;
        let next = (entries.len() > limit).then(|| {
            let last = entries[limit - 1].sequence_number;
            let op = if order == SortOrder::Asc { "gt" } else { "lt" };
            format!("/api/v1/topics/{topic}/messages?limit={limit}&sequencenumber={op}:{last}")
        });
        entries.truncate(limit);
        MessagePage { entries, next }
    }
}

#[async_trait]
impl MirrorReader for MockMirror {
    async fn fetch_messages(
        &self,
        topic: &TopicId,
        page_size: u32,
        order: SortOrder,
    ) -> Result<MessagePage, LicensaError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        {
            let mut failing = self.failing_fetches.lock().await;
            if *failing > 0 {
                *failing -= 1;
                return Err(LicensaError::TransientNetwork {
                    message: "mirror returned 503".into(),
                    source: None,
                });
            }
        }
        let state = self.state.lock().await;
        Ok(self.page(&state, topic, page_size, order))
    }

    async fn is_token_associated(
        &self,
        account: &AccountId,
        token: &TokenId,
    ) -> Result<bool, LicensaError> {
        Ok(self.state.lock().await.associations.contains(&(*account, *token)))
    }

    async fn nft_owner(
        &self,
        token: &TokenId,
        serial_number: u64,
    ) -> Result<Option<AccountId>, LicensaError> {
        Ok(self
            .state
            .lock()
            .await
            .nft_owners
            .get(&(*token, serial_number))
            .copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedger;
    use licensa_core::LedgerOperations;
    use serde_json::json;

    #[tokio::test]
    async fn submitted_messages_visible_on_next_fetch() {
        let state = LedgerState::shared();
        let ledger = MockLedger::new(state.clone(), AccountId::new(0, 0, 2), AccountId::new(0, 0, 3));
        let mirror = MockMirror::new(state);

        let topic = ledger.create_topic("t").await.unwrap();
        assert!(mirror.fetch_messages(&topic, 100, SortOrder::Asc).await.unwrap().entries.is_empty());

        ledger.submit_message(&topic, &json!({"type": "chat-qa"}).to_string()).await.unwrap();
        let page = mirror.fetch_messages(&topic, 100, SortOrder::Asc).await.unwrap();
        assert_eq!(page.entries.len(), 1);
        assert!(!page.has_more());
    }

    #[tokio::test]
    async fn lag_and_paging() {
        let state = LedgerState::shared();
        let ledger = MockLedger::new(state.clone(), AccountId::new(0, 0, 2), AccountId::new(0, 0, 3));
        let mirror = MockMirror::new(state);
        let topic = ledger
            .seed_topic(&[json!({"n": 1}), json!({"n": 2}), json!({"n": 3})])
            .await;

        let page = mirror.fetch_messages(&topic, 2, SortOrder::Asc).await.unwrap();
        assert_eq!(page.entries.len(), 2);
        assert!(page.has_more());

        mirror.set_lag(1);
        let page = mirror.fetch_messages(&topic, 100, SortOrder::Desc).await.unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].sequence_number, 2);
    }

    #[tokio::test]
    async fn scripted_fetch_failures_are_transient() {
        let mirror = MockMirror::new(LedgerState::shared());
        mirror.fail_fetches(1).await;
        let topic = TopicId::new(0, 0, 1);
        assert!(mirror.fetch_messages(&topic, 10, SortOrder::Asc).await.unwrap_err().is_transient());
        assert!(mirror.fetch_messages(&topic, 10, SortOrder::Asc).await.is_ok());
        assert_eq!(mirror.fetches(), 2);
    }
}
