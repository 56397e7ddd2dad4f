// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end workflow tests.
//!
//! `TestHarness` wires a [`MockLedger`], a [`MockMirror`] over the same
//! state, a [`MockSigner`], and a real [`TopicMessageStore`], together with a
//! config that names an operator, a treasury, and two plans.

use std::sync::Arc;

use licensa_config::model::{LicensaConfig, PlanConfig};
use licensa_core::{AccountId, TopicId};
use licensa_mirror::TopicMessageStore;
use serde_json::Value;

use crate::ledger::{LedgerState, MockLedger, SharedLedgerState};
use crate::mirror::MockMirror;
use crate::signer::MockSigner;

pub const OPERATOR: AccountId = AccountId::new(0, 0, 2);
pub const TREASURY: AccountId = AccountId::new(0, 0, 98);
/// The account licenses are issued to in tests.
pub const HOLDER: AccountId = AccountId::new(0, 0, 4242);

/// A complete in-memory environment.
pub struct TestHarness {
    pub state: SharedLedgerState,
    pub ledger: Arc<MockLedger>,
    pub mirror: Arc<MockMirror>,
    pub signer: Arc<MockSigner>,
    pub store: TopicMessageStore,
    pub config: LicensaConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Self::default_config())
    }

    /// Builds the environment around `config`. Identities that are missing
    /// from it fall back to the harness constants for the mock ledger.
    pub fn with_config(config: LicensaConfig) -> Self {
        let state = LedgerState::shared();
        let operator = config.ledger.operator_account_id.unwrap_or(OPERATOR);
        let treasury = config.ledger.treasury_account_id.unwrap_or(TREASURY);
        let ledger = Arc::new(MockLedger::new(state.clone(), operator, treasury));
        let mirror = Arc::new(MockMirror::new(state.clone()));
        let store = TopicMessageStore::from_config(mirror.clone(), &config.mirror, &config.cache);

        Self {
            state,
            ledger,
            mirror,
            signer: Arc::new(MockSigner::new()),
            store,
            config,
        }
    }

    /// Operator and treasury set, plans `basic` and `pro`.
    pub fn default_config() -> LicensaConfig {
        let mut config = LicensaConfig::default();
        config.ledger.operator_account_id = Some(OPERATOR);
        config.ledger.treasury_account_id = Some(TREASURY);
        config.plans = vec![
            PlanConfig {
                name: "basic".into(),
                price_tinybar: 5_000_000_000,
                price_usd: 9.99,
                price_hsuite: 100.0,
                project_limit: 3,
                message_limit: 500,
                duration_days: 30,
            },
            PlanConfig {
                name: "pro".into(),
                price_tinybar: 20_000_000_000,
                price_usd: 29.99,
                price_hsuite: 400.0,
                project_limit: 20,
                message_limit: 5_000,
                duration_days: 30,
            },
        ];
        config
    }

    /// Creates a topic pre-filled with `messages`.
    pub async fn seed_topic(&self, messages: &[Value]) -> TopicId {
        self.ledger.seed_topic(messages).await
    }

    /// Current owner of an NFT serial according to the ledger itself.
    pub async fn owner_of(&self, token: licensa_core::TokenId, serial: u64) -> Option<AccountId> {
        self.state.lock().await.nft_owners.get(&(token, serial)).copied()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn seeded_topic_reads_back_through_store() {
        let harness = TestHarness::new();
        let topic = harness
            .seed_topic(&[json!({"type": "project-creation", "projectName": "p"})])
            .await;
        let messages = harness.store.messages(&topic).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].str_field("projectName"), Some("p"));
    }

    #[tokio::test]
    async fn long_submissions_reassemble() {
        let harness = TestHarness::new();
        let answer = "z".repeat(3000);
        let topic = harness
            .seed_topic(&[json!({"type": "chat-qa", "question": "q", "answer": answer})])
            .await;
        let messages = harness.store.messages(&topic).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].str_field("answer").map(str::len), Some(3000));
    }
}
