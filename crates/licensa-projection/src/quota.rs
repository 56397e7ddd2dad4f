// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage quota projection.

use licensa_config::model::QuotaConfig;
use licensa_core::{ConsensusTimestamp, DecodedMessage, MessageKind};
use serde::Serialize;
use tracing::debug;

/// Bootstrap rules for topics that have not recorded a quota yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub bootstrap_quota: u64,
    pub bootstrap_max_messages: usize,
}

impl QuotaPolicy {
    pub fn from_config(config: &QuotaConfig) -> Self {
        Self {
            bootstrap_quota: config.bootstrap_quota,
            bootstrap_max_messages: config.bootstrap_max_messages,
        }
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self::from_config(&QuotaConfig::default())
    }
}

/// Where a projected quota came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum QuotaSource {
    /// Read from a message on the log.
    Recorded {
        kind: MessageKind,
        timestamp: ConsensusTimestamp,
        sequence_number: u64,
    },
    /// No record yet on a near-empty log; the configured default applies.
    Bootstrap,
}

/// Remaining usage quota for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaView {
    pub remaining: u64,
    #[serde(flatten)]
    pub source: QuotaSource,
}

impl QuotaView {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Current quota: the most recent message carrying `usageQuota` wins.
///
/// Any message kind may carry it, either top-level or under `metadata`. A log
/// without any quota record gets the bootstrap quota only while it holds at
/// most `bootstrap_max_messages` messages; past that, the answer is `None`.
pub fn project_quota(messages: &[DecodedMessage], policy: &QuotaPolicy) -> Option<QuotaView> {
    let recorded = messages
        .iter()
        .filter_map(|m| m.usage_quota().map(|q| (m, q)))
        .max_by_key(|(m, _)| m.ordering_key());

    if let Some((message, remaining)) = recorded {
        return Some(QuotaView {
            remaining,
            source: QuotaSource::Recorded {
                kind: message.kind.clone(),
                timestamp: message.timestamp,
                sequence_number: message.sequence_number,
            },
        });
    }

    if messages.len() <= policy.bootstrap_max_messages {
        debug!(
            messages = messages.len(),
            quota = policy.bootstrap_quota,
            "no quota record yet, using bootstrap quota"
        );
        return Some(QuotaView {
            remaining: policy.bootstrap_quota,
            source: QuotaSource::Bootstrap,
        });
    }
    None
}
