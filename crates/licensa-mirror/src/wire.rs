// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mirror node REST response shapes.

use licensa_core::{ChunkInfo, ConsensusTimestamp, RawLogEntry};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// `GET /api/v1/topics/{id}/messages`
///
/// Messages stay untyped here so one malformed entry cannot fail the page.
#[derive(Debug, Deserialize)]
pub(crate) struct TopicMessagesResponse {
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub links: Links,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Links {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    sequence_number: u64,
    consensus_timestamp: ConsensusTimestamp,
    message: String,
    #[serde(default)]
    chunk_info: Option<WireChunkInfo>,
}

#[derive(Debug, Deserialize)]
struct WireChunkInfo {
    initial_transaction_id: InitialTransactionId,
    number: u32,
    total: u32,
}

/// Older mirror versions render the id as `0.0.123-1700000000-000000000`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InitialTransactionId {
    Structured { account_id: String },
    Plain(String),
}

impl InitialTransactionId {
    /// The initiating account. Valid-start and nonce are deliberately not part
    /// of the grouping key, see `chunk::ChunkKey`.
    fn initiating_id(self) -> String {
        match self {
            InitialTransactionId::Structured { account_id } => account_id,
            InitialTransactionId::Plain(id) => match id.split_once('-') {
                Some((account, _)) => account.to_string(),
                None => id,
            },
        }
    }
}

/// Converts one untyped message, logging and skipping entries that do not fit.
pub(crate) fn to_raw_entry(value: Value) -> Option<RawLogEntry> {
    let msg: WireMessage = match serde_json::from_value(value) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "skipping malformed mirror message");
            return None;
        }
    };
    Some(RawLogEntry {
        sequence_number: msg.sequence_number,
        consensus_timestamp: msg.consensus_timestamp,
        payload_base64: msg.message,
        chunk_info: msg.chunk_info.map(|c| ChunkInfo {
            initiating_id: c.initial_transaction_id.initiating_id(),
            total_parts: c.total,
            part_index: c.number,
        }),
    })
}

/// `GET /api/v1/accounts/{id}/tokens`
#[derive(Debug, Deserialize)]
pub(crate) struct AccountTokensResponse {
    #[serde(default)]
    pub tokens: Vec<TokenRelationship>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenRelationship {
    pub token_id: String,
}

/// `GET /api/v1/tokens/{id}/nfts/{serial}`
#[derive(Debug, Deserialize)]
pub(crate) struct NftResponse {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_chunk_info_maps_to_account() {
        let entry = to_raw_entry(json!({
            "sequence_number": 4,
            "consensus_timestamp": "1700000000.000000004",
            "message": "e30=",
            "chunk_info": {
                "initial_transaction_id": {
                    "account_id": "0.0.77",
                    "nonce": 0,
                    "scheduled": false,
                    "transaction_valid_start": "1699999999.000000000"
                },
                "number": 2,
                "total": 3
            }
        }))
        .unwrap();
        let chunk = entry.chunk_info.unwrap();
        assert_eq!(chunk.initiating_id, "0.0.77");
        assert_eq!(chunk.part_index, 2);
        assert_eq!(chunk.total_parts, 3);
    }

    #[test]
    fn plain_transaction_id_maps_to_account() {
        let entry = to_raw_entry(json!({
            "sequence_number": 1,
            "consensus_timestamp": "1700000000.000000001",
            "message": "e30=",
            "chunk_info": {
                "initial_transaction_id": "0.0.9-1699999999-000000000",
                "number": 1,
                "total": 2
            }
        }))
        .unwrap();
        assert_eq!(entry.chunk_info.unwrap().initiating_id, "0.0.9");
    }

    #[test]
    fn malformed_message_is_skipped() {
        assert!(to_raw_entry(json!({"sequence_number": "x"})).is_none());
        assert!(
            to_raw_entry(json!({
                "sequence_number": 1,
                "consensus_timestamp": "not-a-time",
                "message": "e30="
            }))
            .is_none()
        );
    }
}
