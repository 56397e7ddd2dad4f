// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across collaborator traits and the Licensa crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::error::LicensaError;

/// Parses a `shard.realm.num` entity identifier.
fn parse_entity_id(s: &str, label: &str) -> Result<(u64, u64, u64), LicensaError> {
    let invalid = || LicensaError::Decode(format!("invalid {label} id `{s}`"));
    let mut parts = s.trim().split('.');
    let mut next = || -> Result<u64, LicensaError> {
        parts
            .next()
            .and_then(|p| p.parse::<u64>().ok())
            .ok_or_else(invalid)
    };
    let shard = next()?;
    let realm = next()?;
    let num = next()?;
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok((shard, realm, num))
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name {
            pub shard: u64,
            pub realm: u64,
            pub num: u64,
        }

        impl $name {
            pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
                Self { shard, realm, num }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
            }
        }

        impl FromStr for $name {
            type Err = LicensaError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (shard, realm, num) = parse_entity_id(s, $label)?;
                Ok(Self { shard, realm, num })
            }
        }

        impl TryFrom<String> for $name {
            type Error = LicensaError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

entity_id!(
    /// A ledger account (payer, operator, treasury, license holder).
    AccountId,
    "account"
);
entity_id!(
    /// A consensus topic, i.e. one append-only log.
    TopicId,
    "topic"
);
entity_id!(
    /// A token class; license NFTs are serials of one token.
    TokenId,
    "token"
);

/// Consensus timestamp as reported by the mirror: `<seconds>.<nanos>`.
///
/// Ordered numerically. Wire strings with fewer than nine fractional digits
/// are right-padded, so `"5.1"` is 5.100000000.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ConsensusTimestamp {
    seconds: u64,
    nanos: u32,
}

impl ConsensusTimestamp {
    pub fn new(seconds: u64, nanos: u32) -> Result<Self, LicensaError> {
        if nanos >= 1_000_000_000 {
            return Err(LicensaError::Decode(format!(
                "timestamp nanos out of range: {nanos}"
            )));
        }
        Ok(Self { seconds, nanos })
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Converts to a wall-clock time, `None` if out of chrono's range.
    pub fn to_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let secs = i64::try_from(self.seconds).ok()?;
        chrono::DateTime::from_timestamp(secs, self.nanos)
    }

    pub fn from_datetime(at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            seconds: u64::try_from(at.timestamp()).unwrap_or(0),
            nanos: at.timestamp_subsec_nanos().min(999_999_999),
        }
    }
}

impl fmt::Display for ConsensusTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl FromStr for ConsensusTimestamp {
    type Err = LicensaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LicensaError::Decode(format!("invalid consensus timestamp `{s}`"));
        let (secs, frac) = s.trim().split_once('.').unwrap_or((s.trim(), ""));
        let seconds = secs.parse::<u64>().map_err(|_| invalid())?;
        if frac.len() > 9 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let nanos = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<9}").parse::<u32>().map_err(|_| invalid())?
        };
        Self::new(seconds, nanos)
    }
}

impl TryFrom<String> for ConsensusTimestamp {
    type Error = LicensaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConsensusTimestamp> for String {
    fn from(value: ConsensusTimestamp) -> Self {
        value.to_string()
    }
}

/// Consensus order requested from the read API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Multi-part metadata attached to a chunked log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    /// Account that initiated the first chunk's transaction.
    pub initiating_id: String,
    /// Total number of parts in the submission.
    pub total_parts: u32,
    /// One-indexed position of this part.
    pub part_index: u32,
}

impl ChunkInfo {
    /// Single-part submissions also carry chunk info; only `total > 1` needs grouping.
    pub fn is_multi_part(&self) -> bool {
        self.total_parts > 1
    }
}

/// One entry as fetched from the read API, payload still base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogEntry {
    pub sequence_number: u64,
    pub consensus_timestamp: ConsensusTimestamp,
    pub payload_base64: String,
    pub chunk_info: Option<ChunkInfo>,
}

/// One page of raw entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub entries: Vec<RawLogEntry>,
    /// Opaque continuation link from the read API, if more entries exist.
    pub next: Option<String>,
}

impl MessagePage {
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

/// Application-level message type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    LicenseCreation,
    ProjectCreation,
    SubscriptionCreated,
    ChatQa,
    /// Any other tag, kept verbatim.
    Other(String),
}

impl MessageKind {
    /// Tags produced by the product itself.
    pub const KNOWN_TAGS: [&'static str; 4] = [
        "license-creation",
        "project-creation",
        "subscription-created",
        "chat-qa",
    ];

    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::LicenseCreation => "license-creation",
            MessageKind::ProjectCreation => "project-creation",
            MessageKind::SubscriptionCreated => "subscription-created",
            MessageKind::ChatQa => "chat-qa",
            MessageKind::Other(tag) => tag,
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "license-creation" => MessageKind::LicenseCreation,
            "project-creation" => MessageKind::ProjectCreation,
            "subscription-created" => MessageKind::SubscriptionCreated,
            "chat-qa" => MessageKind::ChatQa,
            other => MessageKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for MessageKind {
    fn from(value: String) -> Self {
        MessageKind::from_tag(&value)
    }
}

impl From<MessageKind> for String {
    fn from(value: MessageKind) -> Self {
        value.as_str().to_string()
    }
}

/// A fully reconstructed and decoded application message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedMessage {
    pub kind: MessageKind,
    pub timestamp: ConsensusTimestamp,
    pub sequence_number: u64,
    /// The decoded JSON object, including its `type` field.
    pub content: Map<String, Value>,
}

impl DecodedMessage {
    /// Sort key: consensus time, ties broken by sequence number.
    pub fn ordering_key(&self) -> (ConsensusTimestamp, u64) {
        (self.timestamp, self.sequence_number)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    /// Reads an unsigned integer that may be encoded as a number or a numeric string.
    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.content.get(key).and_then(value_as_u64)
    }

    /// Usage quota carried by the message, top-level or under `metadata`.
    pub fn usage_quota(&self) -> Option<u64> {
        self.u64_field("usageQuota").or_else(|| {
            self.content
                .get("metadata")
                .and_then(|m| m.get("usageQuota"))
                .and_then(value_as_u64)
        })
    }
}

/// Lenient numeric read used for fields written by several client versions.
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Execution status reported by a mutating ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
    Success,
    Failed,
    /// Precondition already satisfied: the account holds the token association.
    TokenAlreadyAssociated,
    /// Any other status code, kept verbatim.
    Other(String),
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::TokenAlreadyAssociated => "TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT",
            ExecutionStatus::Other(code) => code,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ExecutionStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => ExecutionStatus::Success,
            "FAILED" | "FAILURE" => ExecutionStatus::Failed,
            "TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT" | "ALREADY_ASSOCIATED" => {
                ExecutionStatus::TokenAlreadyAssociated
            }
            _ => ExecutionStatus::Other(value),
        }
    }
}

impl From<ExecutionStatus> for String {
    fn from(value: ExecutionStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Result of minting one license NFT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub token_id: TokenId,
    pub serial_number: u64,
}

/// A frozen but unsigned transfer transaction, ready for a wallet signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub transaction_id: String,
    pub payer: AccountId,
    pub payee: AccountId,
    pub amount_tinybar: u64,
    pub memo: String,
    /// Serialized transaction body, exactly as it must be signed.
    pub bytes: Vec<u8>,
}

/// Outcome of submitting a signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub transaction_id: String,
    pub status: ExecutionStatus,
}
