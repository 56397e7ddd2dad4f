// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed views over the record kinds the product writes.
//!
//! Records were written by several client versions, so field reads are
//! lenient: numbers may arrive as strings, optional fields may be missing.
//! A record missing a field its view cannot do without is skipped with a
//! warning rather than failing the projection.

use chrono::{DateTime, Utc};
use licensa_core::{
    AccountId, ConsensusTimestamp, DecodedMessage, MessageKind, TokenId, TopicId,
    types::value_as_u64,
};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::project::{chronological, latest, of_kind};

/// The license recorded on a license topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseView {
    pub token_id: TokenId,
    pub serial_number: u64,
    /// Wall-clock time written by the issuer, verbatim.
    pub issued_at: Option<String>,
    pub recorded_at: ConsensusTimestamp,
}

impl LicenseView {
    pub fn from_message(message: &DecodedMessage) -> Option<Self> {
        let token_id = match message.str_field("tokenId").map(str::parse::<TokenId>) {
            Some(Ok(id)) => id,
            Some(Err(e)) => {
                warn!(sequence = message.sequence_number, error = %e, "license record with bad token id");
                return None;
            }
            None => {
                warn!(sequence = message.sequence_number, "license record without token id");
                return None;
            }
        };
        let Some(serial_number) = message.u64_field("serialNumber") else {
            warn!(sequence = message.sequence_number, "license record without serial number");
            return None;
        };
        Some(Self {
            token_id,
            serial_number,
            issued_at: message.str_field("timestamp").map(str::to_string),
            recorded_at: message.timestamp,
        })
    }

    /// Latest license record on the log.
    pub fn project(messages: &[DecodedMessage]) -> Option<Self> {
        latest(messages, &MessageKind::LicenseCreation).and_then(Self::from_message)
    }
}

/// The current subscription on a topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionView {
    pub subscription_id: Option<String>,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub project_limit: Option<u64>,
    pub message_limit: Option<u64>,
    pub price_usd: Option<f64>,
    pub price_hsuite: Option<f64>,
    pub recorded_at: ConsensusTimestamp,
}

impl SubscriptionView {
    pub fn from_message(message: &DecodedMessage) -> Self {
        Self {
            subscription_id: message.str_field("subscriptionId").map(str::to_string),
            status: message
                .str_field("status")
                .unwrap_or("unknown")
                .to_ascii_lowercase(),
            expires_at: message.content.get("expiresAt").and_then(parse_instant),
            project_limit: message.u64_field("projectLimit"),
            message_limit: message.u64_field("messageLimit"),
            price_usd: message.content.get("priceUSD").and_then(value_as_f64),
            price_hsuite: message.content.get("priceHSuite").and_then(value_as_f64),
            recorded_at: message.timestamp,
        }
    }

    /// Latest subscription record on the log.
    pub fn project(messages: &[DecodedMessage]) -> Option<Self> {
        latest(messages, &MessageKind::SubscriptionCreated).map(Self::from_message)
    }

    /// Active means status `active` and an expiry strictly after `now`.
    ///
    /// A record without a readable expiry is never active.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == "active" && self.expires_at.is_some_and(|at| at > now)
    }
}

/// One project created under an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectView {
    pub project_topic_id: Option<TopicId>,
    pub name: String,
    pub owner_account_id: Option<AccountId>,
    pub created_at: Option<String>,
    pub usage_quota: Option<u64>,
    pub recorded_at: ConsensusTimestamp,
}

impl ProjectView {
    pub fn from_message(message: &DecodedMessage) -> Option<Self> {
        let Some(name) = message.str_field("projectName") else {
            warn!(sequence = message.sequence_number, "project record without a name");
            return None;
        };
        Some(Self {
            project_topic_id: message
                .str_field("projectTopicId")
                .and_then(|s| s.parse().ok()),
            name: name.to_string(),
            owner_account_id: message
                .str_field("ownerAccountId")
                .and_then(|s| s.parse().ok()),
            created_at: message.str_field("createdAt").map(str::to_string),
            usage_quota: message.u64_field("usageQuota"),
            recorded_at: message.timestamp,
        })
    }

    /// All project records, oldest first.
    pub fn project_all(messages: &[DecodedMessage]) -> Vec<Self> {
        of_kind(messages, &MessageKind::ProjectCreation)
            .into_iter()
            .filter_map(Self::from_message)
            .collect()
    }
}

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRecord {
    pub question: String,
    pub answer: String,
    pub timestamp: Option<String>,
    pub usage_quota: Option<u64>,
    pub recorded_at: ConsensusTimestamp,
}

impl ChatRecord {
    /// Reads either the flat `chat-qa` shape or the agent-protocol shape
    /// (`input.message`, `output.message`, `metadata.*`).
    pub fn from_message(message: &DecodedMessage) -> Option<Self> {
        if message.kind == MessageKind::ChatQa {
            if let (Some(question), Some(answer)) =
                (message.str_field("question"), message.str_field("answer"))
            {
                return Some(Self {
                    question: question.to_string(),
                    answer: answer.to_string(),
                    timestamp: message.str_field("timestamp").map(str::to_string),
                    usage_quota: message.usage_quota(),
                    recorded_at: message.timestamp,
                });
            }
        }

        let nested = |outer: &str, inner: &str| {
            message
                .content
                .get(outer)
                .and_then(|v| v.get(inner))
                .and_then(Value::as_str)
        };
        let question = nested("input", "message")?;
        let answer = nested("output", "message")?;
        Some(Self {
            question: question.to_string(),
            answer: answer.to_string(),
            timestamp: nested("metadata", "timestamp").map(str::to_string),
            usage_quota: message.usage_quota(),
            recorded_at: message.timestamp,
        })
    }

    /// Every chat exchange on the log, oldest first.
    pub fn history(messages: &[DecodedMessage]) -> Vec<Self> {
        chronological(messages)
            .into_iter()
            .filter_map(Self::from_message)
            .collect()
    }
}

/// Accepts RFC 3339 strings or epoch milliseconds.
fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(_) => value_as_u64(value)
            .and_then(|ms| i64::try_from(ms).ok())
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::tests::msg;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn license_view_reads_latest_record() {
        let messages = vec![
            msg(1, 1, json!({"type": "license-creation", "tokenId": "0.0.900", "serialNumber": 1})),
            msg(2, 2, json!({
                "type": "license-creation",
                "tokenId": "0.0.900",
                "serialNumber": "2",
                "timestamp": "2024-05-01T00:00:00Z"
            })),
        ];
        let view = LicenseView::project(&messages).unwrap();
        assert_eq!(view.token_id, TokenId::new(0, 0, 900));
        assert_eq!(view.serial_number, 2);
        assert_eq!(view.issued_at.as_deref(), Some("2024-05-01T00:00:00Z"));
    }

    #[test]
    fn license_view_skips_incomplete_record() {
        let messages = vec![msg(1, 1, json!({"type": "license-creation", "tokenId": "junk"}))];
        assert!(LicenseView::project(&messages).is_none());
    }

    #[test]
    fn subscription_activity_depends_on_status_and_expiry() {
        let messages = vec![msg(5, 1, json!({
            "type": "subscription-created",
            "subscriptionId": "sub-1",
            "expiresAt": "2025-01-31T00:00:00Z",
            "projectLimit": 5,
            "messageLimit": "1000",
            "priceUSD": 19.99,
            "priceHSuite": "250",
            "status": "ACTIVE",
        }))];
        let view = SubscriptionView::project(&messages).unwrap();
        assert_eq!(view.message_limit, Some(1000));
        assert_eq!(view.price_hsuite, Some(250.0));

        let before = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        assert!(view.is_active(before));
        assert!(!view.is_active(after));

        let mut cancelled = view.clone();
        cancelled.status = "cancelled".into();
        assert!(!cancelled.is_active(before));
    }

    #[test]
    fn subscription_expiry_accepts_epoch_millis() {
        let messages = vec![msg(5, 1, json!({
            "type": "subscription-created",
            "expiresAt": 1_735_689_600_000u64,
            "status": "active",
        }))];
        let view = SubscriptionView::project(&messages).unwrap();
        assert_eq!(
            view.expires_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn subscription_without_expiry_is_inactive() {
        let messages = vec![msg(5, 1, json!({"type": "subscription-created", "status": "active"}))];
        let view = SubscriptionView::project(&messages).unwrap();
        assert!(!view.is_active(Utc::now()));
    }

    #[test]
    fn projects_listed_oldest_first() {
        let messages = vec![
            msg(2, 2, json!({
                "type": "project-creation",
                "projectName": "beta",
                "projectTopicId": "0.0.77",
                "ownerAccountId": "0.0.42"
            })),
            msg(1, 1, json!({"type": "project-creation", "projectName": "alpha", "usageQuota": 25})),
            msg(3, 3, json!({"type": "project-creation"})),
        ];
        let projects = ProjectView::project_all(&messages);
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].name, "alpha");
        assert_eq!(projects[0].usage_quota, Some(25));
        assert_eq!(projects[1].project_topic_id, Some(TopicId::new(0, 0, 77)));
        assert_eq!(projects[1].owner_account_id, Some(AccountId::new(0, 0, 42)));
    }

    #[test]
    fn chat_history_reads_both_shapes() {
        let messages = vec![
            msg(2, 2, json!({
                "type": "agent-message",
                "input": {"message": "second?"},
                "output": {"message": "yes"},
                "metadata": {"timestamp": "2024-05-01T10:01:00Z", "usageQuota": 8}
            })),
            msg(1, 1, json!({
                "type": "chat-qa",
                "question": "first?",
                "answer": "sure",
                "timestamp": "2024-05-01T10:00:00Z"
            })),
            msg(3, 3, json!({"type": "project-creation", "projectName": "x"})),
        ];
        let history = ChatRecord::history(&messages);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].question, "first?");
        assert_eq!(history[1].answer, "yes");
        assert_eq!(history[1].usage_quota, Some(8));
        assert_eq!(history[1].timestamp.as_deref(), Some("2024-05-01T10:01:00Z"));
    }
}
