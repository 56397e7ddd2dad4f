// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Latest-record projection over a decoded message sequence.

use licensa_core::{DecodedMessage, MessageKind};
use serde_json::{Map, Value};

/// Most recent message of `kind`, by consensus time then sequence number.
///
/// Input order is irrelevant: the caller may pass messages in any order and
/// gets the same answer as long as timestamps are preserved.
pub fn latest<'a>(messages: &'a [DecodedMessage], kind: &MessageKind) -> Option<&'a DecodedMessage> {
    messages
        .iter()
        .filter(|m| &m.kind == kind)
        .max_by_key(|m| m.ordering_key())
}

/// Content of the most recent message of `kind`, or `None` if the log has none.
pub fn project<'a>(
    messages: &'a [DecodedMessage],
    kind: &MessageKind,
) -> Option<&'a Map<String, Value>> {
    latest(messages, kind).map(|m| &m.content)
}

/// Every message of `kind`, oldest first.
pub fn of_kind<'a>(messages: &'a [DecodedMessage], kind: &MessageKind) -> Vec<&'a DecodedMessage> {
    let mut matching: Vec<_> = messages.iter().filter(|m| &m.kind == kind).collect();
    matching.sort_by_key(|m| m.ordering_key());
    matching
}

/// All messages, oldest first.
pub(crate) fn chronological(messages: &[DecodedMessage]) -> Vec<&DecodedMessage> {
    let mut sorted: Vec<_> = messages.iter().collect();
    sorted.sort_by_key(|m| m.ordering_key());
    sorted
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use licensa_core::ConsensusTimestamp;
    use proptest::prelude::*;
    use serde_json::json;

    pub(crate) fn msg(seconds: u64, seq: u64, content: Value) -> DecodedMessage {
        let content = match content {
            Value::Object(map) => map,
            other => panic!("test content must be an object, got {other}"),
        };
        let tag = content
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("chat-qa")
            .to_string();
        DecodedMessage {
            kind: MessageKind::from_tag(&tag),
            timestamp: ConsensusTimestamp::new(seconds, 0).unwrap(),
            sequence_number: seq,
            content,
        }
    }

    #[test]
    fn latest_wins_by_timestamp_not_position() {
        let messages = vec![
            msg(30, 3, json!({"type": "license-creation", "serialNumber": 3})),
            msg(10, 1, json!({"type": "license-creation", "serialNumber": 1})),
            msg(40, 4, json!({"type": "chat-qa"})),
            msg(20, 2, json!({"type": "license-creation", "serialNumber": 2})),
        ];
        let content = project(&messages, &MessageKind::LicenseCreation).unwrap();
        assert_eq!(content["serialNumber"], 3);
    }

    #[test]
    fn sequence_breaks_timestamp_ties() {
        let messages = vec![
            msg(10, 8, json!({"type": "project-creation", "projectName": "late"})),
            msg(10, 7, json!({"type": "project-creation", "projectName": "early"})),
        ];
        let content = project(&messages, &MessageKind::ProjectCreation).unwrap();
        assert_eq!(content["projectName"], "late");
    }

    #[test]
    fn missing_kind_projects_to_none() {
        let messages = vec![msg(1, 1, json!({"type": "chat-qa"}))];
        assert!(project(&messages, &MessageKind::SubscriptionCreated).is_none());
        assert!(project(&[], &MessageKind::ChatQa).is_none());
    }

    #[test]
    fn other_kinds_project_by_tag() {
        let messages = vec![msg(1, 1, json!({"type": "agent-note", "text": "hi"}))];
        let content = project(&messages, &MessageKind::Other("agent-note".into())).unwrap();
        assert_eq!(content["text"], "hi");
    }

    #[test]
    fn of_kind_is_oldest_first() {
        let messages = vec![
            msg(3, 3, json!({"type": "project-creation", "projectName": "c"})),
            msg(1, 1, json!({"type": "project-creation", "projectName": "a"})),
            msg(2, 2, json!({"type": "chat-qa"})),
        ];
        let names: Vec<_> = of_kind(&messages, &MessageKind::ProjectCreation)
            .iter()
            .map(|m| m.str_field("projectName").unwrap())
            .collect();
        assert_eq!(names, ["a", "c"]);
    }

    fn kind_strategy() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("license-creation"),
            Just("project-creation"),
            Just("subscription-created"),
            Just("chat-qa"),
        ]
    }

    proptest! {
        #[test]
        fn projection_ignores_input_order(
            kinds in prop::collection::vec(kind_strategy(), 1..40),
            rotate in 0usize..40,
            reverse in any::<bool>(),
        ) {
            // Distinct (timestamp, sequence) keys, as on a real topic.
            let messages: Vec<_> = kinds
                .iter()
                .enumerate()
                .map(|(i, tag)| msg(1_000 + (i as u64 / 2), i as u64, json!({"type": tag, "n": i})))
                .collect();

            let mut shuffled = messages.clone();
            let len = shuffled.len();
            shuffled.rotate_left(rotate % len);
            if reverse {
                shuffled.reverse();
            }

            for tag in MessageKind::KNOWN_TAGS {
                let kind = MessageKind::from_tag(tag);
                prop_assert_eq!(project(&messages, &kind), project(&shuffled, &kind));
            }
        }
    }
}
