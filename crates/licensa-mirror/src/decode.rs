// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-tier payload decoding.
//!
//! 1. **Strict**: parse the body as a JSON object with a string `type`.
//! 2. **Repair** (only if strict parsing failed): locate a known type tag,
//!    cut out the smallest balanced `{...}` span around it, escape raw control
//!    characters inside its string literals, and parse once more.
//!
//! Anything that fails both tiers is logged and dropped.

use std::sync::LazyLock;

use licensa_core::{DecodedMessage, MessageKind};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::chunk::ReassembledPayload;

/// Matches `"type": "<known tag>"` with arbitrary whitespace around the colon.
static TYPE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    let tags: Vec<String> = MessageKind::KNOWN_TAGS
        .iter()
        .map(|t| regex::escape(t))
        .collect();
    Regex::new(&format!(r#""type"\s*:\s*"(?:{})""#, tags.join("|"))).unwrap()
});

/// Outcome of the strict tier.
enum Strict {
    Accepted(Map<String, Value>),
    /// Valid JSON, but not an object with a string `type`.
    Rejected,
    /// Not valid JSON at all.
    Unparsable(serde_json::Error),
}

fn parse_strict(text: &str) -> Strict {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => match map.get("type") {
            Some(Value::String(tag)) if !tag.is_empty() => Strict::Accepted(map),
            _ => Strict::Rejected,
        },
        Ok(_) => Strict::Rejected,
        Err(e) => Strict::Unparsable(e),
    }
}

/// Decodes one payload body into its JSON object, or `None` to drop it.
pub fn decode_body(body: &str) -> Option<Map<String, Value>> {
    let error = match parse_strict(body) {
        Strict::Accepted(map) => return Some(map),
        Strict::Rejected => {
            debug!("dropping payload without a type field");
            return None;
        }
        Strict::Unparsable(e) => e,
    };

    let Some(repaired) = repair(body) else {
        debug!(error = %error, "dropping unparsable payload with no known type tag");
        return None;
    };
    match parse_strict(&repaired) {
        Strict::Accepted(map) => {
            debug!(error = %error, "payload recovered by repair pass");
            Some(map)
        }
        Strict::Rejected => None,
        Strict::Unparsable(e) => {
            warn!(error = %e, "dropping payload that failed repair");
            None
        }
    }
}

/// Decodes a payload into a message, inheriting its timestamp and sequence.
pub fn decode_payload(payload: &ReassembledPayload) -> Option<DecodedMessage> {
    let content = decode_body(&payload.body)?;
    let tag = content.get("type").and_then(Value::as_str)?;
    Some(DecodedMessage {
        kind: MessageKind::from_tag(tag),
        timestamp: payload.timestamp,
        sequence_number: payload.sequence_number,
        content,
    })
}

/// Decodes every payload, dropping the ones that cannot be recovered.
pub fn decode_all(payloads: &[ReassembledPayload]) -> Vec<DecodedMessage> {
    let decoded: Vec<_> = payloads.iter().filter_map(decode_payload).collect();
    if decoded.len() < payloads.len() {
        debug!(
            dropped = payloads.len() - decoded.len(),
            kept = decoded.len(),
            "payloads dropped during decoding"
        );
    }
    decoded
}

/// Cuts out the object around the first known type tag and escapes it.
fn repair(body: &str) -> Option<String> {
    let tag = TYPE_TAG.find(body)?;
    let (start, end) = enclosing_object(body, tag.start(), tag.end())?;
    Some(escape_control_chars(&body[start..=end]))
}

/// Smallest balanced-brace span `[open, close]` with `open <= from` and `close >= to`.
///
/// Candidate opening braces are tried nearest first, so the first one whose
/// matching close lies past `to` is the innermost enclosing object.
fn enclosing_object(text: &str, from: usize, to: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    bytes[..from]
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, b)| **b == b'{')
        .find_map(|(open, _)| match matching_close(bytes, open) {
            Some(close) if close >= to => Some((open, close)),
            _ => None,
        })
}

/// Index of the brace closing the one at `open`, skipping string contents.
fn matching_close(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Escapes raw control characters that appear inside JSON string literals.
fn escape_control_chars(span: &str) -> String {
    let mut out = String::with_capacity(span.len() + 16);
    let mut in_string = false;
    let mut escaped = false;

    for c in span.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() && (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use licensa_core::ConsensusTimestamp;
    use serde_json::json;

    #[test]
    fn strict_path_accepts_typed_object() {
        let map = decode_body(r#"{"type":"license-creation","tokenId":"0.0.9","serialNumber":1}"#)
            .unwrap();
        assert_eq!(map["tokenId"], "0.0.9");
    }

    #[test]
    fn strict_path_rejects_untyped_object_without_repair() {
        assert!(decode_body(r#"{"tokenId":"0.0.9"}"#).is_none());
        assert!(decode_body(r#"{"type":42}"#).is_none());
        assert!(decode_body(r#"[1,2,3]"#).is_none());
    }

    #[test]
    fn raw_newline_repaired_to_same_content() {
        let clean = r#"{"type":"chat-qa","question":"hi","answer":"line one\nline two","timestamp":"2024-01-01T00:00:00Z"}"#;
        let broken = clean.replace("\\n", "\n");
        assert!(serde_json::from_str::<Value>(&broken).is_err());

        let expected = decode_body(clean).unwrap();
        let repaired = decode_body(&broken).unwrap();
        assert_eq!(repaired, expected);
    }

    #[test]
    fn repair_cuts_object_out_of_surrounding_noise() {
        let body = "garbage prefix {\"type\": \"project-creation\", \"projectName\": \"tab\there\"} trailing }";
        let map = decode_body(body).unwrap();
        assert_eq!(map["projectName"], "tab\there");
    }

    #[test]
    fn repair_prefers_innermost_enclosing_object() {
        let body = "{\"wrapper\": {\"type\":\"chat-qa\",\"answer\":\"a\u{1}b\"}, broken";
        let map = decode_body(body).unwrap();
        assert_eq!(map["type"], "chat-qa");
        assert_eq!(map["answer"], "a\u{1}b");
        assert!(map.get("wrapper").is_none());
    }

    #[test]
    fn braces_inside_strings_do_not_unbalance_span() {
        let body = "{\"type\":\"chat-qa\",\"answer\":\"use } and {\nfreely\"}";
        let map = decode_body(body).unwrap();
        assert_eq!(map["answer"], "use } and {\nfreely");
    }

    #[test]
    fn unknown_tag_is_not_repaired() {
        let body = "{\"type\":\"agent-note\",\"text\":\"raw\nnewline\"}";
        assert!(decode_body(body).is_none());
    }

    #[test]
    fn truncated_payload_dropped() {
        assert!(decode_body("{\"type\":\"chat-qa\",\"answer\":\"cut of").is_none());
    }

    #[test]
    fn decode_all_keeps_order_and_drops_failures() {
        let payloads = vec![
            ReassembledPayload {
                sequence_number: 1,
                timestamp: ConsensusTimestamp::new(10, 0).unwrap(),
                body: json!({"type": "project-creation", "projectName": "a"}).to_string(),
                parts: 1,
            },
            ReassembledPayload {
                sequence_number: 2,
                timestamp: ConsensusTimestamp::new(11, 0).unwrap(),
                body: "not json".into(),
                parts: 1,
            },
            ReassembledPayload {
                sequence_number: 3,
                timestamp: ConsensusTimestamp::new(12, 0).unwrap(),
                body: json!({"type": "custom-event"}).to_string(),
                parts: 2,
            },
        ];
        let decoded = decode_all(&payloads);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].kind, MessageKind::ProjectCreation);
        assert_eq!(decoded[1].kind, MessageKind::Other("custom-event".into()));
        assert_eq!(decoded[1].sequence_number, 3);
    }
}
