// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reassembly of multi-part topic submissions.
//!
//! The reassembler is not incremental: it consumes a whole fetch, groups
//! fragments, and only then emits. Groups still missing a fragment after the
//! full pass are dropped without error, since a reader must tolerate chunk
//! sets that never complete.

use std::collections::{BTreeMap, HashMap};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use licensa_core::{ConsensusTimestamp, RawLogEntry};
use tracing::{debug, warn};

/// A payload ready for decoding: either a single entry or a joined group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembledPayload {
    pub sequence_number: u64,
    /// For joined groups, the latest fragment's consensus time.
    pub timestamp: ConsensusTimestamp,
    pub body: String,
    pub parts: u32,
}

/// Grouping key for fragments.
///
/// There is no per-submission nonce in the key: two submissions from one
/// initiator with the same part count inside one fetch land in the same
/// group, and the later fragment for a slot replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub initiating_id: String,
    pub total_parts: u32,
}

#[derive(Debug, Clone)]
struct Fragment {
    payload_base64: String,
    timestamp: ConsensusTimestamp,
    sequence_number: u64,
}

/// Fragments received so far for one multi-part submission.
///
/// Stored sparsely: `total_parts` comes off a public log and is not trusted
/// to size an allocation.
#[derive(Debug)]
pub struct ChunkGroup {
    total_parts: u32,
    fragments: BTreeMap<u32, Fragment>,
}

impl ChunkGroup {
    pub fn new(total_parts: u32) -> Self {
        Self {
            total_parts,
            fragments: BTreeMap::new(),
        }
    }

    /// Stores a fragment under `part_index`.
    ///
    /// Returns `false` if `part_index` is outside `1..=total_parts`.
    fn insert(&mut self, part_index: u32, fragment: Fragment) -> bool {
        if part_index == 0 || part_index > self.total_parts {
            return false;
        }
        if let Some(previous) = self.fragments.insert(part_index, fragment) {
            debug!(
                part_index,
                replaced_sequence = previous.sequence_number,
                "chunk slot overwritten by a later fragment"
            );
        }
        true
    }

    pub fn is_complete(&self) -> bool {
        self.fragments.len() as u64 == u64::from(self.total_parts)
    }

    pub fn filled(&self) -> usize {
        self.fragments.len()
    }

    /// Consumes the group and joins it, `None` if incomplete or undecodable.
    fn into_payload(self, key: &ChunkKey) -> Option<ReassembledPayload> {
        if !self.is_complete() {
            return None;
        }
        let total = self.total_parts;
        let fragments: Vec<Fragment> = self.fragments.into_values().collect();

        let timestamp = fragments.iter().map(|f| f.timestamp).max()?;
        let sequence_number = fragments.iter().map(|f| f.sequence_number).max()?;

        let mut bytes = Vec::new();
        for (i, fragment) in fragments.iter().enumerate() {
            match STANDARD.decode(fragment.payload_base64.as_bytes()) {
                Ok(decoded) => bytes.extend_from_slice(&decoded),
                Err(e) => {
                    warn!(
                        initiating_id = %key.initiating_id,
                        part = i + 1,
                        total,
                        error = %e,
                        "dropping chunk group with undecodable fragment"
                    );
                    return None;
                }
            }
        }

        match String::from_utf8(bytes) {
            Ok(body) => Some(ReassembledPayload {
                sequence_number,
                timestamp,
                body,
                parts: key.total_parts,
            }),
            Err(e) => {
                warn!(
                    initiating_id = %key.initiating_id,
                    error = %e,
                    "dropping chunk group that is not valid UTF-8"
                );
                None
            }
        }
    }
}

/// Decodes a single-part entry.
fn decode_single(entry: &RawLogEntry) -> Option<ReassembledPayload> {
    let bytes = match STANDARD.decode(entry.payload_base64.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(sequence = entry.sequence_number, error = %e, "dropping entry with invalid base64");
            return None;
        }
    };
    match String::from_utf8(bytes) {
        Ok(body) => Some(ReassembledPayload {
            sequence_number: entry.sequence_number,
            timestamp: entry.consensus_timestamp,
            body,
            parts: 1,
        }),
        Err(e) => {
            warn!(sequence = entry.sequence_number, error = %e, "dropping entry that is not valid UTF-8");
            None
        }
    }
}

/// Reassembles one fetched page into decodable payloads.
///
/// Output is ordered by consensus time, ties broken by sequence number,
/// regardless of the order fragments arrived in.
pub fn reassemble(entries: &[RawLogEntry]) -> Vec<ReassembledPayload> {
    let mut out = Vec::with_capacity(entries.len());
    let mut groups: HashMap<ChunkKey, ChunkGroup> = HashMap::new();

    for entry in entries {
        let Some(chunk) = entry.chunk_info.as_ref().filter(|c| c.is_multi_part()) else {
            out.extend(decode_single(entry));
            continue;
        };

        let key = ChunkKey {
            initiating_id: chunk.initiating_id.clone(),
            total_parts: chunk.total_parts,
        };
        let fragment = Fragment {
            payload_base64: entry.payload_base64.clone(),
            timestamp: entry.consensus_timestamp,
            sequence_number: entry.sequence_number,
        };
        let group = groups
            .entry(key)
            .or_insert_with(|| ChunkGroup::new(chunk.total_parts));
        if !group.insert(chunk.part_index, fragment) {
            warn!(
                sequence = entry.sequence_number,
                part_index = chunk.part_index,
                total_parts = chunk.total_parts,
                "dropping fragment with out-of-range part index"
            );
        }
    }

    for (key, group) in groups {
        if !group.is_complete() {
            debug!(
                initiating_id = %key.initiating_id,
                filled = group.filled(),
                total = key.total_parts,
                "incomplete chunk group dropped"
            );
            continue;
        }
        out.extend(group.into_payload(&key));
    }

    out.sort_by_key(|p| (p.timestamp, p.sequence_number));
    out
}
