// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log message reconstruction for Licensa.
//!
//! Turns the raw, paginated, chunked view of a consensus topic exposed by the
//! mirror node into an ordered sequence of [`DecodedMessage`]s:
//!
//! 1. [`MirrorClient`] fetches one page of raw entries.
//! 2. [`chunk::reassemble`] joins multi-part submissions.
//! 3. [`decode::decode_all`] parses payloads, repairing mangled ones.
//! 4. [`MessageCache`] memoizes the result per topic for a short TTL.
//!
//! [`TopicMessageStore`] wires the four together.
//!
//! [`DecodedMessage`]: licensa_core::DecodedMessage

pub mod cache;
pub mod chunk;
pub mod client;
pub mod decode;
pub mod store;
mod wire;

pub use cache::MessageCache;
pub use chunk::{reassemble, ReassembledPayload};
pub use client::MirrorClient;
pub use decode::{decode_all, decode_body};
pub use store::TopicMessageStore;
