// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Licensa.
//!
//! Licensa issues licenses and tracks usage quotas on an append-only consensus
//! log. This crate holds the types shared by every other crate in the
//! workspace: ledger entity identifiers, raw and decoded log messages, the
//! error type, and the collaborator traits for the read API, the mutating
//! ledger operations, and the wallet signer.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LicensaError;
pub use types::{
    AccountId, ChunkInfo, ConsensusTimestamp, DecodedMessage, ExecutionResult, ExecutionStatus,
    MessageKind, MessagePage, MintReceipt, RawLogEntry, SortOrder, TokenId, TopicId,
    UnsignedTransaction,
};

pub use traits::{LedgerOperations, MirrorReader, TransactionSigner};
