// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! Every network-facing dependency of the workflows sits behind one of these
//! traits and uses `#[async_trait]` for dynamic dispatch compatibility.

pub mod ledger;
pub mod mirror;
pub mod signer;

pub use ledger::LedgerOperations;
pub use mirror::MirrorReader;
pub use signer::TransactionSigner;
