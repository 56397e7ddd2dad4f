// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Licensa integration tests.
//!
//! Provides an in-memory ledger and its read replica for fast,
//! deterministic tests without network access.
//!
//! # Components
//!
//! - [`MockLedger`] - mutating operations with call counters and scripted failures
//! - [`MockMirror`] - read API over the same state, so submitted messages show
//!   up on the next fetch, chunked exactly as a real mirror returns them
//! - [`MockSigner`] - wallet stand-in that the mock ledger accepts
//! - [`TestHarness`] - all of the above wired to a message store and config

pub mod harness;
pub mod ledger;
pub mod mirror;
pub mod signer;

pub use harness::{HOLDER, OPERATOR, TREASURY, TestHarness};
pub use ledger::{LedgerCall, LedgerState, MockLedger, ScriptedFailure, SharedLedgerState};
pub use mirror::MockMirror;
pub use signer::MockSigner;
