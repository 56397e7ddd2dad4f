// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ledger-mutating operations for Licensa.
//!
//! The operator's keys live behind a small signing gateway. This crate talks
//! to it over JSON/HTTP and exposes it as a
//! [`LedgerOperations`](licensa_core::LedgerOperations) implementation.

pub mod client;
mod wire;

pub use client::LedgerGatewayClient;
