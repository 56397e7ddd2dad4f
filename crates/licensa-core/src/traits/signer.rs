// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wallet signing capability.

use async_trait::async_trait;

use crate::error::LicensaError;
use crate::types::UnsignedTransaction;

/// Opaque signer backed by the payer's wallet.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Signs the transaction and returns the signed bytes ready for submission.
    async fn sign(&self, transaction: &UnsignedTransaction) -> Result<Vec<u8>, LicensaError>;
}
