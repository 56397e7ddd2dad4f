// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mutating ledger operations consumed by the lifecycle workflows.

use async_trait::async_trait;

use crate::error::LicensaError;
use crate::types::{
    AccountId, ExecutionResult, ExecutionStatus, MintReceipt, TokenId, TopicId,
    UnsignedTransaction,
};

/// Irreversible ledger operations.
///
/// Each call is an independent transaction. A returned status other than
/// `SUCCESS` does not prove the effect did not commit: client libraries can
/// report a transmission failure after the transaction reached consensus.
#[async_trait]
pub trait LedgerOperations: Send + Sync {
    /// Creates a new consensus topic and returns its id.
    async fn create_topic(&self, memo: &str) -> Result<TopicId, LicensaError>;

    /// Mints one license NFT carrying `metadata`.
    async fn mint_token(&self, metadata: &[u8]) -> Result<MintReceipt, LicensaError>;

    /// Associates `account` with `token` so it can receive serials.
    async fn associate_token(
        &self,
        account: &AccountId,
        token: &TokenId,
    ) -> Result<ExecutionStatus, LicensaError>;

    /// Appends a message to a topic. Large messages are chunked by the ledger client.
    async fn submit_message(
        &self,
        topic: &TopicId,
        message: &str,
    ) -> Result<ExecutionStatus, LicensaError>;

    /// Transfers one NFT serial between accounts.
    async fn transfer_nft(
        &self,
        token: &TokenId,
        serial_number: u64,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<ExecutionStatus, LicensaError>;

    /// Builds and freezes an unsigned value transfer from `payer` to `payee`.
    async fn build_transfer(
        &self,
        amount_tinybar: u64,
        payer: &AccountId,
        payee: &AccountId,
        memo: &str,
    ) -> Result<UnsignedTransaction, LicensaError>;

    /// Submits a wallet-signed transaction.
    async fn submit_signed_transaction(
        &self,
        signed_bytes: &[u8],
    ) -> Result<ExecutionResult, LicensaError>;
}
