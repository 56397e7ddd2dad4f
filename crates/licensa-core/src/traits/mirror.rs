// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-replica (mirror) API trait.

use async_trait::async_trait;

use crate::error::LicensaError;
use crate::types::{AccountId, MessagePage, SortOrder, TokenId, TopicId};

/// Read-only view over the consensus log and ledger state.
///
/// Implementations perform exactly one request per call and never retry;
/// a non-2xx answer or a timeout is reported as a transient error and the
/// retry decision belongs to the caller.
#[async_trait]
pub trait MirrorReader: Send + Sync {
    /// Fetches one page of raw entries for a topic.
    async fn fetch_messages(
        &self,
        topic: &TopicId,
        page_size: u32,
        order: SortOrder,
    ) -> Result<MessagePage, LicensaError>;

    /// Returns true if `account` is associated with `token`.
    async fn is_token_associated(
        &self,
        account: &AccountId,
        token: &TokenId,
    ) -> Result<bool, LicensaError>;

    /// Returns the current owner of an NFT serial, or `None` if the serial is unknown.
    async fn nft_owner(
        &self,
        token: &TokenId,
        serial_number: u64,
    ) -> Result<Option<AccountId>, LicensaError>;
}
