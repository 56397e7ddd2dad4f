// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway request and response bodies. Binary fields travel as base64.

use licensa_core::{AccountId, ExecutionStatus, TokenId, TopicId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct CreateTopicRequest<'a> {
    pub memo: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateTopicResponse {
    pub topic_id: TopicId,
}

#[derive(Debug, Serialize)]
pub(crate) struct MintRequest {
    pub metadata: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MintResponse {
    pub token_id: TokenId,
    pub serial_number: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssociateRequest<'a> {
    pub account_id: &'a AccountId,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitMessageRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TransferNftRequest<'a> {
    pub from: &'a AccountId,
    pub to: &'a AccountId,
}

#[derive(Debug, Serialize)]
pub(crate) struct BuildTransferRequest<'a> {
    pub payer: &'a AccountId,
    pub payee: &'a AccountId,
    pub amount_tinybar: u64,
    pub memo: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BuildTransferResponse {
    pub transaction_id: String,
    pub bytes: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitTransactionRequest {
    pub signed_bytes: String,
}

/// Common reply of every status-returning operation.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub status: ExecutionStatus,
}

/// Error body; the gateway forwards the ledger's status code when it has one.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
