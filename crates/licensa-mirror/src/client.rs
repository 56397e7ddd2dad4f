// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the mirror node REST API.
//!
//! Provides [`MirrorClient`], the Log Reader. It performs exactly one request
//! per call and never retries: any non-2xx answer, transport failure, or
//! timeout comes back as a transient error for the caller to act on.

use std::time::Duration;

use async_trait::async_trait;
use licensa_config::model::MirrorConfig;
use licensa_core::{
    AccountId, LicensaError, MessagePage, MirrorReader, SortOrder, TokenId, TopicId,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::wire::{self, AccountTokensResponse, NftResponse, TopicMessagesResponse};

/// Largest page the mirror REST API will serve.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Read-only client for one mirror node.
#[derive(Debug, Clone)]
pub struct MirrorClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl MirrorClient {
    /// Creates a client for the mirror at `base_url` (without `/api/v1`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LicensaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LicensaError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Creates a client from the `[mirror]` config section.
    pub fn from_config(config: &MirrorConfig) -> Result<Self, LicensaError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues one GET and decodes the JSON body.
    ///
    /// Returns `Ok(None)` on 404 so lookups of unknown entities are not errors.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, LicensaError> {
        let url = with_query(&format!("{}{path}", self.base_url), query);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        debug!(url = %url, status = %status, "mirror response received");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LicensaError::TransientNetwork {
                message: format!("mirror returned {status} for {path}: {body}"),
                source: None,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&url, e))?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| LicensaError::Decode(format!("unexpected mirror response for {path}: {e}")))
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> LicensaError {
        if e.is_timeout() {
            LicensaError::Timeout {
                duration: self.timeout,
            }
        } else {
            LicensaError::network(format!("mirror request to {url} failed"), e)
        }
    }
}

/// Appends query pairs. Every value sent here is an id, a number, or a fixed word.
fn with_query(url: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{url}?{}", pairs.join("&"))
}

#[async_trait]
impl MirrorReader for MirrorClient {
    async fn fetch_messages(
        &self,
        topic: &TopicId,
        page_size: u32,
        order: SortOrder,
    ) -> Result<MessagePage, LicensaError> {
        let limit = page_size.clamp(1, MAX_PAGE_SIZE);
        let path = format!("/api/v1/topics/{topic}/messages");
        let query = [
            ("limit", limit.to_string()),
            ("encoding", "base64".to_string()),
            ("order", order.to_string()),
        ];

        // An unknown topic has no messages yet.
        let Some(response) = self.get_json::<TopicMessagesResponse>(&path, &query).await? else {
            return Ok(MessagePage::default());
        };

        let received = response.messages.len();
        let entries: Vec<_> = response
            .messages
            .into_iter()
            .filter_map(wire::to_raw_entry)
            .collect();
        debug!(
            topic = %topic,
            received,
            kept = entries.len(),
            has_more = response.links.next.is_some(),
            "fetched topic page"
        );

        Ok(MessagePage {
            entries,
            next: response.links.next,
        })
    }

    async fn is_token_associated(
        &self,
        account: &AccountId,
        token: &TokenId,
    ) -> Result<bool, LicensaError> {
        let path = format!("/api/v1/accounts/{account}/tokens");
        let query = [("token.id", token.to_string())];
        let response = self
            .get_json::<AccountTokensResponse>(&path, &query)
            .await?;

        let wanted = token.to_string();
        Ok(response.is_some_and(|r| r.tokens.iter().any(|t| t.token_id == wanted)))
    }

    async fn nft_owner(
        &self,
        token: &TokenId,
        serial_number: u64,
    ) -> Result<Option<AccountId>, LicensaError> {
        let path = format!("/api/v1/tokens/{token}/nfts/{serial_number}");
        let Some(nft) = self.get_json::<NftResponse>(&path, &[]).await? else {
            return Ok(None);
        };
        if nft.deleted {
            return Ok(None);
        }
        nft.account_id.map(|id| id.parse()).transpose()
    }
}
