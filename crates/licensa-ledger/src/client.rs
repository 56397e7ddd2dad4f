// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the operator signing gateway.
//!
//! Provides [`LedgerGatewayClient`]. Like the mirror client it performs one
//! request per call and never retries: whether a mutating operation may be
//! repeated is decided by the workflow that issued it.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use licensa_config::model::LedgerConfig;
use licensa_core::{
    AccountId, ExecutionResult, ExecutionStatus, LedgerOperations, LicensaError, MintReceipt,
    TokenId, TopicId, UnsignedTransaction,
};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::wire::{
    AssociateRequest, BuildTransferRequest, BuildTransferResponse, CreateTopicRequest,
    CreateTopicResponse, ErrorResponse, MintRequest, MintResponse, StatusResponse,
    SubmitMessageRequest, SubmitTransactionRequest, TransferNftRequest,
};

/// Client for one signing gateway.
#[derive(Debug, Clone)]
pub struct LedgerGatewayClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

/// Raw reply before per-operation interpretation.
struct Reply {
    status: StatusCode,
    body: String,
}

impl LedgerGatewayClient {
    /// Creates a client for the gateway at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, LicensaError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(key).map_err(|e| {
                LicensaError::Config(format!("invalid gateway API key header value: {e}"))
            })?;
            headers.insert("x-api-key", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LicensaError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Creates a client from the `[ledger]` config section.
    ///
    /// Fails with a configuration error if no gateway URL is set.
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LicensaError> {
        let url = config.gateway_url.as_deref().ok_or_else(|| {
            LicensaError::Config("ledger.gateway_url is required for ledger operations".into())
        })?;
        Self::new(
            url,
            config.api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn send<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Reply, LicensaError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        debug!(url = %url, status = %status, "gateway response received");
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&url, e))?;
        Ok(Reply { status, body })
    }

    /// For operations that return a value. Any non-2xx answer is an error.
    async fn call<B, T>(&self, operation: &str, path: &str, body: &B) -> Result<T, LicensaError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let reply = self.send(path, body).await?;
        if reply.status.is_success() {
            return parse(operation, &reply.body);
        }
        Err(error_for(operation, &reply))
    }

    /// For operations that return an execution status.
    ///
    /// A 4xx carrying a ledger status code is a normal outcome, not an error:
    /// the caller decides whether e.g. "already associated" counts as success.
    async fn call_status<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<StatusResponse, LicensaError> {
        let reply = self.send(path, body).await?;
        if reply.status.is_success() {
            return parse(operation, &reply.body);
        }
        if reply.status.is_client_error() && reply.status != StatusCode::TOO_MANY_REQUESTS {
            let error: ErrorResponse = serde_json::from_str(&reply.body).unwrap_or_default();
            if let Some(code) = error.status {
                warn!(operation, status = %code, "ledger rejected operation");
                return Ok(StatusResponse {
                    transaction_id: None,
                    status: ExecutionStatus::from(code),
                });
            }
        }
        Err(error_for(operation, &reply))
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> LicensaError {
        if e.is_timeout() {
            LicensaError::Timeout {
                duration: self.timeout,
            }
        } else {
            LicensaError::network(format!("gateway request to {url} failed"), e)
        }
    }
}

fn parse<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T, LicensaError> {
    serde_json::from_str(body)
        .map_err(|e| LicensaError::Decode(format!("unexpected gateway response for {operation}: {e}")))
}

fn error_for(operation: &str, reply: &Reply) -> LicensaError {
    let status = reply.status;
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return LicensaError::TransientNetwork {
            message: format!("gateway returned {status} for {operation}: {}", reply.body),
            source: None,
        };
    }
    let error: ErrorResponse = serde_json::from_str(&reply.body).unwrap_or_default();
    LicensaError::Ledger {
        operation: operation.to_string(),
        status: error
            .status
            .or(error.error)
            .unwrap_or_else(|| status.to_string()),
    }
}

#[async_trait]
impl LedgerOperations for LedgerGatewayClient {
    async fn create_topic(&self, memo: &str) -> Result<TopicId, LicensaError> {
        let response: CreateTopicResponse = self
            .call("create_topic", "/topics", &CreateTopicRequest { memo })
            .await?;
        info!(topic = %response.topic_id, "topic created");
        Ok(response.topic_id)
    }

    async fn mint_token(&self, metadata: &[u8]) -> Result<MintReceipt, LicensaError> {
        let request = MintRequest {
            metadata: STANDARD.encode(metadata),
        };
        let response: MintResponse = self.call("mint_token", "/tokens/mint", &request).await?;
        info!(token = %response.token_id, serial = response.serial_number, "license token minted");
        Ok(MintReceipt {
            token_id: response.token_id,
            serial_number: response.serial_number,
        })
    }

    async fn associate_token(
        &self,
        account: &AccountId,
        token: &TokenId,
    ) -> Result<ExecutionStatus, LicensaError> {
        let path = format!("/tokens/{token}/associations");
        let request = AssociateRequest {
            account_id: account,
        };
        Ok(self.call_status("associate_token", &path, &request).await?.status)
    }

    async fn submit_message(
        &self,
        topic: &TopicId,
        message: &str,
    ) -> Result<ExecutionStatus, LicensaError> {
        let path = format!("/topics/{topic}/messages");
        let request = SubmitMessageRequest { message };
        Ok(self.call_status("submit_message", &path, &request).await?.status)
    }

    async fn transfer_nft(
        &self,
        token: &TokenId,
        serial_number: u64,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<ExecutionStatus, LicensaError> {
        let path = format!("/tokens/{token}/nfts/{serial_number}/transfer");
        let request = TransferNftRequest { from, to };
        Ok(self.call_status("transfer_nft", &path, &request).await?.status)
    }

    async fn build_transfer(
        &self,
        amount_tinybar: u64,
        payer: &AccountId,
        payee: &AccountId,
        memo: &str,
    ) -> Result<UnsignedTransaction, LicensaError> {
        let request = BuildTransferRequest {
            payer,
            payee,
            amount_tinybar,
            memo,
        };
        let response: BuildTransferResponse =
            self.call("build_transfer", "/transfers", &request).await?;
        let bytes = STANDARD.decode(response.bytes.as_bytes()).map_err(|e| {
            LicensaError::Decode(format!("transaction bytes are not valid base64: {e}"))
        })?;
        Ok(UnsignedTransaction {
            transaction_id: response.transaction_id,
            payer: *payer,
            payee: *payee,
            amount_tinybar,
            memo: memo.to_string(),
            bytes,
        })
    }

    async fn submit_signed_transaction(
        &self,
        signed_bytes: &[u8],
    ) -> Result<ExecutionResult, LicensaError> {
        let request = SubmitTransactionRequest {
            signed_bytes: STANDARD.encode(signed_bytes),
        };
        let response = self
            .call_status("submit_signed_transaction", "/transactions", &request)
            .await?;
        Ok(ExecutionResult {
            transaction_id: response.transaction_id.unwrap_or_default(),
            status: response.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> LedgerGatewayClient {
        LedgerGatewayClient::new(server.uri(), Some("secret"), Duration::from_secs(5)).unwrap()
    }

    fn account(n: u64) -> AccountId {
        AccountId::new(0, 0, n)
    }

    #[tokio::test]
    async fn create_topic_sends_memo_and_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/topics"))
            .and(header("x-api-key", "secret"))
            .and(body_json(json!({"memo": "license for 0.0.42"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"topic_id": "0.0.777"})))
            .expect(1)
            .mount(&server)
            .await;

        let topic = client(&server).create_topic("license for 0.0.42").await.unwrap();
        assert_eq!(topic, TopicId::new(0, 0, 777));
    }

    #[tokio::test]
    async fn mint_encodes_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/mint"))
            .and(body_json(json!({"metadata": STANDARD.encode(b"ipfs://meta")})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token_id": "0.0.900", "serial_number": 12})),
            )
            .mount(&server)
            .await;

        let receipt = client(&server).mint_token(b"ipfs://meta").await.unwrap();
        assert_eq!(receipt.token_id, TokenId::new(0, 0, 900));
        assert_eq!(receipt.serial_number, 12);
    }

    #[tokio::test]
    async fn associate_rejection_is_returned_as_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/0.0.900/associations"))
            .and(body_json(json!({"account_id": "0.0.42"})))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "status": "TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT",
                "error": "already associated"
            })))
            .mount(&server)
            .await;

        let status = client(&server)
            .associate_token(&account(42), &TokenId::new(0, 0, 900))
            .await
            .unwrap();
        assert_eq!(status, ExecutionStatus::TokenAlreadyAssociated);
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("node busy"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .submit_message(&TopicId::new(0, 0, 1), "{}")
            .await
            .unwrap_err();
        assert!(err.is_transient(), "got: {err}");
    }

    #[tokio::test]
    async fn client_error_without_status_is_ledger_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/mint"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "metadata too long"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).mint_token(&[0; 200]).await.unwrap_err();
        match err {
            LicensaError::Ledger { operation, status } => {
                assert_eq!(operation, "mint_token");
                assert_eq!(status, "metadata too long");
            }
            other => panic!("expected ledger error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transfer_posts_accounts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/0.0.900/nfts/3/transfer"))
            .and(body_json(json!({"from": "0.0.2", "to": "0.0.42"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transaction_id": "0.0.2@1700000000.000000001",
                "status": "SUCCESS"
            })))
            .mount(&server)
            .await;

        let status = client(&server)
            .transfer_nft(&TokenId::new(0, 0, 900), 3, &account(2), &account(42))
            .await
            .unwrap();
        assert!(status.is_success());
    }

    #[tokio::test]
    async fn build_and_submit_transfer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transfers"))
            .and(body_json(json!({
                "payer": "0.0.42",
                "payee": "0.0.2",
                "amount_tinybar": 500,
                "memo": "plan:pro"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transaction_id": "0.0.42@1700000000.1",
                "bytes": STANDARD.encode(b"frozen")
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/transactions"))
            .and(body_json(json!({"signed_bytes": STANDARD.encode(b"signed-frozen")})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transaction_id": "0.0.42@1700000000.1",
                "status": "SUCCESS"
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let tx = client
            .build_transfer(500, &account(42), &account(2), "plan:pro")
            .await
            .unwrap();
        assert_eq!(tx.bytes, b"frozen");
        assert_eq!(tx.amount_tinybar, 500);

        let result = client
            .submit_signed_transaction(b"signed-frozen")
            .await
            .unwrap();
        assert_eq!(result.transaction_id, "0.0.42@1700000000.1");
        assert!(result.status.is_success());
    }

    #[test]
    fn from_config_requires_gateway_url() {
        let err = LedgerGatewayClient::from_config(&LedgerConfig::default()).unwrap_err();
        assert!(matches!(err, LicensaError::Config(_)));
    }
}
