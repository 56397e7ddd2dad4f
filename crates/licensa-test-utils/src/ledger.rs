// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory ledger implementing `LedgerOperations`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use licensa_core::{
    AccountId, ChunkInfo, ConsensusTimestamp, ExecutionResult, ExecutionStatus,
    LedgerOperations, LicensaError, MintReceipt, RawLogEntry, TokenId, TopicId,
    UnsignedTransaction,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::signer::SIGNATURE_PREFIX;

/// Message bytes per log entry; longer submissions are split like a real ledger client does.
pub const CHUNK_SIZE: usize = 1024;

/// Ledger contents shared by [`MockLedger`] and [`crate::MockMirror`].
#[derive(Debug)]
pub struct LedgerState {
    next_entity: u64,
    clock: u64,
    pub topics: HashMap<TopicId, Vec<RawLogEntry>>,
    pub associations: HashSet<(AccountId, TokenId)>,
    pub nft_owners: HashMap<(TokenId, u64), AccountId>,
    serials: HashMap<TokenId, u64>,
    license_token: Option<TokenId>,
    pending: HashMap<String, UnsignedTransaction>,
    /// Value transfers that reached consensus, oldest first.
    pub settled: Vec<UnsignedTransaction>,
}

pub type SharedLedgerState = Arc<Mutex<LedgerState>>;

impl LedgerState {
    pub fn new() -> Self {
        Self {
            next_entity: 1000,
            clock: 1_700_000_000,
            topics: HashMap::new(),
            associations: HashSet::new(),
            nft_owners: HashMap::new(),
            serials: HashMap::new(),
            license_token: None,
            pending: HashMap::new(),
            settled: Vec::new(),
        }
    }

    pub fn shared() -> SharedLedgerState {
        Arc::new(Mutex::new(Self::new()))
    }

    fn next_id(&mut self) -> u64 {
        self.next_entity += 1;
        self.next_entity
    }

    fn tick(&mut self) -> ConsensusTimestamp {
        self.clock += 1;
        ConsensusTimestamp::new(self.clock, 0).expect("zero nanos is in range")
    }

    pub fn create_topic(&mut self) -> TopicId {
        let topic = TopicId::new(0, 0, self.next_id());
        self.topics.insert(topic, Vec::new());
        topic
    }

    /// Appends `message`, split into chunks when longer than [`CHUNK_SIZE`].
    ///
    /// Returns false if the topic does not exist.
    pub fn append(&mut self, topic: &TopicId, initiator: &AccountId, message: &str) -> bool {
        if !self.topics.contains_key(topic) {
            return false;
        }
        let chunks: Vec<&[u8]> = if message.is_empty() {
            vec![&b""[..]]
        } else {
            message.as_bytes().chunks(CHUNK_SIZE).collect()
        };
        let total = chunks.len() as u32;
        let mut entries = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.into_iter().enumerate() {
            let consensus_timestamp = self.tick();
            entries.push((consensus_timestamp, chunk, i as u32 + 1));
        }

        let log = self.topics.entry(*topic).or_default();
        for (consensus_timestamp, chunk, part_index) in entries {
            log.push(RawLogEntry {
                sequence_number: log.len() as u64 + 1,
                consensus_timestamp,
                payload_base64: STANDARD.encode(chunk),
                chunk_info: Some(ChunkInfo {
                    initiating_id: initiator.to_string(),
                    total_parts: total,
                    part_index,
                }),
            });
        }
        true
    }

    fn mint(&mut self, treasury: AccountId) -> MintReceipt {
        let token_id = match self.license_token {
            Some(token) => token,
            None => {
                let token = TokenId::new(0, 0, self.next_id());
                self.license_token = Some(token);
                token
            }
        };
        let serial = self.serials.entry(token_id).or_insert(0);
        *serial += 1;
        let serial_number = *serial;
        self.nft_owners.insert((token_id, serial_number), treasury);
        MintReceipt {
            token_id,
            serial_number,
        }
    }

    fn associate(&mut self, account: AccountId, token: TokenId) -> ExecutionStatus {
        if self.associations.insert((account, token)) {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::TokenAlreadyAssociated
        }
    }

    fn transfer(
        &mut self,
        token: TokenId,
        serial_number: u64,
        from: AccountId,
        to: AccountId,
    ) -> ExecutionStatus {
        if self.nft_owners.get(&(token, serial_number)) != Some(&from) {
            return ExecutionStatus::Other("SENDER_DOES_NOT_OWN_NFT_SERIAL_NO".into());
        }
        if !self.associations.contains(&(to, token)) {
            return ExecutionStatus::Other("TOKEN_NOT_ASSOCIATED_TO_ACCOUNT".into());
        }
        self.nft_owners.insert((token, serial_number), to);
        ExecutionStatus::Success
    }

    fn settle(&mut self, signed_bytes: &[u8]) -> ExecutionResult {
        let Some(body) = signed_bytes.strip_prefix(SIGNATURE_PREFIX) else {
            return ExecutionResult {
                transaction_id: String::new(),
                status: ExecutionStatus::Other("INVALID_SIGNATURE".into()),
            };
        };
        if let Some(done) = self.settled.iter().find(|tx| tx.bytes == body) {
            return ExecutionResult {
                transaction_id: done.transaction_id.clone(),
                status: ExecutionStatus::Other("DUPLICATE_TRANSACTION".into()),
            };
        }
        let Some(id) = self
            .pending
            .iter()
            .find(|(_, tx)| tx.bytes == body)
            .map(|(id, _)| id.clone())
        else {
            return ExecutionResult {
                transaction_id: String::new(),
                status: ExecutionStatus::Other("INVALID_TRANSACTION".into()),
            };
        };
        if let Some(tx) = self.pending.remove(&id) {
            self.settled.push(tx);
        }
        ExecutionResult {
            transaction_id: id,
            status: ExecutionStatus::Success,
        }
    }
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutating operations the mock counts and can fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerCall {
    CreateTopic,
    MintToken,
    AssociateToken,
    SubmitMessage,
    TransferNft,
    BuildTransfer,
    SubmitSignedTransaction,
}

/// A failure injected into the next call of one operation.
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    /// Report this status without applying the effect. Id-returning
    /// operations turn it into a ledger error.
    Status(ExecutionStatus),
    /// Fail with a transient error before applying the effect.
    Transient,
    /// Apply the effect, then report a transient error, as when the
    /// acknowledgement is lost after consensus.
    LostAck,
}

/// In-memory ledger. Every instance sharing a [`SharedLedgerState`] sees the same topics.
pub struct MockLedger {
    state: SharedLedgerState,
    operator: AccountId,
    treasury: AccountId,
    calls: Mutex<HashMap<LedgerCall, usize>>,
    failures: Mutex<HashMap<LedgerCall, VecDeque<ScriptedFailure>>>,
}

impl MockLedger {
    pub fn new(state: SharedLedgerState, operator: AccountId, treasury: AccountId) -> Self {
        Self {
            state,
            operator,
            treasury,
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self) -> &SharedLedgerState {
        &self.state
    }

    pub fn treasury(&self) -> AccountId {
        self.treasury
    }

    /// Queues a failure for the next call of `call`.
    pub async fn fail_next(&self, call: LedgerCall, failure: ScriptedFailure) {
        self.failures
            .lock()
            .await
            .entry(call)
            .or_default()
            .push_back(failure);
    }

    /// Number of times `call` was invoked, failed attempts included.
    pub async fn calls(&self, call: LedgerCall) -> usize {
        self.calls.lock().await.get(&call).copied().unwrap_or(0)
    }

    /// Creates a topic holding `messages`, each submitted by the operator.
    pub async fn seed_topic(&self, messages: &[Value]) -> TopicId {
        let mut state = self.state.lock().await;
        let topic = state.create_topic();
        for message in messages {
            state.append(&topic, &self.operator, &message.to_string());
        }
        topic
    }

    /// Appends raw text to an existing topic, bypassing call accounting.
    pub async fn seed_message(&self, topic: &TopicId, text: &str) {
        self.state.lock().await.append(topic, &self.operator, text);
    }

    /// Records the call and pops any scripted failure for it.
    async fn enter(&self, call: LedgerCall) -> Option<ScriptedFailure> {
        *self.calls.lock().await.entry(call).or_insert(0) += 1;
        let failure = self
            .failures
            .lock()
            .await
            .get_mut(&call)
            .and_then(VecDeque::pop_front);
        if let Some(failure) = &failure {
            debug!(?call, ?failure, "injecting scripted failure");
        }
        failure
    }
}

fn transient(call: LedgerCall) -> LicensaError {
    LicensaError::TransientNetwork {
        message: format!("scripted transient failure in {call:?}"),
        source: None,
    }
}

fn rejected(call: LedgerCall, status: &ExecutionStatus) -> LicensaError {
    LicensaError::Ledger {
        operation: format!("{call:?}"),
        status: status.to_string(),
    }
}

/// Runs a status-returning effect under an optional scripted failure.
fn with_status(
    call: LedgerCall,
    failure: Option<ScriptedFailure>,
    effect: impl FnOnce() -> ExecutionStatus,
) -> Result<ExecutionStatus, LicensaError> {
    match failure {
        None => Ok(effect()),
        Some(ScriptedFailure::Status(status)) => Ok(status),
        Some(ScriptedFailure::Transient) => Err(transient(call)),
        Some(ScriptedFailure::LostAck) => {
            effect();
            Err(transient(call))
        }
    }
}

/// Runs a value-returning effect under an optional scripted failure.
fn with_value<T>(
    call: LedgerCall,
    failure: Option<ScriptedFailure>,
    effect: impl FnOnce() -> T,
) -> Result<T, LicensaError> {
    match failure {
        None => Ok(effect()),
        Some(ScriptedFailure::Status(status)) => Err(rejected(call, &status)),
        Some(ScriptedFailure::Transient) => Err(transient(call)),
        Some(ScriptedFailure::LostAck) => {
            effect();
            Err(transient(call))
        }
    }
}

#[async_trait]
impl LedgerOperations for MockLedger {
    async fn create_topic(&self, _memo: &str) -> Result<TopicId, LicensaError> {
        let failure = self.enter(LedgerCall::CreateTopic).await;
        let mut state = self.state.lock().await;
        with_value(LedgerCall::CreateTopic, failure, || state.create_topic())
    }

    async fn mint_token(&self, _metadata: &[u8]) -> Result<MintReceipt, LicensaError> {
        let failure = self.enter(LedgerCall::MintToken).await;
        let mut state = self.state.lock().await;
        with_value(LedgerCall::MintToken, failure, || state.mint(self.treasury))
    }

    async fn associate_token(
        &self,
        account: &AccountId,
        token: &TokenId,
    ) -> Result<ExecutionStatus, LicensaError> {
        let failure = self.enter(LedgerCall::AssociateToken).await;
        let mut state = self.state.lock().await;
        with_status(LedgerCall::AssociateToken, failure, || {
            state.associate(*account, *token)
        })
    }

    async fn submit_message(
        &self,
        topic: &TopicId,
        message: &str,
    ) -> Result<ExecutionStatus, LicensaError> {
        let failure = self.enter(LedgerCall::SubmitMessage).await;
        let mut state = self.state.lock().await;
        with_status(LedgerCall::SubmitMessage, failure, || {
            if state.append(topic, &self.operator, message) {
                ExecutionStatus::Success
            } else {
                ExecutionStatus::Other("INVALID_TOPIC_ID".into())
            }
        })
    }

    async fn transfer_nft(
        &self,
        token: &TokenId,
        serial_number: u64,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<ExecutionStatus, LicensaError> {
        let failure = self.enter(LedgerCall::TransferNft).await;
        let mut state = self.state.lock().await;
        with_status(LedgerCall::TransferNft, failure, || {
            state.transfer(*token, serial_number, *from, *to)
        })
    }

    async fn build_transfer(
        &self,
        amount_tinybar: u64,
        payer: &AccountId,
        payee: &AccountId,
        memo: &str,
    ) -> Result<UnsignedTransaction, LicensaError> {
        let failure = self.enter(LedgerCall::BuildTransfer).await;
        let mut state = self.state.lock().await;
        with_value(LedgerCall::BuildTransfer, failure, || {
            let valid_start = state.tick();
            let transaction_id = format!("{payer}@{valid_start}");
            let bytes = format!("{transaction_id}|{payer}|{payee}|{amount_tinybar}|{memo}")
                .into_bytes();
            let tx = UnsignedTransaction {
                transaction_id: transaction_id.clone(),
                payer: *payer,
                payee: *payee,
                amount_tinybar,
                memo: memo.to_string(),
                bytes,
            };
            state.pending.insert(transaction_id, tx.clone());
            tx
        })
    }

    async fn submit_signed_transaction(
        &self,
        signed_bytes: &[u8],
    ) -> Result<ExecutionResult, LicensaError> {
        let failure = self.enter(LedgerCall::SubmitSignedTransaction).await;
        let mut state = self.state.lock().await;
        match failure {
            None => Ok(state.settle(signed_bytes)),
            Some(ScriptedFailure::Status(status)) => Ok(ExecutionResult {
                transaction_id: String::new(),
                status,
            }),
            Some(ScriptedFailure::Transient) => {
                Err(transient(LedgerCall::SubmitSignedTransaction))
            }
            Some(ScriptedFailure::LostAck) => {
                state.settle(signed_bytes);
                Err(transient(LedgerCall::SubmitSignedTransaction))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> MockLedger {
        MockLedger::new(
            LedgerState::shared(),
            AccountId::new(0, 0, 2),
            AccountId::new(0, 0, 3),
        )
    }

    #[tokio::test]
    async fn long_messages_are_chunked() {
        let ledger = ledger();
        let topic = ledger.create_topic("t").await.unwrap();
        let text = "y".repeat(CHUNK_SIZE * 2 + 10);
        ledger.submit_message(&topic, &text).await.unwrap();

        let state = ledger.state().lock().await;
        let entries = &state.topics[&topic];
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.chunk_info.as_ref().unwrap().total_parts == 3));
        assert_eq!(entries[2].sequence_number, 3);
    }

    #[tokio::test]
    async fn second_association_reports_precondition() {
        let ledger = ledger();
        let account = AccountId::new(0, 0, 42);
        let token = TokenId::new(0, 0, 9);
        assert!(ledger.associate_token(&account, &token).await.unwrap().is_success());
        assert_eq!(
            ledger.associate_token(&account, &token).await.unwrap(),
            ExecutionStatus::TokenAlreadyAssociated
        );
        assert_eq!(ledger.calls(LedgerCall::AssociateToken).await, 2);
    }

    #[tokio::test]
    async fn lost_ack_still_applies_effect() {
        let ledger = ledger();
        let receipt = ledger.mint_token(b"m").await.unwrap();
        let holder = AccountId::new(0, 0, 42);
        ledger.associate_token(&holder, &receipt.token_id).await.unwrap();

        ledger
            .fail_next(LedgerCall::TransferNft, ScriptedFailure::LostAck)
            .await;
        let err = ledger
            .transfer_nft(&receipt.token_id, receipt.serial_number, &ledger.treasury(), &holder)
            .await
            .unwrap_err();
        assert!(err.is_transient());

        let state = ledger.state().lock().await;
        assert_eq!(
            state.nft_owners[&(receipt.token_id, receipt.serial_number)],
            holder
        );
    }

    #[tokio::test]
    async fn unsigned_or_replayed_transactions_rejected() {
        let ledger = ledger();
        let tx = ledger
            .build_transfer(10, &AccountId::new(0, 0, 42), &AccountId::new(0, 0, 3), "m")
            .await
            .unwrap();

        let unsigned = ledger.submit_signed_transaction(&tx.bytes).await.unwrap();
        assert_eq!(unsigned.status, ExecutionStatus::Other("INVALID_SIGNATURE".into()));

        let mut signed = SIGNATURE_PREFIX.to_vec();
        signed.extend_from_slice(&tx.bytes);
        let first = ledger.submit_signed_transaction(&signed).await.unwrap();
        assert!(first.status.is_success());
        assert_eq!(first.transaction_id, tx.transaction_id);

        let replay = ledger.submit_signed_transaction(&signed).await.unwrap();
        assert_eq!(replay.status, ExecutionStatus::Other("DUPLICATE_TRANSACTION".into()));
    }
}
