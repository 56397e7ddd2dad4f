// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! License issuance state machine.
//!
//! ```text
//! Init --create_log--> TopicCreated --mint_token--> TokenMinted --associate-->
//! TokenAssociated --record_message--> MessageRecorded --transfer--> Complete
//! ```
//!
//! `transfer` passes through `TokenTransferred` and only reports `Complete`
//! once the license record is readable from the mirror. A failed step moves
//! the workflow to `Failed`, which keeps the last checkpoint; running the same
//! step again retries from there. The state is serde-serializable so a caller
//! can persist it between attempts and [`LicenseWorkflow::resume`] later.

use std::sync::Arc;

use chrono::Utc;
use licensa_config::model::LedgerConfig;
use licensa_core::{
    AccountId, ExecutionStatus, LedgerOperations, LicensaError, MessageKind, TokenId, TopicId,
};
use licensa_mirror::TopicMessageStore;
use licensa_projection::{LicenseView, of_kind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

/// One transition of the issuance workflow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    CreateLog,
    MintToken,
    Associate,
    RecordMessage,
    Transfer,
}

impl Step {
    /// Rank of the checkpoint this step starts from.
    fn from_rank(self) -> u8 {
        match self {
            Step::CreateLog => 0,
            Step::MintToken => 1,
            Step::Associate => 2,
            Step::RecordMessage => 3,
            Step::Transfer => 4,
        }
    }

    /// Rank of the checkpoint this step ends at.
    fn target_rank(self) -> u8 {
        match self {
            Step::Transfer => 6,
            other => other.from_rank() + 1,
        }
    }
}

/// Everything known about a license once the holder is associated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseFacts {
    pub topic_id: TopicId,
    pub token_id: TokenId,
    pub serial_number: u64,
    pub owner_account_id: AccountId,
}

/// Progress of one issuance attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(tag = "state", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LicenseWorkflowState {
    Init,
    TopicCreated {
        topic_id: TopicId,
    },
    TokenMinted {
        topic_id: TopicId,
        token_id: TokenId,
        serial_number: u64,
    },
    TokenAssociated(LicenseFacts),
    MessageRecorded(LicenseFacts),
    TokenTransferred(LicenseFacts),
    Complete(LicenseFacts),
    /// Frozen at `checkpoint` after `step` failed.
    Failed {
        checkpoint: Box<LicenseWorkflowState>,
        step: Step,
        reason: String,
    },
}

impl LicenseWorkflowState {
    /// The last successfully reached state.
    pub fn checkpoint(&self) -> &LicenseWorkflowState {
        match self {
            LicenseWorkflowState::Failed { checkpoint, .. } => checkpoint,
            other => other,
        }
    }

    fn rank(&self) -> u8 {
        match self.checkpoint() {
            LicenseWorkflowState::Init => 0,
            LicenseWorkflowState::TopicCreated { .. } => 1,
            LicenseWorkflowState::TokenMinted { .. } => 2,
            LicenseWorkflowState::TokenAssociated(_) => 3,
            LicenseWorkflowState::MessageRecorded(_) => 4,
            LicenseWorkflowState::TokenTransferred(_) => 5,
            LicenseWorkflowState::Complete(_) => 6,
            // A checkpoint is never itself a failure.
            LicenseWorkflowState::Failed { .. } => 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, LicenseWorkflowState::Complete(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LicenseWorkflowState::Failed { .. })
    }

    /// The step `advance` would run next, `None` once complete.
    pub fn next_step(&self) -> Option<Step> {
        match self.rank() {
            0 => Some(Step::CreateLog),
            1 => Some(Step::MintToken),
            2 => Some(Step::Associate),
            3 => Some(Step::RecordMessage),
            4 | 5 => Some(Step::Transfer),
            _ => None,
        }
    }

    pub fn topic_id(&self) -> Option<TopicId> {
        match self.checkpoint() {
            LicenseWorkflowState::TopicCreated { topic_id }
            | LicenseWorkflowState::TokenMinted { topic_id, .. } => Some(*topic_id),
            other => other.facts().map(|f| f.topic_id),
        }
    }

    /// Token and serial, once minted.
    pub fn token(&self) -> Option<(TokenId, u64)> {
        match self.checkpoint() {
            LicenseWorkflowState::TokenMinted {
                token_id,
                serial_number,
                ..
            } => Some((*token_id, *serial_number)),
            other => other.facts().map(|f| (f.token_id, f.serial_number)),
        }
    }

    pub fn facts(&self) -> Option<&LicenseFacts> {
        match self.checkpoint() {
            LicenseWorkflowState::TokenAssociated(facts)
            | LicenseWorkflowState::MessageRecorded(facts)
            | LicenseWorkflowState::TokenTransferred(facts)
            | LicenseWorkflowState::Complete(facts) => Some(facts),
            _ => None,
        }
    }
}

/// How a successful step call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The ledger operation ran and the workflow moved forward.
    Advanced,
    /// The step's target was already reached; nothing was done.
    AlreadyReached,
    /// The holder was associated before; no association was submitted.
    AlreadyAssociated,
    /// The license record was already on the log from an earlier attempt.
    AlreadyRecorded,
    /// The transfer reported failure but the holder owns the serial.
    AlreadyOwned,
}

/// Classification of a [`StepError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepErrorKind {
    /// The step's starting checkpoint has not been reached. State is unchanged.
    OutOfOrder,
    /// Network failure or timeout. Retrying the step may succeed.
    Transient,
    /// The ledger refused the operation.
    Rejected,
    /// The effect happened but is not visible on the mirror yet.
    Unconfirmed,
}

/// A failed step, rendered to callers as `{step, error}`.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{step} failed: {error}")]
pub struct StepError {
    pub step: Step,
    pub error: String,
    #[serde(skip)]
    pub kind: StepErrorKind,
}

impl StepError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            StepErrorKind::Transient | StepErrorKind::Unconfirmed
        )
    }
}

fn kind_of(error: &LicensaError) -> StepErrorKind {
    if error.is_transient() {
        StepErrorKind::Transient
    } else {
        StepErrorKind::Rejected
    }
}

/// Drives one license from nothing to a transferred, recorded NFT.
pub struct LicenseWorkflow {
    ledger: Arc<dyn LedgerOperations>,
    store: TopicMessageStore,
    operator: AccountId,
    treasury: AccountId,
    holder: AccountId,
    metadata: Vec<u8>,
    state: LicenseWorkflowState,
}

impl LicenseWorkflow {
    /// Starts a fresh issuance for `holder`.
    ///
    /// Fails with [`LicensaError::Config`] when the operator or treasury
    /// account is not configured, since no step could succeed.
    pub fn new(
        ledger: Arc<dyn LedgerOperations>,
        store: TopicMessageStore,
        config: &LedgerConfig,
        holder: AccountId,
    ) -> Result<Self, LicensaError> {
        Self::resume(ledger, store, config, holder, LicenseWorkflowState::Init)
    }

    /// Continues an issuance from a persisted state.
    ///
    /// Fails with [`LicensaError::Config`] when `state` already names an
    /// owner other than `holder`.
    pub fn resume(
        ledger: Arc<dyn LedgerOperations>,
        store: TopicMessageStore,
        config: &LedgerConfig,
        holder: AccountId,
        state: LicenseWorkflowState,
    ) -> Result<Self, LicensaError> {
        let operator = config.operator_account_id.ok_or_else(|| {
            LicensaError::Config("ledger.operator_account_id is required to issue licenses".into())
        })?;
        let treasury = config.treasury_account_id.ok_or_else(|| {
            LicensaError::Config("ledger.treasury_account_id is required to issue licenses".into())
        })?;
        if let Some(owner) = state.facts().map(|f| f.owner_account_id) {
            if owner != holder {
                return Err(LicensaError::Config(format!(
                    "workflow state belongs to {owner}, not {holder}"
                )));
            }
        }

        Ok(Self {
            ledger,
            store,
            operator,
            treasury,
            holder,
            metadata: format!("licensa:{holder}").into_bytes(),
            state,
        })
    }

    /// Overrides the NFT metadata minted for this license.
    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn state(&self) -> &LicenseWorkflowState {
        &self.state
    }

    pub fn into_state(self) -> LicenseWorkflowState {
        self.state
    }

    pub fn holder(&self) -> AccountId {
        self.holder
    }

    /// Runs the next pending step.
    pub async fn advance(&mut self) -> Result<StepOutcome, StepError> {
        match self.state.next_step() {
            Some(step) => self.run(step).await,
            None => Ok(StepOutcome::AlreadyReached),
        }
    }

    /// Advances until complete or until the first failing step.
    pub async fn run_to_completion(&mut self) -> Result<&LicenseWorkflowState, StepError> {
        while self.state.next_step().is_some() {
            self.advance().await?;
        }
        Ok(&self.state)
    }

    pub async fn run(&mut self, step: Step) -> Result<StepOutcome, StepError> {
        match step {
            Step::CreateLog => self.create_log().await,
            Step::MintToken => self.mint_token().await,
            Step::Associate => self.associate().await,
            Step::RecordMessage => self.record_message().await,
            Step::Transfer => self.transfer().await,
        }
    }

    pub async fn create_log(&mut self) -> Result<StepOutcome, StepError> {
        let step = Step::CreateLog;
        if let Some(outcome) = self.check(step)? {
            return Ok(outcome);
        }

        let memo = format!("licensa license for {} by {}", self.holder, self.operator);
        let result = self.ledger.create_topic(&memo).await;
        match result {
            Ok(topic_id) => {
                self.reach(step, LicenseWorkflowState::TopicCreated { topic_id });
                Ok(StepOutcome::Advanced)
            }
            Err(e) => Err(self.fail(step, e.to_string(), kind_of(&e))),
        }
    }

    pub async fn mint_token(&mut self) -> Result<StepOutcome, StepError> {
        let step = Step::MintToken;
        if let Some(outcome) = self.check(step)? {
            return Ok(outcome);
        }
        let LicenseWorkflowState::TopicCreated { topic_id } = *self.state.checkpoint() else {
            return Err(self.out_of_order(step));
        };

        let result = self.ledger.mint_token(&self.metadata).await;
        match result {
            Ok(receipt) => {
                self.reach(
                    step,
                    LicenseWorkflowState::TokenMinted {
                        topic_id,
                        token_id: receipt.token_id,
                        serial_number: receipt.serial_number,
                    },
                );
                Ok(StepOutcome::Advanced)
            }
            Err(e) => Err(self.fail(step, e.to_string(), kind_of(&e))),
        }
    }

    /// Associates the holder with the license token, skipping the ledger
    /// call when the mirror already shows the association.
    pub async fn associate(&mut self) -> Result<StepOutcome, StepError> {
        let step = Step::Associate;
        if let Some(outcome) = self.check(step)? {
            return Ok(outcome);
        }
        let LicenseWorkflowState::TokenMinted {
            topic_id,
            token_id,
            serial_number,
        } = *self.state.checkpoint()
        else {
            return Err(self.out_of_order(step));
        };
        let facts = LicenseFacts {
            topic_id,
            token_id,
            serial_number,
            owner_account_id: self.holder,
        };

        let associated = match self
            .store
            .reader()
            .is_token_associated(&self.holder, &token_id)
            .await
        {
            Ok(associated) => associated,
            Err(e) => {
                warn!(error = %e, "association lookup failed, submitting association");
                false
            }
        };
        if associated {
            self.reach(step, LicenseWorkflowState::TokenAssociated(facts));
            return Ok(StepOutcome::AlreadyAssociated);
        }

        let result = self.ledger.associate_token(&self.holder, &token_id).await;
        match result {
            Ok(ExecutionStatus::Success) => {
                self.reach(step, LicenseWorkflowState::TokenAssociated(facts));
                Ok(StepOutcome::Advanced)
            }
            Ok(ExecutionStatus::TokenAlreadyAssociated) => {
                self.reach(step, LicenseWorkflowState::TokenAssociated(facts));
                Ok(StepOutcome::AlreadyAssociated)
            }
            Ok(status) => Err(self.fail(
                step,
                format!("ledger returned {status}"),
                StepErrorKind::Rejected,
            )),
            Err(e) => Err(self.fail(step, e.to_string(), kind_of(&e))),
        }
    }

    /// Appends the `license-creation` record to the license topic.
    ///
    /// On a retry the topic is read first, so a record whose acknowledgement
    /// was lost is not written twice.
    pub async fn record_message(&mut self) -> Result<StepOutcome, StepError> {
        let step = Step::RecordMessage;
        if let Some(outcome) = self.check(step)? {
            return Ok(outcome);
        }
        let LicenseWorkflowState::TokenAssociated(facts) = self.state.checkpoint().clone() else {
            return Err(self.out_of_order(step));
        };

        let retrying = matches!(
            self.state,
            LicenseWorkflowState::Failed {
                step: Step::RecordMessage,
                ..
            }
        );
        if retrying {
            let visible = self.record_visible(&facts).await;
            match visible {
                Ok(true) => {
                    self.reach(step, LicenseWorkflowState::MessageRecorded(facts));
                    return Ok(StepOutcome::AlreadyRecorded);
                }
                Ok(false) => {}
                Err(e) => return Err(self.fail(step, e.to_string(), kind_of(&e))),
            }
        }

        let record = json!({
            "type": MessageKind::LicenseCreation.as_str(),
            "tokenId": facts.token_id.to_string(),
            "serialNumber": facts.serial_number,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let result = self
            .ledger
            .submit_message(&facts.topic_id, &record.to_string())
            .await;
        // Whatever happened, the cached view of this topic may be stale now.
        self.store.invalidate(&facts.topic_id);

        match result {
            Ok(status) if status.is_success() => {
                self.reach(step, LicenseWorkflowState::MessageRecorded(facts));
                Ok(StepOutcome::Advanced)
            }
            Ok(status) => Err(self.fail(
                step,
                format!("ledger returned {status}"),
                StepErrorKind::Rejected,
            )),
            Err(e) => Err(self.fail(step, e.to_string(), kind_of(&e))),
        }
    }

    /// Moves the NFT from the treasury to the holder, then confirms the
    /// license record on the mirror.
    ///
    /// A failed transfer is double-checked against the mirror's ownership
    /// view: if the holder owns the serial, the step succeeds as
    /// [`StepOutcome::AlreadyOwned`].
    pub async fn transfer(&mut self) -> Result<StepOutcome, StepError> {
        let step = Step::Transfer;
        if let Some(outcome) = self.check(step)? {
            return Ok(outcome);
        }
        let (facts, transferred) = match self.state.checkpoint() {
            LicenseWorkflowState::MessageRecorded(facts) => (facts.clone(), false),
            LicenseWorkflowState::TokenTransferred(facts) => (facts.clone(), true),
            _ => return Err(self.out_of_order(step)),
        };

        let mut outcome = StepOutcome::Advanced;
        if !transferred {
            let failure = match self
                .ledger
                .transfer_nft(
                    &facts.token_id,
                    facts.serial_number,
                    &self.treasury,
                    &self.holder,
                )
                .await
            {
                Ok(status) if status.is_success() => None,
                Ok(status) => Some((format!("ledger returned {status}"), StepErrorKind::Rejected)),
                Err(e) => Some((e.to_string(), kind_of(&e))),
            };

            if let Some((reason, kind)) = failure {
                let owner = self
                    .store
                    .reader()
                    .nft_owner(&facts.token_id, facts.serial_number)
                    .await;
                match owner {
                    Ok(Some(owner)) if owner == self.holder => {
                        warn!(
                            token = %facts.token_id,
                            serial = facts.serial_number,
                            reason = %reason,
                            "transfer reported failure but holder owns the serial"
                        );
                        outcome = StepOutcome::AlreadyOwned;
                    }
                    Ok(_) => return Err(self.fail(step, reason, kind)),
                    Err(e) => {
                        warn!(error = %e, "ownership lookup after failed transfer also failed");
                        return Err(self.fail(step, reason, kind));
                    }
                }
            }
            self.reach(step, LicenseWorkflowState::TokenTransferred(facts.clone()));
        }

        let visible = self.record_visible(&facts).await;
        match visible {
            Ok(true) => {
                self.reach(step, LicenseWorkflowState::Complete(facts));
                Ok(outcome)
            }
            Ok(false) => Err(self.fail(
                step,
                "license record not yet visible on the mirror".to_string(),
                StepErrorKind::Unconfirmed,
            )),
            Err(e) => Err(self.fail(step, e.to_string(), kind_of(&e))),
        }
    }

    /// Returns the outcome to short-circuit with, or an error if too early.
    fn check(&self, step: Step) -> Result<Option<StepOutcome>, StepError> {
        let rank = self.state.rank();
        if rank >= step.target_rank() {
            return Ok(Some(StepOutcome::AlreadyReached));
        }
        if rank < step.from_rank() {
            return Err(self.out_of_order(step));
        }
        Ok(None)
    }

    fn out_of_order(&self, step: Step) -> StepError {
        StepError {
            step,
            error: format!(
                "cannot run {step} while the workflow is at {}",
                self.state.checkpoint()
            ),
            kind: StepErrorKind::OutOfOrder,
        }
    }

    fn reach(&mut self, step: Step, state: LicenseWorkflowState) {
        info!(
            holder = %self.holder,
            step = %step,
            state = %state,
            "license workflow advanced"
        );
        self.state = state;
    }

    fn fail(&mut self, step: Step, reason: String, kind: StepErrorKind) -> StepError {
        let checkpoint = self.state.checkpoint().clone();
        warn!(
            holder = %self.holder,
            step = %step,
            checkpoint = %checkpoint,
            reason = %reason,
            "license workflow step failed"
        );
        self.state = LicenseWorkflowState::Failed {
            checkpoint: Box::new(checkpoint),
            step,
            reason: reason.clone(),
        };
        StepError {
            step,
            error: reason,
            kind,
        }
    }

    /// Refetches the license topic and looks for this license's record.
    async fn record_visible(&self, facts: &LicenseFacts) -> Result<bool, LicensaError> {
        let messages = self.store.fetch_uncached(&facts.topic_id).await?;
        let visible = of_kind(&messages, &MessageKind::LicenseCreation)
            .into_iter()
            .filter_map(LicenseView::from_message)
            .any(|v| v.token_id == facts.token_id && v.serial_number == facts.serial_number);
        if visible {
            self.store.remember(facts.topic_id, messages);
        }
        Ok(visible)
    }
}
