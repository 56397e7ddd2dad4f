// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `licensa issue`: runs the issuance workflow, persisting its state between runs.

use std::path::Path;
use std::sync::Arc;

use licensa_config::model::LedgerConfig;
use licensa_core::{AccountId, LedgerOperations, LicensaError};
use licensa_lifecycle::{LicenseWorkflow, LicenseWorkflowState, StepError};
use licensa_mirror::TopicMessageStore;
use serde::Serialize;
use tracing::info;

/// What `issue` prints: the state reached and the error that stopped it.
#[derive(Debug, Serialize)]
pub struct IssueReport {
    pub state: LicenseWorkflowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

/// Reads a saved workflow state, or `Init` when there is no file yet.
pub fn load_state(path: &Path) -> Result<LicenseWorkflowState, LicensaError> {
    if !path.exists() {
        return Ok(LicenseWorkflowState::Init);
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| LicensaError::Internal(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| LicensaError::Decode(format!("workflow state in {}: {e}", path.display())))
}

pub fn save_state(path: &Path, state: &LicenseWorkflowState) -> Result<(), LicensaError> {
    let text = serde_json::to_string_pretty(state)
        .map_err(|e| LicensaError::Internal(format!("serializing workflow state: {e}")))?;
    std::fs::write(path, text)
        .map_err(|e| LicensaError::Internal(format!("writing {}: {e}", path.display())))
}

/// Advances the workflow for `holder` as far as it goes.
///
/// Configuration problems are returned as errors; a failing step is part of
/// the report so its state can still be saved and retried.
pub async fn run_issue(
    ledger: Arc<dyn LedgerOperations>,
    store: TopicMessageStore,
    config: &LedgerConfig,
    holder: AccountId,
    state_file: Option<&Path>,
) -> Result<IssueReport, LicensaError> {
    let state = match state_file {
        Some(path) => load_state(path)?,
        None => LicenseWorkflowState::Init,
    };
    info!(holder = %holder, state = %state, "starting license issuance");

    let mut workflow = LicenseWorkflow::resume(ledger, store, config, holder, state)?;
    let error = workflow.run_to_completion().await.err();
    let state = workflow.into_state();

    if let Some(path) = state_file {
        save_state(path, &state)?;
    }
    Ok(IssueReport { state, error })
}
