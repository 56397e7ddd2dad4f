// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ledger-mutating workflows for Licensa.
//!
//! - [`license`]: the step-indexed license issuance state machine. Every step
//!   is one irreversible ledger operation, so the state only moves forward
//!   and a failure freezes it at the last checkpoint for a later retry.
//! - [`payment`]: subscription purchase. The purchase is only visible once
//!   its record is on the log and has been re-projected.

pub mod license;
pub mod payment;

pub use license::{
    LicenseFacts, LicenseWorkflow, LicenseWorkflowState, Step, StepError, StepErrorKind,
    StepOutcome,
};
pub use payment::{PaymentError, PaymentWorkflow, PurchaseReceipt, subscription_record};
