// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription purchase: read quota, build, sign, submit, record, confirm.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use licensa_config::model::{LicensaConfig, PlanConfig};
use licensa_core::{
    AccountId, ExecutionResult, ExecutionStatus, LedgerOperations, LicensaError, MessageKind,
    TopicId, TransactionSigner, UnsignedTransaction,
};
use licensa_mirror::TopicMessageStore;
use licensa_projection::{QuotaPolicy, QuotaView, SubscriptionView, of_kind, project_quota};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

/// Why a purchase did not complete.
///
/// Variants after [`PaymentError::Rejected`] mean the payment itself went
/// through; they carry the transaction id so the purchase can be finished
/// rather than paid twice.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The topic's current quota could not be read. Nothing was paid.
    #[error("reading the current quota failed: {0}")]
    QuotaRead(#[source] LicensaError),

    #[error("could not build transfer: {0}")]
    Build(#[source] LicensaError),

    #[error("signing failed: {0}")]
    Signing(#[source] LicensaError),

    /// Outcome unknown: the transaction may or may not have reached consensus.
    #[error("submitting transaction {transaction_id} failed: {source}")]
    Submit {
        transaction_id: String,
        #[source]
        source: LicensaError,
    },

    #[error("transaction {transaction_id} rejected with {status}")]
    Rejected {
        transaction_id: String,
        status: ExecutionStatus,
    },

    /// Paid, but the subscription record was not written. Write `record`
    /// with [`PaymentWorkflow::record_subscription`].
    #[error("transaction {transaction_id} settled but the subscription was not recorded: {reason}")]
    Unrecorded {
        transaction_id: String,
        record: Value,
        reason: String,
    },

    /// Paid and recorded, but the topic could not be read back.
    #[error("transaction {transaction_id} recorded but the topic could not be refreshed: {source}")]
    Refresh {
        transaction_id: String,
        subscription_id: String,
        #[source]
        source: LicensaError,
    },

    /// Paid and recorded, but the mirror does not show the record yet.
    /// Retry with [`PaymentWorkflow::confirm_purchase`].
    #[error("subscription {subscription_id} of transaction {transaction_id} is not visible on the mirror yet")]
    Unconfirmed {
        transaction_id: String,
        subscription_id: String,
        record: Value,
    },
}

impl PaymentError {
    /// Id of the value transfer, when one was built.
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            PaymentError::QuotaRead(_) | PaymentError::Build(_) | PaymentError::Signing(_) => None,
            PaymentError::Submit { transaction_id, .. }
            | PaymentError::Rejected { transaction_id, .. }
            | PaymentError::Unrecorded { transaction_id, .. }
            | PaymentError::Refresh { transaction_id, .. }
            | PaymentError::Unconfirmed { transaction_id, .. } => Some(transaction_id),
        }
    }

    /// True once the payment is known to have settled.
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            PaymentError::Unrecorded { .. }
                | PaymentError::Refresh { .. }
                | PaymentError::Unconfirmed { .. }
        )
    }

    /// True when the failed stage can be repeated without paying twice:
    /// a quota read by purchasing again, a read-back by calling
    /// [`PaymentWorkflow::confirm_purchase`].
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::QuotaRead(e) | PaymentError::Refresh { source: e, .. } => {
                e.is_transient()
            }
            PaymentError::Unconfirmed { .. } => true,
            _ => false,
        }
    }
}

/// A completed purchase with the state re-projected from the log.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub transaction_id: String,
    pub subscription_id: String,
    pub subscription: Option<SubscriptionView>,
    pub quota: Option<QuotaView>,
}

pub struct PaymentWorkflow {
    ledger: Arc<dyn LedgerOperations>,
    signer: Arc<dyn TransactionSigner>,
    store: TopicMessageStore,
    treasury: AccountId,
    policy: QuotaPolicy,
}

impl PaymentWorkflow {
    /// Fails with [`LicensaError::Config`] when the operator or treasury
    /// account is missing.
    pub fn new(
        ledger: Arc<dyn LedgerOperations>,
        signer: Arc<dyn TransactionSigner>,
        store: TopicMessageStore,
        config: &LicensaConfig,
    ) -> Result<Self, LicensaError> {
        if config.ledger.operator_account_id.is_none() {
            return Err(LicensaError::Config(
                "ledger.operator_account_id is required to take payments".into(),
            ));
        }
        let treasury = config.ledger.treasury_account_id.ok_or_else(|| {
            LicensaError::Config("ledger.treasury_account_id is required to take payments".into())
        })?;

        Ok(Self {
            ledger,
            signer,
            store,
            treasury,
            policy: QuotaPolicy::from_config(&config.quota),
        })
    }

    pub fn treasury(&self) -> AccountId {
        self.treasury
    }

    /// Builds an unsigned value transfer for the wallet to sign.
    pub async fn build_transfer(
        &self,
        amount_tinybar: u64,
        payer: &AccountId,
        payee: &AccountId,
        memo: &str,
    ) -> Result<UnsignedTransaction, LicensaError> {
        self.ledger
            .build_transfer(amount_tinybar, payer, payee, memo)
            .await
    }

    /// Submits wallet-signed transaction bytes.
    pub async fn submit(&self, signed_bytes: &[u8]) -> Result<ExecutionResult, LicensaError> {
        self.ledger.submit_signed_transaction(signed_bytes).await
    }

    /// Writes a subscription record to `topic` and drops the cached view of it.
    pub async fn record_subscription(
        &self,
        topic: &TopicId,
        record: &Value,
    ) -> Result<ExecutionStatus, LicensaError> {
        let result = self.ledger.submit_message(topic, &record.to_string()).await;
        self.store.invalidate(topic);
        result
    }

    /// Pays for `plan` from `payer` and records the subscription on `topic`.
    ///
    /// The new quota is the topic's current quota plus the plan's message
    /// allowance. The current quota is read before any money moves. The
    /// returned views are read back from the log, not computed locally.
    pub async fn purchase_subscription(
        &self,
        plan: &PlanConfig,
        payer: &AccountId,
        topic: &TopicId,
    ) -> Result<PurchaseReceipt, PaymentError> {
        let current = self
            .store
            .refresh(topic)
            .await
            .map_err(PaymentError::QuotaRead)?;
        let prior_quota = project_quota(&current, &self.policy).map_or(0, |q| q.remaining);

        let memo = format!("licensa {} subscription for {topic}", plan.name);
        let tx = self
            .build_transfer(plan.price_tinybar, payer, &self.treasury, &memo)
            .await
            .map_err(PaymentError::Build)?;
        let transaction_id = tx.transaction_id.clone();

        let signed = self.signer.sign(&tx).await.map_err(PaymentError::Signing)?;

        let result = self
            .submit(&signed)
            .await
            .map_err(|source| PaymentError::Submit {
                transaction_id: transaction_id.clone(),
                source,
            })?;
        if !result.status.is_success() {
            warn!(
                transaction = %transaction_id,
                status = %result.status,
                "subscription payment rejected"
            );
            return Err(PaymentError::Rejected {
                transaction_id,
                status: result.status,
            });
        }
        info!(
            transaction = %transaction_id,
            plan = %plan.name,
            amount_tinybar = plan.price_tinybar,
            "subscription payment settled"
        );

        let subscription_id = uuid::Uuid::new_v4().to_string();
        let record = subscription_record(
            plan,
            &subscription_id,
            &transaction_id,
            prior_quota,
            Utc::now(),
        );
        let reason = match self.record_subscription(topic, &record).await {
            Ok(status) if status.is_success() => None,
            Ok(status) => Some(format!("ledger returned {status}")),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = reason {
            warn!(transaction = %transaction_id, %reason, "subscription record not written");
            return Err(PaymentError::Unrecorded {
                transaction_id,
                record,
                reason,
            });
        }

        self.confirm_purchase(topic, &transaction_id, &record).await
    }

    /// Reads `topic` back and checks that it shows the subscription in `record`.
    ///
    /// Fails with [`PaymentError::Unconfirmed`] while the mirror lags behind
    /// the ledger; the lagging read is not cached.
    pub async fn confirm_purchase(
        &self,
        topic: &TopicId,
        transaction_id: &str,
        record: &Value,
    ) -> Result<PurchaseReceipt, PaymentError> {
        let subscription_id = record
            .get("subscriptionId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let messages = self
            .store
            .fetch_uncached(topic)
            .await
            .map_err(|source| PaymentError::Refresh {
                transaction_id: transaction_id.to_string(),
                subscription_id: subscription_id.clone(),
                source,
            })?;
        let visible = of_kind(&messages, &MessageKind::SubscriptionCreated)
            .iter()
            .any(|m| m.str_field("subscriptionId") == Some(subscription_id.as_str()));
        if !visible {
            info!(
                transaction = %transaction_id,
                subscription = %subscription_id,
                "subscription not yet visible on the mirror"
            );
            return Err(PaymentError::Unconfirmed {
                transaction_id: transaction_id.to_string(),
                subscription_id,
                record: record.clone(),
            });
        }
        self.store.remember(*topic, Arc::clone(&messages));

        let quota = project_quota(&messages, &self.policy);
        info!(
            transaction = %transaction_id,
            subscription = %subscription_id,
            quota = quota.as_ref().map(|q| q.remaining),
            "subscription recorded"
        );

        Ok(PurchaseReceipt {
            transaction_id: transaction_id.to_string(),
            subscription_id,
            subscription: SubscriptionView::project(&messages),
            quota,
        })
    }
}

/// The `subscription-created` message for one purchase of `plan`.
pub fn subscription_record(
    plan: &PlanConfig,
    subscription_id: &str,
    transaction_id: &str,
    prior_quota: u64,
    now: DateTime<Utc>,
) -> Value {
    let expires_at = now + Duration::days(i64::from(plan.duration_days));
    json!({
        "type": MessageKind::SubscriptionCreated.as_str(),
        "subscriptionId": subscription_id,
        "plan": plan.name,
        "expiresAt": expires_at.to_rfc3339(),
        "projectLimit": plan.project_limit,
        "messageLimit": plan.message_limit,
        "priceUSD": plan.price_usd,
        "priceHSuite": plan.price_hsuite,
        "status": "active",
        "transactionId": transaction_id,
        "usageQuota": prior_quota.saturating_add(plan.message_limit),
        "timestamp": now.to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use licensa_test_utils::{HOLDER, LedgerCall, ScriptedFailure, TestHarness};

    fn payments(harness: &TestHarness) -> PaymentWorkflow {
        PaymentWorkflow::new(
            harness.ledger.clone(),
            harness.signer.clone(),
            harness.store.clone(),
            &harness.config,
        )
        .unwrap()
    }

    fn basic(harness: &TestHarness) -> PlanConfig {
        harness.config.plan("basic").cloned().unwrap()
    }

    #[test]
    fn record_adds_plan_allowance_to_prior_quota() {
        let harness = TestHarness::new();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let record = subscription_record(&basic(&harness), "sub-1", "0.0.4242@1", 7, now);

        assert_eq!(record["type"], "subscription-created");
        assert_eq!(record["usageQuota"], 507);
        assert_eq!(record["status"], "active");
        assert_eq!(record["projectLimit"], 3);
        assert_eq!(record["expiresAt"], "2026-03-31T12:00:00+00:00");
    }

    #[test]
    fn missing_treasury_is_fatal() {
        let mut config = TestHarness::default_config();
        config.ledger.treasury_account_id = None;
        let harness = TestHarness::with_config(config);
        let err = PaymentWorkflow::new(
            harness.ledger.clone(),
            harness.signer.clone(),
            harness.store.clone(),
            &harness.config,
        )
        .err()
        .unwrap();
        assert!(matches!(err, LicensaError::Config(_)));
    }

    #[tokio::test]
    async fn purchase_on_empty_topic_starts_from_bootstrap_quota() {
        let harness = TestHarness::new();
        let topic = harness.seed_topic(&[]).await;

        let receipt = payments(&harness)
            .purchase_subscription(&basic(&harness), &HOLDER, &topic)
            .await
            .unwrap();

        assert_eq!(receipt.quota.unwrap().remaining, 10 + 500);
        let subscription = receipt.subscription.unwrap();
        assert_eq!(subscription.status, "active");
        assert_eq!(subscription.subscription_id.as_deref(), Some(receipt.subscription_id.as_str()));
        assert_eq!(harness.state.lock().await.settled.len(), 1);
    }

    #[tokio::test]
    async fn rejected_signature_submits_nothing() {
        let harness = TestHarness::new();
        let topic = harness.seed_topic(&[]).await;
        harness.signer.reject_all(true);

        let err = payments(&harness)
            .purchase_subscription(&basic(&harness), &HOLDER, &topic)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Signing(_)));
        assert!(!err.is_paid());
        assert_eq!(harness.ledger.calls(LedgerCall::SubmitSignedTransaction).await, 0);
        assert_eq!(harness.ledger.calls(LedgerCall::SubmitMessage).await, 0);
    }

    #[tokio::test]
    async fn unreadable_quota_moves_no_money() {
        let harness = TestHarness::new();
        let topic = harness.seed_topic(&[]).await;
        harness.mirror.fail_fetches(1).await;

        let err = payments(&harness)
            .purchase_subscription(&basic(&harness), &HOLDER, &topic)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::QuotaRead(_)), "{err}");
        assert!(!err.is_paid());
        assert!(err.is_retryable());
        assert_eq!(err.transaction_id(), None);
        assert_eq!(harness.ledger.calls(LedgerCall::SubmitSignedTransaction).await, 0);
        assert!(harness.state.lock().await.settled.is_empty());
    }

    #[tokio::test]
    async fn duplicate_submission_is_rejected() {
        let harness = TestHarness::new();
        let payments = payments(&harness);
        let tx = payments
            .build_transfer(100, &HOLDER, &payments.treasury(), "memo")
            .await
            .unwrap();
        let signed = harness.signer.sign(&tx).await.unwrap();

        assert!(payments.submit(&signed).await.unwrap().status.is_success());
        let again = payments.submit(&signed).await.unwrap();
        assert_eq!(again.status.as_str(), "DUPLICATE_TRANSACTION");
        assert_eq!(harness.state.lock().await.settled.len(), 1);
    }

    #[tokio::test]
    async fn failed_record_reports_paid_and_returns_record() {
        let harness = TestHarness::new();
        let topic = harness.seed_topic(&[]).await;
        harness
            .ledger
            .fail_next(LedgerCall::SubmitMessage, ScriptedFailure::Transient)
            .await;

        let payments = payments(&harness);
        let err = payments
            .purchase_subscription(&basic(&harness), &HOLDER, &topic)
            .await
            .unwrap_err();
        assert!(err.is_paid());
        let PaymentError::Unrecorded { record, .. } = err else {
            panic!("expected an unrecorded payment");
        };

        assert!(payments.record_subscription(&topic, &record).await.unwrap().is_success());
        let messages = harness.store.messages(&topic).await.unwrap();
        assert_eq!(SubscriptionView::project(&messages).unwrap().status, "active");
    }
}
