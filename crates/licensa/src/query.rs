// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only commands: every view is projected from the topic's messages.

use chrono::Utc;
use licensa_core::{LicensaError, TopicId};
use licensa_mirror::TopicMessageStore;
use licensa_projection::{
    ChatRecord, LicenseView, ProjectView, QuotaPolicy, SubscriptionView, TopicSnapshot,
    project_quota,
};
use serde_json::{Value, json};

/// Which projection of a topic to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Messages,
    Quota,
    Subscription,
    License,
    Projects,
    Chat,
    Snapshot,
}

pub async fn run_query(
    store: &TopicMessageStore,
    policy: &QuotaPolicy,
    view: View,
    topic: &TopicId,
    refresh: bool,
) -> Result<Value, LicensaError> {
    let messages = if refresh {
        store.refresh(topic).await?
    } else {
        store.messages(topic).await?
    };

    let value = match view {
        View::Messages => serde_json::to_value(&*messages),
        View::Quota => serde_json::to_value(project_quota(&messages, policy)),
        View::Subscription => {
            let subscription = SubscriptionView::project(&messages);
            let active = subscription
                .as_ref()
                .is_some_and(|s| s.is_active(Utc::now()));
            return Ok(json!({ "subscription": subscription, "active": active }));
        }
        View::License => serde_json::to_value(LicenseView::project(&messages)),
        View::Projects => serde_json::to_value(ProjectView::project_all(&messages)),
        View::Chat => serde_json::to_value(ChatRecord::history(&messages)),
        View::Snapshot => serde_json::to_value(TopicSnapshot::from_messages(
            &messages,
            policy,
            Utc::now(),
        )),
    };
    value.map_err(|e| LicensaError::Internal(format!("failed to serialize {view:?} view: {e}")))
}
