// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use licensa_core::DecodedMessage;
use serde::Serialize;

use crate::quota::{QuotaPolicy, QuotaView, project_quota};
use crate::views::{LicenseView, ProjectView, SubscriptionView};

/// Every projection of one topic, computed from one fetched message set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicSnapshot {
    pub message_count: usize,
    pub license: Option<LicenseView>,
    pub quota: Option<QuotaView>,
    pub subscription: Option<SubscriptionView>,
    pub subscription_active: bool,
    pub projects: Vec<ProjectView>,
}

impl TopicSnapshot {
    pub fn from_messages(
        messages: &[DecodedMessage],
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let subscription = SubscriptionView::project(messages);
        Self {
            message_count: messages.len(),
            license: LicenseView::project(messages),
            quota: project_quota(messages, policy),
            subscription_active: subscription.as_ref().is_some_and(|s| s.is_active(now)),
            subscription,
            projects: ProjectView::project_all(messages),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::tests::msg;
    use serde_json::json;

    #[test]
    fn empty_topic_snapshot_uses_bootstrap_quota() {
        let snapshot = TopicSnapshot::from_messages(&[], &QuotaPolicy::default(), Utc::now());
        assert_eq!(snapshot.message_count, 0);
        assert!(snapshot.license.is_none());
        assert_eq!(snapshot.quota.map(|q| q.remaining), Some(10));
        assert!(!snapshot.subscription_active);
    }

    #[test]
    fn snapshot_combines_views() {
        let messages = vec![
            msg(1, 1, json!({"type": "license-creation", "tokenId": "0.0.5", "serialNumber": 4})),
            msg(2, 2, json!({"type": "project-creation", "projectName": "p", "usageQuota": 30})),
            msg(3, 3, json!({
                "type": "subscription-created",
                "status": "active",
                "expiresAt": "2999-01-01T00:00:00Z"
            })),
        ];
        let snapshot = TopicSnapshot::from_messages(&messages, &QuotaPolicy::default(), Utc::now());
        assert_eq!(snapshot.license.unwrap().serial_number, 4);
        assert_eq!(snapshot.quota.unwrap().remaining, 30);
        assert!(snapshot.subscription_active);
        assert_eq!(snapshot.projects.len(), 1);
    }
}
