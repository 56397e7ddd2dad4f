// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! State projection for Licensa.
//!
//! Nothing in this crate is stored. Every view is recomputed from a topic's
//! decoded message sequence, so the log stays the single source of truth and
//! a fresh fetch is the only way a view changes.
//!
//! - [`project`] returns the content of the most recent message of one kind.
//! - [`project_quota`] finds the current usage quota, with a bootstrap default
//!   for freshly created topics.
//! - [`views`] turns records into typed license, subscription, project, and
//!   chat views.
//! - [`TopicSnapshot`] bundles all of the above for one topic.

pub mod project;
pub mod quota;
pub mod snapshot;
pub mod views;

pub use project::{latest, of_kind, project};
pub use quota::{QuotaPolicy, QuotaSource, QuotaView, project_quota};
pub use snapshot::TopicSnapshot;
pub use views::{ChatRecord, LicenseView, ProjectView, SubscriptionView};
