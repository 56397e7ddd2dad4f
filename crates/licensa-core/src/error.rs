// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Licensa.

use thiserror::Error;

/// The primary error type for read operations and ledger collaborators.
///
/// Data-quality problems in fetched log entries never surface here; they are
/// logged and the entry is dropped. Only transport, configuration, and ledger
/// execution problems become errors.
#[derive(Debug, Error)]
pub enum LicensaError {
    /// Missing or invalid configuration (no operator identity, bad URL, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// Non-2xx response or transport failure from a remote API.
    #[error("network error: {message}")]
    TransientNetwork {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Request exceeded the client timeout.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// A ledger operation executed but reported a non-success status.
    #[error("ledger operation `{operation}` returned {status}")]
    Ledger { operation: String, status: String },

    /// A remote API answered with a body that does not match its contract.
    #[error("malformed response: {0}")]
    Decode(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LicensaError {
    /// Returns true if the same call may be retried unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LicensaError::TransientNetwork { .. } | LicensaError::Timeout { .. }
        )
    }

    /// Wraps a transport error with a human-readable context message.
    pub fn network(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LicensaError::TransientNetwork {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(
            LicensaError::TransientNetwork {
                message: "502".into(),
                source: None
            }
            .is_transient()
        );
        assert!(
            LicensaError::Timeout {
                duration: std::time::Duration::from_secs(5)
            }
            .is_transient()
        );
        assert!(!LicensaError::Config("missing operator".into()).is_transient());
        assert!(
            !LicensaError::Ledger {
                operation: "mint".into(),
                status: "FAILED".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn display_never_includes_source_chain() {
        let err = LicensaError::network("mirror returned 503", std::io::Error::other("reset"));
        assert_eq!(err.to_string(), "network error: mirror returned 503");
    }
}
