// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wallet stand-in.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use licensa_core::{LicensaError, TransactionSigner, UnsignedTransaction};

/// Marker the mock ledger checks for before accepting a transaction.
pub const SIGNATURE_PREFIX: &[u8] = b"signed:";

/// Signs by prefixing the frozen bytes; can be told to refuse.
#[derive(Debug, Default)]
pub struct MockSigner {
    signed: AtomicUsize,
    reject: AtomicBool,
}

impl MockSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `sign` call fail as if the user declined.
    pub fn reject_all(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn signed(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    async fn sign(&self, transaction: &UnsignedTransaction) -> Result<Vec<u8>, LicensaError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(LicensaError::Ledger {
                operation: "sign".into(),
                status: "USER_REJECTED".into(),
            });
        }
        self.signed.fetch_add(1, Ordering::SeqCst);
        let mut signed = SIGNATURE_PREFIX.to_vec();
        signed.extend_from_slice(&transaction.bytes);
        Ok(signed)
    }
}
