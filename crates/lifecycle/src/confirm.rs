//! Waiting for transactions to reach a confirmation depth.

use std::time::Duration;

use alloy_core::primitives::B256;
use anyhow::{Context, Result};

use crate::{
    chain::{ChainClient, TransactionReceipt},
    error::LifecycleError,
};

/// Default deadline for a single confirmation wait.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(600);

pub struct ConfirmationWaiter<'a, C> {
    client: &'a C,
    timeout: Duration,
}

impl<'a, C: ChainClient> ConfirmationWaiter<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait until `tx_hash` has `confirmations` blocks on top, or the deadline expires.
    ///
    /// A missing receipt, a reverted transaction and an expired deadline are all errors: the
    /// caller must not record a deployment without a confirmed, successful receipt.
    pub async fn wait_for_confirmation(
        &self,
        tx_hash: B256,
        confirmations: u64,
    ) -> Result<TransactionReceipt> {
        tracing::info!(
            tx_hash = %tx_hash,
            confirmations,
            timeout = ?self.timeout,
            "Waiting for confirmations..."
        );

        let receipt = tokio::time::timeout(
            self.timeout,
            self.client.wait_for_transaction(tx_hash, confirmations),
        )
        .await
        .map_err(|_| LifecycleError::ConfirmationTimeout {
            tx_hash,
            confirmations,
            timeout: self.timeout,
        })?
        .with_context(|| format!("Failed while waiting for transaction {}", tx_hash))?
        .ok_or(LifecycleError::ReceiptNotFound { tx_hash })?;

        if !receipt.status {
            return Err(LifecycleError::TransactionReverted {
                tx_hash,
                block_number: receipt.block_number,
            }
            .into());
        }

        tracing::info!(
            tx_hash = %tx_hash,
            block_number = receipt.block_number,
            "Transaction confirmed"
        );
        Ok(receipt)
    }
}
