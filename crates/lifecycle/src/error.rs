//! Conditions that callers need to tell apart.
//!
//! Everything else travels as a plain [`anyhow::Error`] with context attached. These variants are
//! wrapped in `anyhow` too and can be recovered with `downcast_ref::<LifecycleError>()`.

use std::{path::PathBuf, time::Duration};

use alloy_core::primitives::B256;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The chain refused to estimate the deployment, typically because the constructor reverts.
    #[error("gas estimation failed for {contract}: {reason}")]
    EstimationFailed { contract: String, reason: String },

    /// No receipt was returned: the transaction was dropped, reorganised out, or the client gave up.
    #[error("transaction receipt not found for {tx_hash}")]
    ReceiptNotFound { tx_hash: B256 },

    /// The caller's deadline expired before the confirmation depth was reached.
    #[error("timed out after {timeout:?} waiting for {confirmations} confirmations of {tx_hash}")]
    ConfirmationTimeout {
        tx_hash: B256,
        confirmations: u64,
        timeout: Duration,
    },

    #[error("transaction {tx_hash} reverted in block {block_number}")]
    TransactionReverted { tx_hash: B256, block_number: u64 },

    #[error("receipt for {tx_hash} carries no contract address")]
    MissingContractAddress { tx_hash: B256 },

    #[error("no artifact for contract {contract} in {dir}")]
    ArtifactNotFound { contract: String, dir: PathBuf },

    #[error("no deployer address configured (set `deployer` or DEPLOYBOOK_DEPLOYER)")]
    DeployerNotConfigured,
}
