//! The network as the lifecycle manager sees it.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use anyhow::Result;

/// A contract creation transaction, before or after gas has been priced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployTransaction {
    pub from: Option<Address>,
    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub data: Bytes,
    pub gas: Option<U256>,
    pub gas_price: Option<U256>,
}

/// Current fee data. Chains that do not report a legacy gas price leave it empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeData {
    pub gas_price: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub contract_address: Option<Address>,
    pub gas_used: U256,
    pub effective_gas_price: Option<U256>,
    /// `false` when the transaction was included but reverted.
    pub status: bool,
}

/// Network access needed by the lifecycle manager.
///
/// Implementations hold no mutable session state beyond connection handles, so a single client
/// can serve concurrent read-only queries.
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Fails if the transaction would revert.
    fn estimate_gas(&self, tx: &DeployTransaction) -> impl Future<Output = Result<U256>> + Send;

    fn fee_data(&self) -> impl Future<Output = Result<FeeData>> + Send;

    /// Code at `address`; empty when no contract lives there.
    fn get_code(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;

    /// Submit a transaction, returning its hash.
    fn send_transaction(&self, tx: &DeployTransaction) -> impl Future<Output = Result<B256>> + Send;

    /// Wait until `tx_hash` is included with `confirmations` blocks on top (inclusion block
    /// counts as one). `None` means the receipt never showed up or was reorganised away.
    fn wait_for_transaction(
        &self,
        tx_hash: B256,
        confirmations: u64,
    ) -> impl Future<Output = Result<Option<TransactionReceipt>>> + Send;
}
