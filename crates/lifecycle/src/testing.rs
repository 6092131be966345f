//! In-memory chain client and verifier for unit tests.

use std::{collections::HashMap, sync::Mutex, time::Duration};

use alloy_core::primitives::{Address, B256, Bytes, U256};
use anyhow::Result;

use crate::{
    chain::{ChainClient, DeployTransaction, FeeData, TransactionReceipt},
    verify::{VerificationOutcome, VerificationRequest, Verifier},
};

#[derive(Debug, Default)]
pub(crate) struct MockChain {
    pub chain_id: u64,
    pub gas_estimate: U256,
    /// Transactions whose data starts with one of these prefixes revert during estimation.
    pub reverting_prefixes: Vec<Bytes>,
    pub gas_price: Option<U256>,
    /// Per-address code; `Err` simulates an unreachable node.
    pub code: HashMap<Address, std::result::Result<Bytes, String>>,
    pub receipt: Option<TransactionReceipt>,
    pub wait_delay: Option<Duration>,
    pub code_queries: Mutex<Vec<Address>>,
    pub sent: Mutex<Vec<DeployTransaction>>,
}

impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn estimate_gas(&self, tx: &DeployTransaction) -> Result<U256> {
        if self
            .reverting_prefixes
            .iter()
            .any(|prefix| tx.data.starts_with(prefix))
        {
            anyhow::bail!("execution reverted");
        }
        Ok(self.gas_estimate)
    }

    async fn fee_data(&self) -> Result<FeeData> {
        Ok(FeeData {
            gas_price: self.gas_price,
        })
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.code_queries.lock().unwrap().push(address);
        match self.code.get(&address) {
            Some(Ok(code)) => Ok(code.clone()),
            Some(Err(message)) => anyhow::bail!("{}", message),
            None => Ok(Bytes::new()),
        }
    }

    async fn send_transaction(&self, tx: &DeployTransaction) -> Result<B256> {
        self.sent.lock().unwrap().push(tx.clone());
        Ok(self
            .receipt
            .as_ref()
            .map(|r| r.transaction_hash)
            .unwrap_or_default())
    }

    async fn wait_for_transaction(
        &self,
        _tx_hash: B256,
        _confirmations: u64,
    ) -> Result<Option<TransactionReceipt>> {
        if let Some(delay) = self.wait_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.receipt.clone())
    }
}

/// Answers every submission with the same outcome and records the requests.
#[derive(Debug)]
pub(crate) struct MockVerifier {
    pub outcome: VerificationOutcome,
    pub requests: Mutex<Vec<VerificationRequest>>,
}

impl MockVerifier {
    pub fn new(outcome: VerificationOutcome) -> Self {
        Self {
            outcome,
            requests: Mutex::default(),
        }
    }
}

impl Verifier for MockVerifier {
    async fn submit_verification(&self, request: &VerificationRequest) -> VerificationOutcome {
        self.requests.lock().unwrap().push(request.clone());
        self.outcome.clone()
    }
}
