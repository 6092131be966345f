//! JSON-RPC implementation of [`ChainClient`] over HTTP.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use url::Url;

use crate::{
    amount::parse_amount,
    chain::{ChainClient, DeployTransaction, FeeData, TransactionReceipt},
};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between polling attempts while waiting on a transaction.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Polls per wait phase before the client gives up on its own.
const DEFAULT_MAX_POLLS: usize = 300;

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result. A JSON-RPC error object becomes an `Err`.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<T> {
    let response = client
        .post(url.clone())
        .json(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        anyhow::bail!("{} failed with RPC error {}: {}", method, code, message);
    }

    match result {
        Value::Object(mut object) => {
            let value = object
                .remove("result")
                .with_context(|| format!("No result in {} response", method))?;
            serde_json::from_value(value)
                .with_context(|| format!("Failed to deserialize {} result", method))
        }
        other => anyhow::bail!("Malformed {} response: {}", method, other),
    }
}

/// Parse a hex quantity (`0x1a`) into a `u64`.
fn parse_u64_quantity(raw: &str) -> Result<u64> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16)
        .with_context(|| format!("Invalid quantity: '{}'", raw))
}

/// Receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: String,
    contract_address: Option<Address>,
    gas_used: String,
    effective_gas_price: Option<String>,
    status: Option<String>,
}

impl TryFrom<RpcReceipt> for TransactionReceipt {
    type Error = anyhow::Error;

    fn try_from(raw: RpcReceipt) -> Result<Self> {
        Ok(Self {
            transaction_hash: raw.transaction_hash,
            block_number: parse_u64_quantity(&raw.block_number)?,
            contract_address: raw.contract_address,
            gas_used: parse_amount(&raw.gas_used)?,
            effective_gas_price: raw
                .effective_gas_price
                .as_deref()
                .map(parse_amount)
                .transpose()?,
            // Pre-Byzantium receipts have no status field.
            status: raw.status.as_deref().is_none_or(|s| s != "0x0"),
        })
    }
}

/// Encode a transaction as the object taken by `eth_estimateGas` / `eth_sendTransaction`.
fn tx_object(tx: &DeployTransaction) -> Value {
    let mut object = Map::new();
    if let Some(from) = tx.from {
        object.insert("from".into(), json!(from));
    }
    object.insert("data".into(), json!(tx.data));
    if let Some(gas) = tx.gas {
        object.insert("gas".into(), json!(format!("0x{:x}", gas)));
    }
    if let Some(gas_price) = tx.gas_price {
        object.insert("gasPrice".into(), json!(format!("0x{:x}", gas_price)));
    }
    Value::Object(object)
}

/// A [`ChainClient`] talking to a node's HTTP JSON-RPC endpoint.
///
/// Transactions are sent with `eth_sendTransaction`, so the `from` account must be unlocked on
/// the node (a local dev node, or a signing proxy in front of a remote one).
#[derive(Debug, Clone)]
pub struct JsonRpcChainClient {
    client: reqwest::Client,
    url: Url,
    poll_interval: Duration,
    max_polls: usize,
}

impl JsonRpcChainClient {
    pub fn new(url: Url) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            url,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    /// Override how often and how long the client polls while waiting on a transaction.
    pub fn with_polling(mut self, poll_interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls;
        self
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        json_rpc_call(&self.client, &self.url, method, params).await
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>> {
        let raw: Option<RpcReceipt> = self
            .call("eth_getTransactionReceipt", vec![json!(tx_hash)])
            .await?;
        raw.map(TransactionReceipt::try_from).transpose()
    }

    async fn block_number(&self) -> Result<u64> {
        let raw: String = self.call("eth_blockNumber", vec![]).await?;
        parse_u64_quantity(&raw)
    }

    fn poll_policy(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.poll_interval)
            .with_max_times(self.max_polls)
    }
}

impl ChainClient for JsonRpcChainClient {
    async fn chain_id(&self) -> Result<u64> {
        let raw: String = self.call("eth_chainId", vec![]).await?;
        parse_u64_quantity(&raw)
    }

    async fn estimate_gas(&self, tx: &DeployTransaction) -> Result<U256> {
        let raw: String = self.call("eth_estimateGas", vec![tx_object(tx)]).await?;
        parse_amount(&raw)
    }

    async fn fee_data(&self) -> Result<FeeData> {
        let raw: Option<String> = self.call("eth_gasPrice", vec![]).await?;
        Ok(FeeData {
            gas_price: raw.as_deref().map(parse_amount).transpose()?,
        })
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.call("eth_getCode", vec![json!(address), json!("latest")])
            .await
    }

    async fn send_transaction(&self, tx: &DeployTransaction) -> Result<B256> {
        self.call("eth_sendTransaction", vec![tx_object(tx)]).await
    }

    async fn wait_for_transaction(
        &self,
        tx_hash: B256,
        confirmations: u64,
    ) -> Result<Option<TransactionReceipt>> {
        let fetch_receipt = move || async move {
            self.receipt(tx_hash)
                .await?
                .context("Receipt not available yet")
        };

        let receipt = match fetch_receipt
            .retry(self.poll_policy())
            .sleep(tokio::time::sleep)
            .notify(|err: &anyhow::Error, _| {
                tracing::trace!(tx_hash = %tx_hash, error = %err, "Polling for receipt...");
            })
            .await
        {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::debug!(tx_hash = %tx_hash, error = %err, "Gave up polling for receipt");
                return Ok(None);
            }
        };

        let target = receipt.block_number + confirmations.saturating_sub(1);
        let fetch_head = move || async move {
            let head = self.block_number().await?;
            if head >= target {
                Ok(head)
            } else {
                anyhow::bail!("Head {} below target block {}", head, target)
            }
        };

        if let Err(err) = fetch_head
            .retry(self.poll_policy())
            .sleep(tokio::time::sleep)
            .notify(|err: &anyhow::Error, _| {
                tracing::trace!(tx_hash = %tx_hash, error = %err, "Waiting for confirmations...");
            })
            .await
        {
            tracing::debug!(tx_hash = %tx_hash, error = %err, "Gave up waiting for confirmations");
            return Ok(None);
        }

        // Re-read the receipt: it is gone if the inclusion block was reorganised out meanwhile.
        self.receipt(tx_hash).await
    }
}
