//! Gas and cost estimation for pending deployments.

use alloy_core::primitives::U256;
use anyhow::{Context, Result};

use crate::{
    amount::{DEFAULT_GAS_PRICE, display_ether},
    chain::{ChainClient, DeployTransaction},
    error::LifecycleError,
};

/// Gas limit, price and total cost for one deployment, all in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimate {
    pub gas_limit: U256,
    pub gas_price: U256,
    pub estimated_cost: U256,
}

impl GasEstimate {
    pub fn new(gas_limit: U256, gas_price: U256) -> Self {
        Self {
            gas_limit,
            gas_price,
            estimated_cost: gas_limit.saturating_mul(gas_price),
        }
    }

    /// Cost rendered in ether, for display only.
    pub fn cost_in_ether(&self) -> String {
        display_ether(self.estimated_cost)
    }
}

pub struct GasEstimator<'a, C> {
    client: &'a C,
    fallback_gas_price: U256,
}

impl<'a, C: ChainClient> GasEstimator<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            fallback_gas_price: DEFAULT_GAS_PRICE,
        }
    }

    /// Price used when the chain reports no fee data.
    pub fn with_fallback_gas_price(mut self, gas_price: U256) -> Self {
        self.fallback_gas_price = gas_price;
        self
    }

    /// Current gas price, or the fallback when the chain does not report one.
    pub async fn gas_price(&self) -> Result<U256> {
        let fee_data = self
            .client
            .fee_data()
            .await
            .context("Failed to fetch fee data")?;

        Ok(fee_data.gas_price.unwrap_or_else(|| {
            tracing::debug!(
                fallback = %self.fallback_gas_price,
                "No fee data reported, using fallback gas price"
            );
            self.fallback_gas_price
        }))
    }

    /// Estimate an undeployed contract's creation transaction.
    ///
    /// An estimation failure means the deployment would revert; it is returned as
    /// [`LifecycleError::EstimationFailed`] and must stop the deployment.
    pub async fn estimate(&self, contract: &str, tx: &DeployTransaction) -> Result<GasEstimate> {
        let gas_limit = self.client.estimate_gas(tx).await.map_err(|err| {
            LifecycleError::EstimationFailed {
                contract: contract.to_string(),
                reason: format!("{:#}", err),
            }
        })?;
        let gas_price = self.gas_price().await?;

        let estimate = GasEstimate::new(gas_limit, gas_price);
        tracing::debug!(
            contract = %contract,
            gas_limit = %estimate.gas_limit,
            gas_price = %estimate.gas_price,
            cost_eth = %estimate.cost_in_ether(),
            "Estimated deployment gas"
        );
        Ok(estimate)
    }
}
