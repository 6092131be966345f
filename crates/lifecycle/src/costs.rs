//! Redeploy cost estimates for the live contracts of a network.

use std::{collections::BTreeMap, fmt};

use alloy_core::primitives::{Address, U256};
use futures::future::join_all;

use crate::{
    amount::display_ether,
    artifacts::ArtifactStore,
    chain::ChainClient,
    gas::{GasEstimate, GasEstimator},
    record::DeploymentRecord,
    report::group_digits,
    table,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CostLine {
    Estimated(GasEstimate),
    /// Estimation failed; excluded from the total.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostReport {
    pub network: String,
    pub lines: BTreeMap<String, CostLine>,
    /// Sum of the successful gas limits.
    pub total_gas: U256,
    /// Sum of the successful estimates, in wei.
    pub total: U256,
}

impl CostReport {
    pub fn from_lines(network: impl Into<String>, lines: BTreeMap<String, CostLine>) -> Self {
        let (total_gas, total) = lines
            .values()
            .filter_map(|line| match line {
                CostLine::Estimated(estimate) => Some(estimate),
                CostLine::Failed(_) => None,
            })
            .fold((U256::ZERO, U256::ZERO), |(gas, cost), estimate| {
                (
                    gas.saturating_add(estimate.gas_limit),
                    cost.saturating_add(estimate.estimated_cost),
                )
            });

        Self {
            network: network.into(),
            lines,
            total_gas,
            total,
        }
    }

    pub fn failures(&self) -> usize {
        self.lines
            .values()
            .filter(|line| matches!(line, CostLine::Failed(_)))
            .count()
    }
}

/// Estimates what it would cost today to redeploy each live contract with its recorded arguments.
pub struct CostEstimator<'a, C> {
    gas: GasEstimator<'a, C>,
    artifacts: &'a ArtifactStore,
    deployer: Option<Address>,
}

impl<'a, C: ChainClient> CostEstimator<'a, C> {
    pub fn new(gas: GasEstimator<'a, C>, artifacts: &'a ArtifactStore) -> Self {
        Self {
            gas,
            artifacts,
            deployer: None,
        }
    }

    pub fn with_deployer(mut self, deployer: Option<Address>) -> Self {
        self.deployer = deployer;
        self
    }

    pub async fn estimate_all(&self, network: &str, records: &[DeploymentRecord]) -> CostReport {
        let estimates = records
            .iter()
            .filter(|record| record.is_active())
            .map(|record| async move {
                let line = self.estimate_one(record).await;
                (record.contract_name.clone(), line)
            });

        let lines: BTreeMap<_, _> = join_all(estimates).await.into_iter().collect();
        let report = CostReport::from_lines(network, lines);

        tracing::info!(
            network = %network,
            contracts = report.lines.len(),
            failures = report.failures(),
            total_gas = %report.total_gas,
            total_eth = %display_ether(report.total),
            "Redeploy cost estimate complete"
        );
        report
    }

    async fn estimate_one(&self, record: &DeploymentRecord) -> CostLine {
        let estimate = async {
            let artifact = self.artifacts.load(&record.contract_name)?;
            let tx = artifact.deploy_transaction(self.deployer, &record.constructor_args)?;
            self.gas.estimate(&record.contract_name, &tx).await
        };

        match estimate.await {
            Ok(estimate) => CostLine::Estimated(estimate),
            Err(err) => {
                tracing::error!(
                    contract = %record.contract_name,
                    error = %format!("{:#}", err),
                    "Cost estimation failed"
                );
                CostLine::Failed(format!("{:#}", err))
            }
        }
    }
}

impl fmt::Display for CostReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Redeploy costs: {}", self.network)?;
        writeln!(f)?;
        writeln!(f, "{}", table::costs_table(self))?;
        writeln!(f, "Total gas: {}", group_digits(self.total_gas))?;
        write!(f, "Total: {} ETH", display_ether(self.total))?;
        if self.failures() > 0 {
            write!(f, " ({} contract(s) excluded)", self.failures())?;
        }
        Ok(())
    }
}
