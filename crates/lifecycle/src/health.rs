//! Health check module for verifying that recorded contracts still have code on chain.

use std::{collections::BTreeMap, fmt};

use alloy_core::primitives::{Address, Bytes};
use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;

use crate::{chain::ChainClient, record::DeploymentRecord, table};

/// Outcome of one contract's health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Code is present at the recorded address.
    Healthy,
    /// The address holds no code.
    Failed,
    /// The chain could not be queried.
    Error,
    /// Retired record; the chain is not queried.
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractHealth {
    pub status: HealthStatus,
    pub address: Address,
    pub message: String,
}

/// Health report for every contract recorded on a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub network: String,
    pub contracts: BTreeMap<String, ContractHealth>,
}

impl HealthReport {
    /// Every live contract has code. Rolled-back records do not count against health.
    pub fn healthy(&self) -> bool {
        self.contracts.values().all(|c| {
            matches!(c.status, HealthStatus::Healthy | HealthStatus::RolledBack)
        })
    }

    pub fn count(&self, status: HealthStatus) -> usize {
        self.contracts
            .values()
            .filter(|c| c.status == status)
            .count()
    }
}

/// Run a health check over `records`, one concurrent code query per live contract.
pub async fn health_check<C: ChainClient>(
    client: &C,
    network: &str,
    records: &[DeploymentRecord],
) -> HealthReport {
    let checks = records.iter().map(|record| async move {
        let health = check_contract(client, record).await;
        (record.contract_name.clone(), health)
    });

    let contracts: BTreeMap<_, _> = join_all(checks).await.into_iter().collect();

    let report = HealthReport {
        network: network.to_string(),
        contracts,
    };
    tracing::info!(
        network = %network,
        healthy = report.count(HealthStatus::Healthy),
        failed = report.count(HealthStatus::Failed),
        errors = report.count(HealthStatus::Error),
        rolled_back = report.count(HealthStatus::RolledBack),
        "Health check complete"
    );
    report
}

/// Check a single record.
pub async fn check_contract<C: ChainClient>(
    client: &C,
    record: &DeploymentRecord,
) -> ContractHealth {
    if record.rolled_back {
        return ContractHealth {
            status: HealthStatus::RolledBack,
            address: record.address,
            message: "Rolled back, not checked".to_string(),
        };
    }

    let health = classify_code(record.address, client.get_code(record.address).await);
    match health.status {
        HealthStatus::Healthy => {}
        HealthStatus::Failed => tracing::warn!(
            contract = %record.contract_name,
            address = %record.address,
            "No code at recorded address"
        ),
        _ => tracing::error!(
            contract = %record.contract_name,
            address = %record.address,
            error = %health.message,
            "Health query failed"
        ),
    }
    health
}

/// Map a code query result to a health status.
fn classify_code(address: Address, code: Result<Bytes>) -> ContractHealth {
    let (status, message) = match code {
        Ok(code) if code.is_empty() => (HealthStatus::Failed, "No code at address".to_string()),
        Ok(code) => (HealthStatus::Healthy, format!("{} bytes of code", code.len())),
        Err(err) => (HealthStatus::Error, format!("{:#}", err)),
    };
    ContractHealth {
        status,
        address,
        message,
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.healthy() { "HEALTHY" } else { "UNHEALTHY" };
        writeln!(f, "Network {}: {}", self.network, status)?;
        writeln!(f)?;
        write!(f, "{}", table::health_table(self))
    }
}

pub(crate) fn status_icon(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "[ok]",
        HealthStatus::Failed => "[DOWN]",
        HealthStatus::Error => "[ERR]",
        HealthStatus::RolledBack => "[--]",
    }
}
