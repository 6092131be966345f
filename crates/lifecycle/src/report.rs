//! Cost and gas reports over a network's deployment records.

use std::{
    fmt,
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use alloy_core::primitives::U256;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    amount::{decimal, display_ether},
    record::{DeploymentRecord, format_timestamp, now_millis},
    store::DeploymentStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_contracts: usize,
    #[serde(with = "decimal")]
    pub total_gas_used: U256,
    #[serde(with = "decimal")]
    pub total_cost_wei: U256,
    /// Display value of `total_cost_wei`; never read back for arithmetic.
    #[serde(rename = "totalCostETH")]
    pub total_cost_eth: String,
    pub network: String,
    pub timestamp: i64,
}

/// Snapshot of a network's records with aggregate gas and cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub deployments: Vec<DeploymentRecord>,
    pub summary: ReportSummary,
}

impl DeploymentReport {
    /// Aggregate `records` in integer arithmetic.
    pub fn from_records(
        network: impl Into<String>,
        deployments: Vec<DeploymentRecord>,
        timestamp: i64,
    ) -> Self {
        let (total_gas_used, total_cost_wei) = deployments.iter().fold(
            (U256::ZERO, U256::ZERO),
            |(gas, cost), record| {
                (
                    gas.saturating_add(record.gas_used),
                    cost.saturating_add(record.cost()),
                )
            },
        );

        Self {
            summary: ReportSummary {
                total_contracts: deployments.len(),
                total_gas_used,
                total_cost_wei,
                total_cost_eth: display_ether(total_cost_wei),
                network: network.into(),
                timestamp,
            },
            deployments,
        }
    }
}

/// A report together with the artifact it was written to.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub report: DeploymentReport,
    pub path: PathBuf,
}

/// Writes one immutable, timestamped report file per invocation.
pub struct ReportGenerator<'a> {
    store: &'a DeploymentStore,
    dir: PathBuf,
}

impl<'a> ReportGenerator<'a> {
    /// Reports go to `<storage root>/reports`.
    pub fn new(store: &'a DeploymentStore) -> Self {
        Self {
            dir: store.root().join("reports"),
            store,
        }
    }

    pub fn generate(&self) -> Result<GeneratedReport> {
        let report = DeploymentReport::from_records(
            self.store.network(),
            self.store.load(),
            now_millis(),
        );
        let path = self.write_new(&report)?;

        tracing::info!(
            network = %report.summary.network,
            contracts = report.summary.total_contracts,
            total_gas_used = %report.summary.total_gas_used,
            total_cost_eth = %report.summary.total_cost_eth,
            path = %path.display(),
            "Deployment report written"
        );
        Ok(GeneratedReport { report, path })
    }

    /// Create a new file for the report; existing reports are never touched.
    fn write_new(&self, report: &DeploymentReport) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create report directory {}", self.dir.display()))?;

        let content =
            serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        let stem = format!(
            "report-{}-{}",
            report.summary.network, report.summary.timestamp
        );

        for attempt in 0u32.. {
            let path = report_path(&self.dir, &stem, attempt);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())
                        .with_context(|| format!("Failed to write report {}", path.display()))?;
                    return Ok(path);
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("Failed to create report {}", path.display()));
                }
            }
        }

        unreachable!("report suffixes exhausted")
    }
}

fn report_path(dir: &Path, stem: &str, attempt: u32) -> PathBuf {
    if attempt == 0 {
        dir.join(format!("{}.json", stem))
    } else {
        dir.join(format!("{}-{}.json", stem, attempt))
    }
}

/// Insert thousands separators into a decimal number.
pub fn group_digits(value: U256) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

impl fmt::Display for DeploymentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = &self.summary;
        writeln!(f, "Deployment report: {}", summary.network.to_uppercase())?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f)?;
        writeln!(f, "=== Summary ===")?;
        writeln!(f, "  Total contracts: {}", summary.total_contracts)?;
        writeln!(f, "  Total gas used:  {}", group_digits(summary.total_gas_used))?;
        writeln!(f, "  Total cost:      {} ETH", summary.total_cost_eth)?;
        writeln!(f, "  Network:         {}", summary.network)?;
        writeln!(f, "  Timestamp:       {}", format_timestamp(summary.timestamp))?;
        writeln!(f)?;
        writeln!(f, "=== Deployed contracts ===")?;

        for (index, record) in self.deployments.iter().enumerate() {
            writeln!(f, "  {}. {}", index + 1, record.contract_name)?;
            writeln!(f, "     Address:  {}", record.address)?;
            writeln!(f, "     Tx hash:  {}", record.tx_hash)?;
            writeln!(f, "     Gas used: {}", group_digits(record.gas_used))?;
            writeln!(f, "     Cost:     {} ETH", display_ether(record.cost()))?;
            writeln!(f, "     Status:   {}", record.status())?;
            writeln!(f, "     Block:    {}", record.block_number)?;
        }

        Ok(())
    }
}
