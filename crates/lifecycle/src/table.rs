//! Terminal tables for command output.

use comfy_table::{Table, presets::UTF8_FULL};

use crate::{
    amount::display_ether,
    costs::{CostLine, CostReport},
    health::{HealthReport, status_icon},
    record::{DeploymentRecord, format_timestamp},
    report::group_digits,
};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    table
}

pub fn records_table(records: &[DeploymentRecord]) -> Table {
    let mut table = table(&["Contract", "Address", "Status", "Block", "Deployed"]);
    for record in records {
        table.add_row(vec![
            record.contract_name.clone(),
            record.address.to_string(),
            record.status().to_string(),
            record.block_number.to_string(),
            format_timestamp(record.timestamp),
        ]);
    }
    table
}

pub fn health_table(report: &HealthReport) -> Table {
    let mut table = table(&["", "Contract", "Address", "Status", "Detail"]);
    for (name, health) in &report.contracts {
        table.add_row(vec![
            status_icon(health.status).to_string(),
            name.clone(),
            health.address.to_string(),
            health.status.to_string(),
            health.message.clone(),
        ]);
    }
    table
}

pub fn costs_table(report: &CostReport) -> Table {
    let mut table = table(&["Contract", "Gas limit", "Gas price (wei)", "Cost (ETH)"]);
    for (name, line) in &report.lines {
        let row = match line {
            CostLine::Estimated(estimate) => vec![
                name.clone(),
                group_digits(estimate.gas_limit),
                group_digits(estimate.gas_price),
                display_ether(estimate.estimated_cost),
            ],
            CostLine::Failed(reason) => vec![
                name.clone(),
                "-".to_string(),
                "-".to_string(),
                format!("failed: {}", reason),
            ],
        };
        table.add_row(row);
    }
    table
}
