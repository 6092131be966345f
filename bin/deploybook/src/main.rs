//! deploybook is a CLI tool to track, verify and audit contract deployments.

mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command};
use deploybook_lifecycle::{
    CommandOutcome, Config, ConstructorArg, DeployOptions, RpcLifecycleManager, amount,
    table::records_table,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(storage_root) = cli.storage_root {
        config.storage_root = storage_root;
    }
    if let Some(rpc_url) = cli.rpc_url {
        config.profile_mut(&cli.network).rpc_url = Some(rpc_url);
    }

    let manager = RpcLifecycleManager::from_config(&config, &cli.network)?;

    tracing::debug!(
        network = %cli.network,
        storage_root = %config.storage_root.display(),
        "Running command..."
    );

    match cli.command {
        Command::List => {
            let records = manager.list();
            if records.is_empty() {
                println!("No deployments recorded on {}", manager.network());
            } else {
                println!("{}", records_table(&records));
            }
        }
        Command::Health => {
            println!("{}", manager.health().await);
        }
        Command::Rollback { name } => {
            return Ok(finish(manager.rollback(&name)?));
        }
        Command::Addresses => {
            let written = manager.addresses().await?;
            let count = written
                .book
                .contracts(written.chain_id)
                .map_or(0, |contracts| contracts.len());
            println!(
                "Wrote {} address(es) for chain {} to {}",
                count,
                written.chain_id,
                written.path.display()
            );
        }
        Command::Costs => {
            println!("{}", manager.costs().await);
        }
        Command::Report => {
            let generated = manager.report()?;
            println!("{}", generated.report);
            println!("Report saved to {}", generated.path.display());
        }
        Command::Deploy {
            name,
            args,
            verify,
            contract_path,
        } => {
            let args = parse_constructor_args(args.as_deref())?;
            let record = manager
                .deploy(
                    &name,
                    args,
                    &DeployOptions {
                        verify,
                        contract_path,
                    },
                )
                .await?;
            println!(
                "{} deployed at {} (block {}, tx {}, cost {} ETH, {})",
                record.contract_name,
                record.address,
                record.block_number,
                record.tx_hash,
                amount::display_ether(record.cost()),
                record.status()
            );
        }
        Command::Verify {
            name,
            contract_path,
        } => {
            return Ok(finish(manager.verify(&name, contract_path).await?));
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Exit status of a single-target command: 0 on success, 1 when the target failed.
fn outcome_code(outcome: &CommandOutcome) -> u8 {
    if outcome.success { 0 } else { 1 }
}

/// Print a single-target outcome and map it to the exit code.
fn finish(outcome: CommandOutcome) -> ExitCode {
    if outcome.success {
        println!("{}", outcome);
    } else {
        eprintln!("{}", outcome);
    }
    ExitCode::from(outcome_code(&outcome))
}

/// Parse `--args` as a JSON array of constructor arguments.
fn parse_constructor_args(raw: Option<&str>) -> Result<Vec<ConstructorArg>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let value: serde_json::Value =
        serde_json::from_str(raw).context("Constructor arguments must be valid JSON")?;
    let serde_json::Value::Array(items) = value else {
        anyhow::bail!("Constructor arguments must be a JSON array");
    };

    items
        .iter()
        .map(ConstructorArg::from_json)
        .collect::<Result<Vec<_>>>()
}
