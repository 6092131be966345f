use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use url::Url;

/// The network used when none is given.
const DEFAULT_NETWORK: &str = "sepolia";

#[derive(Debug, Parser)]
#[command(name = "deploybook")]
#[command(
    author,
    version,
    about = "Track, verify and audit contract deployments across networks",
    after_help = "Each network's records live in a single document under the storage root. \
                  There is no locking: run one deploybook process per network at a time, \
                  concurrent runs against the same network race and the last writer wins."
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "DEPLOYBOOK_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The network whose deployments are managed.
    #[arg(short, long, global = true, env = "DEPLOYBOOK_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Path to the configuration file. Defaults to `Deploybook.toml` in the working directory.
    #[arg(long, alias = "conf", global = true, env = "DEPLOYBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint of the network, overriding the configuration.
    #[arg(long, alias = "rpc", global = true)]
    pub rpc_url: Option<Url>,

    /// Directory holding deployment records, address books and reports.
    #[arg(long, global = true)]
    pub storage_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List recorded deployments and their status.
    List,

    /// Check that every live deployment still has code on chain.
    Health,

    /// Mark a deployment as rolled back. On-chain state is left untouched.
    Rollback {
        /// The contract name.
        name: String,
    },

    /// Regenerate the address book from the live deployments.
    Addresses,

    /// Estimate the current cost of redeploying every live contract.
    Costs,

    /// Write a gas and cost report for the network.
    Report,

    /// Deploy a contract and record it.
    Deploy {
        /// The contract name, matching `<artifacts_dir>/<name>.json`.
        name: String,

        /// Constructor arguments as a JSON array, e.g. '["Token", "TKN", 18]'.
        #[arg(long)]
        args: Option<String>,

        /// Submit source verification once the deployment is confirmed.
        #[arg(long, default_value_t = false)]
        verify: bool,

        /// Fully qualified contract path, `<source>:<name>`, for verification.
        #[arg(long)]
        contract_path: Option<String>,
    },

    /// Submit source verification for a recorded deployment.
    Verify {
        /// The contract name.
        name: String,

        /// Fully qualified contract path, `<source>:<name>`.
        #[arg(long)]
        contract_path: Option<String>,
    },
}
