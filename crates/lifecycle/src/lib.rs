//! deploybook-lifecycle - Lifecycle management for on-chain contract deployments.
//!
//! This crate records what was deployed where, estimates and tracks gas spend, waits for
//! transaction finality, submits source verification, and answers operator queries (health,
//! rollback, address books, cost and gas reports) over previously deployed contracts.
//!
//! State lives in one JSON document per network under a storage root. There is no cross-process
//! locking on that document: concurrent invocations against the same network race and the last
//! writer wins. Run a single operator process per network at a time.

mod address_book;
pub use address_book::{AddressBook, AddressBookEntry, address_book_path};

pub mod amount;

mod artifacts;
pub use artifacts::{Artifact, ArtifactStore};

mod chain;
pub use chain::{ChainClient, DeployTransaction, FeeData, TransactionReceipt};

mod config;
pub use config::{CONFIG_FILENAME, Config, DEFAULT_RPC_URL, ENV_PREFIX, NetworkProfile, VerifierConfig};

mod confirm;
pub use confirm::{ConfirmationWaiter, DEFAULT_CONFIRMATION_TIMEOUT};

mod costs;
pub use costs::{CostEstimator, CostLine, CostReport};

mod error;
pub use error::LifecycleError;

mod etherscan;
pub use etherscan::{DEFAULT_ETHERSCAN_API_URL, EtherscanVerifier};

mod gas;
pub use gas::{GasEstimate, GasEstimator};

mod health;
pub use health::{ContractHealth, HealthReport, HealthStatus, check_contract, health_check};

mod manager;
pub use manager::{
    CommandOutcome, DeployOptions, LifecycleManager, RpcLifecycleManager, WrittenAddressBook,
};

mod record;
pub use record::{
    ConstructorArg, DeploymentRecord, DeploymentStatus, encode_constructor_args,
    format_timestamp, now_millis,
};

mod report;
pub use report::{DeploymentReport, GeneratedReport, ReportGenerator, ReportSummary};

pub mod rpc;
pub use rpc::JsonRpcChainClient;

mod store;
pub use store::{DeploymentStore, RecordSet};

pub mod table;

mod verify;
pub use verify::{VerificationClient, VerificationOutcome, VerificationRequest, Verifier};

#[cfg(test)]
mod testing;
