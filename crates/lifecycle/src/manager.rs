//! Operator commands over one network's deployments.

use std::{fmt, path::PathBuf, time::Duration};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};

use crate::{
    address_book::{AddressBook, address_book_path},
    artifacts::ArtifactStore,
    chain::{ChainClient, DeployTransaction},
    config::{Config, NetworkProfile},
    confirm::{ConfirmationWaiter, DEFAULT_CONFIRMATION_TIMEOUT},
    costs::{CostEstimator, CostReport},
    error::LifecycleError,
    etherscan::EtherscanVerifier,
    gas::GasEstimator,
    health::{HealthReport, health_check},
    record::{ConstructorArg, DeploymentRecord, now_millis},
    report::{GeneratedReport, ReportGenerator},
    rpc::JsonRpcChainClient,
    store::DeploymentStore,
    verify::{VerificationClient, VerificationRequest, Verifier},
};

/// Result of a single-target command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

impl CommandOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Submit source verification once the deployment is confirmed.
    pub verify: bool,
    /// Fully qualified `<source>:<name>` passed to the verifier.
    pub contract_path: Option<String>,
}

/// A regenerated address book and where it was written.
#[derive(Debug, Clone)]
pub struct WrittenAddressBook {
    pub chain_id: u64,
    pub book: AddressBook,
    pub path: PathBuf,
}

/// Composes the store, estimator, waiter and verifier into the operator commands of one network.
pub struct LifecycleManager<C, V> {
    store: DeploymentStore,
    client: C,
    verifier: V,
    artifacts: ArtifactStore,
    profile: NetworkProfile,
    deployer: Option<Address>,
    confirmation_timeout: Duration,
}

/// The manager as wired by the CLI.
pub type RpcLifecycleManager = LifecycleManager<JsonRpcChainClient, EtherscanVerifier>;

impl RpcLifecycleManager {
    pub fn from_config(config: &Config, network: &str) -> Result<Self> {
        let profile = config.profile(network);
        let rpc_url = config.rpc_url(network)?;
        let artifacts = ArtifactStore::new(&config.artifacts_dir);

        let poll_interval = config.poll_interval();
        let max_polls = (config.confirmation_timeout().as_millis()
            / poll_interval.as_millis().max(1))
        .max(1) as usize;

        tracing::debug!(
            network = %network,
            rpc_url = %rpc_url,
            chain_id = ?profile.chain_id,
            confirmations = profile.confirmations,
            "Connecting to network"
        );

        let client = JsonRpcChainClient::new(rpc_url)?.with_polling(poll_interval, max_polls);
        let verifier = EtherscanVerifier::new(
            config.verifier.api_url.clone(),
            config.verifier.api_key.clone(),
            artifacts.clone(),
        )?
        .with_chain_id(profile.chain_id)
        .with_polling(config.verifier.poll_interval(), config.verifier.max_polls);

        Ok(
            Self::new(
                DeploymentStore::new(&config.storage_root, network)?,
                client,
                verifier,
                artifacts,
            )
            .with_profile(profile)
            .with_deployer(config.deployer)
            .with_confirmation_timeout(config.confirmation_timeout()),
        )
    }
}

impl<C: ChainClient, V: Verifier> LifecycleManager<C, V> {
    pub fn new(store: DeploymentStore, client: C, verifier: V, artifacts: ArtifactStore) -> Self {
        let profile = NetworkProfile::builtin(store.network()).unwrap_or_default();
        Self {
            store,
            client,
            verifier,
            artifacts,
            profile,
            deployer: None,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_profile(mut self, profile: NetworkProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_deployer(mut self, deployer: Option<Address>) -> Self {
        self.deployer = deployer;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn store(&self) -> &DeploymentStore {
        &self.store
    }

    pub fn network(&self) -> &str {
        self.store.network()
    }

    fn gas_estimator(&self) -> GasEstimator<'_, C> {
        GasEstimator::new(&self.client).with_fallback_gas_price(self.profile.fallback_gas_price)
    }

    /// The profile's chain id, or the node's when the profile has none.
    pub async fn chain_id(&self) -> Result<u64> {
        match self.profile.chain_id {
            Some(chain_id) => Ok(chain_id),
            None => self
                .client
                .chain_id()
                .await
                .context("Failed to resolve chain id"),
        }
    }

    /// All records, in store order.
    pub fn list(&self) -> Vec<DeploymentRecord> {
        self.store.load()
    }

    pub async fn health(&self) -> HealthReport {
        health_check(&self.client, self.network(), &self.store.load()).await
    }

    /// Mark a deployment as retired. Only a missing record is a failure.
    pub fn rollback(&self, contract_name: &str) -> Result<CommandOutcome> {
        let Some(mut record) = self.store.get(contract_name) else {
            tracing::error!(
                contract = %contract_name,
                network = %self.network(),
                "No deployment to roll back"
            );
            return Ok(CommandOutcome::failure(format!(
                "No deployment of {} on {}",
                contract_name,
                self.network()
            )));
        };

        if record.rolled_back {
            tracing::info!(contract = %contract_name, "Deployment already rolled back");
            return Ok(CommandOutcome::success(format!(
                "{} on {} was already rolled back",
                contract_name,
                self.network()
            )));
        }

        record.rolled_back = true;
        record.rolled_back_at = Some(now_millis());
        let address = record.address;
        self.store.upsert(record)?;

        tracing::warn!(
            contract = %contract_name,
            network = %self.network(),
            address = %address,
            "Deployment rolled back"
        );
        Ok(CommandOutcome::success(format!(
            "Rolled back {} at {} on {}",
            contract_name,
            address,
            self.network()
        )))
    }

    /// Rebuild the address book from the current store and write it next to the store.
    pub async fn addresses(&self) -> Result<WrittenAddressBook> {
        let chain_id = self.chain_id().await?;
        let book = AddressBook::from_records(chain_id, &self.store.load());
        let path = address_book_path(&self.store);
        book.write(&path)?;

        tracing::info!(
            network = %self.network(),
            chain_id,
            contracts = book.contracts(chain_id).map_or(0, |c| c.len()),
            path = %path.display(),
            "Address book regenerated"
        );
        Ok(WrittenAddressBook {
            chain_id,
            book,
            path,
        })
    }

    /// Estimate today's redeploy cost of every live contract.
    pub async fn costs(&self) -> CostReport {
        CostEstimator::new(self.gas_estimator(), &self.artifacts)
            .with_deployer(self.deployer)
            .estimate_all(self.network(), &self.store.load())
            .await
    }

    pub fn report(&self) -> Result<GeneratedReport> {
        ReportGenerator::new(&self.store).generate()
    }

    /// Deploy a contract, wait for confirmations and record it.
    ///
    /// Nothing is persisted unless a confirmed, successful receipt with a contract address was
    /// obtained. A verification failure leaves the record saved and unverified.
    pub async fn deploy(
        &self,
        contract_name: &str,
        constructor_args: Vec<ConstructorArg>,
        options: &DeployOptions,
    ) -> Result<DeploymentRecord> {
        let deployer = self.deployer.ok_or(LifecycleError::DeployerNotConfigured)?;
        let artifact = self.artifacts.load(contract_name)?;
        let tx = artifact.deploy_transaction(Some(deployer), &constructor_args)?;

        let estimate = self.gas_estimator().estimate(contract_name, &tx).await?;
        tracing::info!(
            contract = %contract_name,
            network = %self.network(),
            gas_limit = %estimate.gas_limit,
            gas_price = %estimate.gas_price,
            cost_eth = %estimate.cost_in_ether(),
            "Deploying contract..."
        );

        let tx = DeployTransaction {
            gas: Some(estimate.gas_limit),
            gas_price: Some(estimate.gas_price),
            ..tx
        };
        let tx_hash = self
            .client
            .send_transaction(&tx)
            .await
            .with_context(|| format!("Failed to submit deployment of {}", contract_name))?;
        tracing::info!(contract = %contract_name, tx_hash = %tx_hash, "Deployment submitted");

        let receipt = ConfirmationWaiter::new(&self.client)
            .with_timeout(self.confirmation_timeout)
            .wait_for_confirmation(tx_hash, self.profile.confirmations)
            .await?;
        let address = receipt
            .contract_address
            .ok_or(LifecycleError::MissingContractAddress { tx_hash })?;

        let mut record = DeploymentRecord {
            contract_name: contract_name.to_string(),
            address,
            tx_hash,
            block_number: receipt.block_number,
            timestamp: now_millis(),
            network: self.network().to_string(),
            gas_used: receipt.gas_used,
            gas_price: receipt.effective_gas_price.unwrap_or(estimate.gas_price),
            deployer,
            verified: false,
            constructor_args,
            rolled_back: false,
            rolled_back_at: None,
        };
        self.store.upsert(record.clone())?;
        tracing::info!(
            contract = %contract_name,
            network = %self.network(),
            address = %address,
            block_number = record.block_number,
            "Contract deployed"
        );

        if options.verify && self.submit_verification(&record, options.contract_path.clone()).await
        {
            record.verified = true;
            self.store.upsert(record.clone())?;
        }

        Ok(record)
    }

    /// Submit verification for a recorded deployment.
    pub async fn verify(
        &self,
        contract_name: &str,
        contract_path: Option<String>,
    ) -> Result<CommandOutcome> {
        let Some(mut record) = self.store.get(contract_name) else {
            tracing::error!(
                contract = %contract_name,
                network = %self.network(),
                "No deployment to verify"
            );
            return Ok(CommandOutcome::failure(format!(
                "No deployment of {} on {}",
                contract_name,
                self.network()
            )));
        };

        if !self.submit_verification(&record, contract_path).await {
            return Ok(CommandOutcome::failure(format!(
                "Verification of {} at {} failed",
                contract_name, record.address
            )));
        }

        let address = record.address;
        if !record.verified {
            record.verified = true;
            self.store.upsert(record)?;
        }
        Ok(CommandOutcome::success(format!(
            "{} at {} is verified",
            contract_name, address
        )))
    }

    async fn submit_verification(
        &self,
        record: &DeploymentRecord,
        contract_path: Option<String>,
    ) -> bool {
        let request = VerificationRequest {
            contract_name: record.contract_name.clone(),
            address: record.address,
            constructor_args: record.constructor_args.clone(),
            contract_path,
        };
        VerificationClient::new(&self.verifier).verify(&request).await
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::{B256, Bytes, U256, address};
    use serde_json::json;
    use tempdir::TempDir;

    use super::*;
    use crate::{
        chain::TransactionReceipt,
        record::tests::sample_record,
        testing::{MockChain, MockVerifier},
        verify::VerificationOutcome,
    };

    const DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const CONTRACT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

    struct Fixture {
        _dir: TempDir,
        store: DeploymentStore,
        artifacts: ArtifactStore,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new("deploybook-manager").unwrap();
        let artifacts_dir = dir.path().join("artifacts");
        std::fs::create_dir_all(&artifacts_dir).unwrap();
        std::fs::write(
            artifacts_dir.join("FHEToken.json"),
            json!({
                "contractName": "FHEToken",
                "sourceName": "contracts/FHEToken.sol",
                "bytecode": "0x6080604052",
            })
            .to_string(),
        )
        .unwrap();

        Fixture {
            store: DeploymentStore::new(dir.path().join("deployments"), "sepolia").unwrap(),
            artifacts: ArtifactStore::new(artifacts_dir),
            _dir: dir,
        }
    }

    fn confirmed_chain() -> MockChain {
        MockChain {
            chain_id: 11155111,
            gas_estimate: U256::from(210_000u64),
            gas_price: Some(U256::from(20_000_000_000u64)),
            receipt: Some(TransactionReceipt {
                transaction_hash: B256::repeat_byte(0xcd),
                block_number: 99,
                contract_address: Some(CONTRACT),
                gas_used: U256::from(200_000u64),
                effective_gas_price: Some(U256::from(15_000_000_000u64)),
                status: true,
            }),
            ..Default::default()
        }
    }

    fn manager(
        fixture: &Fixture,
        chain: MockChain,
        outcome: VerificationOutcome,
    ) -> LifecycleManager<MockChain, MockVerifier> {
        LifecycleManager::new(
            fixture.store.clone(),
            chain,
            MockVerifier::new(outcome),
            fixture.artifacts.clone(),
        )
        .with_deployer(Some(DEPLOYER))
    }

    #[test]
    fn test_rollback_missing_record() {
        let fixture = fixture();
        let manager = manager(&fixture, MockChain::default(), VerificationOutcome::Verified);

        let outcome = manager.rollback("Missing").unwrap();
        assert!(!outcome.success);
        assert!(manager.list().is_empty());
    }

    #[test]
    fn test_rollback_is_idempotent() {
        let fixture = fixture();
        fixture.store.upsert(sample_record("FHEToken")).unwrap();
        let manager = manager(&fixture, MockChain::default(), VerificationOutcome::Verified);

        assert!(manager.rollback("FHEToken").unwrap().success);
        let first = fixture.store.get("FHEToken").unwrap();
        assert!(first.rolled_back);
        assert!(first.rolled_back_at.is_some());

        let second = manager.rollback("FHEToken").unwrap();
        assert!(second.success);
        assert_eq!(fixture.store.get("FHEToken").unwrap(), first);
    }

    #[tokio::test]
    async fn test_deploy_records_confirmed_receipt() {
        let fixture = fixture();
        let manager = manager(&fixture, confirmed_chain(), VerificationOutcome::Verified);

        let record = manager
            .deploy(
                "FHEToken",
                vec![ConstructorArg::String("ZFHE".to_string())],
                &DeployOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(record.address, CONTRACT);
        assert_eq!(record.block_number, 99);
        assert_eq!(record.gas_used, U256::from(200_000u64));
        assert_eq!(record.gas_price, U256::from(15_000_000_000u64));
        assert_eq!(record.deployer, DEPLOYER);
        assert!(!record.verified);
        assert_eq!(fixture.store.get("FHEToken"), Some(record));

        let sent = manager.client.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, Some(DEPLOYER));
        assert_eq!(sent[0].gas, Some(U256::from(210_000u64)));
        assert!(sent[0].data.starts_with(&[0x60, 0x80, 0x60, 0x40, 0x52]));
        assert!(manager.verifier.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_and_verify() {
        let fixture = fixture();
        let manager = manager(
            &fixture,
            confirmed_chain(),
            VerificationOutcome::AlreadyVerified,
        );

        let options = DeployOptions {
            verify: true,
            contract_path: None,
        };
        let record = manager.deploy("FHEToken", vec![], &options).await.unwrap();

        assert!(record.verified);
        assert!(fixture.store.get("FHEToken").unwrap().verified);
    }

    #[tokio::test]
    async fn test_deploy_keeps_record_when_verification_fails() {
        let fixture = fixture();
        let manager = manager(
            &fixture,
            confirmed_chain(),
            VerificationOutcome::Failed("bytecode mismatch".to_string()),
        );

        let options = DeployOptions {
            verify: true,
            contract_path: None,
        };
        let record = manager.deploy("FHEToken", vec![], &options).await.unwrap();

        assert!(!record.verified);
        assert!(!fixture.store.get("FHEToken").unwrap().verified);
    }

    #[tokio::test]
    async fn test_deploy_estimation_failure_persists_nothing() {
        let fixture = fixture();
        let chain = MockChain {
            reverting_prefixes: vec![Bytes::from(vec![0x60])],
            ..confirmed_chain()
        };
        let manager = manager(&fixture, chain, VerificationOutcome::Verified);

        let err = manager
            .deploy("FHEToken", vec![], &DeployOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<LifecycleError>(),
            Some(LifecycleError::EstimationFailed { .. })
        ));
        assert!(manager.client.sent.lock().unwrap().is_empty());
        assert!(!fixture.store.path().exists());
    }

    #[tokio::test]
    async fn test_deploy_missing_receipt_persists_nothing() {
        let fixture = fixture();
        let chain = MockChain {
            receipt: None,
            ..confirmed_chain()
        };
        let manager = manager(&fixture, chain, VerificationOutcome::Verified);

        let err = manager
            .deploy("FHEToken", vec![], &DeployOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<LifecycleError>(),
            Some(LifecycleError::ReceiptNotFound { .. })
        ));
        assert!(manager.list().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_timeout_persists_nothing() {
        let fixture = fixture();
        let chain = MockChain {
            wait_delay: Some(Duration::from_secs(3600)),
            ..confirmed_chain()
        };
        let manager = manager(&fixture, chain, VerificationOutcome::Verified)
            .with_confirmation_timeout(Duration::from_secs(60));

        let err = manager
            .deploy("FHEToken", vec![], &DeployOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<LifecycleError>(),
            Some(LifecycleError::ConfirmationTimeout { .. })
        ));
        assert!(manager.list().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_requires_deployer() {
        let fixture = fixture();
        let manager = manager(&fixture, confirmed_chain(), VerificationOutcome::Verified)
            .with_deployer(None);

        let err = manager
            .deploy("FHEToken", vec![], &DeployOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LifecycleError>(),
            Some(LifecycleError::DeployerNotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_verify_already_verified_matches_verified() {
        let fixture = fixture();
        fixture.store.upsert(sample_record("FHEToken")).unwrap();

        let ok = manager(&fixture, MockChain::default(), VerificationOutcome::Verified);
        assert!(ok.verify("FHEToken", None).await.unwrap().success);
        let after_ok = fixture.store.get("FHEToken").unwrap();

        fixture.store.upsert(sample_record("FHEToken")).unwrap();
        let already = manager(
            &fixture,
            MockChain::default(),
            VerificationOutcome::AlreadyVerified,
        );
        assert!(already.verify("FHEToken", None).await.unwrap().success);
        let after_already = fixture.store.get("FHEToken").unwrap();

        assert!(after_ok.verified);
        assert_eq!(after_ok, after_already);
    }

    #[tokio::test]
    async fn test_verify_missing_record() {
        let fixture = fixture();
        let manager = manager(&fixture, MockChain::default(), VerificationOutcome::Verified);

        let outcome = manager.verify("Missing", None).await.unwrap();
        assert!(!outcome.success);
        assert!(manager.verifier.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_addresses_resolves_chain_id_from_node() {
        let fixture = fixture();
        let mut retired = sample_record("Retired");
        retired.rolled_back = true;
        fixture.store.upsert(sample_record("FHEToken")).unwrap();
        fixture.store.upsert(retired).unwrap();

        let chain = MockChain {
            chain_id: 31337,
            ..Default::default()
        };
        let manager = manager(&fixture, chain, VerificationOutcome::Verified)
            .with_profile(NetworkProfile::default());

        let written = manager.addresses().await.unwrap();
        assert_eq!(written.chain_id, 31337);
        let contracts = written.book.contracts(31337).unwrap();
        assert_eq!(contracts.len(), 1);
        assert!(contracts.contains_key("FHEToken"));
        assert!(written.path.exists());
    }

    #[tokio::test]
    async fn test_deploy_rejects_args_not_matching_abi() {
        let fixture = fixture();
        std::fs::write(
            fixture._dir.path().join("artifacts").join("FHEVault.json"),
            json!({
                "bytecode": "0x6080604052",
                "abi": [{
                    "type": "constructor",
                    "stateMutability": "nonpayable",
                    "inputs": [{"name": "salt", "type": "bytes32"}]
                }]
            })
            .to_string(),
        )
        .unwrap();
        let manager = manager(&fixture, confirmed_chain(), VerificationOutcome::Verified);

        let err = manager
            .deploy(
                "FHEVault",
                vec![ConstructorArg::String("not hex".to_string())],
                &DeployOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("salt"));
        assert!(manager.client.sent.lock().unwrap().is_empty());
        assert!(manager.list().is_empty());
    }

    #[test]
    fn test_from_config_tolerates_bad_verifier_url() {
        let dir = TempDir::new("deploybook-manager").unwrap();
        let mut config = Config {
            storage_root: dir.path().join("deployments"),
            ..Default::default()
        };
        config.verifier.api_url = "not a url".to_string();

        let manager = RpcLifecycleManager::from_config(&config, "sepolia").unwrap();
        assert!(manager.list().is_empty());
        assert!(manager.rollback("FHEToken").is_ok());
    }

    #[test]
    fn test_from_config_rejects_path_like_network() {
        let dir = TempDir::new("deploybook-manager").unwrap();
        let config = Config {
            storage_root: dir.path().join("deployments"),
            ..Default::default()
        };

        assert!(RpcLifecycleManager::from_config(&config, "../escape").is_err());
        assert!(RpcLifecycleManager::from_config(&config, "a/b").is_err());
    }
}
