//! Integration tests for deploybook-lifecycle.
//!
//! Every command runs against an in-memory chain and verifier, with the store under a temporary
//! storage root.
//! Run with: cargo test --test lifecycle_test

use std::{
    collections::HashMap,
    path::Path,
    sync::Mutex,
    time::Duration,
};

use alloy_core::primitives::{Address, B256, Bytes, U256, address};
use anyhow::Result;
use deploybook_lifecycle::{
    ArtifactStore, ChainClient, ConstructorArg, CostLine, DeployOptions, DeployTransaction,
    DeploymentRecord, DeploymentStore, FeeData, HealthStatus, LifecycleError, LifecycleManager,
    NetworkProfile, TransactionReceipt, VerificationOutcome, VerificationRequest, Verifier,
};
use serde_json::{Value, json};
use tempdir::TempDir;

const DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
const DEPLOYED: Address = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");

/// Chain whose state is set up front by each test.
#[derive(Default)]
struct TestChain {
    gas_estimate: u64,
    gas_price: Option<u64>,
    /// Estimation fails for transactions whose data starts with this byte.
    reverting_opcode: Option<u8>,
    code: HashMap<Address, Bytes>,
    unreachable: Vec<Address>,
    receipt: Option<TransactionReceipt>,
    wait_delay: Option<Duration>,
    code_queries: Mutex<Vec<Address>>,
    sent: Mutex<Vec<DeployTransaction>>,
}

impl ChainClient for TestChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(31337)
    }

    async fn estimate_gas(&self, tx: &DeployTransaction) -> Result<U256> {
        if self.reverting_opcode.is_some() && tx.data.first().copied() == self.reverting_opcode {
            anyhow::bail!("execution reverted: constructor failed");
        }
        Ok(U256::from(self.gas_estimate))
    }

    async fn fee_data(&self) -> Result<FeeData> {
        Ok(FeeData {
            gas_price: self.gas_price.map(U256::from),
        })
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.code_queries.lock().unwrap().push(address);
        if self.unreachable.contains(&address) {
            anyhow::bail!("error sending request: connection refused");
        }
        Ok(self.code.get(&address).cloned().unwrap_or_default())
    }

    async fn send_transaction(&self, tx: &DeployTransaction) -> Result<B256> {
        self.sent.lock().unwrap().push(tx.clone());
        Ok(B256::repeat_byte(0x77))
    }

    async fn wait_for_transaction(
        &self,
        _tx_hash: B256,
        _confirmations: u64,
    ) -> Result<Option<TransactionReceipt>> {
        if let Some(delay) = self.wait_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.receipt.clone())
    }
}

/// Verifier answering with a fixed outcome.
struct TestVerifier {
    outcome: VerificationOutcome,
    submissions: Mutex<usize>,
}

impl TestVerifier {
    fn new(outcome: VerificationOutcome) -> Self {
        Self {
            outcome,
            submissions: Mutex::new(0),
        }
    }
}

impl Verifier for TestVerifier {
    async fn submit_verification(&self, _request: &VerificationRequest) -> VerificationOutcome {
        *self.submissions.lock().unwrap() += 1;
        self.outcome.clone()
    }
}

/// Test setup context: a temporary storage root with an artifacts directory.
struct TestContext {
    dir: TempDir,
}

impl TestContext {
    fn new(prefix: &str) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let dir = TempDir::new(prefix).unwrap();
        std::fs::create_dir_all(dir.path().join("artifacts")).unwrap();
        Self { dir }
    }

    fn store(&self) -> DeploymentStore {
        DeploymentStore::new(self.dir.path().join("deployments"), "sepolia").unwrap()
    }

    fn artifacts(&self) -> ArtifactStore {
        ArtifactStore::new(self.dir.path().join("artifacts"))
    }

    fn add_artifact(&self, name: &str, bytecode: &str) {
        let artifact = json!({
            "contractName": name,
            "sourceName": format!("contracts/{}.sol", name),
            "bytecode": bytecode,
        });
        std::fs::write(
            self.dir.path().join("artifacts").join(format!("{}.json", name)),
            artifact.to_string(),
        )
        .unwrap();
    }

    fn manager(
        &self,
        chain: TestChain,
        outcome: VerificationOutcome,
    ) -> LifecycleManager<TestChain, TestVerifier> {
        LifecycleManager::new(
            self.store(),
            chain,
            TestVerifier::new(outcome),
            self.artifacts(),
        )
        .with_deployer(Some(DEPLOYER))
    }
}

fn record(name: &str, gas_used: u64, gas_price: u64) -> DeploymentRecord {
    DeploymentRecord {
        contract_name: name.to_string(),
        address: Address::repeat_byte(name.len() as u8),
        tx_hash: B256::repeat_byte(0x01),
        block_number: 10,
        timestamp: 1_737_316_800_000,
        network: "sepolia".to_string(),
        gas_used: U256::from(gas_used),
        gas_price: U256::from(gas_price),
        deployer: DEPLOYER,
        verified: false,
        constructor_args: vec![],
        rolled_back: false,
        rolled_back_at: None,
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn confirmed_receipt() -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: B256::repeat_byte(0x77),
        block_number: 1234,
        contract_address: Some(DEPLOYED),
        gas_used: U256::from(1_500_000u64),
        effective_gas_price: None,
        status: true,
    }
}

#[test]
fn test_upsert_keeps_last_record_per_name() {
    let ctx = TestContext::new("upsert");
    let store = ctx.store();

    for block in 1..=5u64 {
        let mut r = record("FHEToken", 100_000 * block, 1);
        r.block_number = block;
        store.upsert(r).unwrap();
    }
    store.upsert(record("FHEVault", 1, 1)).unwrap();

    let records = store.load();
    assert_eq!(records.len(), 2);
    let token = store.get("FHEToken").unwrap();
    assert_eq!(token.block_number, 5);
    assert_eq!(token.gas_used, U256::from(500_000u64));

    let document = read_json(&store.path());
    assert_eq!(document.as_array().unwrap().len(), 2);
    assert_eq!(document[0]["gasUsed"], json!("500000"));
}

#[test]
fn test_corrupt_store_degrades_to_empty() {
    let ctx = TestContext::new("corrupt");
    let store = ctx.store();
    std::fs::create_dir_all(store.root()).unwrap();
    std::fs::write(store.path(), "[{\"contractName\": \"Trunc").unwrap();

    let manager = ctx.manager(TestChain::default(), VerificationOutcome::Verified);
    assert!(manager.list().is_empty());

    store.upsert(record("FHEToken", 1, 1)).unwrap();
    assert_eq!(manager.list().len(), 1);
}

#[test]
fn test_rollback_twice() {
    let ctx = TestContext::new("rollback");
    ctx.store().upsert(record("FHEToken", 1, 1)).unwrap();
    let manager = ctx.manager(TestChain::default(), VerificationOutcome::Verified);

    assert!(manager.rollback("FHEToken").unwrap().success);
    assert!(manager.rollback("FHEToken").unwrap().success);
    assert!(!manager.rollback("Unknown").unwrap().success);

    let records = manager.list();
    assert_eq!(records.len(), 1);
    assert!(records[0].rolled_back);
    assert!(records[0].rolled_back_at.is_some());
    assert_eq!(records[0].status().to_string(), "ROLLED_BACK");
}

#[tokio::test]
async fn test_verification_outcomes_converge() {
    let ctx = TestContext::new("verify");

    for outcome in [VerificationOutcome::Verified, VerificationOutcome::AlreadyVerified] {
        ctx.store().upsert(record("FHEToken", 1, 1)).unwrap();
        let manager = ctx.manager(TestChain::default(), outcome);

        let result = manager.verify("FHEToken", None).await.unwrap();
        assert!(result.success);
        assert!(ctx.store().get("FHEToken").unwrap().verified);
    }

    ctx.store().upsert(record("FHEToken", 1, 1)).unwrap();
    let failing = ctx.manager(
        TestChain::default(),
        VerificationOutcome::Failed("Fail - Unable to verify".to_string()),
    );
    assert!(!failing.verify("FHEToken", None).await.unwrap().success);
    assert!(!ctx.store().get("FHEToken").unwrap().verified);
}

#[test]
fn test_report_on_empty_network() {
    let ctx = TestContext::new("report-empty");
    let manager = ctx.manager(TestChain::default(), VerificationOutcome::Verified);

    let generated = manager.report().unwrap();
    let document = read_json(&generated.path);

    assert_eq!(document["deployments"], json!([]));
    assert_eq!(document["summary"]["totalContracts"], json!(0));
    assert_eq!(document["summary"]["totalGasUsed"], json!("0"));
    assert_eq!(document["summary"]["totalCostETH"], json!("0"));
    assert_eq!(document["summary"]["network"], json!("sepolia"));
}

#[test]
fn test_report_totals_two_tokens() {
    let ctx = TestContext::new("report-totals");
    let store = ctx.store();
    store
        .upsert(record("TokenA", 100_000, 10_000_000_000))
        .unwrap();
    store
        .upsert(record("TokenB", 200_000, 10_000_000_000))
        .unwrap();
    let manager = ctx.manager(TestChain::default(), VerificationOutcome::Verified);

    let first = manager.report().unwrap();
    let summary = &first.report.summary;
    assert_eq!(summary.total_contracts, 2);
    assert_eq!(summary.total_gas_used, U256::from(300_000u64));
    assert_eq!(summary.total_cost_wei, U256::from(3_000_000_000_000_000u64));
    assert_eq!(summary.total_cost_eth, "0.003");

    let second = manager.report().unwrap();
    assert_ne!(first.path, second.path);
    assert!(first.path.exists());
    assert_eq!(read_json(&first.path)["summary"]["totalGasUsed"], json!("300000"));
}

#[tokio::test]
async fn test_addresses_exclude_rolled_back() {
    let ctx = TestContext::new("addresses");
    let store = ctx.store();
    store.upsert(record("FHEToken", 1, 1)).unwrap();
    store.upsert(record("FHEVault", 1, 1)).unwrap();
    let manager = ctx.manager(TestChain::default(), VerificationOutcome::Verified);
    manager.rollback("FHEVault").unwrap();

    let written = manager.addresses().await.unwrap();
    assert_eq!(written.chain_id, 11155111);

    let document = read_json(&written.path);
    let contracts = document["11155111"].as_object().unwrap();
    assert!(contracts.contains_key("FHEToken"));
    assert!(!contracts.contains_key("FHEVault"));
    assert_eq!(contracts["FHEToken"]["block"], json!(10));
}

#[tokio::test]
async fn test_health_classification() {
    let ctx = TestContext::new("health");
    let store = ctx.store();
    let live = record("Live", 1, 1);
    let empty = record("Empty", 1, 1);
    let down = record("Unreachable", 1, 1);
    let mut retired = record("Retired!", 1, 1);
    retired.rolled_back = true;
    for r in [&live, &empty, &down, &retired] {
        store.upsert(r.clone()).unwrap();
    }

    let chain = TestChain {
        code: HashMap::from([(live.address, Bytes::from(vec![0x60, 0x80, 0x60, 0x40]))]),
        unreachable: vec![down.address],
        ..Default::default()
    };
    let manager = ctx.manager(chain, VerificationOutcome::Verified);

    let report = manager.health().await;
    let statuses: Vec<_> = report
        .contracts
        .iter()
        .map(|(name, health)| (name.as_str(), health.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("Empty", HealthStatus::Failed),
            ("Live", HealthStatus::Healthy),
            ("Retired!", HealthStatus::RolledBack),
            ("Unreachable", HealthStatus::Error),
        ]
    );
    assert!(!report.healthy());
    assert!(report.to_string().contains("UNHEALTHY"));
}

#[tokio::test]
async fn test_costs_survive_per_contract_failures() {
    let ctx = TestContext::new("costs");
    ctx.add_artifact("TokenA", "0x6080604052");
    ctx.add_artifact("Broken", "0xfe");
    let store = ctx.store();
    let mut token_a = record("TokenA", 1, 1);
    token_a.constructor_args = vec![ConstructorArg::Integer(U256::from(1_000u64))];
    store.upsert(token_a).unwrap();
    store.upsert(record("Broken", 1, 1)).unwrap();
    store.upsert(record("NoArtifact", 1, 1)).unwrap();

    let chain = TestChain {
        gas_estimate: 100_000,
        gas_price: None,
        reverting_opcode: Some(0xfe),
        ..Default::default()
    };
    let manager = ctx
        .manager(chain, VerificationOutcome::Verified)
        .with_profile(NetworkProfile {
            chain_id: Some(11155111),
            fallback_gas_price: U256::from(10_000_000_000u64),
            ..Default::default()
        });

    let costs = manager.costs().await;
    assert_eq!(costs.lines.len(), 3);
    assert_eq!(costs.failures(), 2);
    assert!(matches!(costs.lines["Broken"], CostLine::Failed(_)));
    assert_eq!(costs.total, U256::from(1_000_000_000_000_000u64));
    assert!(costs.to_string().contains("0.001"));
}

#[tokio::test]
async fn test_deploy_then_verify() {
    let ctx = TestContext::new("deploy");
    ctx.add_artifact("FHEToken", "0x6080604052");

    let chain = TestChain {
        gas_estimate: 1_600_000,
        gas_price: Some(20_000_000_000),
        receipt: Some(confirmed_receipt()),
        ..Default::default()
    };
    let manager = ctx.manager(chain, VerificationOutcome::Verified);

    let args = vec![
        ConstructorArg::String("Zama FHE Token".to_string()),
        ConstructorArg::Address(DEPLOYER),
    ];
    let options = DeployOptions {
        verify: true,
        contract_path: Some("contracts/FHEToken.sol:FHEToken".to_string()),
    };
    let deployed = manager.deploy("FHEToken", args.clone(), &options).await.unwrap();

    assert_eq!(deployed.address, DEPLOYED);
    assert_eq!(deployed.gas_price, U256::from(20_000_000_000u64));
    assert_eq!(deployed.cost(), U256::from(30_000_000_000_000_000u64));
    assert!(deployed.verified);

    let stored = ctx.store().get("FHEToken").unwrap();
    assert_eq!(stored, deployed);
    assert_eq!(stored.constructor_args, args);
}

#[tokio::test]
async fn test_failed_deployments_leave_store_untouched() {
    let ctx = TestContext::new("deploy-fail");
    ctx.add_artifact("FHEToken", "0xfe6080");

    let reverting = ctx.manager(
        TestChain {
            reverting_opcode: Some(0xfe),
            receipt: Some(confirmed_receipt()),
            ..Default::default()
        },
        VerificationOutcome::Verified,
    );
    let err = reverting
        .deploy("FHEToken", vec![], &DeployOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LifecycleError>(),
        Some(LifecycleError::EstimationFailed { .. })
    ));

    let mut reverted = confirmed_receipt();
    reverted.status = false;
    let reverted_tx = ctx.manager(
        TestChain {
            receipt: Some(reverted),
            ..Default::default()
        },
        VerificationOutcome::Verified,
    );
    let err = reverted_tx
        .deploy("FHEToken", vec![], &DeployOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LifecycleError>(),
        Some(LifecycleError::TransactionReverted { .. })
    ));

    assert!(!ctx.store().path().exists());
}

#[tokio::test(start_paused = true)]
async fn test_deploy_deadline() {
    let ctx = TestContext::new("deploy-deadline");
    ctx.add_artifact("FHEToken", "0x6080604052");

    let manager = ctx
        .manager(
            TestChain {
                receipt: Some(confirmed_receipt()),
                wait_delay: Some(Duration::from_secs(7200)),
                ..Default::default()
            },
            VerificationOutcome::Verified,
        )
        .with_confirmation_timeout(Duration::from_secs(600));

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
