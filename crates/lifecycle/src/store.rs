//! Durable per-network deployment records.
//!
//! Each network owns one JSON document, `<root>/<network>.json`, holding an ordered array of
//! [`DeploymentRecord`]s. The document is created on first write and only ever replaced whole.
//!
//! There is no cross-process locking: two processes writing the same network's document race,
//! and the last writer wins. Run one operator command per network at a time.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use derive_more::Deref;

use crate::record::DeploymentRecord;

/// A network's records keyed by contract name.
///
/// Keying by name makes the one-record-per-contract rule structural. The on-disk order is
/// recovered by [`RecordSet::into_ordered`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct RecordSet(BTreeMap<String, DeploymentRecord>);

impl RecordSet {
    /// Build a set from a sequence; later records replace earlier ones with the same name.
    pub fn from_records(records: impl IntoIterator<Item = DeploymentRecord>) -> Self {
        let mut set = Self::default();
        for record in records {
            set.upsert(record);
        }
        set
    }

    /// Insert a record, returning the one it replaced.
    pub fn upsert(&mut self, record: DeploymentRecord) -> Option<DeploymentRecord> {
        self.0.insert(record.contract_name.clone(), record)
    }

    /// Records in save order (timestamp, then name), as stored on disk.
    pub fn into_ordered(self) -> Vec<DeploymentRecord> {
        let mut records: Vec<_> = self.0.into_values().collect();
        records.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.contract_name.cmp(&b.contract_name))
        });
        records
    }
}

/// Network names become file names under the storage root, so they are restricted to ASCII
/// letters, digits, `-`, `_` and `.`, and may not start with a dot.
fn validate_network_name(network: &str) -> Result<()> {
    let valid = !network.is_empty()
        && !network.starts_with('.')
        && network
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        anyhow::bail!(
            "Invalid network name '{}': use letters, digits, '-', '_' or '.'",
            network
        );
    }
    Ok(())
}

/// Handle on one network's record document.
#[derive(Debug, Clone)]
pub struct DeploymentStore {
    root: PathBuf,
    network: String,
}

impl DeploymentStore {
    /// Fails for network names that are not a single plain path component.
    pub fn new(root: impl Into<PathBuf>, network: impl Into<String>) -> Result<Self> {
        let network = network.into();
        validate_network_name(&network)?;
        Ok(Self {
            root: root.into(),
            network,
        })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the network's record document.
    pub fn path(&self) -> PathBuf {
        self.root.join(format!("{}.json", self.network))
    }

    /// All records in stored order.
    ///
    /// Never fails: a missing document is an empty store, and an unreadable or corrupt one is
    /// logged and treated as empty so that new deployments can still proceed.
    pub fn load(&self) -> Vec<DeploymentRecord> {
        self.load_set().into_ordered()
    }

    /// All records keyed by contract name. Same degradation rules as [`Self::load`].
    pub fn load_set(&self) -> RecordSet {
        let path = self.path();

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No deployment records yet");
                return RecordSet::default();
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Failed to read deployment records, treating store as empty"
                );
                return RecordSet::default();
            }
        };

        match serde_json::from_str::<Vec<DeploymentRecord>>(&content) {
            Ok(records) => RecordSet::from_records(records),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Deployment records are corrupt, treating store as empty"
                );
                RecordSet::default()
            }
        }
    }

    /// Look up a record by contract name.
    pub fn get(&self, contract_name: &str) -> Option<DeploymentRecord> {
        self.load_set().get(contract_name).cloned()
    }

    /// Replace any record with the same contract name and rewrite the whole document.
    pub fn upsert(&self, record: DeploymentRecord) -> Result<()> {
        if record.network != self.network {
            anyhow::bail!(
                "Record for {} belongs to network '{}', not '{}'",
                record.contract_name,
                record.network,
                self.network
            );
        }

        let contract = record.contract_name.clone();
        let mut set = self.load_set();
        let replaced = set.upsert(record).is_some();
        self.save(set)?;

        tracing::info!(
            contract = %contract,
            network = %self.network,
            replaced,
            "Saved deployment record"
        );
        Ok(())
    }

    /// Write the full document through a temporary file so readers never see a partial write.
    fn save(&self, set: RecordSet) -> Result<()> {
        std::fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create storage root {}", self.root.display())
        })?;

        let path = self.path();
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&set.into_ordered())
            .context("Failed to serialize deployment records")?;

        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        Ok(())
    }
}
