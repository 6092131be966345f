//! Directory of live contract addresses, rebuilt from the store on demand.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use derive_more::Deref;
use serde::{Deserialize, Serialize};

use crate::{record::DeploymentRecord, store::DeploymentStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBookEntry {
    pub address: Address,
    pub verified: bool,
    pub block: u64,
}

/// `chainId -> contractName -> entry`, excluding rolled-back deployments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref)]
pub struct AddressBook(BTreeMap<u64, BTreeMap<String, AddressBookEntry>>);

impl AddressBook {
    pub fn from_records<'a>(
        chain_id: u64,
        records: impl IntoIterator<Item = &'a DeploymentRecord>,
    ) -> Self {
        let contracts: BTreeMap<String, AddressBookEntry> = records
            .into_iter()
            .filter(|record| record.is_active())
            .map(|record| {
                (
                    record.contract_name.clone(),
                    AddressBookEntry {
                        address: record.address,
                        verified: record.verified,
                        block: record.block_number,
                    },
                )
            })
            .collect();

        Self(BTreeMap::from([(chain_id, contracts)]))
    }

    /// Entries for one chain.
    pub fn contracts(&self, chain_id: u64) -> Option<&BTreeMap<String, AddressBookEntry>> {
        self.0.get(&chain_id)
    }

    /// Overwrite `path` with this book.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize address book")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write address book {}", path.display()))?;
        Ok(())
    }
}

/// `<storage root>/addresses-<network>.json`
pub fn address_book_path(store: &DeploymentStore) -> PathBuf {
    store
        .root()
        .join(format!("addresses-{}.json", store.network()))
}
