//! Base state store: the committed ground truth below every tracked view

use std::collections::BTreeMap;

use crate::state::TrackedView;
use crate::types::{opt_hex_bytes, Address, StoredVin, Value};
use crate::Result;

/// A contract or wallet identity and everything the ledger keeps for it
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Account {
    /// Deployed, instrumented contract code
    #[serde(default, with = "opt_hex_bytes", skip_serializing_if = "Option::is_none")]
    pub code: Option<Vec<u8>>,
    /// The single UTXO holding the contract's balance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unspent: Option<StoredVin>,
    /// Contract storage
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<String, Value>,
}

impl Account {
    pub fn is_contract(&self) -> bool {
        self.code.is_some()
    }

    pub fn balance(&self) -> u64 {
        self.unspent.map(|vin| vin.value).unwrap_or(0)
    }
}

/// Complete images of every account a transaction touched
pub type ChangeSet = BTreeMap<Address, Account>;

/// Persistent account storage consumed by the executor.
///
/// `apply` must be all-or-nothing: either every account in the change set
/// is written or none is.
pub trait StateStore {
    fn account(&self, address: &Address) -> Result<Option<Account>>;

    fn apply(&mut self, changes: ChangeSet) -> Result<()>;

    /// Open a writable overlay whose reads fall through to this store
    fn start_tracking(&mut self) -> TrackedView<'_, Self>
    where
        Self: Sized,
    {
        TrackedView::new(self)
    }
}

/// In-memory store, used by tests, the CLI and embedders without a database
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MemoryStore {
    accounts: BTreeMap<Address, Account>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account directly, bypassing tracking
    pub fn insert_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    pub fn get(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn accounts(&self) -> &BTreeMap<Address, Account> {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn account(&self, address: &Address) -> Result<Option<Account>> {
        Ok(self.accounts.get(address).cloned())
    }

    fn apply(&mut self, changes: ChangeSet) -> Result<()> {
        self.accounts.extend(changes);
        Ok(())
    }
}
