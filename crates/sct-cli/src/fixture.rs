//! Block fixtures for `sct run`
//!
//! ```json
//! {
//!   "accounts": { "<address>": { "unspent": { ... }, "storage": { ... } } },
//!   "block": { "number": 1, "difficulty": 1, "coinbase": "<address>" },
//!   "transactions": [ { "opcode": "CreateContract", ..., "module": { ... } } ]
//! }
//! ```
//!
//! A transaction may give its code either as hex `code` or as a plain
//! `module` definition, which is encoded before execution.

use std::collections::BTreeMap;
use std::path::Path;

use sct_core::module::ModuleDefinition;
use sct_core::state::{Account, MemoryStore};
use sct_core::{Address, BlockContext, ExecutionCarrier};

#[derive(Debug, serde::Deserialize)]
pub struct BlockFixture {
    #[serde(default)]
    pub accounts: BTreeMap<Address, Account>,
    pub block: BlockContext,
    pub transactions: Vec<FixtureTransaction>,
}

#[derive(Debug, serde::Deserialize)]
pub struct FixtureTransaction {
    #[serde(flatten)]
    pub carrier: ExecutionCarrier,
    #[serde(default)]
    pub module: Option<ModuleDefinition>,
}

impl BlockFixture {
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        serde_json::from_str(&text).map_err(|e| format!("invalid block fixture {}: {}", path.display(), e))
    }

    /// Genesis store, block context and carriers in ledger order
    pub fn into_parts(self) -> Result<(MemoryStore, BlockContext, Vec<ExecutionCarrier>), String> {
        let mut store = MemoryStore::new();
        for (address, account) in self.accounts {
            store.insert_account(address, account);
        }
        let carriers = self
            .transactions
            .into_iter()
            .map(|tx| {
                let mut carrier = tx.carrier;
                if let Some(module) = tx.module {
                    carrier.code = module.to_bytes().map_err(|e| e.to_string())?;
                }
                Ok(carrier)
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok((store, self.block, carriers))
    }
}
