//! Condensing transactions: moving contract value back onto the UTXO ledger
//!
//! Contracts move value as account-style transfers while they run. After a
//! successful call those transfers are condensed into one ledger
//! transaction that spends the contracts' unspent outputs (and any value
//! the call delivered) and pays every resulting balance out again.
//!
//! # Construction
//!
//! ```text
//! inputs   target prior unspent
//!          incoming value   (carrier hash, carrier nvout, carrier value)
//!          other contracts' prior unspents, address order
//!
//! outputs  one per address with a positive resulting balance, address order
//!          balance = prior + incoming (target only) + credits - debits
//! ```
//!
//! This is a direct translation, not coin selection. Every spent output is
//! paid back out, so contracts receive their change and no value leaks
//! into fees.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::carrier::ExecutionCarrier;
use crate::types::{Address, Hash256, StoredVin, TransferInfo};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CondensingOutput {
    pub address: Address,
    pub value: u64,
}

/// Ledger transaction reconciling contract transfers with the UTXO set
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct CondensingTransaction {
    pub inputs: Vec<StoredVin>,
    pub outputs: Vec<CondensingOutput>,
}

impl CondensingTransaction {
    /// Content hash: SHA-256 of the JSON encoding
    pub fn id(&self) -> Result<Hash256> {
        let bytes = serde_json::to_vec(self)?;
        let digest = Sha256::digest(&bytes);
        let mut id = [0u8; Hash256::LEN];
        id.copy_from_slice(&digest);
        Ok(Hash256(id))
    }

    pub fn total_in(&self) -> u128 {
        self.inputs.iter().map(|vin| vin.value as u128).sum()
    }

    pub fn total_out(&self) -> u128 {
        self.outputs.iter().map(|out| out.value as u128).sum()
    }

    /// Output index paying `address`, if any
    pub fn output_index(&self, address: &Address) -> Option<u32> {
        self.outputs
            .iter()
            .position(|out| out.address == *address)
            .map(|i| i as u32)
    }
}

#[derive(Debug, Clone)]
pub struct CondensingTransactionBuilder<'a> {
    carrier: &'a ExecutionCarrier,
    transfers: &'a [TransferInfo],
    prior_unspent: BTreeMap<Address, StoredVin>,
}

impl<'a> CondensingTransactionBuilder<'a> {
    pub fn new(carrier: &'a ExecutionCarrier, transfers: &'a [TransferInfo]) -> Self {
        CondensingTransactionBuilder {
            carrier,
            transfers,
            prior_unspent: BTreeMap::new(),
        }
    }

    /// Register the current unspent output of a contract touched by the run
    pub fn with_prior_unspent(mut self, address: Address, vin: StoredVin) -> Self {
        self.prior_unspent.insert(address, vin);
        self
    }

    pub fn build(self) -> Result<CondensingTransaction> {
        let target = self.carrier.to.ok_or_else(|| {
            Error::InternalConsistency("condensing transaction without a target contract".into())
        })?;

        let mut inputs = Vec::with_capacity(self.prior_unspent.len() + 1);
        let mut balances: BTreeMap<Address, i128> = BTreeMap::new();

        if let Some(vin) = self.prior_unspent.get(&target) {
            inputs.push(*vin);
            *balances.entry(target).or_default() += vin.value as i128;
        }
        if self.carrier.value > 0 {
            inputs.push(StoredVin {
                hash: self.carrier.transaction_hash,
                nvout: self.carrier.nvout,
                value: self.carrier.value,
            });
            *balances.entry(target).or_default() += self.carrier.value as i128;
        }
        for (address, vin) in self.prior_unspent.iter().filter(|(a, _)| **a != target) {
            inputs.push(*vin);
            *balances.entry(*address).or_default() += vin.value as i128;
        }

        for transfer in self.transfers {
            *balances.entry(transfer.from).or_default() -= transfer.value as i128;
            *balances.entry(transfer.to).or_default() += transfer.value as i128;
        }

        let mut outputs = Vec::with_capacity(balances.len());
        for (address, balance) in balances {
            if balance < 0 {
                return Err(Error::InternalConsistency(format!(
                    "{} transferred {} more than it held",
                    address, -balance
                )));
            }
            if balance > 0 {
                let value = u64::try_from(balance).map_err(|_| {
                    Error::InternalConsistency(format!("output for {} overflows: {}", address, balance))
                })?;
                outputs.push(CondensingOutput { address, value });
            }
        }

        let tx = CondensingTransaction { inputs, outputs };
        if tx.total_in() < tx.total_out() {
            return Err(Error::InternalConsistency(format!(
                "condensing transaction spends {} but pays {}",
                tx.total_in(),
                tx.total_out()
            )));
        }
        tracing::debug!(
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            value = %tx.total_out(),
            "built condensing transaction"
        );
        Ok(tx)
    }
}
