//! Execution result: the data-carrying outcome of one transaction

use crate::condensing::CondensingTransaction;
use crate::error::ErrorKind;
use crate::types::{Address, TransferInfo, Value};
use crate::validation::ValidationError;

/// Why a create was refused before any code ran
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContractRejection {
    pub format_errors: Vec<ValidationError>,
    pub determinism_errors: Vec<ValidationError>,
}

impl ContractRejection {
    pub fn error_count(&self) -> usize {
        self.format_errors.len() + self.determinism_errors.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ExecutionResult {
    /// True when no state change of this run may persist
    pub revert: bool,
    /// Reason for a revert, if the run produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(default)]
    pub return_value: Value,
    pub gas_consumed: u64,
    /// Value movements recorded by the contract
    #[serde(default)]
    pub transfers: Vec<TransferInfo>,
    /// Ledger transactions to include in the block after this one
    #[serde(default)]
    pub internal_transactions: Vec<CondensingTransaction>,
    /// Address of the deployed contract, create only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_contract_address: Option<Address>,
    /// Set when validation refused a deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<ContractRejection>,
}

impl ExecutionResult {
    pub fn success(gas_consumed: u64, return_value: Value) -> Self {
        ExecutionResult {
            revert: false,
            return_value,
            gas_consumed,
            ..Self::default()
        }
    }

    pub fn reverted(gas_consumed: u64, reason: impl Into<String>) -> Self {
        ExecutionResult {
            revert: true,
            exception: Some(reason.into()),
            gas_consumed,
            ..Self::default()
        }
    }

    /// A refused deployment forfeits the whole gas limit
    pub fn rejected(gas_limit: u64, rejection: ContractRejection) -> Self {
        ExecutionResult {
            revert: true,
            exception: Some(format!(
                "contract rejected with {} validation error(s)",
                rejection.error_count()
            )),
            gas_consumed: gas_limit,
            rejection: Some(rejection),
            ..Self::default()
        }
    }

    /// Category of an unsuccessful outcome, `None` on success
    pub fn error_kind(&self) -> Option<ErrorKind> {
        if self.rejection.is_some() {
            Some(ErrorKind::InvalidContractRejected)
        } else if self.revert {
            Some(ErrorKind::Revert)
        } else {
            None
        }
    }

    /// Fee charged for the gas consumed, paid to the block's coinbase
    pub fn fee(&self, gas_price: u64) -> u64 {
        self.gas_consumed.saturating_mul(gas_price)
    }
}
