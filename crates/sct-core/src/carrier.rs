//! Execution carrier: the decoded payload of a contract transaction

use sha2::{Digest, Sha256};

use crate::types::{hex_bytes, Address, Hash256, Value};
use crate::{Error, Result};

/// Domain separator for contract address derivation
const CONTRACT_ADDRESS_TAG: &[u8] = b"sct/contract-address";

/// Which contract opcode the transaction output carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OpcodeType {
    CreateContract,
    CallContract,
}

/// One contract-affecting transaction, as decoded from its output script
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionCarrier {
    pub opcode: OpcodeType,
    /// Address that paid for and signed the transaction
    pub sender: Address,
    /// Target contract, `None` on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Value of the contract output (incoming value for the contract)
    #[serde(default)]
    pub value: u64,
    pub gas_limit: u64,
    pub gas_price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
    #[serde(default)]
    pub method_parameters: Vec<Value>,
    /// Contract code, create only
    #[serde(default, with = "hex_bytes")]
    pub code: Vec<u8>,
    /// Hash of the transaction carrying this payload
    pub transaction_hash: Hash256,
    /// Index of the contract output in that transaction
    pub nvout: u32,
}

impl ExecutionCarrier {
    /// Carrier for a contract deployment
    pub fn create(
        sender: Address,
        code: Vec<u8>,
        gas_limit: u64,
        gas_price: u64,
        transaction_hash: Hash256,
        nvout: u32,
    ) -> Self {
        ExecutionCarrier {
            opcode: OpcodeType::CreateContract,
            sender,
            to: None,
            value: 0,
            gas_limit,
            gas_price,
            method_name: None,
            method_parameters: Vec::new(),
            code,
            transaction_hash,
            nvout,
        }
    }

    /// Carrier for a method call on a deployed contract
    #[allow(clippy::too_many_arguments)]
    pub fn call(
        sender: Address,
        to: Address,
        method_name: impl Into<String>,
        method_parameters: Vec<Value>,
        value: u64,
        gas_limit: u64,
        gas_price: u64,
        transaction_hash: Hash256,
        nvout: u32,
    ) -> Self {
        ExecutionCarrier {
            opcode: OpcodeType::CallContract,
            sender,
            to: Some(to),
            value,
            gas_limit,
            gas_price,
            method_name: Some(method_name.into()),
            method_parameters,
            code: Vec::new(),
            transaction_hash,
            nvout,
        }
    }

    /// Set the constructor parameters of a create carrier
    pub fn with_parameters(mut self, parameters: Vec<Value>) -> Self {
        self.method_parameters = parameters;
        self
    }

    pub fn is_create(&self) -> bool {
        self.opcode == OpcodeType::CreateContract
    }

    /// Check the create/call shape rules
    pub fn validate(&self) -> Result<()> {
        if self.gas_limit == 0 {
            return Err(Error::InvalidCarrier("gas limit must be > 0".into()));
        }
        match self.opcode {
            OpcodeType::CreateContract => {
                if self.to.is_some() {
                    return Err(Error::InvalidCarrier(
                        "create must not name a target; the address is derived".into(),
                    ));
                }
                if self.code.is_empty() {
                    return Err(Error::InvalidCarrier("create carries no code".into()));
                }
                if self.value > 0 {
                    return Err(Error::InvalidCarrier("create must not carry value".into()));
                }
            }
            OpcodeType::CallContract => {
                if self.to.is_none() {
                    return Err(Error::InvalidCarrier("call has no target address".into()));
                }
                match self.method_name.as_deref() {
                    Some(name) if !name.is_empty() => {}
                    _ => {
                        return Err(Error::InvalidCarrier("call has no method name".into()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Derive the address a create carrier deploys to.
    ///
    /// Pure function of sender and the originating output (hash, index),
    /// so every node derives the same address for the same transaction.
    pub fn new_contract_address(&self) -> Address {
        let mut hasher = Sha256::new();
        hasher.update(CONTRACT_ADDRESS_TAG);
        hasher.update(self.sender.as_bytes());
        hasher.update(self.transaction_hash.as_bytes());
        hasher.update(self.nvout.to_be_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; Address::LEN];
        bytes.copy_from_slice(&digest[..Address::LEN]);
        Address(bytes)
    }

    /// The most the sender can pay for this transaction
    pub fn fee_limit(&self) -> u64 {
        self.gas_limit.saturating_mul(self.gas_price)
    }
}
