//! Execution context: the immutable inputs of one contract run
//!
//! A context is fully determined by the carrier and the block it is
//! executed in. Nothing is read from the host environment.

use crate::carrier::ExecutionCarrier;
use crate::types::{Address, Value};
use crate::{Error, Result};

/// Chain head metadata for the block being assembled or validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockContext {
    pub number: u64,
    pub difficulty: u64,
    pub coinbase: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionContext {
    pub block_number: u64,
    pub difficulty: u64,
    pub caller: Address,
    pub call_value: u64,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub parameters: Vec<Value>,
    pub coinbase: Address,
    pub contract_address: Address,
    /// Method to run; `None` runs nothing beyond the base charge
    pub contract_method: Option<String>,
    pub contract_type_name: String,
    /// Whether the contract may move value in this run
    pub transfers_enabled: bool,
}

/// Assembles an [`ExecutionContext`] from a carrier and block metadata
#[derive(Debug, Clone)]
pub struct ExecutionContextBuilder<'a> {
    carrier: &'a ExecutionCarrier,
    block: &'a BlockContext,
    contract_address: Option<Address>,
    contract_method: Option<String>,
    contract_type_name: String,
    transfers_enabled: bool,
}

impl<'a> ExecutionContextBuilder<'a> {
    /// Defaults: target and method from the carrier, transfers allowed
    /// except on create.
    pub fn new(carrier: &'a ExecutionCarrier, block: &'a BlockContext) -> Self {
        ExecutionContextBuilder {
            carrier,
            block,
            contract_address: carrier.to,
            contract_method: carrier.method_name.clone(),
            contract_type_name: String::new(),
            transfers_enabled: !carrier.is_create(),
        }
    }

    pub fn contract_address(mut self, address: Address) -> Self {
        self.contract_address = Some(address);
        self
    }

    pub fn contract_method(mut self, method: Option<String>) -> Self {
        self.contract_method = method;
        self
    }

    pub fn contract_type_name(mut self, name: impl Into<String>) -> Self {
        self.contract_type_name = name.into();
        self
    }

    pub fn transfers_enabled(mut self, enabled: bool) -> Self {
        self.transfers_enabled = enabled;
        self
    }

    pub fn build(self) -> Result<ExecutionContext> {
        let contract_address = self.contract_address.ok_or_else(|| {
            Error::InvalidCarrier("execution context needs a contract address".into())
        })?;
        Ok(ExecutionContext {
            block_number: self.block.number,
            difficulty: self.block.difficulty,
            caller: self.carrier.sender,
            call_value: self.carrier.value,
            gas_limit: self.carrier.gas_limit,
            gas_price: self.carrier.gas_price,
            parameters: self.carrier.method_parameters.clone(),
            coinbase: self.block.coinbase,
            contract_address,
            contract_method: self.contract_method,
            contract_type_name: self.contract_type_name,
            transfers_enabled: self.transfers_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hash256;

    fn block() -> BlockContext {
        BlockContext {
            number: 12,
            difficulty: 3,
            coinbase: Address([0xc0; 20]),
        }
    }

    #[test]
    fn test_call_context_from_carrier() {
        let carrier = ExecutionCarrier::call(
            Address([1; 20]),
            Address([2; 20]),
            "Deposit",
            vec![Value::Int(7)],
            500,
            20_000,
            2,
            Hash256([9; 32]),
            1,
        );
        let block = block();
        let ctx = ExecutionContextBuilder::new(&carrier, &block)
            .contract_type_name("Bank")
            .build()
            .unwrap();
        assert_eq!(ctx.block_number, 12);
        assert_eq!(ctx.caller, Address([1; 20]));
        assert_eq!(ctx.contract_address, Address([2; 20]));
        assert_eq!(ctx.contract_method.as_deref(), Some("Deposit"));
        assert_eq!(ctx.call_value, 500);
        assert_eq!(ctx.parameters, vec![Value::Int(7)]);
        assert_eq!(ctx.coinbase, Address([0xc0; 20]));
        assert!(ctx.transfers_enabled);
    }

    #[test]
    fn test_create_context_disables_transfers() {
        let carrier =
            ExecutionCarrier::create(Address([1; 20]), vec![1], 20_000, 1, Hash256([9; 32]), 0);
        let block = block();
        let address = carrier.new_contract_address();
        let ctx = ExecutionContextBuilder::new(&carrier, &block)
            .contract_address(address)
            .contract_method(None)
            .build()
            .unwrap();
        assert_eq!(ctx.contract_address, address);
        assert!(ctx.contract_method.is_none());
        assert!(!ctx.transfers_enabled);
    }

    #[test]
    fn test_missing_contract_address_rejected() {
        let carrier =
            ExecutionCarrier::create(Address([1; 20]), vec![1], 20_000, 1, Hash256([9; 32]), 0);
        let block = block();
        assert!(ExecutionContextBuilder::new(&carrier, &block).build().is_err());
    }
}
