//! Transaction dispatcher: create and call orchestration
//!
//! # Architecture
//!
//! ```text
//! ExecutionCarrier
//!      │
//!      ├─ create ─→ Decompiler → Format/Determinism validators → GasInjector
//!      │                                                            │
//!      │                                 VirtualMachine(context) ←──┘
//!      │
//!      └─ call ───→ stored code → VirtualMachine(context)
//!                                        │
//!                              ExecutionResult ─→ commit / rollback
//!                                        │
//!                           CondensingTransactionBuilder (call only)
//! ```
//!
//! Every mutation goes through one `TrackedView` opened before anything
//! else happens. The view is committed exactly once on success; on revert,
//! rejection or hard error it is dropped, which leaves the store untouched.

use std::collections::BTreeSet;

use crate::carrier::ExecutionCarrier;
use crate::condensing::{CondensingTransaction, CondensingTransactionBuilder};
use crate::config::ExecutorConfig;
use crate::context::{BlockContext, ExecutionContextBuilder};
use crate::gas::{BasicBlockGasInjector, GasInjector};
use crate::module::{Decompiler, ModuleDecompiler};
use crate::result::{ContractRejection, ExecutionResult};
use crate::state::{StateStore, TrackedView};
use crate::types::{Address, StoredVin};
use crate::validation::{DeterminismValidator, FormatValidator, ModuleValidator, ValidationError};
use crate::vm::{Interpreter, VirtualMachine};
use crate::{Error, Result};

/// Executes single contract transactions against a state store
pub struct TransactionDispatcher {
    decompiler: Box<dyn Decompiler>,
    format_validator: Box<dyn ModuleValidator>,
    determinism_validator: Box<dyn ModuleValidator>,
    gas_injector: Box<dyn GasInjector>,
    vm: Box<dyn VirtualMachine>,
    /// Bound on the instrumented code a create may store
    max_code_size_bytes: usize,
}

impl TransactionDispatcher {
    /// Dispatcher wired with the reference collaborators
    pub fn new(config: ExecutorConfig) -> Self {
        TransactionDispatcher {
            decompiler: Box::new(ModuleDecompiler::new(config.limits.max_code_size_bytes)),
            format_validator: Box::new(FormatValidator),
            determinism_validator: Box::new(DeterminismValidator),
            gas_injector: Box::new(BasicBlockGasInjector::new(config.gas.clone())),
            max_code_size_bytes: config.limits.max_code_size_bytes,
            vm: Box::new(Interpreter::new(config.gas, config.limits)),
        }
    }

    pub fn with_decompiler(mut self, decompiler: impl Decompiler + 'static) -> Self {
        self.decompiler = Box::new(decompiler);
        self
    }

    pub fn with_format_validator(mut self, validator: impl ModuleValidator + 'static) -> Self {
        self.format_validator = Box::new(validator);
        self
    }

    pub fn with_determinism_validator(mut self, validator: impl ModuleValidator + 'static) -> Self {
        self.determinism_validator = Box::new(validator);
        self
    }

    pub fn with_gas_injector(mut self, injector: impl GasInjector + 'static) -> Self {
        self.gas_injector = Box::new(injector);
        self
    }

    pub fn with_virtual_machine(mut self, vm: impl VirtualMachine + 'static) -> Self {
        self.vm = Box::new(vm);
        self
    }

    /// Execute one carrier.
    ///
    /// Reverts and rejected deployments are `Ok` results with `revert` set.
    /// `Err` means the transaction was aborted; in both cases nothing was
    /// written to `store` unless the result is a success.
    pub fn execute<S: StateStore>(
        &self,
        store: &mut S,
        carrier: &ExecutionCarrier,
        block: &BlockContext,
    ) -> Result<ExecutionResult> {
        carrier.validate()?;
        let view = store.start_tracking();
        if carrier.is_create() {
            tracing::debug!(sender = %carrier.sender, tx = %carrier.transaction_hash, "dispatching create");
            self.create(view, carrier, block)
        } else {
            tracing::debug!(sender = %carrier.sender, tx = %carrier.transaction_hash, "dispatching call");
            self.call(view, carrier, block)
        }
    }

    // ── Create ─────────────────────────────────────────────

    fn create<S: StateStore>(
        &self,
        mut view: TrackedView<'_, S>,
        carrier: &ExecutionCarrier,
        block: &BlockContext,
    ) -> Result<ExecutionResult> {
        let address = carrier.new_contract_address();
        view.create_account(&address)?;

        let mut decompilation = self.decompiler.module_definition(&carrier.code)?;

        let format = self.format_validator.validate(&decompilation);
        let determinism = self.determinism_validator.validate(&decompilation);
        if !format.is_valid() || !determinism.is_valid() {
            let rejection = ContractRejection {
                format_errors: format.errors,
                determinism_errors: determinism.errors,
            };
            return Ok(reject(view, address, carrier.gas_limit, rejection));
        }

        self.gas_injector.inject(&mut decompilation);
        let code = decompilation.to_bytes()?;
        // Stored code is decoded under the same limit on every later call.
        if code.len() > self.max_code_size_bytes {
            let rejection = ContractRejection {
                format_errors: vec![ValidationError {
                    rule: "code-size".into(),
                    location: None,
                    message: format!(
                        "metered code is {} bytes, limit is {} bytes",
                        code.len(),
                        self.max_code_size_bytes
                    ),
                }],
                determinism_errors: Vec::new(),
            };
            return Ok(reject(view, address, carrier.gas_limit, rejection));
        }
        let initializer = decompilation.initializer().map(|m| m.name.clone());

        let context = ExecutionContextBuilder::new(carrier, block)
            .contract_address(address)
            .contract_method(initializer)
            .contract_type_name(decompilation.contract_type().name.clone())
            .transfers_enabled(false)
            .build()?;

        let mut result = self.vm.execute(&code, &context, &mut view)?;
        if result.revert {
            tracing::warn!(contract = %address, reason = ?result.exception, "create reverted");
            view.rollback();
            return Ok(result);
        }
        if !view.transfers().is_empty() {
            tracing::warn!(contract = %address, "create recorded value transfers, reverting");
            view.rollback();
            return Ok(ExecutionResult::reverted(
                result.gas_consumed,
                "value transfer is not permitted on create",
            ));
        }

        view.set_code(&address, code)?;
        view.commit()?;
        tracing::info!(contract = %address, gas = result.gas_consumed, "contract created");

        result.new_contract_address = Some(address);
        Ok(result)
    }

    // ── Call ───────────────────────────────────────────────

    fn call<S: StateStore>(
        &self,
        mut view: TrackedView<'_, S>,
        carrier: &ExecutionCarrier,
        block: &BlockContext,
    ) -> Result<ExecutionResult> {
        let target = carrier
            .to
            .ok_or_else(|| Error::InvalidCarrier("call has no target address".into()))?;
        let code = view.code(&target)?.ok_or(Error::NoCodeAtAddress(target))?;
        let decompilation = self.decompiler.module_definition(&code)?;

        let context = ExecutionContextBuilder::new(carrier, block)
            .contract_type_name(decompilation.contract_type().name.clone())
            .build()?;

        let mut result = self.vm.execute(&code, &context, &mut view)?;
        if result.revert {
            tracing::warn!(contract = %target, reason = ?result.exception, "call reverted");
            view.rollback();
            return Ok(result);
        }

        result.transfers = view.transfers();
        if !result.transfers.is_empty() || carrier.value > 0 {
            let condensing = self.condense(&mut view, carrier, target, &result)?;
            result.internal_transactions.push(condensing);
        }

        view.commit()?;
        tracing::info!(
            contract = %target,
            gas = result.gas_consumed,
            transfers = result.transfers.len(),
            "call committed"
        );
        Ok(result)
    }

    /// Build the condensing transaction for a successful call and point
    /// every contract it pays at its new output.
    fn condense<S: StateStore>(
        &self,
        view: &mut TrackedView<'_, S>,
        carrier: &ExecutionCarrier,
        target: Address,
        result: &ExecutionResult,
    ) -> Result<CondensingTransaction> {
        let mut touched = BTreeSet::new();
        touched.insert(target);
        for transfer in &result.transfers {
            touched.insert(transfer.from);
            touched.insert(transfer.to);
        }

        let mut contracts = Vec::new();
        let mut builder = CondensingTransactionBuilder::new(carrier, &result.transfers);
        for address in touched {
            if view.code(&address)?.is_none() {
                continue;
            }
            if let Some(vin) = view.unspent(&address)? {
                builder = builder.with_prior_unspent(address, vin);
            }
            contracts.push(address);
        }
        let tx = builder.build()?;

        let id = tx.id()?;
        for address in contracts {
            let unspent = tx.output_index(&address).map(|nvout| StoredVin {
                hash: id,
                nvout,
                value: tx.outputs[nvout as usize].value,
            });
            view.set_unspent(&address, unspent)?;
        }
        Ok(tx)
    }
}

fn reject<S: StateStore>(
    view: TrackedView<'_, S>,
    address: Address,
    gas_limit: u64,
    rejection: ContractRejection,
) -> ExecutionResult {
    tracing::warn!(
        contract = %address,
        errors = rejection.error_count(),
        "contract rejected, gas limit forfeited"
    );
    view.rollback();
    ExecutionResult::rejected(gas_limit, rejection)
}

impl Default for TransactionDispatcher {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}
