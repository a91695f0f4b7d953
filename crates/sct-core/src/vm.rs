//! Virtual machine: the sandboxed interpreter for metered modules
//!
//! The interpreter is an explicit dispatch loop over [`Instruction`]s. It
//! never reflects over host metadata: methods are found by name in the
//! decoded module and run instruction by instruction.
//!
//! # Failure model
//!
//! - Contract failures (revert, arithmetic fault, bad operand, call depth,
//!   forbidden transfer) end the run as a *revert*. They are data.
//! - Running out of gas is a revert that consumes the whole gas limit.
//! - Exceeding the operand memory limit is a revert. Live stack bytes are
//!   counted across every activation of one execution.
//! - Only state store failures surface as `Err`.
//!
//! # Termination
//!
//! Every reachable instruction sits in a basic block whose head charges at
//! least one unit of gas, so a run is bounded by its gas limit no matter
//! what the code does.

use crate::config::{GasSchedule, SandboxLimits};
use crate::context::ExecutionContext;
use crate::module::{decompile, Decompilation, Instruction, MethodDefinition, ModuleDefinition};
use crate::result::ExecutionResult;
use crate::state::ContractState;
use crate::types::{Address, TransferInfo, Value};
use crate::Result;

/// Runs contract code against a state view
pub trait VirtualMachine {
    fn execute(
        &self,
        code: &[u8],
        context: &ExecutionContext,
        state: &mut dyn ContractState,
    ) -> Result<ExecutionResult>;
}

/// Why a run stopped early
#[derive(Debug)]
enum Trap {
    Revert(String),
    OutOfGas,
    Fatal(crate::Error),
}

impl From<crate::Error> for Trap {
    fn from(err: crate::Error) -> Self {
        Trap::Fatal(err)
    }
}

type Step<T> = std::result::Result<T, Trap>;

fn revert<T>(reason: impl Into<String>) -> Step<T> {
    Err(Trap::Revert(reason.into()))
}

#[derive(Debug)]
struct GasMeter {
    limit: u64,
    consumed: u64,
}

impl GasMeter {
    fn new(limit: u64) -> Self {
        GasMeter { limit, consumed: 0 }
    }

    fn charge(&mut self, amount: u64) -> Step<()> {
        match self.consumed.checked_add(amount) {
            Some(total) if total <= self.limit => {
                self.consumed = total;
                Ok(())
            }
            _ => {
                self.consumed = self.limit;
                Err(Trap::OutOfGas)
            }
        }
    }
}

/// Bytes held on the operand stacks of every live activation
#[derive(Debug)]
struct MemoryMeter {
    limit: usize,
    used: usize,
}

impl MemoryMeter {
    fn new(limit: usize) -> Self {
        MemoryMeter { limit, used: 0 }
    }

    fn reserve(&mut self, bytes: usize) -> Step<()> {
        match self.used.checked_add(bytes) {
            Some(total) if total <= self.limit => {
                self.used = total;
                Ok(())
            }
            _ => revert(format!("memory limit of {} bytes exceeded", self.limit)),
        }
    }

    fn release(&mut self, bytes: usize) {
        self.used = self.used.saturating_sub(bytes);
    }
}

/// One method activation
struct Activation<'m> {
    method: &'m MethodDefinition,
    args: Vec<Value>,
    address: Address,
    caller: Address,
    call_value: u64,
    depth: usize,
}

/// Reference interpreter
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    schedule: GasSchedule,
    limits: SandboxLimits,
}

impl Interpreter {
    pub fn new(schedule: GasSchedule, limits: SandboxLimits) -> Self {
        Interpreter { schedule, limits }
    }

    fn load_module(code: &[u8]) -> Step<Decompilation> {
        let decompilation = ModuleDefinition::from_bytes(code)
            .and_then(decompile)
            .map_err(|e| Trap::Revert(e.to_string()))?;
        if !decompilation.module().metered {
            return revert("module is not metered");
        }
        Ok(decompilation)
    }

    fn resolve<'d>(decompilation: &'d Decompilation, name: &str, args: &[Value]) -> Step<&'d MethodDefinition> {
        let contract = decompilation.contract_type();
        let Some(method) = contract.method(name) else {
            return revert(format!("method '{}' not found on '{}'", name, contract.name));
        };
        if method.arity as usize != args.len() {
            return revert(format!(
                "method '{}' takes {} parameter(s), {} given",
                name,
                method.arity,
                args.len()
            ));
        }
        Ok(method)
    }

    /// Value the contract at `address` may spend right now
    fn available(ctx: &ExecutionContext, state: &dyn ContractState, address: &Address) -> Step<u64> {
        let mut balance = state.balance(address)?;
        if *address == ctx.contract_address {
            balance = balance.saturating_add(ctx.call_value);
        }
        Ok(balance)
    }

    /// Run one activation. Whatever it still holds is released on exit.
    fn run(
        &self,
        ctx: &ExecutionContext,
        state: &mut dyn ContractState,
        meter: &mut GasMeter,
        memory: &mut MemoryMeter,
        frame: Activation<'_>,
    ) -> Step<Value> {
        let mark = memory.used;
        let reserved = frame.args.iter().try_for_each(|arg| memory.reserve(arg.size_bytes()));
        let outcome = reserved.and_then(|()| self.run_body(ctx, state, meter, memory, frame));
        memory.used = mark;
        outcome
    }

    fn run_body(
        &self,
        ctx: &ExecutionContext,
        state: &mut dyn ContractState,
        meter: &mut GasMeter,
        memory: &mut MemoryMeter,
        frame: Activation<'_>,
    ) -> Step<Value> {
        let body = &frame.method.body;
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0usize;
        let max_stack = self.limits.max_stack_depth;
        let max_value = self.limits.max_storage_value_bytes;

        macro_rules! pop {
            () => {
                match stack.pop() {
                    Some(v) => {
                        memory.release(v.size_bytes());
                        v
                    }
                    None => return revert("stack underflow"),
                }
            };
        }
        macro_rules! push {
            ($v:expr) => {{
                let value = $v;
                if stack.len() >= max_stack {
                    return revert("stack overflow");
                }
                memory.reserve(value.size_bytes())?;
                stack.push(value);
            }};
        }
        macro_rules! pop_int {
            () => {
                match pop!() {
                    Value::Int(i) => i,
                    other => return revert(format!("expected Int, found {}", other.type_name())),
                }
            };
        }
        macro_rules! jump {
            ($target:expr) => {{
                let target = $target as usize;
                if target >= body.len() {
                    return revert(format!("jump target {} out of range", target));
                }
                pc = target;
            }};
        }
        macro_rules! arith {
            ($op:ident, $what:expr) => {{
                let b = pop_int!();
                let a = pop_int!();
                match a.$op(b) {
                    Some(v) => push!(Value::Int(v)),
                    None => return revert(format!("arithmetic fault in {}", $what)),
                }
            }};
        }

        while pc < body.len() {
            let instruction = &body[pc];
            pc += 1;
            match instruction {
                Instruction::ChargeGas(amount) => meter.charge(*amount)?,
                Instruction::Push(v) => push!(v.clone()),
                Instruction::Pop => {
                    pop!();
                }
                Instruction::Dup => {
                    let top = pop!();
                    push!(top.clone());
                    push!(top);
                }
                Instruction::Swap => {
                    let b = pop!();
                    let a = pop!();
                    push!(b);
                    push!(a);
                }
                Instruction::Arg(n) => match frame.args.get(*n as usize) {
                    Some(v) => push!(v.clone()),
                    None => return revert(format!("argument {} not supplied", n)),
                },
                Instruction::Add => arith!(checked_add, "add"),
                Instruction::Sub => arith!(checked_sub, "sub"),
                Instruction::Mul => arith!(checked_mul, "mul"),
                Instruction::Div => arith!(checked_div, "div"),
                Instruction::Rem => arith!(checked_rem, "rem"),
                Instruction::Eq => {
                    let b = pop!();
                    let a = pop!();
                    push!(Value::Bool(a == b));
                }
                Instruction::Lt => {
                    let b = pop_int!();
                    let a = pop_int!();
                    push!(Value::Bool(a < b));
                }
                Instruction::Gt => {
                    let b = pop_int!();
                    let a = pop_int!();
                    push!(Value::Bool(a > b));
                }
                Instruction::Not => {
                    let v = pop!();
                    push!(Value::Bool(!v.is_truthy()));
                }
                Instruction::Jump(target) => jump!(*target),
                Instruction::JumpIf(target) => {
                    if pop!().is_truthy() {
                        jump!(*target);
                    }
                }
                Instruction::Load(key) => {
                    let v = state.storage(&frame.address, key)?;
                    push!(v);
                }
                Instruction::Store(key) => {
                    let v = pop!();
                    if v.size_bytes() > max_value {
                        return revert(format!("value for '{}' exceeds storage limit", key));
                    }
                    state.set_storage(&frame.address, key, v)?;
                }
                Instruction::Caller => push!(Value::Address(frame.caller)),
                Instruction::CallValue => push!(Value::Int(to_int(frame.call_value)?)),
                Instruction::SelfAddress => push!(Value::Address(frame.address)),
                Instruction::Balance => {
                    let balance = Self::available(ctx, state, &frame.address)?;
                    push!(Value::Int(to_int(balance)?));
                }
                Instruction::BlockNumber => push!(Value::Int(to_int(ctx.block_number)?)),
                Instruction::Difficulty => push!(Value::Int(to_int(ctx.difficulty)?)),
                Instruction::Coinbase => push!(Value::Address(ctx.coinbase)),
                Instruction::Transfer => {
                    let amount = pop_int!();
                    let to = match pop!() {
                        Value::Address(a) => a,
                        other => {
                            return revert(format!("transfer recipient must be Address, found {}", other.type_name()))
                        }
                    };
                    if !ctx.transfers_enabled {
                        return revert("value transfer is not permitted in this execution");
                    }
                    if amount <= 0 {
                        return revert(format!("transfer amount must be positive, found {}", amount));
                    }
                    if to == frame.address {
                        return revert("contract cannot transfer to itself");
                    }
                    let amount = amount as u64;
                    let available = Self::available(ctx, state, &frame.address)?;
                    if amount > available {
                        return revert(format!("insufficient balance: {} available, {} requested", available, amount));
                    }
                    state.record_transfer(TransferInfo {
                        from: frame.address,
                        to,
                        value: amount,
                    });
                }
                Instruction::Call { method, args } => {
                    let mut params = Vec::with_capacity(*args as usize);
                    for _ in 0..*args {
                        params.push(pop!());
                    }
                    params.reverse();
                    let target = match pop!() {
                        Value::Address(a) => a,
                        other => return revert(format!("call target must be Address, found {}", other.type_name())),
                    };
                    let (value, ok) = self.call(ctx, state, meter, memory, &frame, target, method, params)?;
                    push!(value);
                    push!(Value::Bool(ok));
                }
                Instruction::Return => return Ok(stack.pop().unwrap_or_default()),
                Instruction::Revert => {
                    let reason = stack
                        .pop()
                        .map(|v| match v {
                            Value::Str(s) => s,
                            other => other.to_string(),
                        })
                        .unwrap_or_else(|| "contract reverted".to_string());
                    return revert(reason);
                }
                Instruction::Host(call) => {
                    return revert(format!("non-deterministic host call {:?}", call));
                }
                Instruction::Float(op) => {
                    return revert(format!("floating point operation {:?}", op));
                }
            }
        }
        Ok(Value::Null)
    }

    /// Invoke another contract inside a nested state frame.
    ///
    /// A callee revert rolls back only the callee's frame and is reported
    /// to the caller as `(Null, false)`. Gas exhaustion and store failures
    /// propagate.
    #[allow(clippy::too_many_arguments)]
    fn call(
        &self,
        ctx: &ExecutionContext,
        state: &mut dyn ContractState,
        meter: &mut GasMeter,
        memory: &mut MemoryMeter,
        frame: &Activation<'_>,
        target: Address,
        method: &str,
        params: Vec<Value>,
    ) -> Step<(Value, bool)> {
        if frame.depth + 1 >= self.limits.max_call_depth {
            tracing::debug!(%target, method, "call depth exceeded");
            return Ok((Value::Null, false));
        }
        let Some(code) = state.code(&target)? else {
            tracing::debug!(%target, method, "call to address without code");
            return Ok((Value::Null, false));
        };

        state.start_tracking();
        let outcome = Self::load_module(&code).and_then(|decompilation| {
            let callee = Self::resolve(&decompilation, method, &params)?;
            self.run(
                ctx,
                state,
                meter,
                memory,
                Activation {
                    method: callee,
                    args: params,
                    address: target,
                    caller: frame.address,
                    call_value: 0,
                    depth: frame.depth + 1,
                },
            )
        });
        match outcome {
            Ok(value) => {
                state.commit_frame()?;
                Ok((value, true))
            }
            Err(Trap::Revert(reason)) => {
                tracing::debug!(%target, method, %reason, "inner call reverted");
                state.rollback_frame()?;
                Ok((Value::Null, false))
            }
            Err(trap) => {
                state.rollback_frame()?;
                Err(trap)
            }
        }
    }
}

fn to_int(value: u64) -> Step<i64> {
    i64::try_from(value).or_else(|_| revert(format!("{} does not fit in Int", value)))
}

impl VirtualMachine for Interpreter {
    fn execute(
        &self,
        code: &[u8],
        context: &ExecutionContext,
        state: &mut dyn ContractState,
    ) -> Result<ExecutionResult> {
        let mut meter = GasMeter::new(context.gas_limit);
        let mut memory = MemoryMeter::new(self.limits.max_memory_bytes);
        let outcome = meter.charge(self.schedule.base).and_then(|()| {
            let decompilation = Self::load_module(code)?;
            match context.contract_method.as_deref() {
                None => Ok(Value::Null),
                Some(name) => {
                    let method = Self::resolve(&decompilation, name, &context.parameters)?;
                    self.run(
                        context,
                        state,
                        &mut meter,
                        &mut memory,
                        Activation {
                            method,
                            args: context.parameters.clone(),
                            address: context.contract_address,
                            caller: context.caller,
                            call_value: context.call_value,
                            depth: 0,
                        },
                    )
                }
            }
        });

        match outcome {
            Ok(value) => Ok(ExecutionResult::success(meter.consumed, value)),
            Err(Trap::Revert(reason)) => {
                tracing::debug!(contract = %context.contract_address, %reason, "execution reverted");
                Ok(ExecutionResult::reverted(meter.consumed, reason))
            }
            Err(Trap::OutOfGas) => {
                tracing::debug!(contract = %context.contract_address, limit = context.gas_limit, "out of gas");
                Ok(ExecutionResult::reverted(context.gas_limit, "out of gas"))
            }
            Err(Trap::Fatal(err)) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas::{BasicBlockGasInjector, GasInjector};
    use crate::module::ModuleDefinition;
    use crate::state::{Account, MemoryStore, StateStore};
    use crate::types::{Hash256, StoredVin};

    const CONTRACT: Address = Address([0xc1; 20]);
    const OTHER: Address = Address([0xc2; 20]);
    const WALLET: Address = Address([0xee; 20]);

    fn metered(module: ModuleDefinition) -> Vec<u8> {
        let mut decomp = decompile(module).unwrap();
        BasicBlockGasInjector::default().inject(&mut decomp);
        decomp.to_bytes().unwrap()
    }

    fn ctx(method: &str, params: Vec<Value>, gas_limit: u64) -> ExecutionContext {
        ExecutionContext {
            block_number: 7,
            difficulty: 1,
            caller: WALLET,
            call_value: 0,
            gas_limit,
            gas_price: 1,
            parameters: params,
            coinbase: Address([0xcb; 20]),
            contract_address: CONTRACT,
            contract_method: Some(method.to_string()),
            contract_type_name: "Test".into(),
            transfers_enabled: true,
        }
    }

    fn store_with(code: Vec<u8>, balance: u64) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert_account(
            CONTRACT,
            Account {
                code: Some(code),
                unspent: (balance > 0).then_some(StoredVin {
                    hash: Hash256([1; 32]),
                    nvout: 0,
                    value: balance,
                }),
                ..Account::default()
            },
        );
        store
    }

    fn single(method: MethodDefinition) -> ModuleDefinition {
        ModuleDefinition::contract("Test", vec![method], None)
    }

    #[test]
    fn test_arithmetic_return() {
        let code = metered(single(MethodDefinition::new(
            "Sum",
            2,
            vec![Instruction::Arg(0), Instruction::Arg(1), Instruction::Add, Instruction::Return],
        )));
        let mut store = store_with(code.clone(), 0);
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&code, &ctx("Sum", vec![Value::Int(2), Value::Int(40)], 10_000), &mut view)
            .unwrap();
        assert!(!result.revert, "{:?}", result.exception);
        assert_eq!(result.return_value, Value::Int(42));
        assert_eq!(result.gas_consumed, GasSchedule::default().base + 4);
    }

    #[test]
    fn test_infinite_loop_runs_out_of_gas() {
        let code = metered(single(MethodDefinition::new("Spin", 0, vec![Instruction::Jump(0)])));
        let mut store = store_with(code.clone(), 0);
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&code, &ctx("Spin", vec![], 5_000), &mut view)
            .unwrap();
        assert!(result.revert);
        assert_eq!(result.gas_consumed, 5_000);
        assert_eq!(result.exception.as_deref(), Some("out of gas"));
    }

    #[test]
    fn test_base_cost_exceeding_limit_is_out_of_gas() {
        let code = metered(single(MethodDefinition::new("Run", 0, vec![])));
        let mut store = store_with(code.clone(), 0);
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&code, &ctx("Run", vec![], 10), &mut view)
            .unwrap();
        assert!(result.revert);
        assert_eq!(result.gas_consumed, 10);
    }

    #[test]
    fn test_unmetered_module_reverts() {
        let code = single(MethodDefinition::new("Run", 0, vec![Instruction::Return]))
            .to_bytes()
            .unwrap();
        let mut store = store_with(code.clone(), 0);
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&code, &ctx("Run", vec![], 10_000), &mut view)
            .unwrap();
        assert!(result.revert);
        assert_eq!(result.exception.as_deref(), Some("module is not metered"));
    }

    #[test]
    fn test_missing_method_and_arity() {
        let code = metered(single(MethodDefinition::new("Run", 1, vec![Instruction::Return])));
        let mut store = store_with(code.clone(), 0);
        let mut view = store.start_tracking();
        let vm = Interpreter::default();
        let missing = vm.execute(&code, &ctx("Nope", vec![], 10_000), &mut view).unwrap();
        assert!(missing.exception.unwrap().contains("not found"));
        let arity = vm.execute(&code, &ctx("Run", vec![], 10_000), &mut view).unwrap();
        assert!(arity.exception.unwrap().contains("takes 1 parameter"));
    }

    #[test]
    fn test_division_by_zero_reverts() {
        let code = metered(single(MethodDefinition::new(
            "Div",
            0,
            vec![
                Instruction::Push(Value::Int(1)),
                Instruction::Push(Value::Int(0)),
                Instruction::Div,
                Instruction::Return,
            ],
        )));
        let mut store = store_with(code.clone(), 0);
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&code, &ctx("Div", vec![], 10_000), &mut view)
            .unwrap();
        assert!(result.revert);
        assert!(result.exception.unwrap().contains("arithmetic fault"));
    }

    #[test]
    fn test_storage_and_transfer_recorded() {
        let code = metered(single(MethodDefinition::new(
            "Pay",
            0,
            vec![
                Instruction::Push(Value::Int(1)),
                Instruction::Store("paid".into()),
                Instruction::Push(Value::Address(WALLET)),
                Instruction::Push(Value::Int(100)),
                Instruction::Transfer,
                Instruction::Balance,
                Instruction::Return,
            ],
        )));
        let mut store = store_with(code.clone(), 250);
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&code, &ctx("Pay", vec![], 10_000), &mut view)
            .unwrap();
        assert!(!result.revert, "{:?}", result.exception);
        assert_eq!(result.return_value, Value::Int(150));
        assert_eq!(
            view.transfers(),
            vec![TransferInfo { from: CONTRACT, to: WALLET, value: 100 }]
        );
        assert_eq!(view.storage(&CONTRACT, "paid").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_overdraft_reverts() {
        let code = metered(single(MethodDefinition::new(
            "Pay",
            0,
            vec![
                Instruction::Push(Value::Address(WALLET)),
                Instruction::Push(Value::Int(100)),
                Instruction::Transfer,
            ],
        )));
        let mut store = store_with(code.clone(), 50);
        let mut view = store.start_tracking();
        let mut context = ctx("Pay", vec![], 10_000);
        let result = Interpreter::default().execute(&code, &context, &mut view).unwrap();
        assert!(result.exception.unwrap().contains("insufficient balance"));

        // incoming value counts toward the spendable balance
        context.call_value = 50;
        let result = Interpreter::default().execute(&code, &context, &mut view).unwrap();
        assert!(!result.revert, "{:?}", result.exception);
    }

    #[test]
    fn test_transfer_disabled_reverts() {
        let code = metered(single(MethodDefinition::new(
            "Pay",
            0,
            vec![
                Instruction::Push(Value::Address(WALLET)),
                Instruction::Push(Value::Int(1)),
                Instruction::Transfer,
            ],
        )));
        let mut store = store_with(code.clone(), 50);
        let mut view = store.start_tracking();
        let mut context = ctx("Pay", vec![], 10_000);
        context.transfers_enabled = false;
        let result = Interpreter::default().execute(&code, &context, &mut view).unwrap();
        assert!(result.revert);
        assert!(view.transfers().is_empty());
    }

    #[test]
    fn test_inner_call_revert_is_isolated() {
        // OTHER.Fail writes then reverts; CONTRACT.Run writes, calls, and returns the flag
        let callee = metered(single(MethodDefinition::new(
            "Fail",
            0,
            vec![
                Instruction::Push(Value::Int(9)),
                Instruction::Store("touched".into()),
                Instruction::Push(Value::Str("nope".into())),
                Instruction::Revert,
            ],
        )));
        let caller = metered(single(MethodDefinition::new(
            "Run",
            0,
            vec![
                Instruction::Push(Value::Int(1)),
                Instruction::Store("before".into()),
                Instruction::Push(Value::Address(OTHER)),
                Instruction::Call { method: "Fail".into(), args: 0 },
                Instruction::Return,
            ],
        )));
        let mut store = store_with(caller.clone(), 0);
        store.insert_account(
            OTHER,
            Account {
                code: Some(callee),
                ..Account::default()
            },
        );
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&caller, &ctx("Run", vec![], 100_000), &mut view)
            .unwrap();
        assert!(!result.revert, "{:?}", result.exception);
        assert_eq!(result.return_value, Value::Bool(false));
        assert_eq!(view.depth(), 1);
        assert_eq!(view.storage(&CONTRACT, "before").unwrap(), Value::Int(1));
        assert_eq!(view.storage(&OTHER, "touched").unwrap(), Value::Null);
    }

    #[test]
    fn test_inner_call_success_commits() {
        let callee = metered(single(MethodDefinition::new(
            "Echo",
            1,
            vec![
                Instruction::Arg(0),
                Instruction::Dup,
                Instruction::Store("last".into()),
                Instruction::Return,
            ],
        )));
        let caller = metered(single(MethodDefinition::new(
            "Run",
            0,
            vec![
                Instruction::Push(Value::Address(OTHER)),
                Instruction::Push(Value::Int(5)),
                Instruction::Call { method: "Echo".into(), args: 1 },
                Instruction::Pop,
                Instruction::Return,
            ],
        )));
        let mut store = store_with(caller.clone(), 0);
        store.insert_account(
            OTHER,
            Account {
                code: Some(callee),
                ..Account::default()
            },
        );
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&caller, &ctx("Run", vec![], 100_000), &mut view)
            .unwrap();
        assert_eq!(result.return_value, Value::Int(5));
        assert_eq!(view.storage(&OTHER, "last").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_recursion_bounded_by_call_depth() {
        // Calls itself forever; depth limit turns the deepest call into a failure flag
        let code = metered(single(MethodDefinition::new(
            "Recurse",
            0,
            vec![
                Instruction::SelfAddress,
                Instruction::Call { method: "Recurse".into(), args: 0 },
                Instruction::Return,
            ],
        )));
        let mut store = store_with(code.clone(), 0);
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&code, &ctx("Recurse", vec![], 1_000_000), &mut view)
            .unwrap();
        assert!(!result.revert, "{:?}", result.exception);
        assert_eq!(result.return_value, Value::Bool(true));
        assert_eq!(view.depth(), 1);
    }

    // ── Memory ────────────────────────────────────────────

    fn big_str() -> Value {
        Value::Str("x".repeat(200_000))
    }

    #[test]
    fn test_duplicating_large_values_hits_memory_limit() {
        let mut body = vec![Instruction::Push(big_str())];
        body.extend(std::iter::repeat(Instruction::Dup).take(1_000));
        body.push(Instruction::Return);
        let code = metered(single(MethodDefinition::new("Hoard", 0, body)));
        let mut store = store_with(code.clone(), 0);
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&code, &ctx("Hoard", vec![], 5_000), &mut view)
            .unwrap();
        assert!(result.revert);
        assert!(result.gas_consumed < 5_000, "memory revert is not gas exhaustion");
        assert_eq!(
            result.exception.as_deref(),
            Some("memory limit of 1048576 bytes exceeded")
        );
    }

    #[test]
    fn test_popped_values_release_memory() {
        let mut body = Vec::new();
        for _ in 0..20 {
            body.push(Instruction::Push(big_str()));
            body.push(Instruction::Pop);
        }
        body.push(Instruction::Push(Value::Int(1)));
        body.push(Instruction::Return);
        let code = metered(single(MethodDefinition::new("Churn", 0, body)));
        let mut store = store_with(code.clone(), 0);
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&code, &ctx("Churn", vec![], 10_000), &mut view)
            .unwrap();
        assert!(!result.revert, "{:?}", result.exception);
        assert_eq!(result.return_value, Value::Int(1));
    }

    #[test]
    fn test_memory_limit_counts_nested_activations() {
        // Caller holds 600 KB while the callee allocates another 600 KB.
        let callee = ModuleDefinition::contract(
            "Callee",
            vec![MethodDefinition::new(
                "Grow",
                0,
                vec![
                    Instruction::Push(Value::Str("y".repeat(600_000))),
                    Instruction::Pop,
                    Instruction::Return,
                ],
            )],
            None,
        );
        let caller = single(MethodDefinition::new(
            "Run",
            0,
            vec![
                Instruction::Push(Value::Str("z".repeat(600_000))),
                Instruction::Push(Value::Address(OTHER)),
                Instruction::Call { method: "Grow".into(), args: 0 },
                Instruction::Return,
            ],
        ));
        let code = metered(caller);
        let mut store = store_with(code.clone(), 0);
        store.insert_account(
            OTHER,
            Account {
                code: Some(metered(callee)),
                ..Account::default()
            },
        );
        let mut view = store.start_tracking();
        let result = Interpreter::default()
            .execute(&code, &ctx("Run", vec![], 10_000), &mut view)
            .unwrap();
        assert!(!result.revert, "{:?}", result.exception);
        assert_eq!(result.return_value, Value::Bool(false), "callee reverts on memory");
    }

    #[test]
    fn test_no_method_runs_only_base_charge() {
        let code = metered(single(MethodDefinition::new("Run", 0, vec![])));
        let mut store = store_with(code.clone(), 0);
        let mut view = store.start_tracking();
        let mut context = ctx("Run", vec![], 10_000);
        context.contract_method = None;
        let result = Interpreter::default().execute(&code, &context, &mut view).unwrap();
        assert!(!result.revert);
        assert_eq!(result.gas_consumed, GasSchedule::default().base);
    }
}
