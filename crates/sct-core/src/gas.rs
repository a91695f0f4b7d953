//! Gas injection: instruments contract methods with metering instructions
//!
//! Each method body is split into basic blocks. A block starts at method
//! entry, at every jump target and after every instruction that ends a
//! block. The injector prefixes every block with `ChargeGas(cost)` where
//! `cost` is the static cost of the whole block, and rewrites jump targets
//! so they land on the charge of the block they enter.
//!
//! Because every loop must pass through a block head and every block costs
//! at least one unit, any execution is bounded by its gas limit.

use std::collections::BTreeSet;

use crate::config::GasSchedule;
use crate::module::{Decompilation, Instruction};

/// Inserts metering into the contract type of a module, in place
pub trait GasInjector {
    fn inject(&self, decompilation: &mut Decompilation);
}

/// Per-basic-block static metering
#[derive(Debug, Clone, Default)]
pub struct BasicBlockGasInjector {
    schedule: GasSchedule,
}

impl BasicBlockGasInjector {
    pub fn new(schedule: GasSchedule) -> Self {
        BasicBlockGasInjector { schedule }
    }

    /// Instrument a single method body
    pub fn instrument(&self, body: &[Instruction]) -> Vec<Instruction> {
        let leaders = block_leaders(body);
        // Position of the charge instruction that heads the block starting at `target`.
        let charge_position = |target: usize| -> usize {
            target + leaders.range(..target).count()
        };

        let mut out = Vec::with_capacity(body.len() + leaders.len());
        for (i, instruction) in body.iter().enumerate() {
            if leaders.contains(&i) {
                let end = leaders
                    .range(i + 1..)
                    .next()
                    .copied()
                    .unwrap_or(body.len());
                let cost: u64 = body[i..end]
                    .iter()
                    .map(|ins| ins.cost(&self.schedule))
                    .fold(0u64, u64::saturating_add);
                out.push(Instruction::ChargeGas(cost.max(1)));
            }
            let rewritten = match instruction {
                Instruction::Jump(t) => Instruction::Jump(remap(*t, body.len(), &charge_position)),
                Instruction::JumpIf(t) => Instruction::JumpIf(remap(*t, body.len(), &charge_position)),
                other => other.clone(),
            };
            out.push(rewritten);
        }
        out
    }
}

fn remap(target: u32, len: usize, charge_position: &impl Fn(usize) -> usize) -> u32 {
    let target = target as usize;
    if target < len {
        charge_position(target) as u32
    } else {
        // Out-of-range targets are rejected by the format validator; keep them out of range.
        u32::MAX
    }
}

fn block_leaders(body: &[Instruction]) -> BTreeSet<usize> {
    let mut leaders = BTreeSet::new();
    if body.is_empty() {
        return leaders;
    }
    leaders.insert(0);
    for (i, instruction) in body.iter().enumerate() {
        if let Some(target) = instruction.jump_target() {
            if (target as usize) < body.len() {
                leaders.insert(target as usize);
            }
        }
        if instruction.ends_block() && i + 1 < body.len() {
            leaders.insert(i + 1);
        }
    }
    leaders
}

impl GasInjector for BasicBlockGasInjector {
    fn inject(&self, decompilation: &mut Decompilation) {
        let contract = decompilation.contract_type_mut();
        for method in &mut contract.methods {
            method.body = self.instrument(&method.body);
        }
        decompilation.module_mut().metered = true;
        tracing::debug!(
            contract = %decompilation.contract_type().name,
            "gas metering injected"
        );
    }
}
