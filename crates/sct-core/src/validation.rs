//! Module validators: structural format rules and determinism rules
//!
//! Validators run on a decompiled module before it is instrumented and
//! deployed. They accumulate every finding rather than stopping at the
//! first one, so a rejected deployment reports the complete picture.
//!
//! # Rule sets
//!
//! 1. **Format**: the contract type derives from `SmartContract`, is the
//!    only contract type, has uniquely named methods, and every method body
//!    is well formed (argument indices, jump targets, no metering opcodes).
//! 2. **Determinism**: no wall clock, randomness, threads, I/O,
//!    reflection or floating point.

use std::collections::BTreeSet;

use crate::module::{Decompilation, Instruction, MethodDefinition, SMART_CONTRACT_BASE_TYPE};

// ── Validation Result Types ───────────────────────────────

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationError {
    /// Rule that produced the finding
    pub rule: String,
    /// Where in the module, e.g. `Token::Transfer@4`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "[{}] at {}: {}", self.rule, location, self.message),
            None => write!(f, "[{}]: {}", self.rule, self.message),
        }
    }
}

/// Result of running one validator: accumulates all findings
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn add(&mut self, rule: &str, location: Option<String>, message: String) {
        self.errors.push(ValidationError {
            rule: rule.to_string(),
            location,
            message,
        });
    }
}

/// A rule set checked against a decompiled module
pub trait ModuleValidator {
    fn validate(&self, decompilation: &Decompilation) -> ValidationResult;
}

fn location(type_name: &str, method: &MethodDefinition, index: Option<usize>) -> Option<String> {
    Some(match index {
        Some(i) => format!("{}::{}@{}", type_name, method.name, i),
        None => format!("{}::{}", type_name, method.name),
    })
}

// ── Format Validator ─────────────────────────────────────

/// Structural rules on module shape and method bodies
#[derive(Debug, Clone, Default)]
pub struct FormatValidator;

impl ModuleValidator for FormatValidator {
    fn validate(&self, decompilation: &Decompilation) -> ValidationResult {
        let mut result = ValidationResult::new();
        let module = decompilation.module();
        let contract = decompilation.contract_type();

        if module.metered {
            result.add(
                "metering",
                None,
                "module is already metered; submit uninstrumented code".into(),
            );
        }

        if decompilation.base_type() != Some(SMART_CONTRACT_BASE_TYPE) {
            result.add(
                "base-type",
                Some(contract.name.clone()),
                format!(
                    "contract type must derive from '{}', found {}",
                    SMART_CONTRACT_BASE_TYPE,
                    decompilation
                        .base_type()
                        .map(|b| format!("'{}'", b))
                        .unwrap_or_else(|| "no base type".into())
                ),
            );
        }

        for other in module.types.iter().filter(|t| t.name != contract.name) {
            if other.base_type.as_deref() == Some(SMART_CONTRACT_BASE_TYPE) {
                result.add(
                    "single-contract",
                    Some(other.name.clone()),
                    "a module may declare only one contract type".into(),
                );
            }
        }

        let mut type_names = BTreeSet::new();
        for ty in &module.types {
            if !type_names.insert(ty.name.as_str()) {
                result.add(
                    "unique-type",
                    Some(ty.name.clone()),
                    "type declared more than once".into(),
                );
            }
        }

        let mut method_names = BTreeSet::new();
        for method in &contract.methods {
            if method.name.trim().is_empty() {
                result.add(
                    "method-name",
                    Some(contract.name.clone()),
                    "method name must not be empty".into(),
                );
            } else if !method_names.insert(method.name.as_str()) {
                result.add(
                    "unique-method",
                    location(&contract.name, method, None),
                    "method declared more than once".into(),
                );
            }
            check_method_body(&contract.name, method, &mut result);
        }

        result
    }
}

fn check_method_body(type_name: &str, method: &MethodDefinition, result: &mut ValidationResult) {
    let len = method.body.len();
    for (i, instruction) in method.body.iter().enumerate() {
        match instruction {
            Instruction::Arg(n) if *n >= method.arity => {
                result.add(
                    "argument-index",
                    location(type_name, method, Some(i)),
                    format!("argument {} out of range for arity {}", n, method.arity),
                );
            }
            Instruction::Jump(t) | Instruction::JumpIf(t) if *t as usize >= len => {
                result.add(
                    "jump-target",
                    location(type_name, method, Some(i)),
                    format!("jump target {} outside method of {} instructions", t, len),
                );
            }
            Instruction::ChargeGas(_) => {
                result.add(
                    "metering",
                    location(type_name, method, Some(i)),
                    "gas instructions are reserved for the metering pass".into(),
                );
            }
            Instruction::Load(key) | Instruction::Store(key) if key.is_empty() => {
                result.add(
                    "storage-key",
                    location(type_name, method, Some(i)),
                    "storage key must not be empty".into(),
                );
            }
            Instruction::Call { method: callee, .. } if callee.is_empty() => {
                result.add(
                    "call-target",
                    location(type_name, method, Some(i)),
                    "called method name must not be empty".into(),
                );
            }
            _ => {}
        }
    }
}

// ── Determinism Validator ─────────────────────────────────

/// Rejects instructions whose outcome may differ between nodes
#[derive(Debug, Clone, Default)]
pub struct DeterminismValidator;

impl ModuleValidator for DeterminismValidator {
    fn validate(&self, decompilation: &Decompilation) -> ValidationResult {
        let mut result = ValidationResult::new();
        for ty in &decompilation.module().types {
            for method in &ty.methods {
                for (i, instruction) in method.body.iter().enumerate() {
                    let finding = match instruction {
                        Instruction::Host(call) => Some(format!("host call {:?} is non-deterministic", call)),
                        Instruction::Float(op) => Some(format!("floating point operation {:?}", op)),
                        _ => None,
                    };
                    if let Some(message) = finding {
                        result.add("determinism", location(&ty.name, method, Some(i)), message);
                    }
                }
            }
        }
        result
    }
}
