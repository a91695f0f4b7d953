//! Contract module format and the decompiler that reads it
//!
//! A module is the structural representation of deployable contract code:
//! one or more types, each with methods made of explicit instructions, and
//! a manifest naming the contract type and its optional initializer.
//!
//! # Byte format
//!
//! ```text
//! "SCTM" ‖ JSON(ModuleDefinition)
//! ```
//!
//! The JSON body is produced by serde from structs and vectors only, so
//! encoding the same module always yields the same bytes.

use crate::config::GasSchedule;
use crate::types::Value;
use crate::{Error, Result};

/// Magic prefix of encoded modules
pub const MODULE_MAGIC: &[u8; 4] = b"SCTM";

/// Base type every contract type must derive from
pub const SMART_CONTRACT_BASE_TYPE: &str = "SmartContract";

/// Host services a deterministic contract is never allowed to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HostCall {
    WallClock,
    Random,
    SpawnThread,
    FileRead,
    NetworkRequest,
    Reflect,
}

/// Floating point operations, rejected by the determinism validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
    FromInt,
}

/// One interpreter instruction
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Instruction {
    // stack
    Push(Value),
    Pop,
    Dup,
    Swap,
    /// Push the n-th method parameter
    Arg(u8),

    // checked integer arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    // comparison and logic
    Eq,
    Lt,
    Gt,
    Not,

    // control flow, absolute instruction indices
    Jump(u32),
    JumpIf(u32),

    // contract storage
    Load(String),
    Store(String),

    // environment
    Caller,
    CallValue,
    SelfAddress,
    Balance,
    BlockNumber,
    Difficulty,
    Coinbase,

    /// Pops amount then recipient address
    Transfer,
    /// Pops `args` parameters then the callee address;
    /// pushes the return value and a success flag
    Call { method: String, args: u8 },
    Return,
    Revert,

    /// Inserted by the gas injector, never accepted from submitters
    ChargeGas(u64),

    Host(HostCall),
    Float(FloatOp),
}

impl Instruction {
    /// Static gas cost of the instruction under a schedule
    pub fn cost(&self, schedule: &GasSchedule) -> u64 {
        match self {
            Instruction::ChargeGas(_) => 0,
            Instruction::Load(_) => schedule.storage_read,
            Instruction::Store(_) => schedule.storage_write,
            Instruction::Transfer => schedule.transfer,
            Instruction::Call { .. } => schedule.call,
            _ => schedule.step,
        }
    }

    /// Jump target, if this instruction branches
    pub fn jump_target(&self) -> Option<u32> {
        match self {
            Instruction::Jump(t) | Instruction::JumpIf(t) => Some(*t),
            _ => None,
        }
    }

    /// Whether control may not fall through to the next instruction unchanged
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            Instruction::Jump(_)
                | Instruction::JumpIf(_)
                | Instruction::Return
                | Instruction::Revert
                | Instruction::Call { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MethodDefinition {
    pub name: String,
    /// Number of parameters the method takes
    pub arity: u8,
    pub body: Vec<Instruction>,
}

impl MethodDefinition {
    pub fn new(name: impl Into<String>, arity: u8, body: Vec<Instruction>) -> Self {
        MethodDefinition {
            name: name.into(),
            arity,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    pub methods: Vec<MethodDefinition>,
}

impl TypeDefinition {
    pub fn method(&self, name: &str) -> Option<&MethodDefinition> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Table of entry points emitted alongside the compiled module
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    /// Name of the type deployed as the contract
    pub contract_type: String,
    /// Method run once on deployment, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModuleDefinition {
    pub name: String,
    pub types: Vec<TypeDefinition>,
    pub manifest: Manifest,
    /// Set once gas accounting has been injected
    #[serde(default)]
    pub metered: bool,
}

impl ModuleDefinition {
    /// Single-type module deriving from `SmartContract`
    pub fn contract(
        name: impl Into<String>,
        methods: Vec<MethodDefinition>,
        initializer: Option<&str>,
    ) -> Self {
        let name = name.into();
        ModuleDefinition {
            types: vec![TypeDefinition {
                name: name.clone(),
                base_type: Some(SMART_CONTRACT_BASE_TYPE.to_string()),
                methods,
            }],
            manifest: Manifest {
                contract_type: name.clone(),
                initializer: initializer.map(str::to_string),
            },
            name,
            metered: false,
        }
    }

    pub fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Serialize to the module byte format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = MODULE_MAGIC.to_vec();
        serde_json::to_writer(&mut bytes, self)?;
        Ok(bytes)
    }

    /// Parse the module byte format without structural checks
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let body = bytes
            .strip_prefix(MODULE_MAGIC.as_slice())
            .ok_or_else(|| Error::MalformedModule("missing module magic".into()))?;
        serde_json::from_slice(body)
            .map_err(|e| Error::MalformedModule(format!("undecodable module body: {}", e)))
    }
}

/// A decoded module with its contract type resolved through the manifest
#[derive(Debug, Clone, PartialEq)]
pub struct Decompilation {
    module: ModuleDefinition,
    contract_type_index: usize,
}

impl Decompilation {
    pub fn module(&self) -> &ModuleDefinition {
        &self.module
    }

    /// Mutable access for instrumentation passes
    pub fn module_mut(&mut self) -> &mut ModuleDefinition {
        &mut self.module
    }

    pub fn contract_type(&self) -> &TypeDefinition {
        &self.module.types[self.contract_type_index]
    }

    pub fn contract_type_mut(&mut self) -> &mut TypeDefinition {
        &mut self.module.types[self.contract_type_index]
    }

    pub fn base_type(&self) -> Option<&str> {
        self.contract_type().base_type.as_deref()
    }

    /// The initializer named by the manifest, resolved by table lookup
    pub fn initializer(&self) -> Option<&MethodDefinition> {
        let name = self.module.manifest.initializer.as_deref()?;
        self.contract_type().method(name)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.module.to_bytes()
    }

    pub fn into_module(self) -> ModuleDefinition {
        self.module
    }
}

/// Turns code bytes into a structural module representation
pub trait Decompiler {
    fn module_definition(&self, code: &[u8]) -> Result<Decompilation>;
}

/// Decoder for the `SCTM` module format
#[derive(Debug, Clone)]
pub struct ModuleDecompiler {
    max_code_size_bytes: usize,
}

impl ModuleDecompiler {
    pub fn new(max_code_size_bytes: usize) -> Self {
        ModuleDecompiler {
            max_code_size_bytes,
        }
    }
}

impl Default for ModuleDecompiler {
    fn default() -> Self {
        Self::new(crate::config::SandboxLimits::default().max_code_size_bytes)
    }
}

impl Decompiler for ModuleDecompiler {
    fn module_definition(&self, code: &[u8]) -> Result<Decompilation> {
        if code.len() > self.max_code_size_bytes {
            return Err(Error::MalformedModule(format!(
                "code size {} bytes exceeds limit of {} bytes",
                code.len(),
                self.max_code_size_bytes
            )));
        }
        let module = ModuleDefinition::from_bytes(code)?;
        decompile(module)
    }
}

/// Resolve the manifest of an already decoded module
pub fn decompile(module: ModuleDefinition) -> Result<Decompilation> {
    let contract_type_index = module
        .types
        .iter()
        .position(|t| t.name == module.manifest.contract_type)
        .ok_or_else(|| {
            Error::MalformedModule(format!(
                "manifest names contract type '{}' which the module does not define",
                module.manifest.contract_type
            ))
        })?;
    let decompilation = Decompilation {
        module,
        contract_type_index,
    };
    if let Some(name) = decompilation.module.manifest.initializer.as_deref() {
        if decompilation.contract_type().method(name).is_none() {
            return Err(Error::MalformedModule(format!(
                "manifest initializer '{}' is not a method of '{}'",
                name,
                decompilation.contract_type().name
            )));
        }
    }
    Ok(decompilation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_module() -> ModuleDefinition {
        ModuleDefinition::contract(
            "Counter",
            vec![
                MethodDefinition::new(
                    "Init",
                    0,
                    vec![
                        Instruction::Push(Value::Int(0)),
                        Instruction::Store("count".into()),
                        Instruction::Return,
                    ],
                ),
                MethodDefinition::new(
                    "Get",
                    0,
                    vec![Instruction::Load("count".into()), Instruction::Return],
                ),
            ],
            Some("Init"),
        )
    }

    #[test]
    fn test_module_bytes_roundtrip() {
        let module = counter_module();
        let bytes = module.to_bytes().unwrap();
        assert!(bytes.starts_with(MODULE_MAGIC));
        assert_eq!(ModuleDefinition::from_bytes(&bytes).unwrap(), module);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let first = counter_module().to_bytes().unwrap();
        for i in 0..100 {
            assert_eq!(
                counter_module().to_bytes().unwrap(),
                first,
                "Non-determinism at iteration {}",
                i
            );
        }
    }

    #[test]
    fn test_decompile_resolves_contract_type() {
        let bytes = counter_module().to_bytes().unwrap();
        let decomp = ModuleDecompiler::default().module_definition(&bytes).unwrap();
        assert_eq!(decomp.contract_type().name, "Counter");
        assert_eq!(decomp.base_type(), Some(SMART_CONTRACT_BASE_TYPE));
        assert_eq!(decomp.initializer().map(|m| m.name.as_str()), Some("Init"));
    }

    #[test]
    fn test_decompile_without_initializer() {
        let mut module = counter_module();
        module.manifest.initializer = None;
        let decomp = decompile(module).unwrap();
        assert!(decomp.initializer().is_none());
    }

    #[test]
    fn test_decompile_bad_magic() {
        let err = ModuleDecompiler::default()
            .module_definition(b"nope")
            .unwrap_err();
        assert!(matches!(err, Error::MalformedModule(_)));
    }

    #[test]
    fn test_decompile_garbage_body() {
        let mut bytes = MODULE_MAGIC.to_vec();
        bytes.extend_from_slice(b"{\"name\":");
        let err = ModuleDecompiler::default()
            .module_definition(&bytes)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedModule(_)));
    }

    #[test]
    fn test_decompile_missing_contract_type() {
        let mut module = counter_module();
        module.manifest.contract_type = "Ghost".into();
        assert!(matches!(decompile(module), Err(Error::MalformedModule(_))));
    }

    #[test]
    fn test_decompile_missing_initializer_method() {
        let mut module = counter_module();
        module.manifest.initializer = Some("Setup".into());
        assert!(matches!(decompile(module), Err(Error::MalformedModule(_))));
    }

    #[test]
    fn test_decompile_oversized_code() {
        let bytes = counter_module().to_bytes().unwrap();
        let err = ModuleDecompiler::new(8).module_definition(&bytes).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn test_instruction_costs() {
        let schedule = GasSchedule::default();
        assert_eq!(Instruction::Add.cost(&schedule), schedule.step);
        assert_eq!(Instruction::Store("k".into()).cost(&schedule), schedule.storage_write);
        assert_eq!(Instruction::ChargeGas(5).cost(&schedule), 0);
    }
}
