//! Executor configuration: gas schedule and sandbox limits
//!
//! Every field has a default so a partial JSON document is accepted.
//! Nothing here may depend on the host: two nodes with the same config
//! must meter and bound execution identically.

use std::path::Path;

use crate::{Error, Result};

/// Static cost of each instruction class, in gas units
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    /// Charged once per execution before any instruction runs
    pub base: u64,
    /// Stack, arithmetic and control-flow instructions
    pub step: u64,
    /// Reading one storage slot
    pub storage_read: u64,
    /// Writing one storage slot
    pub storage_write: u64,
    /// Recording a value transfer
    pub transfer: u64,
    /// Invoking another contract
    pub call: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        GasSchedule {
            base: 1_000,
            step: 1,
            storage_read: 20,
            storage_write: 100,
            transfer: 50,
            call: 200,
        }
    }
}

/// Hard bounds on a single execution, independent of gas
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    /// Maximum depth of nested contract calls
    pub max_call_depth: usize,
    /// Maximum operand stack height
    pub max_stack_depth: usize,
    /// Maximum size of submitted or stored contract code
    pub max_code_size_bytes: usize,
    /// Maximum size of a single stored value
    pub max_storage_value_bytes: usize,
    /// Maximum bytes held on operand stacks across all live activations
    pub max_memory_bytes: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        SandboxLimits {
            max_call_depth: 8,
            max_stack_depth: 1_024,
            max_code_size_bytes: 256 * 1024,
            max_storage_value_bytes: 16 * 1024,
            max_memory_bytes: 1_048_576,
        }
    }
}

/// Complete configuration of a `TransactionDispatcher`
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub gas: GasSchedule,
    pub limits: SandboxLimits,
}

impl ExecutorConfig {
    /// Parse a JSON configuration document and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ExecutorConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Reject configurations that would break metering or termination
    pub fn validate(&self) -> Result<()> {
        let gas = &self.gas;
        let costs = [
            ("base", gas.base),
            ("step", gas.step),
            ("storage_read", gas.storage_read),
            ("storage_write", gas.storage_write),
            ("transfer", gas.transfer),
            ("call", gas.call),
        ];
        // Every basic block must cost at least one unit or loops could run for free.
        for (name, cost) in costs {
            if cost == 0 {
                return Err(Error::Config(format!("gas cost '{}' must be > 0", name)));
            }
        }
        if self.limits.max_call_depth == 0 {
            return Err(Error::Config("max_call_depth must be > 0".into()));
        }
        if self.limits.max_stack_depth == 0 {
            return Err(Error::Config("max_stack_depth must be > 0".into()));
        }
        if self.limits.max_code_size_bytes == 0 {
            return Err(Error::Config("max_code_size_bytes must be > 0".into()));
        }
        if self.limits.max_memory_bytes < self.limits.max_storage_value_bytes {
            return Err(Error::Config(
                "max_memory_bytes must be at least max_storage_value_bytes".into(),
            ));
        }
        Ok(())
    }
}
