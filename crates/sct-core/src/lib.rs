//! SCT Core - Smart contract transaction execution over a UTXO ledger
//!
//! Executes contract-creating and contract-calling transactions against a
//! layered, rollback-capable state repository and reconciles the value
//! contracts move with the unspent-output ledger.
//!
//! # Architecture
//!
//! ```text
//! ExecutionCarrier → TransactionDispatcher → Decompiler → Validators → GasInjector
//!                              ↓
//!                       VirtualMachine(ExecutionContext, TrackedView)
//!                              ↓
//!                       ExecutionResult → commit / rollback
//!                              ↓
//!                       CondensingTransactionBuilder → internal transactions
//! ```
//!
//! # Guarantees
//!
//! - **Deterministic**: same carrier, block and state always give the same result
//! - **Atomic**: a transaction either commits all of its writes or none
//! - **Bounded**: every run terminates within its gas limit
//! - **Balanced**: condensing transactions never pay out more than they spend

/// Version of this crate, as built
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod block;
pub mod carrier;
pub mod condensing;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod gas;
pub mod module;
pub mod result;
pub mod state;
pub mod types;
pub mod validation;
pub mod vm;

pub use block::{BlockExecutor, BlockOutcome, TransactionReceipt};
pub use carrier::{ExecutionCarrier, OpcodeType};
pub use condensing::{CondensingOutput, CondensingTransaction, CondensingTransactionBuilder};
pub use config::{ExecutorConfig, GasSchedule, SandboxLimits};
pub use context::{BlockContext, ExecutionContext, ExecutionContextBuilder};
pub use dispatcher::TransactionDispatcher;
pub use error::{Error, ErrorKind, Result};
pub use result::{ContractRejection, ExecutionResult};
pub use types::{Address, Hash256, StoredVin, TransferInfo, Value};
