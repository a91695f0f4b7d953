//! Error types for the execution core
//!
//! All fallible operations return `Result<T, Error>`.
//!
//! Contract-level failures (a revert, a rejected module) are *not* errors:
//! they are carried as data inside [`ExecutionResult`](crate::ExecutionResult).
//! The variants below abort a single transaction and leave the base state
//! exactly as it was before the transaction started.

use crate::types::Address;

/// Category of a failed or unsuccessful transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Carrier fields violate the create/call shape rules
    MalformedCarrier,
    /// Contract code cannot be decoded into a module
    MalformedModule,
    /// Format or determinism validation failed on create
    InvalidContractRejected,
    /// Call target has no deployed code
    NoCodeAtAddress,
    /// Contract logic reverted or ran out of gas
    Revert,
    /// Upstream invariant broken or the base repository failed
    InternalConsistency,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ErrorKind::MalformedCarrier => "malformed carrier",
            ErrorKind::MalformedModule => "malformed module",
            ErrorKind::InvalidContractRejected => "invalid contract rejected",
            ErrorKind::NoCodeAtAddress => "no code at address",
            ErrorKind::Revert => "revert",
            ErrorKind::InternalConsistency => "internal consistency",
        };
        f.write_str(name)
    }
}

/// Hard errors of the execution core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The carrier does not describe a well-formed create or call
    #[error("Invalid carrier: {0}")]
    InvalidCarrier(String),

    /// Code bytes could not be decoded into a module definition
    #[error("Malformed module: {0}")]
    MalformedModule(String),

    /// Call target has no code
    #[error("No code at address {0}")]
    NoCodeAtAddress(Address),

    /// A freshly derived contract address is already occupied
    #[error("Address collision: contract already deployed at {0}")]
    AddressCollision(Address),

    /// Condensing transaction imbalance or similar broken invariant
    #[error("Internal consistency violation: {0}")]
    InternalConsistency(String),

    /// The base repository failed to read or apply changes
    #[error("State store failure: {0}")]
    Storage(String),

    /// Executor configuration is unusable
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization failure of a core data structure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Map the error into the transaction error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidCarrier(_) => ErrorKind::MalformedCarrier,
            Error::MalformedModule(_) => ErrorKind::MalformedModule,
            Error::NoCodeAtAddress(_) => ErrorKind::NoCodeAtAddress,
            Error::AddressCollision(_)
            | Error::InternalConsistency(_)
            | Error::Storage(_)
            | Error::Config(_)
            | Error::Serialization(_) => ErrorKind::InternalConsistency,
        }
    }
}

/// Result type alias for execution core operations
pub type Result<T> = std::result::Result<T, Error>;
