//! Primitive ledger types shared by every module
//!
//! Addresses and hashes are fixed-width byte arrays rendered as lowercase
//! hex. All collections keyed by them use `BTreeMap` so iteration order is
//! identical on every node.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! fixed_bytes {
    ($name:ident, $len:expr, $what:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Width in bytes
            pub const LEN: usize = $len;

            pub const fn zero() -> Self {
                $name([0u8; $len])
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Build from a slice of exactly `LEN` bytes
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let array: [u8; $len] = bytes.try_into().ok()?;
                Some($name(array))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let trimmed = s.trim();
                let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
                let bytes = hex::decode(digits)
                    .map_err(|e| format!("invalid {} '{}': {}", $what, s, e))?;
                $name::from_slice(&bytes).ok_or_else(|| {
                    format!(
                        "invalid {} '{}': expected {} bytes, found {}",
                        $what,
                        s,
                        $len,
                        bytes.len()
                    )
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(Address, 20, "address");
fixed_bytes!(Hash256, 32, "hash");

/// Serde adapter for byte blobs as hex strings
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for optional byte blobs as hex strings
pub mod opt_hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| {
            let digits = s.strip_prefix("0x").unwrap_or(&s).to_string();
            hex::decode(digits).map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

/// An unspent output owned by a contract, usable as a future input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVin {
    /// Transaction that created the output
    pub hash: Hash256,
    /// Output index within that transaction
    pub nvout: u32,
    /// Output value
    pub value: u64,
}

/// A value movement recorded while a contract ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInfo {
    pub from: Address,
    pub to: Address,
    pub value: u64,
}

/// A runtime value passed to, returned from, or stored by a contract.
///
/// There is deliberately no floating point variant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Address(Address),
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
    Str(String),
}

impl Value {
    /// Check if value is "truthy" for conditional jumps
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Address(a) => *a != Address::zero(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Address(_) => "Address",
            Value::Bytes(_) => "Bytes",
            Value::Str(_) => "Str",
        }
    }

    /// Approximate size in bytes, used for stack and storage accounting
    pub fn size_bytes(&self) -> usize {
        match self {
            Value::Null | Value::Bool(_) => 1,
            Value::Int(_) => 8,
            Value::Address(_) => Address::LEN,
            Value::Bytes(b) => b.len(),
            Value::Str(s) => s.len(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Address(a) => write!(f, "{}", a),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Value::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}
