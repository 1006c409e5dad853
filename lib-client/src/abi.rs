//! Contract call value encoding
//!
//! `AbiValue` and `ParamKind` are the client's view of contract arguments.
//! Encoding is delegated to `alloy-dyn-abi`: values are lowered onto
//! `DynSolValue` and encoded as a parameter tuple behind the 4-byte Keccak
//! selector of the canonical signature.
//!
//! ```text
//! +----------+----------------------+----------------------+
//! | selector | heads (1 word / arg) | tails (dynamic args) |
//! +----------+----------------------+----------------------+
//! | 4B       | 32B * n              | variable             |
//! +----------+----------------------+----------------------+
//! ```
//!
//! Return values are decoded by the transport and arrive as positional
//! `AbiValue`s.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{FixedBytes, I256, U256};
use lib_types::Address;
use std::fmt;

const WORD: usize = 32;

/// Keccak-256 digest
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    alloy_primitives::keccak256(data).0
}

/// Client address as an alloy address
pub fn to_alloy_address(address: &Address) -> alloy_primitives::Address {
    alloy_primitives::Address::from_slice(address.as_bytes())
}

/// Alloy address as a client address
pub fn from_alloy_address(address: &alloy_primitives::Address) -> Address {
    let mut out = [0u8; 20];
    out.copy_from_slice(address.as_slice());
    Address::new(out)
}

// ============================================================================
// KINDS AND VALUES
// ============================================================================

/// Declared type of a contract method parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Address,
    Uint,
    Int,
    Bool,
    /// `bytesN` with 1 <= N <= 32
    FixedBytes(usize),
    Bytes,
    String,
    /// Dynamic-length `T[]`
    Array(Box<ParamKind>),
}

impl ParamKind {
    /// Canonical type name used in signatures
    pub fn type_name(&self) -> String {
        match self {
            ParamKind::Address => "address".to_string(),
            ParamKind::Uint => "uint256".to_string(),
            ParamKind::Int => "int256".to_string(),
            ParamKind::Bool => "bool".to_string(),
            ParamKind::FixedBytes(n) => format!("bytes{}", n),
            ParamKind::Bytes => "bytes".to_string(),
            ParamKind::String => "string".to_string(),
            ParamKind::Array(inner) => format!("{}[]", inner.type_name()),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

/// A single argument or return value
///
/// `Uint`/`Int` are limited to 128 bits; every amount the hotel contracts
/// carry fits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(u128),
    Int(i128),
    Bool(bool),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
}

impl AbiValue {
    /// Check this value against a declared parameter kind
    pub fn matches(&self, kind: &ParamKind) -> bool {
        match (self, kind) {
            (AbiValue::Address(_), ParamKind::Address)
            | (AbiValue::Uint(_), ParamKind::Uint)
            | (AbiValue::Int(_), ParamKind::Int)
            | (AbiValue::Bool(_), ParamKind::Bool)
            | (AbiValue::Bytes(_), ParamKind::Bytes)
            | (AbiValue::String(_), ParamKind::String) => true,
            (AbiValue::FixedBytes(bytes), ParamKind::FixedBytes(n)) => bytes.len() == *n && *n <= WORD,
            (AbiValue::Array(items), ParamKind::Array(inner)) => items.iter().all(|v| v.matches(inner)),
            _ => false,
        }
    }

    /// Lower onto the dynamic Solidity value used for encoding
    pub fn to_sol_value(&self) -> DynSolValue {
        match self {
            AbiValue::Address(addr) => DynSolValue::Address(to_alloy_address(addr)),
            AbiValue::Uint(v) => DynSolValue::Uint(U256::from(*v), 256),
            AbiValue::Int(v) => {
                let magnitude = I256::from_raw(U256::from(v.unsigned_abs()));
                DynSolValue::Int(if *v < 0 { -magnitude } else { magnitude }, 256)
            }
            AbiValue::Bool(b) => DynSolValue::Bool(*b),
            AbiValue::FixedBytes(bytes) => {
                let len = bytes.len().min(WORD);
                DynSolValue::FixedBytes(FixedBytes::<32>::right_padding_from(&bytes[..len]), len)
            }
            AbiValue::Bytes(bytes) => DynSolValue::Bytes(bytes.clone()),
            AbiValue::String(s) => DynSolValue::String(s.clone()),
            AbiValue::Array(items) => DynSolValue::Array(items.iter().map(AbiValue::to_sol_value).collect()),
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            AbiValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            AbiValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fixed_bytes(&self) -> Option<&[u8]> {
        match self {
            AbiValue::FixedBytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[AbiValue]> {
        match self {
            AbiValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

// ============================================================================
// SIGNATURES
// ============================================================================

/// Canonical signature, e.g. `editAddress(string,string,string,bytes2)`
pub fn signature(method: &str, params: &[ParamKind]) -> String {
    let types: Vec<String> = params.iter().map(ParamKind::type_name).collect();
    format!("{}({})", method, types.join(","))
}

/// First 4 bytes of the Keccak-256 of the canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

// ============================================================================
// ENCODING
// ============================================================================

/// Encode a full call: selector followed by the encoded arguments
pub fn encode_call(signature: &str, args: &[AbiValue]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend(encode_arguments(args));
    out
}

/// Encode an argument list as a parameter tuple
pub fn encode_arguments(args: &[AbiValue]) -> Vec<u8> {
    DynSolValue::Tuple(args.iter().map(AbiValue::to_sol_value).collect()).abi_encode_params()
}
