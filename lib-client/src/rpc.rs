//! External ledger capabilities
//!
//! The transport and the wallet are consumed as opaque capabilities. Every
//! method is one network round trip and one suspension point; timeouts and
//! cancellation belong to the implementation behind the trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use lib_types::{Address, BlockHeight, Gas, Nonce, TxHash};
use serde::{Deserialize, Serialize};

use crate::abi::AbiValue;
use crate::error::LedgerError;
use crate::payload::CallPayload;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

// ============================================================================
// DATA CARRIED ACROSS THE SEAM
// ============================================================================

/// Historical log query for one contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub address: Address,
    pub event: String,
    pub from_block: BlockHeight,
    /// `None` means up to the current head
    pub to_block: Option<BlockHeight>,
}

impl EventFilter {
    pub fn new(address: Address, event: impl Into<String>, from_block: BlockHeight) -> Self {
        Self {
            address,
            event: event.into(),
            from_block,
            to_block: None,
        }
    }
}

/// A decoded log entry as returned by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub transaction_hash: TxHash,
    pub block_number: BlockHeight,
    /// Transport-assigned log identifier
    pub log_id: String,
    pub address: Address,
    pub event: String,
    /// Named event fields
    pub fields: BTreeMap<String, AbiValue>,
}

impl RawEvent {
    pub fn field(&self, name: &str) -> Option<&AbiValue> {
        self.fields.get(name)
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub block_number: BlockHeight,
    pub success: bool,
}

/// A transaction ready to be signed; built fresh for every submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDescriptor {
    pub nonce: Nonce,
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
    pub gas: Gas,
    /// Method name, carried for logs and error messages
    pub method: String,
}

/// Sender and optional gas limit for a mutating operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    pub from: Address,
    /// Skip estimation and use this limit as-is
    pub gas_limit: Option<Gas>,
}

impl TxOptions {
    pub fn new(from: Address) -> Self {
        Self {
            from,
            gas_limit: None,
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: Gas) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Read-side ledger access
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Execute a read-only call and return its positional outputs
    async fn call(&self, payload: &CallPayload) -> LedgerResult<Vec<AbiValue>>;

    /// Dry-run `payload` as `from` and return the gas it would consume
    async fn estimate_gas(&self, from: Address, payload: &CallPayload) -> LedgerResult<Gas>;

    /// Next nonce for `account`, counting submitted but unconfirmed transactions
    async fn pending_nonce(&self, account: Address) -> LedgerResult<Nonce>;

    /// Logs matching `filter`, in ascending block order
    async fn past_events(&self, filter: &EventFilter) -> LedgerResult<Vec<RawEvent>>;

    /// Receipt of a mined transaction, `None` while it is still pending
    async fn transaction_receipt(&self, hash: TxHash) -> LedgerResult<Option<TxReceipt>>;

    /// Current head
    async fn block_number(&self) -> LedgerResult<BlockHeight>;
}

/// Signing and broadcast
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn sign_and_send(&self, tx: &TransactionDescriptor) -> LedgerResult<TxHash>;
}
