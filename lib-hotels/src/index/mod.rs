//! Hotel index providers
//!
//! `IndexDataProvider` is the bookkeeping façade over every hotel reachable
//! from one index: registration, lookup, merge-update, manager-checked
//! removal, enumeration and transaction status polling.
//!
//! - [`InMemoryIndex`]: reference implementation over a JSON-shaped map
//! - [`LedgerIndex`]: the same operations against the index contract

mod ledger;
mod memory;

pub use ledger::LedgerIndex;
pub use memory::InMemoryIndex;

use std::collections::BTreeMap;

use async_trait::async_trait;
use lib_client::Result;
use lib_types::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cached data of one hotel
///
/// `address` and `manager` are the fields the index itself relies on; any
/// other descriptive data rides along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotelRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl HotelRecord {
    pub fn new(manager: Address, url: impl Into<String>) -> Self {
        Self {
            manager: Some(manager),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Overlay the fields `other` carries onto this record
    pub fn merge(&mut self, other: &HotelRecord) {
        if other.address.is_some() {
            self.address = other.address;
        }
        if other.manager.is_some() {
            self.manager = other.manager;
        }
        if other.url.is_some() {
            self.url = other.url.clone();
        }
        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Result of registering a hotel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddHotelResponse {
    pub address: Address,
    pub transaction_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Status of one transaction reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxResult {
    pub status: TxStatus,
    /// Blocks mined on top of the transaction's block
    pub block_age: u64,
}

/// Summary over a batch of transaction references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxStatusMeta {
    pub total: usize,
    pub processed: usize,
    pub min_block_age: u64,
    pub max_block_age: u64,
    /// Every reference was processed and none failed
    pub all_passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionsStatus {
    pub meta: TxStatusMeta,
    /// Only processed references appear here
    pub results: BTreeMap<String, TxResult>,
}

impl TransactionsStatus {
    /// Build the summary from the processed references, in input order
    ///
    /// A reference given twice counts twice towards `processed`.
    pub fn summarize(total: usize, processed: Vec<(String, TxResult)>) -> Self {
        let ages = processed.iter().map(|(_, r)| r.block_age);
        let min_block_age = ages.clone().min().unwrap_or(0);
        let max_block_age = ages.max().unwrap_or(0);
        let all_passed = processed.len() == total
            && processed.iter().all(|(_, r)| r.status == TxStatus::Confirmed);
        let count = processed.len();
        let results: BTreeMap<String, TxResult> = processed.into_iter().collect();
        Self {
            meta: TxStatusMeta {
                total,
                processed: count,
                min_block_age,
                max_block_age,
                all_passed,
            },
            results,
        }
    }
}

/// Bookkeeping over the hotels of one index
#[async_trait]
pub trait IndexDataProvider: Send + Sync {
    /// Register a hotel; a record without a manager is rejected with
    /// `Validation` and leaves the index unchanged
    async fn add(&self, record: HotelRecord) -> Result<AddHotelResponse>;

    /// `NotFound` if no hotel is registered at `address`
    async fn get(&self, address: Address) -> Result<HotelRecord>;

    /// Merge `record` into the hotel registered at `record.address`
    async fn update(&self, record: &HotelRecord) -> Result<Vec<String>>;

    /// Remove the hotel at `record.address` if `record.manager` matches
    /// the registered manager, `Authorization` otherwise
    async fn remove(&self, record: &HotelRecord) -> Result<Vec<String>>;

    /// Every registered hotel, in no particular order
    async fn list_all(&self) -> Result<Vec<HotelRecord>>;

    async fn get_transactions_status(&self, references: &[String]) -> Result<TransactionsStatus>;
}
