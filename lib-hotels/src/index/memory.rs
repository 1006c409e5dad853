//! In-memory index
//!
//! Reference provider over a JSON-shaped document:
//!
//! ```json
//! { "index": { "hotels": { "<address>": { "manager": "0x..", "url": ".." } } } }
//! ```
//!
//! Missing sections default to empty. Transaction references are synthetic
//! (`tx-add-<address>`, `tx-update-<address>`, `tx-remove-<address>`) and
//! are reported confirmed immediately.

use std::collections::BTreeMap;

use async_trait::async_trait;
use lib_client::{ClientError, Result};
use lib_types::Address;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{AddHotelResponse, HotelRecord, IndexDataProvider, TransactionsStatus, TxResult, TxStatus};

const TX_PREFIXES: [&str; 3] = ["tx-add-", "tx-update-", "tx-remove-"];

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    index: IndexSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexSection {
    #[serde(default)]
    hotels: BTreeMap<Address, HotelRecord>,
}

struct MemoryState {
    hotels: BTreeMap<Address, HotelRecord>,
    next_id: u64,
}

/// Index kept entirely in memory
pub struct InMemoryIndex {
    state: Mutex<MemoryState>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::with_hotels(BTreeMap::new())
    }

    /// Seed from a JSON document
    pub fn from_json(source: &str) -> Result<Self> {
        let document: Document = serde_json::from_str(source)
            .map_err(|e| ClientError::decode(format!("invalid index document: {}", e)))?;
        Ok(Self::with_hotels(document.index.hotels))
    }

    fn with_hotels(mut hotels: BTreeMap<Address, HotelRecord>) -> Self {
        for (address, record) in hotels.iter_mut() {
            record.address = Some(*address);
        }
        let next_id = hotels.len() as u64;
        Self {
            state: Mutex::new(MemoryState { hotels, next_id }),
        }
    }

    /// Snapshot in the seed document shape
    pub async fn to_json(&self) -> Result<String> {
        let state = self.state.lock().await;
        let document = Document {
            index: IndexSection {
                hotels: state.hotels.clone(),
            },
        };
        serde_json::to_string_pretty(&document)
            .map_err(|e| ClientError::decode(format!("cannot serialize index: {}", e)))
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.hotels.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexDataProvider for InMemoryIndex {
    async fn add(&self, mut record: HotelRecord) -> Result<AddHotelResponse> {
        if record.manager.is_none() {
            return Err(ClientError::validation("cannot add hotel without manager"));
        }
        let mut state = self.state.lock().await;

        // ids are monotonic; skip any seeded address they would collide with
        let address = loop {
            state.next_id += 1;
            let candidate = Address::from_low_u64(state.next_id);
            if !state.hotels.contains_key(&candidate) {
                break candidate;
            }
        };

        record.address = Some(address);
        state.hotels.insert(address, record);
        debug!("Added hotel {} ({} total)", address, state.hotels.len());

        Ok(AddHotelResponse {
            address,
            transaction_ids: vec![format!("tx-add-{}", address)],
        })
    }

    async fn get(&self, address: Address) -> Result<HotelRecord> {
        self.state
            .lock()
            .await
            .hotels
            .get(&address)
            .cloned()
            .ok_or_else(|| ClientError::not_found(format!("cannot find hotel at {}", address)))
    }

    async fn update(&self, record: &HotelRecord) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        let stored = match record.address {
            Some(address) => state.hotels.get_mut(&address),
            None => None,
        };
        let stored = stored.ok_or_else(|| {
            ClientError::not_found(format!(
                "cannot update hotel at {}: not found",
                record.address.map_or("~unknown~".to_string(), |a| a.to_string())
            ))
        })?;

        stored.merge(record);
        let address = stored.address.unwrap_or_default();
        Ok(vec![format!("tx-update-{}", address)])
    }

    async fn remove(&self, record: &HotelRecord) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        let address = record.address.ok_or_else(|| {
            ClientError::authorization("cannot remove hotel without an address")
        })?;

        let authorized = state
            .hotels
            .get(&address)
            .map_or(false, |stored| stored.manager.is_some() && stored.manager == record.manager);
        if !authorized {
            return Err(ClientError::authorization(format!(
                "cannot remove hotel at {}: not registered to this manager",
                address
            )));
        }

        state.hotels.remove(&address);
        Ok(vec![format!("tx-remove-{}", address)])
    }

    async fn list_all(&self) -> Result<Vec<HotelRecord>> {
        Ok(self.state.lock().await.hotels.values().cloned().collect())
    }

    async fn get_transactions_status(&self, references: &[String]) -> Result<TransactionsStatus> {
        let processed: Vec<(String, TxResult)> = references
            .iter()
            .filter(|r| TX_PREFIXES.iter().any(|prefix| r.starts_with(prefix)))
            .map(|r| {
                (
                    r.clone(),
                    TxResult {
                        status: TxStatus::Confirmed,
                        block_age: 0,
                    },
                )
            })
            .collect();
        Ok(TransactionsStatus::summarize(references.len(), processed))
    }
}
