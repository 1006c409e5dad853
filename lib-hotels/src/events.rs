//! Event Reconciler
//!
//! Derived facts (bookings, outstanding booking requests) are not stored on
//! the ledger. They are rebuilt on every query from historical logs:
//!
//! ```text
//!   Book ─────────────► BookingRecord
//!
//!   CallStarted ──┐
//!                 ├──► outstanding (set difference on dataHash)
//!   CallFinish ───┘
//! ```
//!
//! Nothing is cached between queries; the logs are the only source of truth.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use chrono::NaiveDate;
use lib_client::codec;
use lib_client::{
    AbiValue, ClientError, ContractKind, ContractRegistry, EventFilter, LedgerRpc, RawEvent, Result,
};
use lib_types::{Address, BlockHeight, DayIndex, TxHash};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// STREAMS AND RECORDS
// ============================================================================

/// Event streams emitted by hotel contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStream {
    /// A unit was booked
    Book,
    /// A booking that needs confirmation was requested
    CallStarted,
    /// A requested booking was confirmed
    CallFinish,
}

impl EventStream {
    pub fn name(&self) -> &'static str {
        match self {
            EventStream::Book => "Book",
            EventStream::CallStarted => "CallStarted",
            EventStream::CallFinish => "CallFinish",
        }
    }
}

/// A record built from one raw log entry of a fixed stream
pub trait FromEvent: Sized {
    const STREAM: EventStream;

    fn from_event(event: &RawEvent) -> Result<Self>;
}

/// Records that can be paired by a correlation key
pub trait Correlated {
    type Key: Eq + Hash;

    fn correlation_key(&self) -> &Self::Key;
}

/// A booking, rebuilt from a `Book` log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub transaction_hash: TxHash,
    pub block_number: BlockHeight,
    pub id: String,
    pub from: Address,
    pub unit: Address,
    pub from_date: NaiveDate,
    pub days_amount: u128,
}

/// A booking request, rebuilt from a `CallStarted` log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequestRecord {
    pub transaction_hash: TxHash,
    pub block_number: BlockHeight,
    pub id: String,
    pub from: Address,
    /// `0x`-prefixed correlation key
    pub data_hash: String,
}

/// Completion of a request, rebuilt from a `CallFinish` log; used only for matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub transaction_hash: TxHash,
    pub block_number: BlockHeight,
    pub id: String,
    pub data_hash: String,
}

fn field<'a>(event: &'a RawEvent, name: &str) -> Result<&'a AbiValue> {
    event.field(name).ok_or_else(|| {
        ClientError::decode(format!("{} event {} has no field {}", event.event, event.log_id, name))
    })
}

fn address_field(event: &RawEvent, name: &str) -> Result<Address> {
    field(event, name)?
        .as_address()
        .ok_or_else(|| ClientError::decode(format!("{}.{} is not an address", event.event, name)))
}

fn uint_field(event: &RawEvent, name: &str) -> Result<u128> {
    field(event, name)?
        .as_uint()
        .ok_or_else(|| ClientError::decode(format!("{}.{} is not a uint", event.event, name)))
}

fn hash_field(event: &RawEvent, name: &str) -> Result<String> {
    let bytes = field(event, name)?
        .as_fixed_bytes()
        .ok_or_else(|| ClientError::decode(format!("{}.{} is not bytes32", event.event, name)))?;
    Ok(format!("0x{}", hex::encode(bytes)))
}

impl FromEvent for BookingRecord {
    const STREAM: EventStream = EventStream::Book;

    fn from_event(event: &RawEvent) -> Result<Self> {
        let day = uint_field(event, "fromDay")?;
        let day = DayIndex::try_from(day)
            .map_err(|_| ClientError::decode(format!("Book.fromDay {} out of range", day)))?;
        Ok(Self {
            transaction_hash: event.transaction_hash,
            block_number: event.block_number,
            id: event.log_id.clone(),
            from: address_field(event, "from")?,
            unit: address_field(event, "unit")?,
            from_date: codec::day_to_date(day)?,
            days_amount: uint_field(event, "daysAmount")?,
        })
    }
}

impl FromEvent for BookingRequestRecord {
    const STREAM: EventStream = EventStream::CallStarted;

    fn from_event(event: &RawEvent) -> Result<Self> {
        Ok(Self {
            transaction_hash: event.transaction_hash,
            block_number: event.block_number,
            id: event.log_id.clone(),
            from: address_field(event, "from")?,
            data_hash: hash_field(event, "dataHash")?,
        })
    }
}

impl FromEvent for CompletionRecord {
    const STREAM: EventStream = EventStream::CallFinish;

    fn from_event(event: &RawEvent) -> Result<Self> {
        Ok(Self {
            transaction_hash: event.transaction_hash,
            block_number: event.block_number,
            id: event.log_id.clone(),
            data_hash: hash_field(event, "dataHash")?,
        })
    }
}

impl Correlated for BookingRequestRecord {
    type Key = String;

    fn correlation_key(&self) -> &String {
        &self.data_hash
    }
}

impl Correlated for CompletionRecord {
    type Key = String;

    fn correlation_key(&self) -> &String {
        &self.data_hash
    }
}

// ============================================================================
// RECONCILIATION
// ============================================================================

/// Start records with no finish record sharing their key, in input order
///
/// Block order plays no part: a finish anywhere in the stream cancels every
/// start with the same key.
pub fn outstanding<S, F>(start: Vec<S>, finish: &[F]) -> Vec<S>
where
    S: Correlated,
    F: Correlated<Key = S::Key>,
{
    let finished: HashSet<&S::Key> = finish.iter().map(Correlated::correlation_key).collect();
    start
        .into_iter()
        .filter(|record| !finished.contains(record.correlation_key()))
        .collect()
}

/// Log scans over a set of hotel contracts
///
/// Each log is checked against the hotel event declarations of the
/// registry before it is decoded.
#[derive(Clone)]
pub struct EventReconciler {
    rpc: Arc<dyn LedgerRpc>,
    registry: Arc<ContractRegistry>,
}

impl EventReconciler {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self::with_registry(rpc, Arc::new(ContractRegistry::standard()))
    }

    pub fn with_registry(rpc: Arc<dyn LedgerRpc>, registry: Arc<ContractRegistry>) -> Self {
        Self { rpc, registry }
    }

    /// All `R::STREAM` records of `addresses` from `from_block` to the head
    ///
    /// Addresses are visited in input order and each address's records stay
    /// in ascending block order. No addresses means no network call.
    pub async fn collect<R: FromEvent>(
        &self,
        addresses: &[Address],
        from_block: BlockHeight,
    ) -> Result<Vec<R>> {
        let schema = self
            .registry
            .event(ContractKind::Hotel, R::STREAM.name())
            .ok_or_else(|| ClientError::decode(format!("{} is not a hotel event", R::STREAM.name())))?;

        let mut records = Vec::new();
        for address in addresses {
            let filter = EventFilter::new(*address, R::STREAM.name(), from_block);
            let mut events = self.rpc.past_events(&filter).await?;
            events.sort_by_key(|e| e.block_number);
            debug!(
                "Fetched {} {} events of {} from block {}",
                events.len(),
                R::STREAM.name(),
                address,
                from_block
            );
            for event in &events {
                schema.validate(event)?;
                records.push(R::from_event(event)?);
            }
        }
        Ok(records)
    }

    /// Requests of one contract that have not been completed yet
    pub async fn outstanding_requests(
        &self,
        address: Address,
        from_block: BlockHeight,
    ) -> Result<Vec<BookingRequestRecord>> {
        let started: Vec<BookingRequestRecord> = self.collect(&[address], from_block).await?;
        let finished: Vec<CompletionRecord> = self.collect(&[address], from_block).await?;
        Ok(outstanding(started, &finished))
    }
}
