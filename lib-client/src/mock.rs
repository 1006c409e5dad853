//! In-memory ledger for tests
//!
//! `MockLedger` implements both [`LedgerRpc`] and [`Wallet`]. Reads are
//! answered by scripted handlers keyed by `(contract, method)`, every round
//! trip is counted, and writes are recorded instead of executed.
//!
//! Failure injection is keyed by canonical signature and also matches calls
//! forwarded through `callHotel`/`callUnit`/`callUnitType`, so a failing
//! `editInfo(string)` fails even when it arrives wrapped in `callHotel`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lib_types::{Address, BlockHeight, Gas, Nonce, TxHash};
use parking_lot::Mutex;

use crate::abi::{self, keccak256, AbiValue};
use crate::error::LedgerError;
use crate::payload::CallPayload;
use crate::rpc::{EventFilter, LedgerResult, LedgerRpc, RawEvent, TransactionDescriptor, TxReceipt, Wallet};

type CallHandler = Arc<dyn Fn(&[AbiValue]) -> LedgerResult<Vec<AbiValue>> + Send + Sync>;

const FORWARDING_SIGNATURES: [&str; 3] = [
    "callHotel(address,bytes)",
    "callUnit(address,bytes)",
    "callUnitType(bytes32,bytes)",
];

/// Default answer to gas estimation
pub const DEFAULT_GAS_ESTIMATE: Gas = 21_000;

struct MockState {
    handlers: HashMap<(Address, String), CallHandler>,
    call_counts: HashMap<(Address, String), usize>,
    nonces: HashMap<Address, Nonce>,
    gas_estimate: Gas,
    estimate_count: usize,
    estimate_failures: HashMap<[u8; 4], LedgerError>,
    submission_failures: HashMap<[u8; 4], LedgerError>,
    revert_on_mine: Vec<[u8; 4]>,
    auto_mine: bool,
    sent: Vec<TransactionDescriptor>,
    receipts: HashMap<TxHash, TxReceipt>,
    events: Vec<RawEvent>,
    event_queries: usize,
    block: BlockHeight,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            call_counts: HashMap::new(),
            nonces: HashMap::new(),
            gas_estimate: DEFAULT_GAS_ESTIMATE,
            estimate_count: 0,
            estimate_failures: HashMap::new(),
            submission_failures: HashMap::new(),
            revert_on_mine: Vec::new(),
            auto_mine: true,
            sent: Vec::new(),
            receipts: HashMap::new(),
            events: Vec::new(),
            event_queries: 0,
            block: 1,
        }
    }
}

/// Scripted in-memory ledger and wallet
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // SCRIPTING
    // ========================================================================

    /// Answer read calls to `method` on `address` with `handler`
    pub fn on_call<F>(&self, address: Address, method: &str, handler: F)
    where
        F: Fn(&[AbiValue]) -> LedgerResult<Vec<AbiValue>> + Send + Sync + 'static,
    {
        self.state
            .lock()
            .handlers
            .insert((address, method.to_string()), Arc::new(handler));
    }

    /// Answer read calls to `method` on `address` with fixed values
    pub fn respond(&self, address: Address, method: &str, values: Vec<AbiValue>) {
        self.on_call(address, method, move |_| Ok(values.clone()));
    }

    pub fn set_gas_estimate(&self, gas: Gas) {
        self.state.lock().gas_estimate = gas;
    }

    pub fn set_nonce(&self, account: Address, nonce: Nonce) {
        self.state.lock().nonces.insert(account, nonce);
    }

    /// Make gas estimation fail for calls invoking `signature`
    pub fn fail_estimation(&self, signature: &str, error: LedgerError) {
        self.state
            .lock()
            .estimate_failures
            .insert(abi::selector(signature), error);
    }

    /// Make the wallet reject transactions invoking `signature`
    pub fn fail_submission(&self, signature: &str, error: LedgerError) {
        self.state
            .lock()
            .submission_failures
            .insert(abi::selector(signature), error);
    }

    /// Mine transactions invoking `signature` with a failed receipt
    pub fn revert_on_mine(&self, signature: &str) {
        self.state.lock().revert_on_mine.push(abi::selector(signature));
    }

    /// When on (default) every accepted transaction is mined in its own block
    pub fn set_auto_mine(&self, enabled: bool) {
        self.state.lock().auto_mine = enabled;
    }

    /// Mine a pending transaction in a new block
    pub fn mine(&self, hash: TxHash, success: bool) {
        let mut state = self.state.lock();
        state.block += 1;
        let block_number = state.block;
        state.receipts.insert(
            hash,
            TxReceipt {
                hash,
                block_number,
                success,
            },
        );
    }

    pub fn set_block(&self, block: BlockHeight) {
        self.state.lock().block = block;
    }

    /// Append a log entry and return it
    pub fn emit(
        &self,
        address: Address,
        event: &str,
        block_number: BlockHeight,
        fields: Vec<(&str, AbiValue)>,
    ) -> RawEvent {
        let mut state = self.state.lock();
        let seq = state.events.len() as u64;

        let mut preimage = address.as_bytes().to_vec();
        preimage.extend_from_slice(&block_number.to_be_bytes());
        preimage.extend_from_slice(&seq.to_be_bytes());

        let raw = RawEvent {
            transaction_hash: TxHash::new(keccak256(&preimage)),
            block_number,
            log_id: format!("log_{:08x}", seq),
            address,
            event: event.to_string(),
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        };
        state.events.push(raw.clone());
        if block_number > state.block {
            state.block = block_number;
        }
        raw
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    /// Read calls made to `method` on `address`
    pub fn call_count(&self, address: Address, method: &str) -> usize {
        self.state
            .lock()
            .call_counts
            .get(&(address, method.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// All read calls, any contract
    pub fn total_calls(&self) -> usize {
        self.state.lock().call_counts.values().sum()
    }

    pub fn estimate_count(&self) -> usize {
        self.state.lock().estimate_count
    }

    pub fn event_queries(&self) -> usize {
        self.state.lock().event_queries
    }

    /// Every transaction the wallet accepted, in order
    pub fn sent(&self) -> Vec<TransactionDescriptor> {
        self.state.lock().sent.clone()
    }

    /// Accepted transactions invoking `signature`, directly or forwarded
    pub fn sent_invoking(&self, signature: &str) -> usize {
        let wanted = abi::selector(signature);
        self.state
            .lock()
            .sent
            .iter()
            .filter(|tx| invoked_selectors(&tx.data).contains(&wanted))
            .count()
    }

    /// Total network round trips of any kind
    pub fn round_trips(&self) -> usize {
        let state = self.state.lock();
        state.call_counts.values().sum::<usize>()
            + state.estimate_count
            + state.event_queries
            + state.sent.len()
    }
}

/// Selectors of a call and of every call forwarded inside it
fn invoked_selectors(data: &[u8]) -> Vec<[u8; 4]> {
    let mut out = Vec::new();
    let mut current = data;
    while current.len() >= 4 {
        let selector = [current[0], current[1], current[2], current[3]];
        out.push(selector);

        let forwards = FORWARDING_SIGNATURES
            .iter()
            .any(|sig| abi::selector(sig) == selector);
        if !forwards {
            break;
        }
        // (word, bytes): selector | head word | offset | length | data
        let len_start = 4 + 64;
        if current.len() < len_start + 32 {
            break;
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&current[len_start + 24..len_start + 32]);
        let len = u64::from_be_bytes(len_bytes) as usize;
        let body = len_start + 32;
        if current.len() < body + len {
            break;
        }
        current = &current[body..body + len];
    }
    out
}

fn matching_failure(
    failures: &HashMap<[u8; 4], LedgerError>,
    data: &[u8],
) -> Option<LedgerError> {
    invoked_selectors(data)
        .iter()
        .find_map(|selector| failures.get(selector).cloned())
}

fn tx_hash(from: &Address, nonce: Nonce) -> TxHash {
    let mut preimage = from.as_bytes().to_vec();
    preimage.extend_from_slice(&nonce.to_be_bytes());
    TxHash::new(keccak256(&preimage))
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn call(&self, payload: &CallPayload) -> LedgerResult<Vec<AbiValue>> {
        let key = (payload.to, payload.method.clone());
        let handler = {
            let mut state = self.state.lock();
            *state.call_counts.entry(key.clone()).or_insert(0) += 1;
            state.handlers.get(&key).cloned()
        };
        match handler {
            Some(handler) => handler(&payload.args),
            None => Err(LedgerError::Reverted(format!(
                "no handler for {} on {}",
                payload.signature, payload.to
            ))),
        }
    }

    async fn estimate_gas(&self, _from: Address, payload: &CallPayload) -> LedgerResult<Gas> {
        let mut state = self.state.lock();
        state.estimate_count += 1;
        if let Some(error) = matching_failure(&state.estimate_failures, &payload.data) {
            return Err(error);
        }
        Ok(state.gas_estimate)
    }

    async fn pending_nonce(&self, account: Address) -> LedgerResult<Nonce> {
        Ok(self.state.lock().nonces.get(&account).copied().unwrap_or(0))
    }

    async fn past_events(&self, filter: &EventFilter) -> LedgerResult<Vec<RawEvent>> {
        let mut state = self.state.lock();
        state.event_queries += 1;
        let mut events: Vec<RawEvent> = state
            .events
            .iter()
            .filter(|e| e.address == filter.address && e.event == filter.event)
            .filter(|e| e.block_number >= filter.from_block)
            .filter(|e| filter.to_block.map_or(true, |to| e.block_number <= to))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.block_number);
        Ok(events)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> LedgerResult<Option<TxReceipt>> {
        Ok(self.state.lock().receipts.get(&hash).copied())
    }

    async fn block_number(&self) -> LedgerResult<BlockHeight> {
        Ok(self.state.lock().block)
    }
}

#[async_trait]
impl Wallet for MockLedger {
    async fn sign_and_send(&self, tx: &TransactionDescriptor) -> LedgerResult<TxHash> {
        let mut state = self.state.lock();

        let expected = state.nonces.get(&tx.from).copied().unwrap_or(0);
        if tx.nonce != expected {
            return Err(LedgerError::Rejected(format!(
                "nonce {} does not match expected {}",
                tx.nonce, expected
            )));
        }
        if let Some(error) = matching_failure(&state.submission_failures, &tx.data) {
            return Err(error);
        }

        let hash = tx_hash(&tx.from, tx.nonce);
        state.nonces.insert(tx.from, expected + 1);
        state.sent.push(tx.clone());

        if state.auto_mine {
            let reverted = invoked_selectors(&tx.data)
                .iter()
                .any(|s| state.revert_on_mine.contains(s));
            state.block += 1;
            let block_number = state.block;
            state.receipts.insert(
                hash,
                TxReceipt {
                    hash,
                    block_number,
                    success: !reverted,
                },
            );
        }
        Ok(hash)
    }
}
