//! Shared ledger context
//!
//! One `HotelContext` is built at startup and shared by `Arc` with every
//! component: the transport, the contract registry (through the payload
//! builder), the transaction pipeline, the client config and the address
//! of the hotel index.

use std::sync::Arc;

use lib_client::{
    AbiValue, CallPayload, CallPayloadBuilder, ClientConfig, ClientError, ContractKind,
    ContractRegistry, LedgerRpc, Result, TransactionPipeline, TxOptions, Wallet,
};
use lib_types::{Address, TxHash};

/// Everything a hotel-domain operation needs to reach the ledger
pub struct HotelContext {
    pub rpc: Arc<dyn LedgerRpc>,
    pub builder: CallPayloadBuilder,
    pub pipeline: TransactionPipeline,
    pub config: ClientConfig,
    /// Address of the hotel index contract
    pub index: Address,
}

impl HotelContext {
    /// Context over the standard contract suite
    pub fn new(rpc: Arc<dyn LedgerRpc>, index: Address, config: ClientConfig) -> Result<Self> {
        Self::with_registry(rpc, Arc::new(ContractRegistry::standard()), index, config)
    }

    /// Fails with `Validation` if `config` is out of range
    pub fn with_registry(
        rpc: Arc<dyn LedgerRpc>,
        registry: Arc<ContractRegistry>,
        index: Address,
        config: ClientConfig,
    ) -> Result<Self> {
        let pipeline = TransactionPipeline::from_config(rpc.clone(), &config)?;
        Ok(Self {
            rpc,
            builder: CallPayloadBuilder::new(registry),
            pipeline,
            config,
            index,
        })
    }

    /// Build a payload against the registry
    pub fn payload(
        &self,
        kind: ContractKind,
        to: Address,
        method: &str,
        args: Vec<AbiValue>,
    ) -> Result<CallPayload> {
        self.builder.build(kind, to, method, args)
    }

    /// Read-only call returning every output
    pub async fn call(
        &self,
        kind: ContractKind,
        to: Address,
        method: &str,
        args: Vec<AbiValue>,
    ) -> Result<Vec<AbiValue>> {
        let payload = self.payload(kind, to, method, args)?;
        Ok(self.rpc.call(&payload).await?)
    }

    /// Read-only call returning its first output
    pub async fn call_single(
        &self,
        kind: ContractKind,
        to: Address,
        method: &str,
        args: Vec<AbiValue>,
    ) -> Result<AbiValue> {
        let mut outputs = self.call(kind, to, method, args).await?;
        if outputs.is_empty() {
            return Err(ClientError::decode(format!("{}.{} returned nothing", kind, method)));
        }
        Ok(outputs.swap_remove(0))
    }

    /// Submit a payload as-is
    pub async fn submit(
        &self,
        wallet: &dyn Wallet,
        options: &TxOptions,
        payload: &CallPayload,
    ) -> Result<TxHash> {
        self.pipeline
            .submit(wallet, options.from, payload, options.gas_limit)
            .await
    }

    /// Forward a hotel-level call through the index (`callHotel`) and submit
    pub async fn execute_on_hotel(
        &self,
        wallet: &dyn Wallet,
        options: &TxOptions,
        inner: &CallPayload,
    ) -> Result<TxHash> {
        let outer = self.builder.wrap_hotel_call(self.index, inner)?;
        self.submit(wallet, options, &outer).await
    }
}

// ============================================================================
// OUTPUT DECODING
// ============================================================================

pub(crate) fn output_at<'a>(outputs: &'a [AbiValue], position: usize, method: &str) -> Result<&'a AbiValue> {
    outputs.get(position).ok_or_else(|| {
        ClientError::decode(format!("{} returned {} values, expected at least {}", method, outputs.len(), position + 1))
    })
}

pub(crate) fn expect_address(value: &AbiValue, method: &str) -> Result<Address> {
    value
        .as_address()
        .ok_or_else(|| ClientError::decode(format!("{} did not return an address: {:?}", method, value)))
}

pub(crate) fn expect_uint(value: &AbiValue, method: &str) -> Result<u128> {
    value
        .as_uint()
        .ok_or_else(|| ClientError::decode(format!("{} did not return a uint: {:?}", method, value)))
}

pub(crate) fn expect_bool(value: &AbiValue, method: &str) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| ClientError::decode(format!("{} did not return a bool: {:?}", method, value)))
}

pub(crate) fn expect_string(value: &AbiValue, method: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ClientError::decode(format!("{} did not return a string: {:?}", method, value)))
}

pub(crate) fn expect_fixed_bytes<'a>(value: &'a AbiValue, method: &str) -> Result<&'a [u8]> {
    value
        .as_fixed_bytes()
        .ok_or_else(|| ClientError::decode(format!("{} did not return fixed bytes: {:?}", method, value)))
}

pub(crate) fn expect_array<'a>(value: &'a AbiValue, method: &str) -> Result<&'a [AbiValue]> {
    value
        .as_array()
        .ok_or_else(|| ClientError::decode(format!("{} did not return an array: {:?}", method, value)))
}
