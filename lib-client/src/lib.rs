//! Hotel Ledger Client Library
//!
//! Ledger plumbing shared by every hotel-domain operation:
//!
//! - **Value codec**: prices, token amounts, days, coordinates and codes to
//!   and from their on-chain integer encodings
//! - **Contract registry**: explicit method tables for the contract suite,
//!   built once and shared by `Arc`
//! - **Call payloads**: validated, encoded calls and their forwarding wrappers
//! - **Transaction pipeline**: pending nonce, gas estimate, margin, broadcast
//! - **Capabilities**: `LedgerRpc` and `Wallet` traits for the transport and
//!   signer, plus `MockLedger` for tests
//!
//! # Example
//!
//! ```ignore
//! use lib_client::{CallPayloadBuilder, ContractKind, TransactionPipeline, AbiValue};
//!
//! let builder = CallPayloadBuilder::default();
//! let payload = builder.build(
//!     ContractKind::HotelIndex,
//!     index,
//!     "registerHotel",
//!     vec![AbiValue::String("https://hotel.example".into())],
//! )?;
//!
//! let pipeline = TransactionPipeline::new(rpc, config.gas_margin);
//! let tx = pipeline.submit(&wallet, manager, &payload, None).await?;
//! ```

pub mod abi;
pub mod codec;
pub mod config;
pub mod error;
pub mod mock;
pub mod payload;
pub mod pipeline;
pub mod registry;
pub mod rpc;

// Re-exports for convenience
pub use abi::{AbiValue, ParamKind};
pub use config::ClientConfig;
pub use error::{ClientError, LedgerError, Result};
pub use payload::{CallPayload, CallPayloadBuilder};
pub use pipeline::{apply_gas_margin, future_contract_address, TransactionPipeline};
pub use registry::{ContractInterface, ContractKind, ContractRegistry, EventSchema, MethodSchema};
pub use rpc::{
    EventFilter, LedgerResult, LedgerRpc, RawEvent, TransactionDescriptor, TxOptions, TxReceipt,
    Wallet,
};
