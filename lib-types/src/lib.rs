//! Hotel ledger client primitives.
//! Stable, transport-neutral, behavior-free.
//!
//! Rule: addresses and hashes are fixed-size values, never strings, once
//! they cross into the client layer.

pub mod primitives;

pub use primitives::{
    Address, Amount, BlockHeight, DayIndex, Gas, Nonce, ParseHexError, TxHash,
};
