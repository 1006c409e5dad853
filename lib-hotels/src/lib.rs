//! Hotel Assets on the Ledger
//!
//! Client-side orchestration for hotels, unit types and units whose state
//! lives in ledger contracts. The ledger is reached only through the
//! capability traits of `lib-client`, so every component runs unchanged
//! against a real node or the in-memory `MockLedger`.
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐
//! │ HotelManager │  │ BookingData  │  │ IndexDataProvider│
//! └──────┬───────┘  └──────┬───────┘  └────────┬─────────┘
//!        │                 │                   │
//!        │        ┌────────┴────────┐   ┌──────┴──────┐
//!        │        │ Availability    │   │ LedgerHotel │
//!        │        │ EventReconciler │   │ RemoteDataset│
//!        │        └────────┬────────┘   └──────┬──────┘
//!        └─────────────────┼───────────────────┘
//!                          ▼
//!                   HotelContext (rpc, registry, pipeline, config)
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `dataset` | Lazily synchronized field sets with a deploy state machine |
//! | `hotel` | A hotel contract driven through its dataset |
//! | `index` | Index bookkeeping, in memory or on the ledger |
//! | `events` | Bookings and outstanding requests rebuilt from logs |
//! | `availability` | Sequential, short-circuiting availability checks |
//! | `manager` | Owner-side administration of hotels, unit types and units |
//! | `booking` | Client-side cost, availability and history queries |

pub mod availability;
pub mod booking;
pub mod context;
pub mod dataset;
pub mod events;
pub mod hotel;
pub mod index;
pub mod manager;
pub mod unit;

pub use availability::{AvailabilityScanner, ReservationSource};
pub use booking::BookingData;
pub use context::HotelContext;
pub use dataset::{DeployState, FieldFailure, FieldState, RemoteDataset, RemoteGetter, RemoteSetter, SyncReport};
pub use events::{
    outstanding, BookingRecord, BookingRequestRecord, CompletionRecord, Correlated, EventReconciler,
    EventStream, FromEvent,
};
pub use hotel::LedgerHotel;
pub use index::{
    AddHotelResponse, HotelRecord, InMemoryIndex, IndexDataProvider, LedgerIndex, TransactionsStatus,
    TxResult, TxStatus, TxStatusMeta,
};
pub use manager::{HotelInfo, HotelManager};
pub use unit::{Reservation, UnitInfo, UnitReader};
