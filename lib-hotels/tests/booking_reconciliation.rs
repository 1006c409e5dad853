//! Integration tests for booking history, outstanding requests and
//! availability, with the manager writing and the booking façade reading.

use std::sync::Arc;

use chrono::NaiveDate;
use lib_client::mock::MockLedger;
use lib_client::{abi, codec, AbiValue, ClientConfig};
use lib_hotels::{outstanding, BookingData, BookingRequestRecord, CompletionRecord, EventReconciler, HotelContext, HotelManager};
use lib_types::{Address, BlockHeight};

const INDEX: u64 = 0x1d;
const HOTEL: u64 = 0x40;
const UNIT: u64 = 0x50;

fn guest() -> AbiValue {
    AbiValue::Address(Address::from_low_u64(0xc1))
}

fn data_hash(n: u8) -> AbiValue {
    AbiValue::FixedBytes(vec![n; 32])
}

fn setup() -> (Arc<MockLedger>, Arc<HotelContext>) {
    let ledger = Arc::new(MockLedger::new());
    let ctx = HotelContext::new(ledger.clone(), Address::from_low_u64(INDEX), ClientConfig::default()).unwrap();
    (ledger, Arc::new(ctx))
}

fn request(ledger: &MockLedger, hotel: Address, block: BlockHeight, n: u8) {
    ledger.emit(hotel, "CallStarted", block, vec![("from", guest()), ("dataHash", data_hash(n))]);
}

fn finish(ledger: &MockLedger, hotel: Address, block: BlockHeight, n: u8) {
    ledger.emit(hotel, "CallFinish", block, vec![("from", guest()), ("dataHash", data_hash(n))]);
}

/// First uint argument of the call to `signature` found inside `data`
fn first_argument(data: &[u8], signature: &str) -> Option<u128> {
    let selector = abi::selector(signature);
    let start = data.windows(4).position(|w| w == selector)? + 4;
    let word = data.get(start..start + 32)?;
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Some(u128::from_be_bytes(low))
}

#[tokio::test]
async fn test_outstanding_is_a_stable_set_difference() {
    let (ledger, ctx) = setup();
    let hotel = Address::from_low_u64(HOTEL);
    request(&ledger, hotel, 1, 1);
    request(&ledger, hotel, 2, 2);
    request(&ledger, hotel, 3, 3);
    finish(&ledger, hotel, 4, 2);

    let reconciler = EventReconciler::new(ctx.rpc.clone());
    let started: Vec<BookingRequestRecord> = reconciler.collect(&[hotel], 0).await.unwrap();
    let finished: Vec<CompletionRecord> = reconciler.collect(&[hotel], 0).await.unwrap();

    let once = outstanding(started.clone(), &finished);
    let twice = outstanding(started.clone(), &finished);
    assert_eq!(once, twice);
    assert_eq!(once.iter().map(|r| r.block_number).collect::<Vec<_>>(), vec![1, 3]);

    let none_finished: Vec<CompletionRecord> = Vec::new();
    assert_eq!(outstanding(started.clone(), &none_finished), started);
}

#[tokio::test]
async fn test_confirmed_request_leaves_the_outstanding_set() {
    let (ledger, ctx) = setup();
    let hotel = Address::from_low_u64(HOTEL);
    let booking = BookingData::new(ctx.clone());
    let manager = HotelManager::new(ctx, ledger.clone(), Address::from_low_u64(0xaa));

    request(&ledger, hotel, 1, 9);
    let pending = booking.get_booking_requests(&[hotel], None).await.unwrap();
    assert_eq!(pending.len(), 1);

    manager.confirm_booking(hotel, &pending[0].data_hash).await.unwrap();
    assert_eq!(ledger.sent_invoking("continueCall(bytes32)"), 1);

    // the contract answers the confirmation with a finish log
    finish(&ledger, hotel, 3, 9);
    assert!(booking.get_booking_requests(&[hotel], None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bookings_decode_dates() {
    let (ledger, ctx) = setup();
    let hotel = Address::from_low_u64(HOTEL);
    ledger.emit(
        hotel,
        "Book",
        25,
        vec![
            ("from", guest()),
            ("unit", AbiValue::Address(Address::from_low_u64(UNIT))),
            ("fromDay", AbiValue::Uint(18545)),
            ("daysAmount", AbiValue::Uint(5)),
        ],
    );

    let bookings = BookingData::new(ctx).get_bookings(&[hotel], None).await.unwrap();
    assert_eq!(bookings.len(), 1);
    let record = &bookings[0];
    assert_eq!(record.block_number, 25);
    assert_eq!(record.unit, Address::from_low_u64(UNIT));
    assert_eq!(record.from_date, NaiveDate::from_ymd_opt(2020, 10, 10).unwrap());
    assert_eq!(record.days_amount, 5);
    assert!(record.id.starts_with("log_"));
}

#[tokio::test]
async fn test_special_price_round_trip() {
    let (ledger, ctx) = setup();
    let hotel = Address::from_low_u64(HOTEL);
    let unit = Address::from_low_u64(UNIT);
    let day = NaiveDate::from_ymd_opt(2020, 10, 10).unwrap();
    let manager = HotelManager::new(ctx.clone(), ledger.clone(), Address::from_low_u64(0xaa));

    manager.set_unit_special_price(hotel, unit, 120.55, day, 1).await.unwrap();
    let sent = ledger.sent();
    let stored = first_argument(&sent[0].data, "setSpecialPrice(uint256,uint256,uint256)").unwrap();

    ledger.respond(
        unit,
        "getReservation",
        vec![AbiValue::Uint(stored), AbiValue::Uint(0), AbiValue::Address(Address::from_low_u64(0xc1))],
    );
    let reservation = BookingData::new(ctx).get_reservation(unit, day).await.unwrap();
    assert!((reservation.special_price - 120.55).abs() < 0.005);
    assert_eq!(reservation.special_lif_price, "0");
    assert!(reservation.is_booked());
}

#[tokio::test]
async fn test_availability_counts_day_fetches() {
    let (ledger, ctx) = setup();
    let unit = Address::from_low_u64(UNIT);
    let from = NaiveDate::from_ymd_opt(2020, 10, 10).unwrap();
    let booked = codec::date_to_day(from).unwrap() + 2;

    ledger.respond(unit, "active", vec![AbiValue::Bool(true)]);
    ledger.on_call(unit, "getReservation", move |args| {
        let holder = if args[0] == AbiValue::Uint(booked.into()) {
            Address::from_low_u64(0xc1)
        } else {
            Address::ZERO
        };
        Ok(vec![AbiValue::Uint(0), AbiValue::Uint(0), AbiValue::Address(holder)])
    });

    let booking = BookingData::new(ctx);
    assert!(!booking.unit_is_available(unit, from, 7).await.unwrap());
    assert_eq!(ledger.call_count(unit, "getReservation"), 3);

    ledger.respond(unit, "active", vec![AbiValue::Bool(false)]);
    assert!(!booking.unit_is_available(unit, from, 7).await.unwrap());
    assert_eq!(ledger.call_count(unit, "getReservation"), 3);
}
