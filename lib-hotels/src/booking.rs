//! Booking queries
//!
//! Read-only façade for clients: stay costs, availability and the booking
//! history of a set of hotels. Nothing here submits transactions.

use std::sync::Arc;

use chrono::NaiveDate;
use lib_client::codec;
use lib_client::Result;
use lib_types::{Address, BlockHeight};
use tracing::debug;

use crate::availability::AvailabilityScanner;
use crate::context::HotelContext;
use crate::events::{BookingRecord, BookingRequestRecord, EventReconciler};
use crate::unit::{Reservation, UnitReader};

pub struct BookingData {
    ctx: Arc<HotelContext>,
    units: UnitReader,
    scanner: AvailabilityScanner<UnitReader>,
    reconciler: EventReconciler,
}

impl BookingData {
    pub fn new(ctx: Arc<HotelContext>) -> Self {
        let units = UnitReader::new(ctx.clone());
        Self {
            scanner: AvailabilityScanner::new(units.clone()),
            reconciler: EventReconciler::with_registry(ctx.rpc.clone(), ctx.builder.registry().clone()),
            units,
            ctx,
        }
    }

    fn from_block(&self, from_block: Option<BlockHeight>) -> BlockHeight {
        from_block.unwrap_or(self.ctx.config.default_from_block)
    }

    /// Domestic cost of a stay, check-in on `from_date`
    pub async fn get_cost(&self, unit: Address, from_date: NaiveDate, days_amount: u32) -> Result<f64> {
        let from_day = codec::date_to_day(from_date)?;
        self.units.cost(unit, from_day, days_amount).await
    }

    /// Token cost of a stay in human units
    pub async fn get_lif_cost(&self, unit: Address, from_date: NaiveDate, days_amount: u32) -> Result<String> {
        let from_day = codec::date_to_day(from_date)?;
        self.units.lif_cost(unit, from_day, days_amount).await
    }

    /// Reservation record of `unit` on `date`
    pub async fn get_reservation(&self, unit: Address, date: NaiveDate) -> Result<Reservation> {
        let day = codec::date_to_day(date)?;
        self.units.reservation(unit, day).await
    }

    pub async fn unit_is_available(&self, unit: Address, from_date: NaiveDate, days_amount: u32) -> Result<bool> {
        let from_day = codec::date_to_day(from_date)?;
        self.scanner.is_available(unit, from_day, days_amount).await
    }

    /// Every booking made at `hotels`, hotel by hotel
    pub async fn get_bookings(
        &self,
        hotels: &[Address],
        from_block: Option<BlockHeight>,
    ) -> Result<Vec<BookingRecord>> {
        let bookings: Vec<BookingRecord> = self
            .reconciler
            .collect(hotels, self.from_block(from_block))
            .await?;
        debug!("Found {} bookings across {} hotels", bookings.len(), hotels.len());
        Ok(bookings)
    }

    /// Booking requests of `hotels` still waiting for confirmation
    ///
    /// Requests are matched against completions of the same hotel only.
    pub async fn get_booking_requests(
        &self,
        hotels: &[Address],
        from_block: Option<BlockHeight>,
    ) -> Result<Vec<BookingRequestRecord>> {
        let from_block = self.from_block(from_block);
        let mut requests = Vec::new();
        for hotel in hotels {
            let outstanding = self.reconciler.outstanding_requests(*hotel, from_block).await?;
            debug!("Hotel {} has {} outstanding requests", hotel, outstanding.len());
            requests.extend(outstanding);
        }
        Ok(requests)
    }
}
