//! Availability Scanner
//!
//! A unit is available for `[from_day, from_day + day_count)` when it is
//! active and none of those days has a booking holder. Days are fetched one
//! at a time in ascending order and the scan stops at the first booked day.

use async_trait::async_trait;
use lib_client::Result;
use lib_types::{Address, DayIndex};
use tracing::debug;

use crate::unit::{Reservation, UnitReader};

/// Source of unit state and per-day reservation records
#[async_trait]
pub trait ReservationSource: Send + Sync {
    async fn is_active(&self, unit: Address) -> Result<bool>;

    async fn reservation(&self, unit: Address, day: DayIndex) -> Result<Reservation>;
}

#[async_trait]
impl ReservationSource for UnitReader {
    async fn is_active(&self, unit: Address) -> Result<bool> {
        UnitReader::is_active(self, unit).await
    }

    async fn reservation(&self, unit: Address, day: DayIndex) -> Result<Reservation> {
        UnitReader::reservation(self, unit, day).await
    }
}

pub struct AvailabilityScanner<S> {
    source: S,
}

impl<S: ReservationSource> AvailabilityScanner<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Check the active flag, then each day until the first booked one
    pub async fn is_available(&self, unit: Address, from_day: DayIndex, day_count: u32) -> Result<bool> {
        if !self.source.is_active(unit).await? {
            debug!("Unit {} is inactive", unit);
            return Ok(false);
        }

        let end = from_day.saturating_add(day_count);
        for day in from_day..end {
            let reservation = self.source.reservation(unit, day).await?;
            if reservation.is_booked() {
                debug!("Unit {} booked on day {} by {}", unit, day, reservation.booked_by);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_client::{ClientError, LedgerError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeUnit {
        active: bool,
        booked: HashMap<DayIndex, Address>,
        failing_day: Option<DayIndex>,
        fetches: AtomicUsize,
    }

    impl FakeUnit {
        fn new(active: bool) -> Self {
            Self {
                active,
                booked: HashMap::new(),
                failing_day: None,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReservationSource for FakeUnit {
        async fn is_active(&self, _unit: Address) -> Result<bool> {
            Ok(self.active)
        }

        async fn reservation(&self, _unit: Address, day: DayIndex) -> Result<Reservation> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.failing_day == Some(day) {
                return Err(LedgerError::Timeout(format!("day {}", day)).into());
            }
            Ok(Reservation {
                special_price: 0.0,
                special_lif_price: "0".to_string(),
                booked_by: self.booked.get(&day).copied().unwrap_or(Address::ZERO),
            })
        }
    }

    const UNIT: Address = Address::ZERO;

    #[tokio::test]
    async fn test_free_range_is_available() {
        let scanner = AvailabilityScanner::new(FakeUnit::new(true));
        assert!(scanner.is_available(UNIT, 100, 5).await.unwrap());
        assert_eq!(scanner.source.fetches.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_inactive_unit_fetches_no_days() {
        let scanner = AvailabilityScanner::new(FakeUnit::new(false));
        assert!(!scanner.is_available(UNIT, 100, 5).await.unwrap());
        assert_eq!(scanner.source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_short_circuits_on_first_booked_day() {
        let mut unit = FakeUnit::new(true);
        unit.booked.insert(101, Address::from_low_u64(0xc1));
        unit.booked.insert(103, Address::from_low_u64(0xc2));
        let scanner = AvailabilityScanner::new(unit);

        assert!(!scanner.is_available(UNIT, 100, 5).await.unwrap());
        // days 100 and 101 only
        assert_eq!(scanner.source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_day_fetch_failure_surfaces() {
        let mut unit = FakeUnit::new(true);
        unit.failing_day = Some(102);
        let scanner = AvailabilityScanner::new(unit);

        let err = scanner.is_available(UNIT, 100, 5).await.unwrap_err();
        assert!(matches!(err, ClientError::Ledger(LedgerError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_zero_days_only_checks_active() {
        let scanner = AvailabilityScanner::new(FakeUnit::new(true));
        assert!(scanner.is_available(UNIT, 100, 0).await.unwrap());
        assert_eq!(scanner.source.fetches.load(Ordering::SeqCst), 0);
    }
}
