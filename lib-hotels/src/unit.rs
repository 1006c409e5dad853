//! Unit reads
//!
//! Per-day reservation records are never cached or materialized in bulk;
//! every query is a fresh read against the unit contract.

use std::sync::Arc;

use lib_client::codec;
use lib_client::{AbiValue, ContractKind, Result};
use lib_types::{Address, DayIndex};
use serde::{Deserialize, Serialize};

use crate::context::{
    expect_address, expect_bool, expect_fixed_bytes, expect_uint, output_at, HotelContext,
};

/// Reservation record of one unit on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// Domestic override price, `0.0` when none
    pub special_price: f64,
    /// Token override price in human units
    pub special_lif_price: String,
    /// Booking holder, zero address when free
    pub booked_by: Address,
}

impl Reservation {
    pub fn is_booked(&self) -> bool {
        !self.booked_by.is_zero()
    }
}

/// Static configuration of a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitInfo {
    pub address: Address,
    pub unit_type: String,
    pub active: bool,
    pub default_price: f64,
    pub default_lif_price: String,
    /// Numeric currency code, `0` when unset
    pub currency_code: u16,
}

/// Read-only access to unit contracts
#[derive(Clone)]
pub struct UnitReader {
    ctx: Arc<HotelContext>,
}

impl UnitReader {
    pub fn new(ctx: Arc<HotelContext>) -> Self {
        Self { ctx }
    }

    fn decimals(&self) -> u32 {
        self.ctx.config.token_decimals
    }

    pub async fn is_active(&self, unit: Address) -> Result<bool> {
        let value = self
            .ctx
            .call_single(ContractKind::Unit, unit, "active", vec![])
            .await?;
        expect_bool(&value, "active")
    }

    pub async fn reservation(&self, unit: Address, day: DayIndex) -> Result<Reservation> {
        let outputs = self
            .ctx
            .call(ContractKind::Unit, unit, "getReservation", vec![AbiValue::Uint(day.into())])
            .await?;
        let method = "getReservation";
        let price = expect_uint(output_at(&outputs, 0, method)?, method)?;
        let lif_price = expect_uint(output_at(&outputs, 1, method)?, method)?;
        let booked_by = expect_address(output_at(&outputs, 2, method)?, method)?;

        Ok(Reservation {
            special_price: codec::uint_to_price(price),
            special_lif_price: codec::base_units_to_token(lif_price, self.decimals())?,
            booked_by,
        })
    }

    /// Domestic cost of `days` nights starting on `from_day`
    pub async fn cost(&self, unit: Address, from_day: DayIndex, days: u32) -> Result<f64> {
        let value = self
            .ctx
            .call_single(
                ContractKind::Unit,
                unit,
                "getCost",
                vec![AbiValue::Uint(from_day.into()), AbiValue::Uint(days.into())],
            )
            .await?;
        Ok(codec::uint_to_price(expect_uint(&value, "getCost")?))
    }

    /// Token cost of `days` nights starting on `from_day`, in human units
    pub async fn lif_cost(&self, unit: Address, from_day: DayIndex, days: u32) -> Result<String> {
        let value = self
            .ctx
            .call_single(
                ContractKind::Unit,
                unit,
                "getLifCost",
                vec![AbiValue::Uint(from_day.into()), AbiValue::Uint(days.into())],
            )
            .await?;
        codec::base_units_to_token(expect_uint(&value, "getLifCost")?, self.decimals())
    }

    pub async fn info(&self, unit: Address) -> Result<UnitInfo> {
        let ctx = &self.ctx;
        let unit_type = ctx.call_single(ContractKind::Unit, unit, "unitType", vec![]).await?;
        let default_price = ctx.call_single(ContractKind::Unit, unit, "defaultPrice", vec![]).await?;
        let default_lif_price = ctx
            .call_single(ContractKind::Unit, unit, "defaultLifPrice", vec![])
            .await?;
        let currency = ctx.call_single(ContractKind::Unit, unit, "currencyCode", vec![]).await?;

        let currency = expect_fixed_bytes(&currency, "currencyCode")?;
        let currency_code = match currency {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        };

        Ok(UnitInfo {
            address: unit,
            unit_type: codec::bytes32_to_text(expect_fixed_bytes(&unit_type, "unitType")?),
            active: self.is_active(unit).await?,
            default_price: codec::uint_to_price(expect_uint(&default_price, "defaultPrice")?),
            default_lif_price: codec::base_units_to_token(
                expect_uint(&default_lif_price, "defaultLifPrice")?,
                self.decimals(),
            )?,
            currency_code,
        })
    }
}
