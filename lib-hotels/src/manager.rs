//! Hotel administration
//!
//! `HotelManager` acts for one owner account. Every mutation is a hotel,
//! unit type or unit method call forwarded through the index:
//!
//! ```text
//! Index.callHotel(hotel, ──► Hotel.<method>(..)
//!                        ──► Hotel.callUnit(unit, ──► Unit.<method>(..))
//!                        ──► Hotel.callUnitType(name, ──► UnitType.<method>(..)))
//! ```
//!
//! and goes through the transaction pipeline (nonce, estimate, margin,
//! broadcast). Reads refresh a per-manager cache of [`HotelInfo`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use lib_client::codec;
use lib_client::{AbiValue, CallPayload, ClientError, ContractKind, Result, TxOptions, Wallet};
use lib_types::{Address, DayIndex, TxHash};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::{expect_address, expect_array, expect_bool, expect_fixed_bytes, expect_string, HotelContext};
use crate::unit::{Reservation, UnitInfo, UnitReader};

/// Non-booking data of one hotel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelInfo {
    pub address: Address,
    pub url: String,
    pub manager: Address,
    pub wait_confirmation: bool,
    /// Unit type name to unit type contract
    pub unit_types: BTreeMap<String, Address>,
    pub units: BTreeMap<Address, UnitInfo>,
}

pub struct HotelManager {
    ctx: Arc<HotelContext>,
    wallet: Arc<dyn Wallet>,
    options: TxOptions,
    units: UnitReader,
    hotels: BTreeMap<Address, HotelInfo>,
    hotel_addresses: Vec<Address>,
}

impl HotelManager {
    /// Manager acting as `owner`, which pays for every transaction
    pub fn new(ctx: Arc<HotelContext>, wallet: Arc<dyn Wallet>, owner: Address) -> Self {
        Self {
            units: UnitReader::new(ctx.clone()),
            ctx,
            wallet,
            options: TxOptions::new(owner),
            hotels: BTreeMap::new(),
            hotel_addresses: Vec::new(),
        }
    }

    /// Override the transaction options (e.g. a fixed gas limit)
    pub fn with_options(mut self, options: TxOptions) -> Self {
        self.options = options;
        self
    }

    pub fn owner(&self) -> Address {
        self.options.from
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Fetch and cache the data of one hotel
    pub async fn get_hotel(&mut self, hotel: Address) -> Result<HotelInfo> {
        let info = self.load_hotel(hotel).await?;
        self.hotels.insert(hotel, info.clone());
        Ok(info)
    }

    /// Fetch every hotel registered to the owner, replacing the cache
    pub async fn get_hotels(&mut self) -> Result<BTreeMap<Address, HotelInfo>> {
        let listed = self
            .ctx
            .call_single(
                ContractKind::HotelIndex,
                self.ctx.index,
                "getHotelsByManager",
                vec![AbiValue::Address(self.owner())],
            )
            .await?;
        let mut addresses = Vec::new();
        for value in expect_array(&listed, "getHotelsByManager")? {
            let address = expect_address(value, "getHotelsByManager")?;
            if !address.is_zero() {
                addresses.push(address);
            }
        }

        self.hotels.clear();
        for address in &addresses {
            let info = self.load_hotel(*address).await?;
            self.hotels.insert(*address, info);
        }
        self.hotel_addresses = addresses;
        debug!("Loaded {} hotels of {}", self.hotels.len(), self.owner());
        Ok(self.hotels.clone())
    }

    pub async fn get_reservation(&self, unit: Address, day: DayIndex) -> Result<Reservation> {
        self.units.reservation(unit, day).await
    }

    /// Hotel data from the last `get_hotel`/`get_hotels`
    pub fn get_cached_hotel(&self, hotel: Address) -> Option<&HotelInfo> {
        self.hotels.get(&hotel)
    }

    pub fn get_cached_hotels(&self) -> &BTreeMap<Address, HotelInfo> {
        &self.hotels
    }

    /// Addresses found by the last `get_hotels`
    pub fn get_cached_hotels_addrs(&self) -> &[Address] {
        &self.hotel_addresses
    }

    async fn load_hotel(&self, hotel: Address) -> Result<HotelInfo> {
        let ctx = &self.ctx;
        let url = ctx.call_single(ContractKind::Hotel, hotel, "url", vec![]).await?;
        let manager = ctx.call_single(ContractKind::Hotel, hotel, "manager", vec![]).await?;
        let wait = ctx
            .call_single(ContractKind::Hotel, hotel, "waitConfirmation", vec![])
            .await?;

        let mut unit_types = BTreeMap::new();
        for name in self.unit_type_names(hotel).await? {
            let text = codec::bytes32_to_text(&name);
            if text.is_empty() {
                continue;
            }
            let address = self.unit_type_address(hotel, name).await?;
            unit_types.insert(text, address);
        }

        let listed = ctx.call_single(ContractKind::Hotel, hotel, "getUnits", vec![]).await?;
        let mut units = BTreeMap::new();
        for value in expect_array(&listed, "getUnits")? {
            let unit = expect_address(value, "getUnits")?;
            if !unit.is_zero() {
                units.insert(unit, self.units.info(unit).await?);
            }
        }

        Ok(HotelInfo {
            address: hotel,
            url: expect_string(&url, "url")?,
            manager: expect_address(&manager, "manager")?,
            wait_confirmation: expect_bool(&wait, "waitConfirmation")?,
            unit_types,
            units,
        })
    }

    async fn unit_type_names(&self, hotel: Address) -> Result<Vec<Vec<u8>>> {
        let names = self
            .ctx
            .call_single(ContractKind::Hotel, hotel, "getUnitTypeNames", vec![])
            .await?;
        expect_array(&names, "getUnitTypeNames")?
            .iter()
            .map(|name| expect_fixed_bytes(name, "getUnitTypeNames").map(<[u8]>::to_vec))
            .collect()
    }

    async fn unit_type_address(&self, hotel: Address, name: Vec<u8>) -> Result<Address> {
        let value = self
            .ctx
            .call_single(ContractKind::Hotel, hotel, "getUnitType", vec![AbiValue::FixedBytes(name)])
            .await?;
        expect_address(&value, "getUnitType")
    }

    // ========================================================================
    // SUBMISSION HELPERS
    // ========================================================================

    async fn index_call(&self, method: &str, args: Vec<AbiValue>) -> Result<TxHash> {
        let payload = self
            .ctx
            .payload(ContractKind::HotelIndex, self.ctx.index, method, args)?;
        self.ctx.submit(self.wallet.as_ref(), &self.options, &payload).await
    }

    async fn hotel_call(&self, hotel: Address, method: &str, args: Vec<AbiValue>) -> Result<TxHash> {
        let inner = self.ctx.payload(ContractKind::Hotel, hotel, method, args)?;
        self.forward(&inner).await
    }

    async fn unit_call(
        &self,
        hotel: Address,
        unit: Address,
        method: &str,
        args: Vec<AbiValue>,
    ) -> Result<TxHash> {
        let inner = self.ctx.payload(ContractKind::Unit, unit, method, args)?;
        let hotel_level = self.ctx.builder.wrap_unit_call(hotel, &inner)?;
        self.forward(&hotel_level).await
    }

    async fn unit_type_call(
        &self,
        hotel: Address,
        unit_type: &str,
        method: &str,
        args: Vec<AbiValue>,
    ) -> Result<TxHash> {
        let name = codec::text_to_bytes32(unit_type)?;
        let address = self.unit_type_address(hotel, name.clone()).await?;
        if address.is_zero() {
            return Err(ClientError::not_found(format!(
                "hotel {} has no unit type {}",
                hotel, unit_type
            )));
        }
        let inner = self.ctx.payload(ContractKind::UnitType, address, method, args)?;
        let hotel_level = self.ctx.builder.wrap_unit_type_call(hotel, name, &inner)?;
        self.forward(&hotel_level).await
    }

    async fn forward(&self, hotel_level: &CallPayload) -> Result<TxHash> {
        self.ctx
            .execute_on_hotel(self.wallet.as_ref(), &self.options, hotel_level)
            .await
    }

    // ========================================================================
    // HOTELS
    // ========================================================================

    /// Register a new hotel on the index
    pub async fn create_hotel(&self, url: &str) -> Result<TxHash> {
        if url.is_empty() {
            return Err(ClientError::validation("hotel url is required"));
        }
        let hash = self
            .index_call("registerHotel", vec![AbiValue::String(url.to_string())])
            .await?;
        info!("🏨 Hotel registration sent by {}", self.owner());
        Ok(hash)
    }

    pub async fn remove_hotel(&self, hotel: Address) -> Result<TxHash> {
        self.index_call("deleteHotel", vec![AbiValue::Address(hotel)]).await
    }

    /// Whether bookings at `hotel` wait for the manager's confirmation
    pub async fn set_require_confirmation(&self, hotel: Address, required: bool) -> Result<TxHash> {
        self.hotel_call(hotel, "changeConfirmation", vec![AbiValue::Bool(required)])
            .await
    }

    pub async fn change_hotel_info(&self, hotel: Address, url: &str) -> Result<TxHash> {
        self.hotel_call(hotel, "editInfo", vec![AbiValue::String(url.to_string())])
            .await
    }

    pub async fn change_hotel_address(
        &self,
        hotel: Address,
        line_one: &str,
        line_two: &str,
        zip_code: &str,
        country: &str,
    ) -> Result<TxHash> {
        let country = codec::country_code_to_bytes(country)?;
        self.hotel_call(
            hotel,
            "editAddress",
            vec![
                AbiValue::String(line_one.to_string()),
                AbiValue::String(line_two.to_string()),
                AbiValue::String(zip_code.to_string()),
                AbiValue::FixedBytes(country),
            ],
        )
        .await
    }

    pub async fn change_hotel_location(
        &self,
        hotel: Address,
        timezone: u32,
        latitude: f64,
        longitude: f64,
    ) -> Result<TxHash> {
        let (long, lat) = codec::location_to_uint(longitude, latitude)?;
        self.hotel_call(
            hotel,
            "editLocation",
            vec![AbiValue::Uint(timezone.into()), AbiValue::Uint(long), AbiValue::Uint(lat)],
        )
        .await
    }

    pub async fn add_image_hotel(&self, hotel: Address, url: &str) -> Result<TxHash> {
        self.hotel_call(hotel, "addImage", vec![AbiValue::String(url.to_string())])
            .await
    }

    pub async fn remove_image_hotel(&self, hotel: Address, image_index: u32) -> Result<TxHash> {
        self.hotel_call(hotel, "removeImage", vec![AbiValue::Uint(image_index.into())])
            .await
    }

    /// Confirm a pending booking request by its `dataHash`
    pub async fn confirm_booking(&self, hotel: Address, data_hash: &str) -> Result<TxHash> {
        let key = codec::parse_bytes32(data_hash)?;
        self.hotel_call(hotel, "continueCall", vec![AbiValue::FixedBytes(key)])
            .await
    }

    // ========================================================================
    // UNIT TYPES
    // ========================================================================

    /// Attach an already deployed unit type contract to `hotel`
    pub async fn add_unit_type(&self, hotel: Address, unit_type: Address) -> Result<TxHash> {
        self.hotel_call(hotel, "addUnitType", vec![AbiValue::Address(unit_type)])
            .await
    }

    pub async fn remove_unit_type(&self, hotel: Address, unit_type: &str) -> Result<TxHash> {
        let name = codec::text_to_bytes32(unit_type)?;
        let position = self
            .unit_type_names(hotel)
            .await?
            .iter()
            .position(|candidate| *candidate == name)
            .ok_or_else(|| {
                ClientError::not_found(format!("hotel {} has no unit type {}", hotel, unit_type))
            })?;
        self.hotel_call(
            hotel,
            "removeUnitType",
            vec![AbiValue::FixedBytes(name), AbiValue::Uint(position as u128)],
        )
        .await
    }

    pub async fn edit_unit_type(
        &self,
        hotel: Address,
        unit_type: &str,
        description: &str,
        min_guests: u32,
        max_guests: u32,
        price: &str,
    ) -> Result<TxHash> {
        if min_guests > max_guests {
            return Err(ClientError::validation(format!(
                "min guests {} exceeds max guests {}",
                min_guests, max_guests
            )));
        }
        self.unit_type_call(
            hotel,
            unit_type,
            "edit",
            vec![
                AbiValue::String(description.to_string()),
                AbiValue::Uint(min_guests.into()),
                AbiValue::Uint(max_guests.into()),
                AbiValue::String(price.to_string()),
            ],
        )
        .await
    }

    pub async fn add_amenity(&self, hotel: Address, unit_type: &str, amenity: u32) -> Result<TxHash> {
        self.unit_type_call(hotel, unit_type, "addAmenity", vec![AbiValue::Uint(amenity.into())])
            .await
    }

    pub async fn remove_amenity(&self, hotel: Address, unit_type: &str, amenity: u32) -> Result<TxHash> {
        self.unit_type_call(hotel, unit_type, "removeAmenity", vec![AbiValue::Uint(amenity.into())])
            .await
    }

    pub async fn add_image_unit_type(&self, hotel: Address, unit_type: &str, url: &str) -> Result<TxHash> {
        self.unit_type_call(hotel, unit_type, "addImage", vec![AbiValue::String(url.to_string())])
            .await
    }

    pub async fn remove_image_unit_type(
        &self,
        hotel: Address,
        unit_type: &str,
        image_index: u32,
    ) -> Result<TxHash> {
        self.unit_type_call(hotel, unit_type, "removeImage", vec![AbiValue::Uint(image_index.into())])
            .await
    }

    // ========================================================================
    // UNITS
    // ========================================================================

    /// Attach an already deployed unit contract to `hotel`
    pub async fn add_unit(&self, hotel: Address, unit: Address) -> Result<TxHash> {
        self.hotel_call(hotel, "addUnit", vec![AbiValue::Address(unit)]).await
    }

    pub async fn remove_unit(&self, hotel: Address, unit: Address) -> Result<TxHash> {
        self.hotel_call(hotel, "removeUnit", vec![AbiValue::Address(unit)]).await
    }

    /// Inactive units cannot be booked
    pub async fn set_unit_active(&self, hotel: Address, unit: Address, active: bool) -> Result<TxHash> {
        self.unit_call(hotel, unit, "setActive", vec![AbiValue::Bool(active)]).await
    }

    pub async fn set_default_price(&self, hotel: Address, unit: Address, price: f64) -> Result<TxHash> {
        let price = codec::price_to_uint(price)?;
        self.unit_call(hotel, unit, "setDefaultPrice", vec![AbiValue::Uint(price)])
            .await
    }

    /// `price` in human token units, e.g. `"20.5"`
    pub async fn set_default_lif_price(&self, hotel: Address, unit: Address, price: &str) -> Result<TxHash> {
        let price = codec::token_to_base_units(price, self.ctx.config.token_decimals)?;
        self.unit_call(hotel, unit, "setDefaultLifPrice", vec![AbiValue::Uint(price)])
            .await
    }

    /// Switch the unit's domestic currency
    ///
    /// Special prices already stored for individual days keep their old
    /// amounts; they are not converted to the new currency.
    pub async fn set_currency_code(&self, hotel: Address, unit: Address, code: u16) -> Result<TxHash> {
        let code = codec::currency_code_to_bytes(code)?;
        self.unit_call(hotel, unit, "setCurrencyCode", vec![AbiValue::FixedBytes(code)])
            .await
    }

    /// Domestic price for `days_amount` nights, check-in on `from_date`
    pub async fn set_unit_special_price(
        &self,
        hotel: Address,
        unit: Address,
        price: f64,
        from_date: NaiveDate,
        days_amount: u32,
    ) -> Result<TxHash> {
        let price = codec::price_to_uint(price)?;
        let from_day = codec::date_to_day(from_date)?;
        self.unit_call(
            hotel,
            unit,
            "setSpecialPrice",
            vec![
                AbiValue::Uint(price),
                AbiValue::Uint(from_day.into()),
                AbiValue::Uint(days_amount.into()),
            ],
        )
        .await
    }

    /// Token price for `days_amount` nights, check-in on `from_date`
    pub async fn set_unit_special_lif_price(
        &self,
        hotel: Address,
        unit: Address,
        price: &str,
        from_date: NaiveDate,
        days_amount: u32,
    ) -> Result<TxHash> {
        let price = codec::token_to_base_units(price, self.ctx.config.token_decimals)?;
        let from_day = codec::date_to_day(from_date)?;
        self.unit_call(
            hotel,
            unit,
            "setSpecialLifPrice",
            vec![
                AbiValue::Uint(price),
                AbiValue::Uint(from_day.into()),
                AbiValue::Uint(days_amount.into()),
            ],
        )
        .await
    }
}
