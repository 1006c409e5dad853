//! Value Codec
//!
//! Pure conversions between the integer encodings stored by the hotel
//! contracts and domain values. No state, no I/O.
//!
//! | domain value            | on-chain encoding                          |
//! |-------------------------|--------------------------------------------|
//! | domestic price `200.00` | `uint256` cents (`20000`)                  |
//! | token amount `"0.5"`    | `uint256` base units (`decimals` places)   |
//! | calendar date           | `uint256` whole UTC days since 1970-01-01  |
//! | latitude / longitude    | `uint256` offset by +90 / +180, scaled 1e6 |
//! | unit type name          | `bytes32`, right-padded UTF-8              |
//! | country / currency code | `bytes2`                                   |

use chrono::{Days, NaiveDate};
use lib_types::DayIndex;

use crate::error::{ClientError, Result};

/// Domestic prices carry two decimal places
pub const PRICE_SCALE: f64 = 100.0;

/// Geocoordinates carry six decimal places
pub const LOCATION_SCALE: f64 = 1_000_000.0;

/// Largest supported number of token decimals (10^38 still fits in u128)
pub const MAX_TOKEN_DECIMALS: u32 = 38;

// ============================================================================
// PRICES
// ============================================================================

/// Convert a domestic price to its integer encoding, rounding to cents
pub fn price_to_uint(price: f64) -> Result<u128> {
    if !price.is_finite() || price < 0.0 {
        return Err(ClientError::validation(format!("invalid price: {}", price)));
    }
    let scaled = (price * PRICE_SCALE).round();
    if scaled > u128::MAX as f64 {
        return Err(ClientError::validation(format!("price out of range: {}", price)));
    }
    Ok(scaled as u128)
}

/// Convert an integer-encoded price back to its decimal value
pub fn uint_to_price(value: u128) -> f64 {
    value as f64 / PRICE_SCALE
}

// ============================================================================
// TOKEN AMOUNTS
// ============================================================================

fn decimals_factor(decimals: u32) -> Result<u128> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(ClientError::validation(format!(
            "token decimals {} exceed {}",
            decimals, MAX_TOKEN_DECIMALS
        )));
    }
    Ok(10u128.pow(decimals))
}

/// Parse a human token amount such as `"20"` or `"0.5"` into base units
///
/// Exact decimal arithmetic; more fractional digits than `decimals` is an
/// error rather than a silent truncation.
pub fn token_to_base_units(amount: &str, decimals: u32) -> Result<u128> {
    let factor = decimals_factor(decimals)?;
    let amount = amount.trim();
    let invalid = || ClientError::validation(format!("invalid token amount: {:?}", amount));

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > decimals as usize {
        return Err(ClientError::validation(format!(
            "token amount {:?} has more than {} decimal places",
            amount, decimals
        )));
    }

    let whole_units: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let fraction_units: u128 = if fraction.is_empty() {
        0
    } else {
        let padding = 10u128.pow(decimals - fraction.len() as u32);
        fraction
            .parse::<u128>()
            .map_err(|_| invalid())?
            .checked_mul(padding)
            .ok_or_else(invalid)?
    };

    whole_units
        .checked_mul(factor)
        .and_then(|v| v.checked_add(fraction_units))
        .ok_or_else(invalid)
}

/// Render base units as a human token amount, trimming trailing zeros
pub fn base_units_to_token(value: u128, decimals: u32) -> Result<String> {
    let factor = decimals_factor(decimals)?;
    let whole = value / factor;
    let fraction = value % factor;
    if fraction == 0 {
        return Ok(whole.to_string());
    }
    let digits = format!("{:0width$}", fraction, width = decimals as usize);
    Ok(format!("{}.{}", whole, digits.trim_end_matches('0')))
}

// ============================================================================
// CALENDAR DAYS
// ============================================================================

fn epoch() -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(|| ClientError::validation("epoch unavailable"))
}

/// Whole UTC days between 1970-01-01 and `date`
pub fn date_to_day(date: NaiveDate) -> Result<DayIndex> {
    let days = date.signed_duration_since(epoch()?).num_days();
    DayIndex::try_from(days)
        .map_err(|_| ClientError::validation(format!("date {} is outside the supported range", date)))
}

/// Calendar date of a day index
pub fn day_to_date(day: DayIndex) -> Result<NaiveDate> {
    epoch()?
        .checked_add_days(Days::new(u64::from(day)))
        .ok_or_else(|| ClientError::validation(format!("day index {} is out of range", day)))
}

// ============================================================================
// GEOCOORDINATES
// ============================================================================

/// Encode `(longitude, latitude)` as offset integers `(long, lat)`
pub fn location_to_uint(longitude: f64, latitude: f64) -> Result<(u128, u128)> {
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ClientError::validation(format!("longitude out of range: {}", longitude)));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ClientError::validation(format!("latitude out of range: {}", latitude)));
    }
    let long = ((longitude + 180.0) * LOCATION_SCALE).round() as u128;
    let lat = ((latitude + 90.0) * LOCATION_SCALE).round() as u128;
    Ok((long, lat))
}

/// Decode offset integers back into `(longitude, latitude)`
pub fn location_from_uint(long: u128, lat: u128) -> (f64, f64) {
    let round6 = |v: f64| (v * LOCATION_SCALE).round() / LOCATION_SCALE;
    let longitude = round6(long as f64 / LOCATION_SCALE - 180.0);
    let latitude = round6(lat as f64 / LOCATION_SCALE - 90.0);
    (longitude, latitude)
}

// ============================================================================
// SHORT TEXT AND CODES
// ============================================================================

/// Right-pad a short identifier such as `BASIC_ROOM` into `bytes32`
pub fn text_to_bytes32(text: &str) -> Result<Vec<u8>> {
    if text.is_empty() || text.len() > 32 {
        return Err(ClientError::validation(format!(
            "{:?} must be between 1 and 32 bytes",
            text
        )));
    }
    let mut out = text.as_bytes().to_vec();
    out.resize(32, 0);
    Ok(out)
}

/// Inverse of [`text_to_bytes32`]; trailing zero bytes are dropped
pub fn bytes32_to_text(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|b| *b != 0).map(|i| i + 1).unwrap_or(0);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Parse a `0x`-prefixed 32-byte hex value (booking correlation keys)
pub fn parse_bytes32(input: &str) -> Result<Vec<u8>> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    let bytes = hex::decode(stripped)
        .map_err(|e| ClientError::validation(format!("invalid bytes32 {:?}: {}", input, e)))?;
    if bytes.len() != 32 {
        return Err(ClientError::validation(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Two-letter country code to `bytes2`
///
/// Only the format is checked here; membership in the ISO table is the
/// caller's concern.
pub fn country_code_to_bytes(code: &str) -> Result<Vec<u8>> {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ClientError::validation(format!("invalid country code: {:?}", code)));
    }
    Ok(code.to_ascii_uppercase().into_bytes())
}

/// Numeric currency code (1..=999) to big-endian `bytes2`
pub fn currency_code_to_bytes(code: u16) -> Result<Vec<u8>> {
    if !(1..=999).contains(&code) {
        return Err(ClientError::validation(format!("invalid currency code: {}", code)));
    }
    Ok(code.to_be_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_round_trip_two_decimals() {
        for price in [0.0, 0.01, 1.5, 99.99, 200.0, 1234.56] {
            let encoded = price_to_uint(price).unwrap();
            let decoded = uint_to_price(encoded);
            assert_eq!((decoded * 100.0).round(), (price * 100.0_f64).round());
        }
        assert_eq!(price_to_uint(200.0).unwrap(), 20_000);
        assert_eq!(price_to_uint(12.344).unwrap(), 1234);
    }

    #[test]
    fn test_price_rejects_invalid() {
        assert!(matches!(price_to_uint(-1.0), Err(ClientError::Validation(_))));
        assert!(matches!(price_to_uint(f64::NAN), Err(ClientError::Validation(_))));
    }

    #[test]
    fn test_token_units() {
        assert_eq!(token_to_base_units("20", 18).unwrap(), 20 * 10u128.pow(18));
        assert_eq!(token_to_base_units("0.5", 18).unwrap(), 5 * 10u128.pow(17));
        assert_eq!(token_to_base_units(".25", 2).unwrap(), 25);
        assert_eq!(base_units_to_token(5 * 10u128.pow(17), 18).unwrap(), "0.5");
        assert_eq!(base_units_to_token(20 * 10u128.pow(18), 18).unwrap(), "20");
        assert_eq!(base_units_to_token(1, 18).unwrap(), "0.000000000000000001");
    }

    #[test]
    fn test_token_units_reject_bad_input() {
        assert!(token_to_base_units("", 18).is_err());
        assert!(token_to_base_units("1.2.3", 18).is_err());
        assert!(token_to_base_units("-1", 18).is_err());
        assert!(token_to_base_units("0.001", 2).is_err());
        assert!(token_to_base_units("1", 39).is_err());
    }

    #[test]
    fn test_days() {
        let date = NaiveDate::from_ymd_opt(2020, 10, 10).unwrap();
        let day = date_to_day(date).unwrap();
        assert_eq!(day, 18_545);
        assert_eq!(day_to_date(day).unwrap(), date);
        assert_eq!(day_to_date(0).unwrap(), NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());

        let before_epoch = NaiveDate::from_ymd_opt(1969, 12, 31).unwrap();
        assert!(date_to_day(before_epoch).is_err());
    }

    #[test]
    fn test_location() {
        let (long, lat) = location_to_uint(40.426371, -3.703578).unwrap();
        assert_eq!(long, 220_426_371);
        assert_eq!(lat, 86_296_422);

        let (longitude, latitude) = location_from_uint(long, lat);
        assert_eq!(longitude, 40.426371);
        assert_eq!(latitude, -3.703578);

        assert!(location_to_uint(181.0, 0.0).is_err());
        assert!(location_to_uint(0.0, -91.0).is_err());
    }

    #[test]
    fn test_bytes32_text() {
        let encoded = text_to_bytes32("BASIC_ROOM").unwrap();
        assert_eq!(encoded.len(), 32);
        assert_eq!(bytes32_to_text(&encoded), "BASIC_ROOM");
        assert!(text_to_bytes32("").is_err());
        assert!(text_to_bytes32(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_codes() {
        assert_eq!(country_code_to_bytes("es").unwrap(), b"ES".to_vec());
        assert!(country_code_to_bytes("ESP").is_err());
        assert_eq!(currency_code_to_bytes(978).unwrap(), vec![0x03, 0xd2]);
        assert!(currency_code_to_bytes(0).is_err());
        assert!(currency_code_to_bytes(1000).is_err());
    }

    #[test]
    fn test_parse_bytes32() {
        let key = format!("0x{}", "ab".repeat(32));
        assert_eq!(parse_bytes32(&key).unwrap(), vec![0xab; 32]);
        assert!(parse_bytes32("0x1234").is_err());
    }
}
