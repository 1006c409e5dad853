//! Call payload construction
//!
//! A `CallPayload` is an encoded method call aimed at one contract. The
//! builder checks method name, arity and argument kinds against the
//! registry so malformed calls fail locally with `ClientError::Validation`.
//!
//! Hotel mutations are never sent to the hotel directly; they are wrapped
//! and forwarded through the contract that owns it:
//!
//! ```text
//! HotelIndex.callHotel(hotel, Hotel.<method>(...))
//! HotelIndex.callHotel(hotel, Hotel.callUnit(unit, Unit.<method>(...)))
//! HotelIndex.callHotel(hotel, Hotel.callUnitType(name, UnitType.<method>(...)))
//! ```

use std::sync::Arc;

use lib_types::Address;

use crate::abi::{self, AbiValue};
use crate::error::{ClientError, Result};
use crate::registry::{ContractKind, ContractRegistry};

/// An encoded call, immutable after construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPayload {
    /// Contract receiving the call
    pub to: Address,
    /// Kind of the receiving contract
    pub kind: ContractKind,
    /// Method name in the callee
    pub method: String,
    /// Canonical signature
    pub signature: String,
    /// Arguments as given
    pub args: Vec<AbiValue>,
    /// Selector plus encoded arguments
    pub data: Vec<u8>,
}

impl CallPayload {
    /// Encoded call data as a single `bytes` argument, for forwarding
    pub fn as_forwarded(&self) -> AbiValue {
        AbiValue::Bytes(self.data.clone())
    }
}

/// Validating payload builder
#[derive(Debug, Clone)]
pub struct CallPayloadBuilder {
    registry: Arc<ContractRegistry>,
}

impl CallPayloadBuilder {
    pub fn new(registry: Arc<ContractRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ContractRegistry> {
        &self.registry
    }

    /// Build and encode a call to `method` on the contract at `to`
    pub fn build(
        &self,
        kind: ContractKind,
        to: Address,
        method: &str,
        args: Vec<AbiValue>,
    ) -> Result<CallPayload> {
        let schema = self.registry.method(kind, method).ok_or_else(|| {
            ClientError::validation(format!("{} has no method {}", kind, method))
        })?;

        if schema.params.len() != args.len() {
            return Err(ClientError::validation(format!(
                "{} expects {} arguments, got {}",
                schema.signature,
                schema.params.len(),
                args.len()
            )));
        }
        for (position, (arg, kind)) in args.iter().zip(&schema.params).enumerate() {
            if !arg.matches(kind) {
                return Err(ClientError::validation(format!(
                    "{} argument {} must be {}",
                    schema.signature, position, kind
                )));
            }
        }

        let data = abi::encode_call(&schema.signature, &args);
        Ok(CallPayload {
            to,
            kind,
            method: method.to_string(),
            signature: schema.signature.clone(),
            args,
            data,
        })
    }

    /// `HotelIndex.callHotel(hotel, inner)`
    pub fn wrap_hotel_call(&self, index: Address, inner: &CallPayload) -> Result<CallPayload> {
        self.expect_kind(inner, ContractKind::Hotel)?;
        self.build(
            ContractKind::HotelIndex,
            index,
            "callHotel",
            vec![AbiValue::Address(inner.to), inner.as_forwarded()],
        )
    }

    /// `Hotel.callUnit(unit, inner)`
    pub fn wrap_unit_call(&self, hotel: Address, inner: &CallPayload) -> Result<CallPayload> {
        self.expect_kind(inner, ContractKind::Unit)?;
        self.build(
            ContractKind::Hotel,
            hotel,
            "callUnit",
            vec![AbiValue::Address(inner.to), inner.as_forwarded()],
        )
    }

    /// `Hotel.callUnitType(name, inner)`; `type_name` is the `bytes32` name
    pub fn wrap_unit_type_call(
        &self,
        hotel: Address,
        type_name: Vec<u8>,
        inner: &CallPayload,
    ) -> Result<CallPayload> {
        self.expect_kind(inner, ContractKind::UnitType)?;
        self.build(
            ContractKind::Hotel,
            hotel,
            "callUnitType",
            vec![AbiValue::FixedBytes(type_name), inner.as_forwarded()],
        )
    }

    fn expect_kind(&self, inner: &CallPayload, kind: ContractKind) -> Result<()> {
        if inner.kind != kind {
            return Err(ClientError::validation(format!(
                "cannot forward a {} call as a {} call",
                inner.kind, kind
            )));
        }
        Ok(())
    }
}

impl Default for CallPayloadBuilder {
    fn default() -> Self {
        Self::new(Arc::new(ContractRegistry::standard()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> CallPayloadBuilder {
        CallPayloadBuilder::default()
    }

    #[test]
    fn test_build_encodes_selector() {
        let hotel = Address::from_low_u64(7);
        let payload = builder()
            .build(ContractKind::Hotel, hotel, "changeConfirmation", vec![AbiValue::Bool(true)])
            .unwrap();
        assert_eq!(payload.signature, "changeConfirmation(bool)");
        assert_eq!(&payload.data[..4], &abi::selector("changeConfirmation(bool)"));
        assert_eq!(payload.data.len(), 36);
        assert_eq!(payload.to, hotel);
    }

    #[test]
    fn test_build_rejects_unknown_method() {
        let err = builder()
            .build(ContractKind::Unit, Address::from_low_u64(1), "selfDestruct", vec![])
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_build_rejects_bad_arity_and_kind() {
        let b = builder();
        let to = Address::from_low_u64(1);
        assert!(matches!(
            b.build(ContractKind::Unit, to, "setActive", vec![]),
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            b.build(ContractKind::Unit, to, "setActive", vec![AbiValue::Uint(1)]),
            Err(ClientError::Validation(_))
        ));
    }

    #[test]
    fn test_wrap_unit_call_through_index() {
        let b = builder();
        let index = Address::from_low_u64(1);
        let hotel = Address::from_low_u64(2);
        let unit = Address::from_low_u64(3);

        let inner = b
            .build(ContractKind::Unit, unit, "setDefaultPrice", vec![AbiValue::Uint(20_000)])
            .unwrap();
        let via_hotel = b.wrap_unit_call(hotel, &inner).unwrap();
        let via_index = b.wrap_hotel_call(index, &via_hotel).unwrap();

        assert_eq!(via_index.to, index);
        assert_eq!(via_index.method, "callHotel");
        assert_eq!(via_index.args[0], AbiValue::Address(hotel));
        assert_eq!(via_index.args[1], AbiValue::Bytes(via_hotel.data.clone()));
    }

    #[test]
    fn test_wrap_rejects_wrong_kind() {
        let b = builder();
        let inner = b
            .build(ContractKind::Hotel, Address::from_low_u64(2), "url", vec![])
            .unwrap();
        assert!(b.wrap_unit_call(Address::from_low_u64(2), &inner).is_err());
    }
}
