//! Contract interface registry
//!
//! Declares the callable surface of each hotel contract kind: method names
//! with parameter kinds, plus the events they emit. Payload construction
//! validates against these declarations before anything reaches the ledger,
//! and logs are checked against them before they are decoded.

use std::collections::HashMap;
use std::fmt;

use crate::abi::{self, ParamKind};
use crate::error::{ClientError, Result};
use crate::rpc::RawEvent;

/// The four contract kinds the client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    /// Directory of hotels; entry point for registration and forwarding
    HotelIndex,
    Hotel,
    UnitType,
    Unit,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractKind::HotelIndex => "HotelIndex",
            ContractKind::Hotel => "Hotel",
            ContractKind::UnitType => "UnitType",
            ContractKind::Unit => "Unit",
        };
        f.write_str(name)
    }
}

/// A declared method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSchema {
    pub name: String,
    pub params: Vec<ParamKind>,
    /// Canonical signature, used for the selector
    pub signature: String,
}

impl MethodSchema {
    pub fn new(name: impl Into<String>, params: &[ParamKind]) -> Self {
        let name = name.into();
        let signature = abi::signature(&name, params);
        Self {
            name,
            params: params.to_vec(),
            signature,
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        abi::selector(&self.signature)
    }
}

/// A declared event with its named fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSchema {
    pub name: String,
    pub fields: Vec<(String, ParamKind)>,
}

impl EventSchema {
    /// Check a raw log against this declaration
    ///
    /// Every declared field must be present with the declared kind; extra
    /// fields from the transport are ignored.
    pub fn validate(&self, event: &RawEvent) -> Result<()> {
        if event.event != self.name {
            return Err(ClientError::decode(format!(
                "expected {} event, got {}",
                self.name, event.event
            )));
        }
        for (field, kind) in &self.fields {
            match event.field(field) {
                Some(value) if value.matches(kind) => {}
                Some(_) => {
                    return Err(ClientError::decode(format!(
                        "{}.{} in {} is not {}",
                        self.name, field, event.log_id, kind
                    )))
                }
                None => {
                    return Err(ClientError::decode(format!(
                        "{} event {} has no field {}",
                        self.name, event.log_id, field
                    )))
                }
            }
        }
        Ok(())
    }
}

/// Methods and events of one contract kind
#[derive(Debug, Clone)]
pub struct ContractInterface {
    pub kind: ContractKind,
    methods: HashMap<String, MethodSchema>,
    events: HashMap<String, EventSchema>,
}

impl ContractInterface {
    pub fn new(kind: ContractKind) -> Self {
        Self {
            kind,
            methods: HashMap::new(),
            events: HashMap::new(),
        }
    }

    /// Declare a method (builder style)
    pub fn method(mut self, name: &str, params: &[ParamKind]) -> Self {
        self.methods.insert(name.to_string(), MethodSchema::new(name, params));
        self
    }

    /// Declare an event (builder style)
    pub fn event(mut self, name: &str, fields: &[(&str, ParamKind)]) -> Self {
        let fields = fields
            .iter()
            .map(|(field, kind)| (field.to_string(), kind.clone()))
            .collect();
        self.events.insert(
            name.to_string(),
            EventSchema {
                name: name.to_string(),
                fields,
            },
        );
        self
    }

    pub fn get_method(&self, name: &str) -> Option<&MethodSchema> {
        self.methods.get(name)
    }

    pub fn get_event(&self, name: &str) -> Option<&EventSchema> {
        self.events.get(name)
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

/// Interfaces keyed by contract kind
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    interfaces: HashMap<ContractKind, ContractInterface>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an interface
    pub fn register(&mut self, interface: ContractInterface) {
        self.interfaces.insert(interface.kind, interface);
    }

    pub fn get(&self, kind: ContractKind) -> Option<&ContractInterface> {
        self.interfaces.get(&kind)
    }

    pub fn method(&self, kind: ContractKind, name: &str) -> Option<&MethodSchema> {
        self.get(kind).and_then(|i| i.get_method(name))
    }

    pub fn event(&self, kind: ContractKind, name: &str) -> Option<&EventSchema> {
        self.get(kind).and_then(|i| i.get_event(name))
    }

    /// The hotel contract suite
    pub fn standard() -> Self {
        use ParamKind::*;

        let mut registry = Self::new();

        registry.register(
            ContractInterface::new(ContractKind::HotelIndex)
                .method("registerHotel", &[String])
                .method("deleteHotel", &[Address])
                .method("callHotel", &[Address, Bytes])
                .method("getHotels", &[])
                .method("getHotelsByManager", &[Address]),
        );

        registry.register(
            ContractInterface::new(ContractKind::Hotel)
                .method("url", &[])
                .method("manager", &[])
                .method("waitConfirmation", &[])
                .method("editInfo", &[String])
                .method("changeConfirmation", &[Bool])
                .method("editAddress", &[String, String, String, FixedBytes(2)])
                .method("editLocation", &[Uint, Uint, Uint])
                .method("addImage", &[String])
                .method("removeImage", &[Uint])
                .method("continueCall", &[FixedBytes(32)])
                .method("addUnitType", &[Address])
                .method("removeUnitType", &[FixedBytes(32), Uint])
                .method("getUnitTypeNames", &[])
                .method("getUnitType", &[FixedBytes(32)])
                .method("callUnitType", &[FixedBytes(32), Bytes])
                .method("addUnit", &[Address])
                .method("removeUnit", &[Address])
                .method("callUnit", &[Address, Bytes])
                .method("getUnits", &[])
                .event(
                    "Book",
                    &[("from", Address), ("unit", Address), ("fromDay", Uint), ("daysAmount", Uint)],
                )
                .event("CallStarted", &[("from", Address), ("dataHash", FixedBytes(32))])
                .event("CallFinish", &[("from", Address), ("dataHash", FixedBytes(32))]),
        );

        registry.register(
            ContractInterface::new(ContractKind::UnitType)
                .method("edit", &[String, Uint, Uint, String])
                .method("addAmenity", &[Uint])
                .method("removeAmenity", &[Uint])
                .method("addImage", &[String])
                .method("removeImage", &[Uint]),
        );

        registry.register(
            ContractInterface::new(ContractKind::Unit)
                .method("active", &[])
                .method("unitType", &[])
                .method("defaultPrice", &[])
                .method("defaultLifPrice", &[])
                .method("currencyCode", &[])
                .method("setActive", &[Bool])
                .method("setDefaultPrice", &[Uint])
                .method("setDefaultLifPrice", &[Uint])
                .method("setCurrencyCode", &[FixedBytes(2)])
                .method("setSpecialPrice", &[Uint, Uint, Uint])
                .method("setSpecialLifPrice", &[Uint, Uint, Uint])
                .method("getReservation", &[Uint])
                .method("getCost", &[Uint, Uint])
                .method("getLifCost", &[Uint, Uint]),
        );

        registry
    }
}
