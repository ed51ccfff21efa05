//! Event schemas for the two oracle contract families.
//!
//! A schema maps an event selector (the hashed event name) to an ordered,
//! typed field list. The built-in constructors cover the known deployments;
//! [`ContractSchema::from_abi_json`] builds the same shape from the ABI
//! document a class-introspection call returns, so newer generations that
//! add fields (the on-chain request id) decode without a code change.

use crate::primitives::{
    keccak256,
    Felt,
    U256,
};

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

/// Hash an event or entrypoint name to its felt-valued selector: keccak-256
/// masked to the low 250 bits.
pub fn name_selector(name: &str) -> Felt {
    let hash = U256::from_be_bytes(keccak256(name.as_bytes()).0);
    hash & ((U256::from(1u8) << 250) - U256::from(1u8))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFamily {
    /// request / propose / dispute / settle.
    Request,
    /// made / disputed / settled.
    Assertion,
}

/// The closed set of event kinds the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RequestPrice,
    ProposePrice,
    DisputePrice,
    Settle,
    AssertionMade,
    AssertionDisputed,
    AssertionSettled,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestPrice => "RequestPrice",
            Self::ProposePrice => "ProposePrice",
            Self::DisputePrice => "DisputePrice",
            Self::Settle => "Settle",
            Self::AssertionMade => "AssertionMade",
            Self::AssertionDisputed => "AssertionDisputed",
            Self::AssertionSettled => "AssertionSettled",
        }
    }

    pub fn family(&self) -> EventFamily {
        match self {
            Self::RequestPrice | Self::ProposePrice | Self::DisputePrice | Self::Settle => {
                EventFamily::Request
            }
            Self::AssertionMade | Self::AssertionDisputed | Self::AssertionSettled => {
                EventFamily::Assertion
            }
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "RequestPrice" => Some(Self::RequestPrice),
            "ProposePrice" => Some(Self::ProposePrice),
            "DisputePrice" => Some(Self::DisputePrice),
            "Settle" => Some(Self::Settle),
            "AssertionMade" => Some(Self::AssertionMade),
            "AssertionDisputed" => Some(Self::AssertionDisputed),
            "AssertionSettled" => Some(Self::AssertionSettled),
            _ => None,
        }
    }
}

/// Wire type of a single event field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One word: contract address.
    Address,
    /// One word: opaque felt (identifiers, domain ids, request ids).
    Felt,
    /// One word constrained to u64 range (timestamps).
    U64,
    /// Two words: low/high 128-bit limbs.
    U256,
    /// Three words: sign flag plus u256 magnitude.
    Int256,
    /// Variable: full-word count, full words, pending word, pending length.
    ByteString,
    /// One word constrained to 0 or 1.
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    /// Indexed fields live in the record's key words, after the selector.
    pub indexed: bool,
}

impl Field {
    fn new(name: &str, kind: FieldKind, indexed: bool) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            indexed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    pub kind: EventKind,
    pub selector: Felt,
    pub fields: Vec<Field>,
}

impl EventDescriptor {
    fn new(kind: EventKind, fields: Vec<Field>) -> Self {
        Self {
            kind,
            selector: name_selector(kind.name()),
            fields,
        }
    }
}

/// The event surface of one oracle contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSchema {
    pub family: EventFamily,
    events: HashMap<Felt, EventDescriptor>,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("abi document is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported field type `{ty}` on event {event}")]
    UnsupportedType { event: String, ty: String },
    #[error("abi declares events from both oracle families")]
    MixedFamilies,
    #[error("abi declares no known oracle events")]
    NoKnownEvents,
}

impl ContractSchema {
    /// Schema for the request/propose/dispute/settle family.
    /// `with_request_id` selects the newer contract generation whose
    /// events all carry the on-chain request id as their last field.
    pub fn request_family(with_request_id: bool) -> Self {
        let mut events = vec![
            (
                EventKind::RequestPrice,
                vec![
                    Field::new("requester", FieldKind::Address, true),
                    Field::new("identifier", FieldKind::Felt, false),
                    Field::new("timestamp", FieldKind::U64, false),
                    Field::new("ancillary_data", FieldKind::ByteString, false),
                    Field::new("currency", FieldKind::Address, false),
                    Field::new("reward", FieldKind::U256, false),
                    Field::new("final_fee", FieldKind::U256, false),
                ],
            ),
            (
                EventKind::ProposePrice,
                vec![
                    Field::new("requester", FieldKind::Address, true),
                    Field::new("proposer", FieldKind::Address, false),
                    Field::new("identifier", FieldKind::Felt, false),
                    Field::new("timestamp", FieldKind::U64, false),
                    Field::new("ancillary_data", FieldKind::ByteString, false),
                    Field::new("proposed_price", FieldKind::Int256, false),
                    Field::new("expiration_timestamp", FieldKind::U64, false),
                    Field::new("currency", FieldKind::Address, false),
                ],
            ),
            (
                EventKind::DisputePrice,
                vec![
                    Field::new("requester", FieldKind::Address, true),
                    Field::new("proposer", FieldKind::Address, false),
                    Field::new("disputer", FieldKind::Address, false),
                    Field::new("identifier", FieldKind::Felt, false),
                    Field::new("timestamp", FieldKind::U64, false),
                    Field::new("ancillary_data", FieldKind::ByteString, false),
                    Field::new("proposed_price", FieldKind::Int256, false),
                ],
            ),
            (
                EventKind::Settle,
                vec![
                    Field::new("requester", FieldKind::Address, true),
                    Field::new("proposer", FieldKind::Address, false),
                    Field::new("disputer", FieldKind::Address, false),
                    Field::new("identifier", FieldKind::Felt, false),
                    Field::new("timestamp", FieldKind::U64, false),
                    Field::new("ancillary_data", FieldKind::ByteString, false),
                    Field::new("price", FieldKind::Int256, false),
                    Field::new("payout", FieldKind::U256, false),
                ],
            ),
        ];
        if with_request_id {
            for (_, fields) in &mut events {
                fields.push(Field::new("request_id", FieldKind::Felt, false));
            }
        }

        let events = events
            .into_iter()
            .map(|(kind, fields)| EventDescriptor::new(kind, fields))
            .collect();
        Self::from_descriptors(EventFamily::Request, events)
    }

    /// Schema for the assertion made/disputed/settled family.
    pub fn assertion_family() -> Self {
        let events = vec![
            EventDescriptor::new(
                EventKind::AssertionMade,
                vec![
                    Field::new("assertion_id", FieldKind::Felt, true),
                    Field::new("domain_id", FieldKind::Felt, false),
                    Field::new("claim", FieldKind::ByteString, false),
                    Field::new("asserter", FieldKind::Address, false),
                    Field::new("callback_recipient", FieldKind::Address, false),
                    Field::new("escalation_manager", FieldKind::Address, false),
                    Field::new("caller", FieldKind::Address, false),
                    Field::new("expiration_timestamp", FieldKind::U64, false),
                    Field::new("currency", FieldKind::Address, false),
                    Field::new("bond", FieldKind::U256, false),
                    Field::new("identifier", FieldKind::Felt, false),
                ],
            ),
            EventDescriptor::new(
                EventKind::AssertionDisputed,
                vec![
                    Field::new("assertion_id", FieldKind::Felt, true),
                    Field::new("caller", FieldKind::Address, false),
                    Field::new("disputer", FieldKind::Address, false),
                    Field::new("request_id", FieldKind::Felt, false),
                ],
            ),
            EventDescriptor::new(
                EventKind::AssertionSettled,
                vec![
                    Field::new("assertion_id", FieldKind::Felt, true),
                    Field::new("bond_recipient", FieldKind::Address, false),
                    Field::new("disputed", FieldKind::Bool, false),
                    Field::new("settlement_resolution", FieldKind::Bool, false),
                    Field::new("settle_caller", FieldKind::Address, false),
                ],
            ),
        ];

        Self::from_descriptors(EventFamily::Assertion, events)
    }

    /// Build a schema from a Cairo ABI document (the `abi` payload of a
    /// class-introspection response). Only struct-kind event entries whose
    /// short name matches a known [`EventKind`] are kept.
    pub fn from_abi_json(abi: &str) -> Result<Self, SchemaError> {
        let entries: Vec<AbiEntry> = serde_json::from_str(abi)?;

        let mut family = None;
        let mut events = Vec::new();
        for entry in entries {
            if entry.entry_type != "event" || entry.kind.as_deref() != Some("struct") {
                continue;
            }
            let short_name = entry.name.rsplit("::").next().unwrap_or(&entry.name);
            let Some(kind) = EventKind::from_name(short_name) else {
                continue;
            };

            match family {
                None => family = Some(kind.family()),
                Some(f) if f != kind.family() => return Err(SchemaError::MixedFamilies),
                Some(_) => {}
            }

            let mut fields = Vec::new();
            for member in entry.members {
                let field_kind = field_kind_from_cairo(&member.member_type).ok_or_else(|| {
                    SchemaError::UnsupportedType {
                        event: short_name.to_owned(),
                        ty: member.member_type.clone(),
                    }
                })?;
                fields.push(Field::new(
                    &member.name,
                    field_kind,
                    member.kind.as_deref() == Some("key"),
                ));
            }
            events.push(EventDescriptor::new(kind, fields));
        }

        let family = family.ok_or(SchemaError::NoKnownEvents)?;
        Ok(Self::from_descriptors(family, events))
    }

    fn from_descriptors(family: EventFamily, descriptors: Vec<EventDescriptor>) -> Self {
        let events = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.selector, descriptor))
            .collect();
        Self { family, events }
    }

    pub fn descriptor(&self, selector: Felt) -> Option<&EventDescriptor> {
        self.events.get(&selector)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

fn field_kind_from_cairo(ty: &str) -> Option<FieldKind> {
    match ty {
        "core::starknet::contract_address::ContractAddress" => Some(FieldKind::Address),
        "core::felt252" => Some(FieldKind::Felt),
        "core::integer::u8" | "core::integer::u16" | "core::integer::u32"
        | "core::integer::u64" => Some(FieldKind::U64),
        "core::integer::u256" => Some(FieldKind::U256),
        "core::byte_array::ByteArray" => Some(FieldKind::ByteString),
        "core::bool" => Some(FieldKind::Bool),
        _ if ty.ends_with("::i257") || ty.ends_with("::i256") => Some(FieldKind::Int256),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct AbiEntry {
    #[serde(rename = "type")]
    entry_type: String,
    name: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    members: Vec<AbiMember>,
}

#[derive(Debug, Deserialize)]
struct AbiMember {
    name: String,
    #[serde(rename = "type")]
    member_type: String,
    #[serde(default)]
    kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_is_masked_to_250_bits() {
        let selector = name_selector("RequestPrice");
        assert!(selector < (U256::from(1u8) << 250));
        // Stable across calls.
        assert_eq!(selector, name_selector("RequestPrice"));
        assert_ne!(selector, name_selector("ProposePrice"));
    }

    #[test]
    fn request_family_lookup() {
        let schema = ContractSchema::request_family(false);
        assert_eq!(schema.family, EventFamily::Request);
        assert_eq!(schema.event_count(), 4);

        let descriptor = schema
            .descriptor(name_selector("RequestPrice"))
            .expect("RequestPrice descriptor");
        assert_eq!(descriptor.kind, EventKind::RequestPrice);
        assert_eq!(descriptor.fields.len(), 7);
        assert!(descriptor.fields[0].indexed);
        assert!(schema.descriptor(name_selector("AssertionMade")).is_none());
    }

    #[test]
    fn request_family_generations_differ_by_request_id() {
        let v1 = ContractSchema::request_family(false);
        let v2 = ContractSchema::request_family(true);
        for name in ["RequestPrice", "ProposePrice", "DisputePrice", "Settle"] {
            let selector = name_selector(name);
            let fields =
                |schema: &ContractSchema| schema.descriptor(selector).unwrap().fields.clone();
            assert_eq!(fields(&v2).len(), fields(&v1).len() + 1);
            assert_eq!(fields(&v2).last().unwrap().name, "request_id");
        }
    }

    #[test]
    fn abi_json_parses_known_events() {
        let abi = r#"[
            {
                "type": "impl",
                "name": "OracleImpl"
            },
            {
                "type": "event",
                "name": "oracle::optimistic_oracle::RequestPrice",
                "kind": "struct",
                "members": [
                    {"name": "requester", "type": "core::starknet::contract_address::ContractAddress", "kind": "key"},
                    {"name": "identifier", "type": "core::felt252", "kind": "data"},
                    {"name": "timestamp", "type": "core::integer::u64", "kind": "data"},
                    {"name": "ancillary_data", "type": "core::byte_array::ByteArray", "kind": "data"},
                    {"name": "currency", "type": "core::starknet::contract_address::ContractAddress", "kind": "data"},
                    {"name": "reward", "type": "core::integer::u256", "kind": "data"},
                    {"name": "final_fee", "type": "core::integer::u256", "kind": "data"},
                    {"name": "request_id", "type": "core::felt252", "kind": "data"}
                ]
            },
            {
                "type": "event",
                "name": "oracle::optimistic_oracle::Event",
                "kind": "enum",
                "variants": []
            }
        ]"#;

        let schema = ContractSchema::from_abi_json(abi).unwrap();
        assert_eq!(schema.family, EventFamily::Request);
        let descriptor = schema.descriptor(name_selector("RequestPrice")).unwrap();
        assert_eq!(descriptor.fields.len(), 8);
        assert_eq!(descriptor.fields.last().unwrap().name, "request_id");
        assert_eq!(descriptor.fields[3].kind, FieldKind::ByteString);
    }

    #[test]
    fn abi_json_rejects_unknown_field_type() {
        let abi = r#"[
            {
                "type": "event",
                "name": "oracle::Settle",
                "kind": "struct",
                "members": [
                    {"name": "weird", "type": "core::array::Array::<core::felt252>", "kind": "data"}
                ]
            }
        ]"#;
        let err = ContractSchema::from_abi_json(abi).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedType { .. }));
    }

    #[test]
    fn abi_json_without_oracle_events_is_rejected() {
        let err = ContractSchema::from_abi_json("[]").unwrap_err();
        assert!(matches!(err, SchemaError::NoKnownEvents));
    }
}
