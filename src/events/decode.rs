//! Schema-driven decoding of raw log records into the closed event variants.
//!
//! The decoder is the only constructor of these types; downstream code
//! matches on the variants instead of probing loose field maps. One
//! malformed record never aborts a batch: it is logged, counted and skipped.

use crate::{
    codec::{
        read_byte_string,
        read_int256,
        read_u256,
        CodecError,
        WordReader,
    },
    primitives::{
        Bytes,
        Felt,
        Int256,
        RawLogRecord,
        TxHash,
        U256,
    },
    schema::{
        ContractSchema,
        EventDescriptor,
        EventKind,
        Field,
        FieldKind,
    },
};

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("record carries no selector key")]
    NoSelector,
    #[error("value decoding failed on field `{field}`: {source}")]
    Codec {
        field: String,
        #[source]
        source: CodecError,
    },
    #[error("field `{field}` is not a valid bool word")]
    InvalidBool { field: String },
    #[error("{event} record carries trailing words")]
    TrailingWords { event: &'static str },
    #[error("{event} schema is missing field `{field}`")]
    MissingField { event: &'static str, field: &'static str },
    #[error("field `{field}` has the wrong schema type for {event}")]
    FieldType { event: &'static str, field: &'static str },
}

/// Where the event was observed; copied onto every decoded variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMeta {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPrice {
    pub meta: EventMeta,
    pub requester: Felt,
    pub identifier: Felt,
    pub timestamp: u64,
    pub ancillary_data: Bytes,
    pub currency: Felt,
    pub reward: U256,
    pub final_fee: U256,
    /// On-chain request id, present only on the newer contract generation.
    pub request_id: Option<Felt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposePrice {
    pub meta: EventMeta,
    pub requester: Felt,
    pub proposer: Felt,
    pub identifier: Felt,
    pub timestamp: u64,
    pub ancillary_data: Bytes,
    pub proposed_price: Int256,
    pub expiration_timestamp: u64,
    pub currency: Felt,
    pub request_id: Option<Felt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputePrice {
    pub meta: EventMeta,
    pub requester: Felt,
    pub proposer: Felt,
    pub disputer: Felt,
    pub identifier: Felt,
    pub timestamp: u64,
    pub ancillary_data: Bytes,
    pub proposed_price: Int256,
    pub request_id: Option<Felt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlePrice {
    pub meta: EventMeta,
    pub requester: Felt,
    pub proposer: Felt,
    pub disputer: Felt,
    pub identifier: Felt,
    pub timestamp: u64,
    pub ancillary_data: Bytes,
    pub price: Int256,
    pub payout: U256,
    pub request_id: Option<Felt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionMade {
    pub meta: EventMeta,
    pub assertion_id: Felt,
    pub domain_id: Felt,
    pub claim: Bytes,
    pub asserter: Felt,
    pub callback_recipient: Felt,
    pub escalation_manager: Felt,
    pub caller: Felt,
    pub expiration_timestamp: u64,
    pub currency: Felt,
    pub bond: U256,
    pub identifier: Felt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionDisputed {
    pub meta: EventMeta,
    pub assertion_id: Felt,
    pub caller: Felt,
    pub disputer: Felt,
    pub request_id: Felt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionSettled {
    pub meta: EventMeta,
    pub assertion_id: Felt,
    pub bond_recipient: Felt,
    pub disputed: bool,
    pub settlement_resolution: bool,
    pub settle_caller: Felt,
}

/// Request-family events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    Requested(RequestPrice),
    Proposed(ProposePrice),
    Disputed(DisputePrice),
    Settled(SettlePrice),
}

/// Assertion-family events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionEvent {
    Made(AssertionMade),
    Disputed(AssertionDisputed),
    Settled(AssertionSettled),
}

/// One decoded value plus the field name it was read under.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldValue {
    Word(Felt),
    U64(u64),
    U256(U256),
    Int256(Int256),
    Bytes(Bytes),
    Bool(bool),
}

/// Decode a record against `schema`. `Ok(None)` means the selector is not
/// part of the schema (contracts emit more events than the oracle surface;
/// those are not errors).
pub fn decode_request_record(
    schema: &ContractSchema,
    record: &RawLogRecord,
) -> Result<Option<RequestEvent>, DecodeError> {
    let Some(descriptor) = lookup(schema, record)? else {
        return Ok(None);
    };
    let mut fields = decode_fields(descriptor, record)?;
    let meta = meta_of(record);

    let event = match descriptor.kind {
        EventKind::RequestPrice => RequestEvent::Requested(RequestPrice {
            meta,
            requester: fields.word("requester")?,
            identifier: fields.word("identifier")?,
            timestamp: fields.u64("timestamp")?,
            ancillary_data: fields.bytes("ancillary_data")?,
            currency: fields.word("currency")?,
            reward: fields.u256("reward")?,
            final_fee: fields.u256("final_fee")?,
            request_id: fields.optional_word("request_id")?,
        }),
        EventKind::ProposePrice => RequestEvent::Proposed(ProposePrice {
            meta,
            requester: fields.word("requester")?,
            proposer: fields.word("proposer")?,
            identifier: fields.word("identifier")?,
            timestamp: fields.u64("timestamp")?,
            ancillary_data: fields.bytes("ancillary_data")?,
            proposed_price: fields.int256("proposed_price")?,
            expiration_timestamp: fields.u64("expiration_timestamp")?,
            currency: fields.word("currency")?,
            request_id: fields.optional_word("request_id")?,
        }),
        EventKind::DisputePrice => RequestEvent::Disputed(DisputePrice {
            meta,
            requester: fields.word("requester")?,
            proposer: fields.word("proposer")?,
            disputer: fields.word("disputer")?,
            identifier: fields.word("identifier")?,
            timestamp: fields.u64("timestamp")?,
            ancillary_data: fields.bytes("ancillary_data")?,
            proposed_price: fields.int256("proposed_price")?,
            request_id: fields.optional_word("request_id")?,
        }),
        EventKind::Settle => RequestEvent::Settled(SettlePrice {
            meta,
            requester: fields.word("requester")?,
            proposer: fields.word("proposer")?,
            disputer: fields.word("disputer")?,
            identifier: fields.word("identifier")?,
            timestamp: fields.u64("timestamp")?,
            ancillary_data: fields.bytes("ancillary_data")?,
            price: fields.int256("price")?,
            payout: fields.u256("payout")?,
            request_id: fields.optional_word("request_id")?,
        }),
        _ => return Ok(None),
    };

    Ok(Some(event))
}

/// Assertion-family counterpart of [`decode_request_record`].
pub fn decode_assertion_record(
    schema: &ContractSchema,
    record: &RawLogRecord,
) -> Result<Option<AssertionEvent>, DecodeError> {
    let Some(descriptor) = lookup(schema, record)? else {
        return Ok(None);
    };
    let mut fields = decode_fields(descriptor, record)?;
    let meta = meta_of(record);

    let event = match descriptor.kind {
        EventKind::AssertionMade => AssertionEvent::Made(AssertionMade {
            meta,
            assertion_id: fields.word("assertion_id")?,
            domain_id: fields.word("domain_id")?,
            claim: fields.bytes("claim")?,
            asserter: fields.word("asserter")?,
            callback_recipient: fields.word("callback_recipient")?,
            escalation_manager: fields.word("escalation_manager")?,
            caller: fields.word("caller")?,
            expiration_timestamp: fields.u64("expiration_timestamp")?,
            currency: fields.word("currency")?,
            bond: fields.u256("bond")?,
            identifier: fields.word("identifier")?,
        }),
        EventKind::AssertionDisputed => AssertionEvent::Disputed(AssertionDisputed {
            meta,
            assertion_id: fields.word("assertion_id")?,
            caller: fields.word("caller")?,
            disputer: fields.word("disputer")?,
            request_id: fields.word("request_id")?,
        }),
        EventKind::AssertionSettled => AssertionEvent::Settled(AssertionSettled {
            meta,
            assertion_id: fields.word("assertion_id")?,
            bond_recipient: fields.word("bond_recipient")?,
            disputed: fields.bool("disputed")?,
            settlement_resolution: fields.bool("settlement_resolution")?,
            settle_caller: fields.word("settle_caller")?,
        }),
        _ => return Ok(None),
    };

    Ok(Some(event))
}

/// Decode a whole window, skipping malformed records with a warning.
/// Returns the decoded events and the number of records skipped.
pub fn decode_request_batch(
    schema: &ContractSchema,
    records: &[RawLogRecord],
) -> (Vec<RequestEvent>, usize) {
    let mut events = Vec::new();
    let mut skipped = 0;
    for record in records {
        match decode_request_record(schema, record) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(err) => {
                warn!(%err, tx_hash = %record.tx_hash, "skipping malformed request-family record");
                skipped += 1;
            }
        }
    }
    (events, skipped)
}

/// See [`decode_request_batch`].
pub fn decode_assertion_batch(
    schema: &ContractSchema,
    records: &[RawLogRecord],
) -> (Vec<AssertionEvent>, usize) {
    let mut events = Vec::new();
    let mut skipped = 0;
    for record in records {
        match decode_assertion_record(schema, record) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(err) => {
                warn!(%err, tx_hash = %record.tx_hash, "skipping malformed assertion-family record");
                skipped += 1;
            }
        }
    }
    (events, skipped)
}

fn meta_of(record: &RawLogRecord) -> EventMeta {
    EventMeta {
        tx_hash: record.tx_hash,
        block_number: record.block_number,
    }
}

fn lookup<'a>(
    schema: &'a ContractSchema,
    record: &RawLogRecord,
) -> Result<Option<&'a EventDescriptor>, DecodeError> {
    let selector = record.selector().ok_or(DecodeError::NoSelector)?;
    Ok(schema.descriptor(selector))
}

/// Walk the record's key and data words in declared field order.
fn decode_fields(
    descriptor: &EventDescriptor,
    record: &RawLogRecord,
) -> Result<DecodedFields, DecodeError> {
    let mut keys = WordReader::new(&record.keys);
    // Skip the selector word.
    keys.take().map_err(|source| DecodeError::Codec {
        field: "selector".to_owned(),
        source,
    })?;
    let mut data = WordReader::new(&record.data);

    let mut values = Vec::with_capacity(descriptor.fields.len());
    for field in &descriptor.fields {
        let reader = if field.indexed { &mut keys } else { &mut data };
        let value = decode_field(field, reader)?;
        values.push((field.name.clone(), value));
    }

    if !keys.is_exhausted() || !data.is_exhausted() {
        return Err(DecodeError::TrailingWords {
            event: descriptor.kind.name(),
        });
    }

    Ok(DecodedFields {
        event: descriptor.kind.name(),
        values,
    })
}

fn decode_field(field: &Field, reader: &mut WordReader<'_>) -> Result<FieldValue, DecodeError> {
    let codec = |source| DecodeError::Codec {
        field: field.name.clone(),
        source,
    };

    let value = match field.kind {
        FieldKind::Address | FieldKind::Felt => FieldValue::Word(reader.take().map_err(codec)?),
        FieldKind::U64 => FieldValue::U64(reader.take_u64().map_err(codec)?),
        FieldKind::U256 => FieldValue::U256(read_u256(reader).map_err(codec)?),
        FieldKind::Int256 => FieldValue::Int256(read_int256(reader).map_err(codec)?),
        FieldKind::ByteString => FieldValue::Bytes(read_byte_string(reader).map_err(codec)?),
        FieldKind::Bool => {
            let word = reader.take().map_err(codec)?;
            if word > Felt::from(1u8) {
                return Err(DecodeError::InvalidBool {
                    field: field.name.clone(),
                });
            }
            FieldValue::Bool(word == Felt::from(1u8))
        }
    };
    Ok(value)
}

/// Positionally-decoded values, consumed by name by the typed constructors.
struct DecodedFields {
    event: &'static str,
    values: Vec<(String, FieldValue)>,
}

impl DecodedFields {
    fn take(&mut self, name: &'static str) -> Option<FieldValue> {
        let idx = self.values.iter().position(|(n, _)| n == name)?;
        Some(self.values.remove(idx).1)
    }

    fn required(&mut self, name: &'static str) -> Result<FieldValue, DecodeError> {
        self.take(name).ok_or(DecodeError::MissingField {
            event: self.event,
            field: name,
        })
    }

    fn word(&mut self, name: &'static str) -> Result<Felt, DecodeError> {
        match self.required(name)? {
            FieldValue::Word(v) => Ok(v),
            _ => Err(self.type_err(name)),
        }
    }

    fn optional_word(&mut self, name: &'static str) -> Result<Option<Felt>, DecodeError> {
        match self.take(name) {
            None => Ok(None),
            Some(FieldValue::Word(v)) => Ok(Some(v)),
            Some(_) => Err(self.type_err(name)),
        }
    }

    fn u64(&mut self, name: &'static str) -> Result<u64, DecodeError> {
        match self.required(name)? {
            FieldValue::U64(v) => Ok(v),
            _ => Err(self.type_err(name)),
        }
    }

    fn u256(&mut self, name: &'static str) -> Result<U256, DecodeError> {
        match self.required(name)? {
            FieldValue::U256(v) => Ok(v),
            _ => Err(self.type_err(name)),
        }
    }

    fn int256(&mut self, name: &'static str) -> Result<Int256, DecodeError> {
        match self.required(name)? {
            FieldValue::Int256(v) => Ok(v),
            _ => Err(self.type_err(name)),
        }
    }

    fn bytes(&mut self, name: &'static str) -> Result<Bytes, DecodeError> {
        match self.required(name)? {
            FieldValue::Bytes(v) => Ok(v),
            _ => Err(self.type_err(name)),
        }
    }

    fn bool(&mut self, name: &'static str) -> Result<bool, DecodeError> {
        match self.required(name)? {
            FieldValue::Bool(v) => Ok(v),
            _ => Err(self.type_err(name)),
        }
    }

    fn type_err(&self, name: &'static str) -> DecodeError {
        DecodeError::FieldType {
            event: self.event,
            field: name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        encode_assertion_disputed,
        encode_assertion_made,
        encode_assertion_settled,
        encode_dispute_price,
        encode_propose_price,
        encode_request_price,
        encode_settle,
        sample_assertion_disputed,
        sample_assertion_made,
        sample_assertion_settled,
        sample_dispute,
        sample_propose,
        sample_request,
        sample_settle,
    };

    fn schema() -> ContractSchema {
        ContractSchema::request_family(false)
    }

    #[test]
    fn decodes_request_price_fields() {
        let request = sample_request(1);
        let record = encode_request_price(&request);

        let decoded = decode_request_record(&schema(), &record).unwrap().unwrap();
        assert_eq!(decoded, RequestEvent::Requested(request));
    }

    #[test]
    fn decodes_propose_price_fields() {
        let propose = sample_propose(2);
        let record = encode_propose_price(&propose);

        let decoded = decode_request_record(&schema(), &record).unwrap().unwrap();
        assert_eq!(decoded, RequestEvent::Proposed(propose));
    }

    #[test]
    fn request_id_generation_is_schema_driven() {
        let mut request = sample_request(3);
        request.request_id = Some(Felt::from(0xfeedu32));
        let record = encode_request_price(&request);

        let v2 = ContractSchema::request_family(true);
        let decoded = decode_request_record(&v2, &record).unwrap().unwrap();
        assert_eq!(decoded, RequestEvent::Requested(request.clone()));

        // Follow-up events of the newer generation carry the id too.
        let mut propose = sample_propose(3);
        propose.request_id = Some(Felt::from(0xfeedu32));
        let decoded = decode_request_record(&v2, &encode_propose_price(&propose))
            .unwrap()
            .unwrap();
        assert_eq!(decoded, RequestEvent::Proposed(propose));

        // The old-generation schema sees the extra word as trailing garbage.
        let err = decode_request_record(&schema(), &record).unwrap_err();
        assert!(matches!(err, DecodeError::TrailingWords { .. }));
    }

    #[test]
    fn decodes_dispute_and_settle_fields() {
        let dispute = sample_dispute(8);
        let settle = sample_settle(8);
        let (events, skipped) = decode_request_batch(
            &schema(),
            &[encode_dispute_price(&dispute), encode_settle(&settle)],
        );
        assert_eq!(skipped, 0);
        assert_eq!(
            events,
            vec![
                RequestEvent::Disputed(dispute),
                RequestEvent::Settled(settle),
            ]
        );
    }

    #[test]
    fn decodes_assertion_family() {
        let made = sample_assertion_made(9);
        let disputed = sample_assertion_disputed(9);
        let settled = sample_assertion_settled(9);

        let (events, skipped) = decode_assertion_batch(
            &ContractSchema::assertion_family(),
            &[
                encode_assertion_made(&made),
                encode_assertion_disputed(&disputed),
                encode_assertion_settled(&settled),
            ],
        );
        assert_eq!(skipped, 0);
        assert_eq!(
            events,
            vec![
                AssertionEvent::Made(made),
                AssertionEvent::Disputed(disputed),
                AssertionEvent::Settled(settled),
            ]
        );
    }

    #[test]
    fn unknown_selector_is_not_an_error() {
        let mut record = encode_request_price(&sample_request(4));
        record.keys[0] = Felt::from(0xdeadu32);
        assert!(decode_request_record(&schema(), &record).unwrap().is_none());
    }

    #[test]
    fn truncated_record_is_an_error() {
        let mut record = encode_request_price(&sample_request(5));
        record.data.truncate(3);
        let err = decode_request_record(&schema(), &record).unwrap_err();
        assert!(matches!(err, DecodeError::Codec { .. }));
    }

    #[test]
    fn batch_skips_malformed_and_counts() {
        let good = encode_request_price(&sample_request(6));
        let mut bad = encode_request_price(&sample_request(7));
        bad.data.truncate(1);

        let (events, skipped) = decode_request_batch(&schema(), &[bad, good]);
        assert_eq!(events.len(), 1);
        assert_eq!(skipped, 1);
    }
}
