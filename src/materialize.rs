//! Builds display-ready records out of correlated groups.
//!
//! One record per entity, carrying everything a consumer renders: titles
//! split out of the raw question bytes, the derived state pair, amounts,
//! participants and the transaction hash of every observed lifecycle event.
//! The exact creation-time ancillary bytes are preserved verbatim; they are
//! the correlation identity and any later proposal must echo them.

use crate::{
    events::{
        AssertionGroup,
        RequestGroup,
    },
    lifecycle::{
        derive_assertion_state,
        derive_request_state,
        time_left,
        DisplayStatus,
        LifecycleState,
    },
    codec::felt_to_string,
    primitives::{
        Bytes,
        Felt,
        Int256,
        OracleKind,
        TxHash,
        U256,
    },
};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("group has follow-up events but no creation event")]
    MissingCreation,
}

/// Fully materialized view of one request or assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRecord {
    /// Stable listing id, assigned after sorting.
    pub id: String,
    pub oracle: OracleKind,
    pub contract: Felt,
    pub title: String,
    pub description: String,
    pub state: LifecycleState,
    pub status: DisplayStatus,
    /// Raw identifier word and its trimmed text rendering.
    pub identifier: Felt,
    pub identifier_text: String,
    pub requester: Option<Felt>,
    pub proposer: Option<Felt>,
    pub disputer: Option<Felt>,
    pub asserter: Option<Felt>,
    /// Request creation time (the value echoed into proposal calldata) or
    /// the assertion's liveness deadline. Not comparable across families.
    pub timestamp: u64,
    /// Byte-exact creation ancillary data (the claim, for assertions).
    pub ancillary_data: Bytes,
    pub currency: Option<Felt>,
    pub reward: Option<U256>,
    pub bond: Option<U256>,
    pub proposed_price: Option<Int256>,
    pub settled_price: Option<Int256>,
    pub expiration_timestamp: Option<u64>,
    pub time_left: Option<String>,
    pub request_tx: Option<TxHash>,
    pub propose_tx: Option<TxHash>,
    pub dispute_tx: Option<TxHash>,
    pub settle_tx: Option<TxHash>,
    /// Block of the creation event, used for newest-first ordering.
    pub creation_block: u64,
}

/// Materialize one request group at unix time `now`.
///
/// The bond surfaced for a request is its final fee: that is the amount a
/// proposer must escrow on top of any reward.
pub fn materialize_request(
    group: &RequestGroup,
    oracle: OracleKind,
    contract: Felt,
    now: u64,
) -> Result<QueryRecord, MaterializeError> {
    let request = group.request.as_ref().ok_or(MaterializeError::MissingCreation)?;

    let state = derive_request_state(group, now);
    let (title, description) = split_question(&request.ancillary_data);
    let expiration = group.propose.as_ref().map(|p| p.expiration_timestamp);

    Ok(QueryRecord {
        id: String::new(),
        oracle,
        contract,
        title,
        description,
        state,
        status: state.display_status(),
        identifier: request.identifier,
        identifier_text: felt_to_string(request.identifier),
        requester: Some(request.requester),
        proposer: group.propose.as_ref().map(|p| p.proposer),
        disputer: group.dispute.as_ref().map(|d| d.disputer),
        asserter: None,
        timestamp: request.timestamp,
        ancillary_data: request.ancillary_data.clone(),
        currency: Some(request.currency),
        reward: Some(request.reward),
        bond: Some(request.final_fee),
        proposed_price: group.propose.as_ref().map(|p| p.proposed_price),
        settled_price: group.settle.as_ref().map(|s| s.price),
        expiration_timestamp: expiration,
        time_left: expiration.and_then(|at| time_left(at, now)),
        request_tx: Some(request.meta.tx_hash),
        propose_tx: group.propose.as_ref().map(|p| p.meta.tx_hash),
        dispute_tx: group.dispute.as_ref().map(|d| d.meta.tx_hash),
        settle_tx: group.settle.as_ref().map(|s| s.meta.tx_hash),
        creation_block: request.meta.block_number,
    })
}

/// Materialize one assertion group at unix time `now`.
pub fn materialize_assertion(
    group: &AssertionGroup,
    oracle: OracleKind,
    contract: Felt,
    now: u64,
) -> Result<QueryRecord, MaterializeError> {
    let made = group.made.as_ref().ok_or(MaterializeError::MissingCreation)?;

    let state = derive_assertion_state(group, now);
    let (title, description) = split_question(&made.claim);

    Ok(QueryRecord {
        id: String::new(),
        oracle,
        contract,
        title,
        description,
        state,
        status: state.display_status(),
        identifier: made.identifier,
        identifier_text: felt_to_string(made.identifier),
        requester: None,
        proposer: None,
        disputer: group.dispute.as_ref().map(|d| d.disputer),
        asserter: Some(made.asserter),
        timestamp: made.expiration_timestamp,
        ancillary_data: made.claim.clone(),
        currency: Some(made.currency),
        reward: None,
        bond: Some(made.bond),
        proposed_price: None,
        settled_price: None,
        expiration_timestamp: Some(made.expiration_timestamp),
        time_left: time_left(made.expiration_timestamp, now),
        request_tx: Some(made.meta.tx_hash),
        propose_tx: None,
        dispute_tx: group.dispute.as_ref().map(|d| d.meta.tx_hash),
        settle_tx: group.settle.as_ref().map(|s| s.meta.tx_hash),
        creation_block: made.meta.block_number,
    })
}

/// Best-effort split of question bytes into a title and description.
///
/// The common layout is `q: <title> : <description>`. Bytes that do not
/// follow the layout become the title wholesale; nothing here ever fails.
fn split_question(bytes: &Bytes) -> (String, String) {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();

    let Some(body) = text.strip_prefix("q:") else {
        return (text.to_owned(), String::new());
    };
    match body.split_once(" : ") {
        Some((title, description)) => (title.trim().to_owned(), description.trim().to_owned()),
        None => (body.trim().to_owned(), String::new()),
    }
}
