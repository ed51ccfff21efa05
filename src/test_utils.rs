//! In-memory collaborators and sample event fixtures for tests.
//!
//! Samples with the same seed share their correlation identity, so
//! `sample_request(1)` and `sample_propose(1)` land in one group. The
//! encoders produce wire records laid out exactly as the hand-built
//! schemas describe them.

use crate::{
    codec::{
        push_byte_string,
        push_int256,
        push_u256,
    },
    events::decode::{
        AssertionDisputed,
        AssertionMade,
        AssertionSettled,
        DisputePrice,
        EventMeta,
        ProposePrice,
        RequestPrice,
        SettlePrice,
    },
    indexer::OracleContract,
    primitives::{
        Bytes,
        EncodedCall,
        Felt,
        Int256,
        RawLogRecord,
        TxHash,
        U256,
    },
    provider::{
        CallSubmitter,
        ContinuationToken,
        LogPage,
        LogQuery,
        LogSource,
        TransportError,
    },
    schema::{
        name_selector,
        ContractSchema,
        EventKind,
    },
};

use std::{
    collections::HashMap,
    sync::Mutex,
};

/// Scripted [`LogSource`]: fixed head, per-contract page sequences and
/// injectable page failures.
#[derive(Debug, Default)]
pub struct MockSource {
    head: u64,
    pages: HashMap<Felt, Vec<Vec<RawLogRecord>>>,
    schemas: HashMap<Felt, ContractSchema>,
    failures: HashMap<Felt, usize>,
    call_results: HashMap<(Felt, String), Vec<Felt>>,
}

impl MockSource {
    pub fn new(head: u64) -> Self {
        Self {
            head,
            ..Self::default()
        }
    }

    /// A source pre-loaded with the hand-built schema matching each
    /// contract's oracle kind.
    pub fn with_oracle_schemas(head: u64, contracts: &[OracleContract]) -> Self {
        let mut source = Self::new(head);
        for contract in contracts {
            let schema = if contract.kind.is_request_family() {
                ContractSchema::request_family(false)
            } else {
                ContractSchema::assertion_family()
            };
            source.set_schema(contract.address, schema);
        }
        source
    }

    /// Append one page to the contract's scripted sequence.
    pub fn push_page(&mut self, contract: Felt, records: Vec<RawLogRecord>) {
        self.pages.entry(contract).or_default().push(records);
    }

    pub fn set_schema(&mut self, contract: Felt, schema: ContractSchema) {
        self.schemas.insert(contract, schema);
    }

    /// Make the page at `page_idx` fail for `contract`.
    pub fn fail_contract(&mut self, contract: Felt, page_idx: usize) {
        self.failures.insert(contract, page_idx);
    }

    /// Script the words a state read of `entrypoint` on `contract` returns.
    pub fn push_call_result(&mut self, contract: Felt, entrypoint: &str, words: Vec<Felt>) {
        self.call_results
            .insert((contract, entrypoint.to_owned()), words);
    }

    /// A record with no payload at all, for pagination-only tests.
    pub fn blank_record(contract: Felt, block_number: u64) -> RawLogRecord {
        RawLogRecord {
            contract,
            block_number,
            tx_hash: TxHash::from(Felt::from(block_number)),
            keys: Vec::new(),
            data: Vec::new(),
        }
    }
}

impl LogSource for MockSource {
    async fn get_logs(
        &self,
        query: &LogQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<LogPage, TransportError> {
        let idx = match continuation {
            Some(token) => token
                .0
                .parse::<usize>()
                .map_err(|_| TransportError::InvalidResponse(format!("bad token `{}`", token.0)))?,
            None => 0,
        };

        if self.failures.get(&query.contract) == Some(&idx) {
            return Err(TransportError::Rpc("injected page failure".to_owned()));
        }

        let pages = self.pages.get(&query.contract);
        let total = pages.map_or(0, Vec::len);
        let records = pages
            .and_then(|pages| pages.get(idx))
            .cloned()
            .unwrap_or_default();
        // A scheduled failure keeps the token chain alive so the fetcher
        // actually walks into it.
        let has_more =
            idx + 1 < total || self.failures.get(&query.contract) == Some(&(idx + 1));
        let continuation = has_more.then(|| ContinuationToken((idx + 1).to_string()));

        Ok(LogPage {
            records,
            continuation,
        })
    }

    async fn head_block_number(&self) -> Result<u64, TransportError> {
        Ok(self.head)
    }

    async fn contract_schema(&self, contract: Felt) -> Result<ContractSchema, TransportError> {
        self.schemas
            .get(&contract)
            .cloned()
            .ok_or_else(|| TransportError::Schema(format!("no schema scripted for {contract:#x}")))
    }

    async fn call(
        &self,
        contract: Felt,
        entrypoint: &str,
        _calldata: Vec<Felt>,
    ) -> Result<Vec<Felt>, TransportError> {
        self.call_results
            .get(&(contract, entrypoint.to_owned()))
            .cloned()
            .ok_or_else(|| {
                TransportError::Rpc(format!("no call result scripted for `{entrypoint}`"))
            })
    }
}

/// Recording [`CallSubmitter`] that confirms everything.
#[derive(Debug, Default)]
pub struct MockSubmitter {
    submitted: Mutex<Vec<EncodedCall>>,
    confirmations: Mutex<usize>,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<EncodedCall> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn confirmations(&self) -> usize {
        *self.confirmations.lock().unwrap()
    }

    /// Deterministic hash handed out for the nth submitted call.
    pub fn tx_hash_of(&self, idx: usize) -> TxHash {
        TxHash::from(Felt::from(idx as u64 + 1))
    }
}

impl CallSubmitter for MockSubmitter {
    async fn submit_call(&self, call: &EncodedCall) -> Result<TxHash, TransportError> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(call.clone());
        Ok(self.tx_hash_of(submitted.len() - 1))
    }

    async fn await_confirmation(&self, _tx_hash: TxHash) -> Result<(), TransportError> {
        *self.confirmations.lock().unwrap() += 1;
        Ok(())
    }
}

fn meta(seed: u64, slot: u64) -> EventMeta {
    EventMeta {
        tx_hash: TxHash::from(Felt::from(seed * 16 + slot)),
        block_number: seed,
    }
}

fn ancillary(seed: u64) -> Bytes {
    Bytes::from(format!("q: sample question {seed} : sample details {seed}").into_bytes())
}

pub fn sample_request(seed: u64) -> RequestPrice {
    RequestPrice {
        meta: meta(seed, 1),
        requester: Felt::from(0x1000 + seed),
        identifier: Felt::from(0x59_45_53u32),
        timestamp: 100 * seed,
        ancillary_data: ancillary(seed),
        currency: Felt::from(0xcc00 + seed),
        reward: U256::from(10_000 + seed),
        final_fee: U256::from(500 + seed),
        request_id: None,
    }
}

pub fn sample_propose(seed: u64) -> ProposePrice {
    ProposePrice {
        meta: meta(seed, 2),
        requester: Felt::from(0x1000 + seed),
        proposer: Felt::from(0x2000 + seed),
        identifier: Felt::from(0x59_45_53u32),
        timestamp: 100 * seed,
        ancillary_data: ancillary(seed),
        proposed_price: Int256::from(77i128),
        // seed 1 expires at 2_000.
        expiration_timestamp: 1_000 + seed * 1_000,
        currency: Felt::from(0xcc00 + seed),
        request_id: None,
    }
}

pub fn sample_dispute(seed: u64) -> DisputePrice {
    DisputePrice {
        meta: meta(seed, 3),
        requester: Felt::from(0x1000 + seed),
        proposer: Felt::from(0x2000 + seed),
        disputer: Felt::from(0x3000 + seed),
        identifier: Felt::from(0x59_45_53u32),
        timestamp: 100 * seed,
        ancillary_data: ancillary(seed),
        proposed_price: Int256::from(77i128),
        request_id: None,
    }
}

pub fn sample_settle(seed: u64) -> SettlePrice {
    SettlePrice {
        meta: meta(seed, 4),
        requester: Felt::from(0x1000 + seed),
        proposer: Felt::from(0x2000 + seed),
        disputer: Felt::from(0x3000 + seed),
        identifier: Felt::from(0x59_45_53u32),
        timestamp: 100 * seed,
        ancillary_data: ancillary(seed),
        price: Int256::from(-5i128),
        payout: U256::from(600 + seed),
        request_id: None,
    }
}

pub fn sample_assertion_made(seed: u64) -> AssertionMade {
    AssertionMade {
        meta: meta(seed, 5),
        assertion_id: Felt::from(0xa000 + seed),
        domain_id: Felt::from(0xd000 + seed),
        claim: Bytes::from(format!("q: assertion claim {seed}").into_bytes()),
        asserter: Felt::from(0x4000 + seed),
        callback_recipient: Felt::ZERO,
        escalation_manager: Felt::ZERO,
        caller: Felt::from(0x5000 + seed),
        expiration_timestamp: 2_000 + seed * 10,
        currency: Felt::from(0xcc00 + seed),
        bond: U256::from(900 + seed),
        identifier: Felt::from(0x41_53_53u32),
    }
}

pub fn sample_assertion_disputed(seed: u64) -> AssertionDisputed {
    AssertionDisputed {
        meta: meta(seed, 6),
        assertion_id: Felt::from(0xa000 + seed),
        caller: Felt::from(0x5000 + seed),
        disputer: Felt::from(0x3000 + seed),
        request_id: Felt::from(0xb000 + seed),
    }
}

pub fn sample_assertion_settled(seed: u64) -> AssertionSettled {
    AssertionSettled {
        meta: meta(seed, 7),
        assertion_id: Felt::from(0xa000 + seed),
        bond_recipient: Felt::from(0x4000 + seed),
        disputed: false,
        settlement_resolution: true,
        settle_caller: Felt::from(0x5000 + seed),
    }
}

fn record(kind: EventKind, meta: EventMeta, keys: Vec<Felt>, data: Vec<Felt>) -> RawLogRecord {
    let mut all_keys = vec![name_selector(kind.name())];
    all_keys.extend(keys);
    RawLogRecord {
        contract: Felt::ZERO,
        block_number: meta.block_number,
        tx_hash: meta.tx_hash,
        keys: all_keys,
        data,
    }
}

pub fn encode_request_price(event: &RequestPrice) -> RawLogRecord {
    let mut data = vec![event.identifier, Felt::from(event.timestamp)];
    push_byte_string(&mut data, &event.ancillary_data);
    data.push(event.currency);
    push_u256(&mut data, event.reward);
    push_u256(&mut data, event.final_fee);
    if let Some(id) = event.request_id {
        data.push(id);
    }
    record(EventKind::RequestPrice, event.meta, vec![event.requester], data)
}

pub fn encode_propose_price(event: &ProposePrice) -> RawLogRecord {
    let mut data = vec![event.proposer, event.identifier, Felt::from(event.timestamp)];
    push_byte_string(&mut data, &event.ancillary_data);
    push_int256(&mut data, event.proposed_price);
    data.push(Felt::from(event.expiration_timestamp));
    data.push(event.currency);
    if let Some(id) = event.request_id {
        data.push(id);
    }
    record(EventKind::ProposePrice, event.meta, vec![event.requester], data)
}

pub fn encode_dispute_price(event: &DisputePrice) -> RawLogRecord {
    let mut data = vec![
        event.proposer,
        event.disputer,
        event.identifier,
        Felt::from(event.timestamp),
    ];
    push_byte_string(&mut data, &event.ancillary_data);
    push_int256(&mut data, event.proposed_price);
    if let Some(id) = event.request_id {
        data.push(id);
    }
    record(EventKind::DisputePrice, event.meta, vec![event.requester], data)
}

pub fn encode_settle(event: &SettlePrice) -> RawLogRecord {
    let mut data = vec![
        event.proposer,
        event.disputer,
        event.identifier,
        Felt::from(event.timestamp),
    ];
    push_byte_string(&mut data, &event.ancillary_data);
    push_int256(&mut data, event.price);
    push_u256(&mut data, event.payout);
    if let Some(id) = event.request_id {
        data.push(id);
    }
    record(EventKind::Settle, event.meta, vec![event.requester], data)
}

pub fn encode_assertion_made(event: &AssertionMade) -> RawLogRecord {
    let mut data = vec![event.domain_id];
    push_byte_string(&mut data, &event.claim);
    data.extend([
        event.asserter,
        event.callback_recipient,
        event.escalation_manager,
        event.caller,
        Felt::from(event.expiration_timestamp),
        event.currency,
    ]);
    push_u256(&mut data, event.bond);
    data.push(event.identifier);
    record(
        EventKind::AssertionMade,
        event.meta,
        vec![event.assertion_id],
        data,
    )
}

pub fn encode_assertion_disputed(event: &AssertionDisputed) -> RawLogRecord {
    let data = vec![event.caller, event.disputer, event.request_id];
    record(
        EventKind::AssertionDisputed,
        event.meta,
        vec![event.assertion_id],
        data,
    )
}

pub fn encode_assertion_settled(event: &AssertionSettled) -> RawLogRecord {
    let data = vec![
        event.bond_recipient,
        Felt::from(u8::from(event.disputed)),
        Felt::from(u8::from(event.settlement_resolution)),
        event.settle_caller,
    ];
    record(
        EventKind::AssertionSettled,
        event.meta,
        vec![event.assertion_id],
        data,
    )
}
