//! Ties the pipeline together: one refresh scans the three oracle
//! contracts concurrently, replays their logs from deploy block to head,
//! and materializes the combined newest-first listing.
//!
//! A refresh is all-or-nothing. If any contract scan fails the whole
//! refresh returns the error and the caller keeps its previous listing;
//! an empty result only ever means the contracts emitted nothing.

use crate::{
    events::{
        correlate_assertions,
        correlate_requests,
        decode_assertion_batch,
        decode_request_batch,
        fetch_logs,
    },
    materialize::{
        materialize_assertion,
        materialize_request,
        QueryRecord,
    },
    primitives::{
        Felt,
        OracleKind,
    },
    provider::{
        LogQuery,
        LogSource,
        TransportError,
    },
    schema::ContractSchema,
};

use std::sync::Arc;

use moka::sync::Cache;
use thiserror::Error;
use tracing::{
    debug,
    instrument,
    warn,
};

const SCHEMA_CACHE_CAPACITY: u64 = 16;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// One deployed oracle contract to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleContract {
    pub kind: OracleKind,
    pub address: Felt,
    /// Replay starts here; blocks before the deployment hold no events.
    pub deploy_block: u64,
}

/// Outcome of one full refresh.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    /// Newest-creation-first, across all three contracts.
    pub queries: Vec<QueryRecord>,
    /// Malformed records dropped during decoding.
    pub skipped_records: usize,
    /// Head block the scan window was pinned to.
    pub head_block: u64,
}

pub struct OracleIndexer<S> {
    source: S,
    optimistic: OracleContract,
    optimistic_managed: OracleContract,
    asserter: OracleContract,
    page_size: usize,
    // Contract schemas never change under a class hash, so cache them
    // across refreshes.
    schemas: Cache<Felt, Arc<ContractSchema>>,
}

impl<S: LogSource> OracleIndexer<S> {
    pub fn new(
        source: S,
        optimistic: OracleContract,
        optimistic_managed: OracleContract,
        asserter: OracleContract,
        page_size: usize,
    ) -> Self {
        Self {
            source,
            optimistic,
            optimistic_managed,
            asserter,
            page_size,
            schemas: Cache::new(SCHEMA_CACHE_CAPACITY),
        }
    }

    /// Replay all three contracts up to the current head and materialize
    /// the listing at unix time `now`.
    #[instrument(skip(self))]
    pub async fn refresh(&self, now: u64) -> Result<RefreshReport, RefreshError> {
        let head_block = self.source.head_block_number().await?;

        let (optimistic, managed, asserted) = tokio::try_join!(
            self.scan_requests(self.optimistic, head_block, now),
            self.scan_requests(self.optimistic_managed, head_block, now),
            self.scan_assertions(self.asserter, head_block, now),
        )?;

        let mut skipped_records = 0;
        let mut queries = Vec::new();
        for (records, skipped) in [optimistic, managed, asserted] {
            queries.extend(records);
            skipped_records += skipped;
        }

        // Timestamps mean different things per family (request creation
        // time vs assertion liveness deadline), so the same-block
        // tie-break uses the creation tx hash instead.
        queries.sort_by(|a, b| {
            b.creation_block
                .cmp(&a.creation_block)
                .then_with(|| b.request_tx.cmp(&a.request_tx))
        });
        for (idx, record) in queries.iter_mut().enumerate() {
            record.id = format!("{}-{idx}", record.oracle);
        }

        debug!(
            queries = queries.len(),
            skipped_records,
            head_block,
            "refresh complete"
        );

        Ok(RefreshReport {
            queries,
            skipped_records,
            head_block,
        })
    }

    async fn scan_requests(
        &self,
        contract: OracleContract,
        head_block: u64,
        now: u64,
    ) -> Result<(Vec<QueryRecord>, usize), RefreshError> {
        let schema = self.schema(contract.address).await?;
        let records = fetch_logs(&self.source, &self.query(contract, head_block)).await?;
        let (events, skipped) = decode_request_batch(&schema, &records);

        let mut out = Vec::new();
        for group in correlate_requests(events) {
            match materialize_request(&group, contract.kind, contract.address, now) {
                Ok(record) => out.push(record),
                Err(err) => {
                    warn!(%err, oracle = %contract.kind, "dropping unmaterializable group");
                }
            }
        }
        Ok((out, skipped))
    }

    async fn scan_assertions(
        &self,
        contract: OracleContract,
        head_block: u64,
        now: u64,
    ) -> Result<(Vec<QueryRecord>, usize), RefreshError> {
        let schema = self.schema(contract.address).await?;
        let records = fetch_logs(&self.source, &self.query(contract, head_block)).await?;
        let (events, skipped) = decode_assertion_batch(&schema, &records);

        let mut out = Vec::new();
        for group in correlate_assertions(events) {
            match materialize_assertion(&group, contract.kind, contract.address, now) {
                Ok(record) => out.push(record),
                Err(err) => {
                    warn!(%err, oracle = %contract.kind, "dropping unmaterializable group");
                }
            }
        }
        Ok((out, skipped))
    }

    fn query(&self, contract: OracleContract, head_block: u64) -> LogQuery {
        LogQuery {
            contract: contract.address,
            from_block: contract.deploy_block,
            to_block: head_block,
            page_size: self.page_size,
        }
    }

    async fn schema(&self, contract: Felt) -> Result<Arc<ContractSchema>, TransportError> {
        if let Some(schema) = self.schemas.get(&contract) {
            return Ok(schema);
        }
        let schema = Arc::new(self.source.contract_schema(contract).await?);
        self.schemas.insert(contract, Arc::clone(&schema));
        Ok(schema)
    }
}
