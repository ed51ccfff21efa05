//! Collaborator interfaces the core consumes: a paginated log source for
//! replay and a call submitter for state-changing transactions. The two are
//! separate traits because submission needs a wallet the read path never
//! touches.

pub mod rpc;
pub use rpc::RpcClient;

use crate::{
    primitives::{
        EncodedCall,
        Felt,
        RawLogRecord,
        TxHash,
    },
    schema::ContractSchema,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("rpc request failed: {0}")]
    Rpc(String),
    #[error("malformed rpc response: {0}")]
    InvalidResponse(String),
    #[error("contract schema unavailable: {0}")]
    Schema(String),
    #[error("transaction {0} was not confirmed")]
    Confirmation(TxHash),
}

/// Opaque pagination token, passed back verbatim on the next page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(pub String);

/// One page of raw log records.
#[derive(Debug, Clone)]
pub struct LogPage {
    pub records: Vec<RawLogRecord>,
    pub continuation: Option<ContinuationToken>,
}

/// A bounded log window over one contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub contract: Felt,
    pub from_block: u64,
    pub to_block: u64,
    pub page_size: usize,
}

/// Read-side collaborator: log retrieval, head tracking, schema
/// introspection and view calls.
pub trait LogSource {
    fn get_logs(
        &self,
        query: &LogQuery,
        continuation: Option<&ContinuationToken>,
    ) -> impl std::future::Future<Output = Result<LogPage, TransportError>> + Send;

    fn head_block_number(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, TransportError>> + Send;

    fn contract_schema(
        &self,
        contract: Felt,
    ) -> impl std::future::Future<Output = Result<ContractSchema, TransportError>> + Send;

    /// Direct state read, orthogonal to event replay. The refresh pipeline
    /// never calls this; it exists for callers that need a current on-chain
    /// value (a live status check before proposing, say) next to the
    /// replayed listing.
    fn call(
        &self,
        contract: Felt,
        entrypoint: &str,
        calldata: Vec<Felt>,
    ) -> impl std::future::Future<Output = Result<Vec<Felt>, TransportError>> + Send;
}

/// Write-side collaborator, implemented by wallet-owning callers.
pub trait CallSubmitter {
    fn submit_call(
        &self,
        call: &EncodedCall,
    ) -> impl std::future::Future<Output = Result<TxHash, TransportError>> + Send;

    fn await_confirmation(
        &self,
        tx_hash: TxHash,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}
