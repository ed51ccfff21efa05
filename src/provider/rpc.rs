//! JSON-RPC implementation of [`LogSource`] over HTTP.

use crate::{
    primitives::{
        Felt,
        RawLogRecord,
        TxHash,
        B256,
        U256,
    },
    provider::{
        ContinuationToken,
        LogPage,
        LogQuery,
        LogSource,
        TransportError,
    },
    schema::{
        name_selector,
        ContractSchema,
    },
};

use jsonrpsee::{
    core::client::ClientT,
    http_client::{
        HttpClient,
        HttpClientBuilder,
    },
    rpc_params,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::json;
use url::Url;

/// HTTP client for a node exposing the standard `starknet_*` read methods.
#[derive(Debug)]
pub struct RpcClient {
    client: HttpClient,
}

impl RpcClient {
    pub fn new(url: &Url) -> Result<Self, TransportError> {
        let client = HttpClientBuilder::default()
            .build(url.as_str())
            .map_err(|e| TransportError::Rpc(e.to_string()))?;
        Ok(Self { client })
    }
}

#[derive(Debug, Serialize)]
struct EventFilter<'a> {
    from_block: BlockNumber,
    to_block: BlockNumber,
    address: String,
    chunk_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    continuation_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct BlockNumber {
    block_number: u64,
}

#[derive(Debug, Deserialize)]
struct EventsChunk {
    events: Vec<EmittedEvent>,
    #[serde(default)]
    continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmittedEvent {
    from_address: String,
    keys: Vec<String>,
    data: Vec<String>,
    block_number: u64,
    transaction_hash: String,
}

#[derive(Debug, Deserialize)]
struct ContractClass {
    abi: serde_json::Value,
}

fn parse_felt(value: &str) -> Result<Felt, TransportError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    U256::from_str_radix(digits, 16)
        .map_err(|_| TransportError::InvalidResponse(format!("bad felt `{value}`")))
}

fn parse_felts(values: &[String]) -> Result<Vec<Felt>, TransportError> {
    values.iter().map(|v| parse_felt(v)).collect()
}

fn felt_hex(value: Felt) -> String {
    format!("{value:#x}")
}

impl LogSource for RpcClient {
    async fn get_logs(
        &self,
        query: &LogQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<LogPage, TransportError> {
        let filter = EventFilter {
            from_block: BlockNumber {
                block_number: query.from_block,
            },
            to_block: BlockNumber {
                block_number: query.to_block,
            },
            address: felt_hex(query.contract),
            chunk_size: query.page_size,
            continuation_token: continuation.map(|t| t.0.as_str()),
        };

        let chunk: EventsChunk = self
            .client
            .request("starknet_getEvents", rpc_params![filter])
            .await
            .map_err(|e| TransportError::Rpc(e.to_string()))?;

        let mut records = Vec::with_capacity(chunk.events.len());
        for event in &chunk.events {
            let tx_word = parse_felt(&event.transaction_hash)?;
            records.push(RawLogRecord {
                contract: parse_felt(&event.from_address)?,
                block_number: event.block_number,
                tx_hash: TxHash::from(tx_word),
                keys: parse_felts(&event.keys)?,
                data: parse_felts(&event.data)?,
            });
        }

        Ok(LogPage {
            records,
            continuation: chunk.continuation_token.map(ContinuationToken),
        })
    }

    async fn head_block_number(&self) -> Result<u64, TransportError> {
        self.client
            .request("starknet_blockNumber", rpc_params![])
            .await
            .map_err(|e| TransportError::Rpc(e.to_string()))
    }

    async fn contract_schema(&self, contract: Felt) -> Result<ContractSchema, TransportError> {
        let class: ContractClass = self
            .client
            .request("starknet_getClassAt", rpc_params!["latest", felt_hex(contract)])
            .await
            .map_err(|e| TransportError::Rpc(e.to_string()))?;

        // Older nodes return the abi as an embedded JSON string, newer ones
        // as a structured array.
        let abi_text = match class.abi {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };

        ContractSchema::from_abi_json(&abi_text)
            .map_err(|e| TransportError::Schema(e.to_string()))
    }

    async fn call(
        &self,
        contract: Felt,
        entrypoint: &str,
        calldata: Vec<Felt>,
    ) -> Result<Vec<Felt>, TransportError> {
        let request = json!({
            "contract_address": felt_hex(contract),
            "entry_point_selector": felt_hex(name_selector(entrypoint)),
            "calldata": calldata.iter().map(|f| felt_hex(*f)).collect::<Vec<_>>(),
        });

        let words: Vec<String> = self
            .client
            .request("starknet_call", rpc_params![request, "latest"])
            .await
            .map_err(|e| TransportError::Rpc(e.to_string()))?;

        parse_felts(&words)
    }
}
