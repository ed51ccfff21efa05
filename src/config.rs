use clap::Parser;

use oracle_indexer::{
    indexer::OracleContract,
    primitives::{
        Felt,
        OracleKind,
    },
};

use url::Url;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct IndexerConfig {
    /// JSON-RPC endpoint of the node to replay events from.
    #[arg(long)]
    pub rpc_url: Url,
    /// Address of the optimistic oracle contract.
    #[arg(long)]
    pub optimistic_address: Felt,
    /// Block the optimistic oracle was deployed at.
    #[arg(long, default_value = "0")]
    pub optimistic_deploy_block: u64,
    /// Address of the managed optimistic oracle contract.
    #[arg(long)]
    pub managed_address: Felt,
    /// Block the managed optimistic oracle was deployed at.
    #[arg(long, default_value = "0")]
    pub managed_deploy_block: u64,
    /// Address of the assertion oracle contract.
    #[arg(long)]
    pub asserter_address: Felt,
    /// Block the assertion oracle was deployed at.
    #[arg(long, default_value = "0")]
    pub asserter_deploy_block: u64,
    /// Events fetched per log page.
    #[arg(long, default_value = "128")]
    pub page_size: usize,
    /// Seconds between refreshes.
    #[arg(long, default_value = "30")]
    pub refresh_interval_secs: u64,
}

impl IndexerConfig {
    pub fn contracts(&self) -> (OracleContract, OracleContract, OracleContract) {
        (
            OracleContract {
                kind: OracleKind::Optimistic,
                address: self.optimistic_address,
                deploy_block: self.optimistic_deploy_block,
            },
            OracleContract {
                kind: OracleKind::OptimisticManaged,
                address: self.managed_address,
                deploy_block: self.managed_deploy_block,
            },
            OracleContract {
                kind: OracleKind::Asserter,
                address: self.asserter_address,
                deploy_block: self.asserter_deploy_block,
            },
        )
    }
}
