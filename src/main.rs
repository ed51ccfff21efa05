mod config;

use oracle_indexer::{
    indexer::OracleIndexer,
    provider::RpcClient,
};

use std::time::{
    Duration,
    SystemTime,
    UNIX_EPOCH,
};

use anyhow::Result;
use clap::Parser;
use tracing::{
    error,
    info,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config::IndexerConfig::parse();
    let (optimistic, managed, asserter) = config.contracts();

    let client = RpcClient::new(&config.rpc_url)?;
    let indexer = OracleIndexer::new(client, optimistic, managed, asserter, config.page_size);

    let mut ticker = tokio::time::interval(Duration::from_secs(config.refresh_interval_secs));
    loop {
        ticker.tick().await;
        let now = unix_now()?;
        match indexer.refresh(now).await {
            Ok(report) => {
                info!(
                    queries = report.queries.len(),
                    skipped = report.skipped_records,
                    head_block = report.head_block,
                    "listing refreshed"
                );
                for query in &report.queries {
                    println!(
                        "{} [{}] {} ({}) {}",
                        query.id,
                        query.status,
                        query.title,
                        query.state,
                        query.time_left.as_deref().unwrap_or("-"),
                    );
                }
            }
            // Keep the previous listing on transport failure; an error is
            // never rendered as an empty result.
            Err(err) => error!(%err, "refresh failed"),
        }
    }
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}
