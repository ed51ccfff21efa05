//! Event-replay core for a family of on-chain optimistic oracles.
//!
//! Three deployed contracts (an optimistic oracle, a managed variant and a
//! standalone asserter) are scanned from their deploy blocks to the current
//! head; their logs are decoded against introspected schemas, correlated
//! into per-entity groups and materialized into a display-ready listing.
//! The proposal path encodes the approve/propose calldata pair for
//! answering an open request.

pub mod codec;

pub mod schema;

pub mod primitives;

pub mod provider;

pub mod events;

pub mod lifecycle;

pub mod materialize;

pub mod propose;

pub mod indexer;

#[cfg(any(test, feature = "test"))]
pub mod test_utils;

pub use indexer::{
    OracleContract,
    OracleIndexer,
    RefreshReport,
};
pub use materialize::QueryRecord;
