//! Event replay pipeline: fetch raw log pages, decode them against the
//! contract schema, and correlate per-entity groups.

pub mod correlate;
pub mod decode;
pub mod fetch;

pub use correlate::{
    correlate_assertions,
    correlate_requests,
    AssertionGroup,
    CorrelationKey,
    RequestGroup,
};
pub use decode::{
    decode_assertion_batch,
    decode_request_batch,
    AssertionEvent,
    DecodeError,
    RequestEvent,
};
pub use fetch::fetch_logs;
