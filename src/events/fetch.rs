//! Paginated log retrieval for one contract window.

use crate::{
    primitives::RawLogRecord,
    provider::{
        LogQuery,
        LogSource,
        TransportError,
    },
};

use tracing::{
    debug,
    instrument,
};

/// Drain every page of `query`, following the source's continuation token
/// until it reports no more.
///
/// Any page error aborts the whole fetch: a correlation built on a partial
/// log would show entities stuck in stale states, so partial results are
/// discarded rather than returned silently incomplete.
#[instrument(skip(source), fields(contract = %query.contract))]
pub async fn fetch_logs<S: LogSource>(
    source: &S,
    query: &LogQuery,
) -> Result<Vec<RawLogRecord>, TransportError> {
    let mut records = Vec::new();
    let mut continuation = None;
    let mut pages = 0usize;

    loop {
        let page = source.get_logs(query, continuation.as_ref()).await?;
        pages += 1;
        records.extend(page.records);

        match page.continuation {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }

    debug!(
        records = records.len(),
        pages,
        from_block = query.from_block,
        to_block = query.to_block,
        "fetched contract log window"
    );

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        primitives::Felt,
        test_utils::MockSource,
    };

    fn query(contract: Felt) -> LogQuery {
        LogQuery {
            contract,
            from_block: 0,
            to_block: 100,
            page_size: 2,
        }
    }

    #[tokio::test]
    async fn follows_continuation_tokens_to_the_end() {
        let contract = Felt::from(7u8);
        let mut source = MockSource::new(100);
        // Three pages of two, one, and zero records.
        source.push_page(contract, vec![MockSource::blank_record(contract, 1); 2]);
        source.push_page(contract, vec![MockSource::blank_record(contract, 2)]);
        source.push_page(contract, vec![]);

        let records = fetch_logs(&source, &query(contract)).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].block_number, 2);
    }

    #[tokio::test]
    async fn single_page_without_token() {
        let contract = Felt::from(9u8);
        let mut source = MockSource::new(100);
        source.push_page(contract, vec![MockSource::blank_record(contract, 5)]);

        let records = fetch_logs(&source, &query(contract)).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn page_error_aborts_whole_fetch() {
        let contract = Felt::from(3u8);
        let mut source = MockSource::new(100);
        source.push_page(contract, vec![MockSource::blank_record(contract, 1)]);
        source.fail_contract(contract, 1);

        let err = fetch_logs(&source, &query(contract)).await.unwrap_err();
        assert!(matches!(err, TransportError::Rpc(_)));
    }

    #[tokio::test]
    async fn unknown_contract_yields_empty_window() {
        let source = MockSource::new(100);
        let records = fetch_logs(&source, &query(Felt::from(1u8))).await.unwrap();
        assert!(records.is_empty());
    }
}
