//! Builds and submits the two-call proposal flow: a bond-token approval
//! followed by the price proposal itself.
//!
//! Preconditions are checked before any wire encoding so a half-built
//! record fails fast instead of producing calldata the contract would
//! reject. The ancillary bytes encoded into the proposal are the exact
//! creation-time bytes off the record; re-encoding anything else would
//! target a different request.

use crate::{
    codec::{
        push_byte_string,
        push_int256,
        push_u256,
    },
    materialize::QueryRecord,
    primitives::{
        EncodedCall,
        Felt,
        Int256,
        OracleKind,
        TxHash,
    },
    provider::{
        CallSubmitter,
        TransportError,
    },
    schema::name_selector,
};

use thiserror::Error;
use tracing::{
    info,
    instrument,
};

#[derive(Debug, Error)]
pub enum ProposeError {
    #[error("{0} entries do not accept proposals")]
    NotProposable(OracleKind),
    #[error("record is missing its {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The approval and proposal calls, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalCalls {
    pub approve: EncodedCall,
    pub propose: EncodedCall,
}

/// Encode the calldata for proposing `price` against `record`.
///
/// `bond_token` is the ERC20 the oracle escrows; the approval is for the
/// record's bond amount in favor of the oracle contract.
pub fn build_proposal(
    record: &QueryRecord,
    price: Int256,
    bond_token: Felt,
) -> Result<ProposalCalls, ProposeError> {
    // Whether a proposal is still acceptable at this point in the lifecycle
    // is the contract's call; only structural completeness is checked here.
    if !record.oracle.is_request_family() {
        return Err(ProposeError::NotProposable(record.oracle));
    }

    let requester = record.requester.ok_or(ProposeError::MissingField("requester"))?;
    let bond = record.bond.ok_or(ProposeError::MissingField("bond amount"))?;
    if record.identifier.is_zero() {
        return Err(ProposeError::MissingField("identifier"));
    }
    if record.ancillary_data.is_empty() {
        return Err(ProposeError::MissingField("ancillary data"));
    }

    let mut approve_calldata = vec![record.contract];
    push_u256(&mut approve_calldata, bond);
    let approve = EncodedCall {
        contract: bond_token,
        entrypoint: "approve".to_owned(),
        selector: name_selector("approve"),
        calldata: approve_calldata,
    };

    let mut calldata = vec![
        requester,
        record.identifier,
        Felt::from(record.timestamp),
    ];
    push_byte_string(&mut calldata, &record.ancillary_data);
    push_int256(&mut calldata, price);
    let propose = EncodedCall {
        contract: record.contract,
        entrypoint: "propose_price".to_owned(),
        selector: name_selector("propose_price"),
        calldata,
    };

    Ok(ProposalCalls { approve, propose })
}

/// Submit the approval, wait for it to land, then submit the proposal and
/// wait again. Returns the proposal transaction hash.
#[instrument(skip(submitter, calls), fields(contract = %calls.propose.contract))]
pub async fn submit_proposal<S: CallSubmitter>(
    submitter: &S,
    calls: &ProposalCalls,
) -> Result<TxHash, ProposeError> {
    let approve_tx = submitter.submit_call(&calls.approve).await?;
    submitter.await_confirmation(approve_tx).await?;
    info!(%approve_tx, "bond approval confirmed");

    let propose_tx = submitter.submit_call(&calls.propose).await?;
    submitter.await_confirmation(propose_tx).await?;
    info!(%propose_tx, "price proposal confirmed");

    Ok(propose_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{
            read_byte_string,
            read_int256,
            read_u256,
            WordReader,
        },
        events::RequestGroup,
        materialize::materialize_request,
        test_utils::{
            sample_request,
            MockSubmitter,
        },
    };

    fn open_record() -> QueryRecord {
        let group = RequestGroup {
            request: Some(sample_request(1)),
            propose: None,
            dispute: None,
            settle: None,
        };
        materialize_request(&group, OracleKind::Optimistic, Felt::from(0xabcu32), 500).unwrap()
    }

    #[test]
    fn proposal_calldata_echoes_creation_bytes() {
        let record = open_record();
        let price = Int256::from(-42i128);
        let calls = build_proposal(&record, price, Felt::from(0x777u32)).unwrap();

        assert_eq!(calls.approve.contract, Felt::from(0x777u32));
        assert_eq!(calls.approve.entrypoint, "approve");
        let mut reader = WordReader::new(&calls.approve.calldata);
        assert_eq!(reader.take().unwrap(), record.contract);
        assert_eq!(read_u256(&mut reader).unwrap(), record.bond.unwrap());
        assert!(reader.is_exhausted());

        assert_eq!(calls.propose.contract, record.contract);
        assert_eq!(calls.propose.selector, name_selector("propose_price"));
        let mut reader = WordReader::new(&calls.propose.calldata);
        assert_eq!(reader.take().unwrap(), record.requester.unwrap());
        assert_eq!(reader.take().unwrap(), record.identifier);
        assert_eq!(reader.take_u64().unwrap(), record.timestamp);
        assert_eq!(
            read_byte_string(&mut reader).unwrap(),
            record.ancillary_data
        );
        assert_eq!(read_int256(&mut reader).unwrap(), price);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn assertion_records_are_rejected() {
        let mut record = open_record();
        record.oracle = OracleKind::Asserter;
        let err = build_proposal(&record, Int256::from(1i128), Felt::from(1u8)).unwrap_err();
        assert!(matches!(err, ProposeError::NotProposable(_)));
    }

    #[test]
    fn missing_identifier_is_rejected() {
        let mut record = open_record();
        record.identifier = Felt::ZERO;
        let err = build_proposal(&record, Int256::from(1i128), Felt::from(1u8)).unwrap_err();
        assert!(matches!(err, ProposeError::MissingField("identifier")));
    }

    #[test]
    fn missing_bond_is_rejected() {
        let mut record = open_record();
        record.bond = None;
        let err = build_proposal(&record, Int256::from(1i128), Felt::from(1u8)).unwrap_err();
        assert!(matches!(err, ProposeError::MissingField("bond amount")));
    }

    #[tokio::test]
    async fn submission_orders_approve_before_propose() {
        let record = open_record();
        let calls = build_proposal(&record, Int256::from(7i128), Felt::from(2u8)).unwrap();

        let submitter = MockSubmitter::new();
        let tx = submit_proposal(&submitter, &calls).await.unwrap();

        let submitted = submitter.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0].entrypoint, "approve");
        assert_eq!(submitted[1].entrypoint, "propose_price");
        assert_eq!(submitter.confirmations(), 2);
        assert_eq!(tx, submitter.tx_hash_of(1));
    }
}
