//! Groups per-entity events out of an unordered decoded window.
//!
//! Requests correlate on two interchangeable keys: the composite of
//! (requester, identifier, timestamp, ancillary bytes) and, where the
//! contract emits one, the on-chain request id. Any event carrying the id
//! resolves through it first and registers both key forms for its group,
//! so the two forms always land together whichever arrives first. Within a
//! group each lifecycle slot is filled at most once; later duplicates are
//! dropped with a warning.

use crate::{
    events::decode::{
        AssertionDisputed,
        AssertionEvent,
        AssertionMade,
        AssertionSettled,
        DisputePrice,
        ProposePrice,
        RequestEvent,
        RequestPrice,
        SettlePrice,
    },
    primitives::{
        Bytes,
        Felt,
    },
};

use std::collections::HashMap;

use tracing::warn;

/// Identity under which a request-family event is matched to its group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    /// Opaque on-chain request id.
    RequestId(Felt),
    /// Byte-exact composite identity. Ancillary data participates in full;
    /// a single differing byte is a different request.
    Composite {
        requester: Felt,
        identifier: Felt,
        timestamp: u64,
        ancillary_data: Bytes,
    },
}

impl CorrelationKey {
    fn composite(requester: Felt, identifier: Felt, timestamp: u64, ancillary_data: &Bytes) -> Self {
        Self::Composite {
            requester,
            identifier,
            timestamp,
            ancillary_data: ancillary_data.clone(),
        }
    }
}

/// All events observed for one price request, keyed by lifecycle slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestGroup {
    pub request: Option<RequestPrice>,
    pub propose: Option<ProposePrice>,
    pub dispute: Option<DisputePrice>,
    pub settle: Option<SettlePrice>,
}

/// All events observed for one assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionGroup {
    pub made: Option<AssertionMade>,
    pub dispute: Option<AssertionDisputed>,
    pub settle: Option<AssertionSettled>,
}

/// Correlate an unordered request-family window into per-request groups.
///
/// Replay order is whatever the log source returned; no slot assignment
/// depends on encounter order except the first-wins duplicate rule.
pub fn correlate_requests(events: Vec<RequestEvent>) -> Vec<RequestGroup> {
    let mut index: HashMap<CorrelationKey, usize> = HashMap::new();
    let mut groups: Vec<RequestGroup> = Vec::new();

    // Resolve by id first (the stronger identity), then by composite;
    // whichever group is found (or created) gets both forms registered so
    // later events match under either.
    let mut slot = |index: &mut HashMap<CorrelationKey, usize>,
                    groups: &mut Vec<RequestGroup>,
                    composite: CorrelationKey,
                    request_id: Option<Felt>|
     -> usize {
        let id_key = request_id.map(CorrelationKey::RequestId);
        let found = id_key
            .as_ref()
            .and_then(|key| index.get(key))
            .or_else(|| index.get(&composite))
            .copied();
        let at = found.unwrap_or_else(|| {
            groups.push(RequestGroup::default());
            groups.len() - 1
        });
        index.entry(composite).or_insert(at);
        if let Some(key) = id_key {
            index.entry(key).or_insert(at);
        }
        at
    };

    for event in events {
        match event {
            RequestEvent::Requested(request) => {
                let key = CorrelationKey::composite(
                    request.requester,
                    request.identifier,
                    request.timestamp,
                    &request.ancillary_data,
                );
                let at = slot(&mut index, &mut groups, key, request.request_id);
                fill(&mut groups[at].request, request, "RequestPrice");
            }
            RequestEvent::Proposed(propose) => {
                let key = CorrelationKey::composite(
                    propose.requester,
                    propose.identifier,
                    propose.timestamp,
                    &propose.ancillary_data,
                );
                let at = slot(&mut index, &mut groups, key, propose.request_id);
                fill(&mut groups[at].propose, propose, "ProposePrice");
            }
            RequestEvent::Disputed(dispute) => {
                let key = CorrelationKey::composite(
                    dispute.requester,
                    dispute.identifier,
                    dispute.timestamp,
                    &dispute.ancillary_data,
                );
                let at = slot(&mut index, &mut groups, key, dispute.request_id);
                fill(&mut groups[at].dispute, dispute, "DisputePrice");
            }
            RequestEvent::Settled(settle) => {
                let key = CorrelationKey::composite(
                    settle.requester,
                    settle.identifier,
                    settle.timestamp,
                    &settle.ancillary_data,
                );
                let at = slot(&mut index, &mut groups, key, settle.request_id);
                fill(&mut groups[at].settle, settle, "Settle");
            }
        }
    }

    groups
}

/// Correlate an assertion-family window on the assertion id.
pub fn correlate_assertions(events: Vec<AssertionEvent>) -> Vec<AssertionGroup> {
    let mut index: HashMap<Felt, usize> = HashMap::new();
    let mut groups: Vec<AssertionGroup> = Vec::new();

    let mut slot = |index: &mut HashMap<Felt, usize>,
                    groups: &mut Vec<AssertionGroup>,
                    id: Felt|
     -> usize {
        if let Some(&at) = index.get(&id) {
            return at;
        }
        let at = groups.len();
        groups.push(AssertionGroup::default());
        index.insert(id, at);
        at
    };

    for event in events {
        match event {
            AssertionEvent::Made(made) => {
                let at = slot(&mut index, &mut groups, made.assertion_id);
                fill(&mut groups[at].made, made, "AssertionMade");
            }
            AssertionEvent::Disputed(dispute) => {
                let at = slot(&mut index, &mut groups, dispute.assertion_id);
                fill(&mut groups[at].dispute, dispute, "AssertionDisputed");
            }
            AssertionEvent::Settled(settle) => {
                let at = slot(&mut index, &mut groups, settle.assertion_id);
                fill(&mut groups[at].settle, settle, "AssertionSettled");
            }
        }
    }

    groups
}

fn fill<T: std::fmt::Debug>(slot: &mut Option<T>, event: T, name: &str) {
    if slot.is_some() {
        warn!(event = name, ?event, "duplicate lifecycle event dropped");
        return;
    }
    *slot = Some(event);
}
