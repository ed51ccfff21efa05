//! Pure lifecycle derivation over a correlated event group.
//!
//! State is a function of (group, now) and nothing else, so repeated
//! evaluation over the same replay window is idempotent. Precedence:
//! a settlement outranks a dispute, a dispute outranks expiration, and
//! expiration only applies once the liveness deadline has passed.

use crate::events::{
    AssertionGroup,
    RequestGroup,
};

use std::fmt;

use serde::Serialize;

/// Canonical lifecycle state of a request or assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Requested,
    Proposed,
    Disputed,
    /// Assertion whose liveness passed without a dispute.
    Expired,
    /// Proposed answer whose challenge window passed unchallenged.
    Resolved,
    Settled,
}

/// Coarse badge shown alongside the full state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Active,
    Disputed,
    Ended,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Requested => "requested",
            Self::Proposed => "proposed",
            Self::Disputed => "disputed",
            Self::Expired => "expired",
            Self::Resolved => "resolved",
            Self::Settled => "settled",
        };
        f.write_str(label)
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Disputed => "disputed",
            Self::Ended => "ended",
        };
        f.write_str(label)
    }
}

impl LifecycleState {
    pub fn display_status(&self) -> DisplayStatus {
        match self {
            Self::Requested | Self::Proposed => DisplayStatus::Active,
            Self::Disputed => DisplayStatus::Disputed,
            Self::Expired | Self::Resolved | Self::Settled => DisplayStatus::Ended,
        }
    }
}

/// Derive the state of a price request at unix time `now`.
///
/// Expiration is carried by the proposal: an unchallenged proposal past its
/// deadline is resolved even before anyone calls settle.
pub fn derive_request_state(group: &RequestGroup, now: u64) -> LifecycleState {
    if group.settle.is_some() {
        return LifecycleState::Settled;
    }
    if group.dispute.is_some() {
        return LifecycleState::Disputed;
    }
    if let Some(propose) = &group.propose {
        if propose.expiration_timestamp <= now {
            return LifecycleState::Resolved;
        }
        return LifecycleState::Proposed;
    }
    LifecycleState::Requested
}

/// Derive the state of an assertion at unix time `now`.
///
/// The liveness deadline is set at creation; past it an undisputed
/// assertion is expired, not resolved, because nothing was proposed against
/// it.
pub fn derive_assertion_state(group: &AssertionGroup, now: u64) -> LifecycleState {
    if group.settle.is_some() {
        return LifecycleState::Settled;
    }
    if group.dispute.is_some() {
        return LifecycleState::Disputed;
    }
    if let Some(made) = &group.made {
        if made.expiration_timestamp <= now {
            return LifecycleState::Expired;
        }
    }
    LifecycleState::Requested
}

/// Relative time until `expiration`, for display next to active entries.
/// Returns `None` once the deadline has passed.
pub fn time_left(expiration: u64, now: u64) -> Option<String> {
    let left = expiration.checked_sub(now).filter(|left| *left > 0)?;

    let days = left / 86_400;
    let hours = (left % 86_400) / 3_600;
    let minutes = (left % 3_600) / 60;
    let seconds = left % 60;

    let text = if days > 0 {
        format!("{days}d {hours}h left")
    } else if hours > 0 {
        format!("{hours}h {minutes}m left")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s left")
    } else {
        format!("{seconds}s left")
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        sample_assertion_disputed,
        sample_assertion_made,
        sample_assertion_settled,
        sample_dispute,
        sample_propose,
        sample_request,
        sample_settle,
    };

    fn request_group(
        propose: bool,
        dispute: bool,
        settle: bool,
    ) -> RequestGroup {
        RequestGroup {
            request: Some(sample_request(1)),
            propose: propose.then(|| sample_propose(1)),
            dispute: dispute.then(|| sample_dispute(1)),
            settle: settle.then(|| sample_settle(1)),
        }
    }

    // sample_propose(1) expires at timestamp 2_000.
    const BEFORE_EXPIRY: u64 = 1_500;
    const AFTER_EXPIRY: u64 = 2_500;

    #[test]
    fn disputed_then_settled_is_settled() {
        let group = request_group(true, true, true);
        assert_eq!(derive_request_state(&group, AFTER_EXPIRY), LifecycleState::Settled);
        assert_eq!(
            derive_request_state(&group, AFTER_EXPIRY).display_status(),
            DisplayStatus::Ended
        );
    }

    #[test]
    fn unchallenged_proposal_resolves_at_expiry() {
        let group = request_group(true, false, false);
        assert_eq!(derive_request_state(&group, BEFORE_EXPIRY), LifecycleState::Proposed);
        assert_eq!(derive_request_state(&group, AFTER_EXPIRY), LifecycleState::Resolved);
    }

    #[test]
    fn dispute_outranks_expiration() {
        let group = request_group(true, true, false);
        assert_eq!(derive_request_state(&group, AFTER_EXPIRY), LifecycleState::Disputed);
        assert_eq!(
            derive_request_state(&group, AFTER_EXPIRY).display_status(),
            DisplayStatus::Disputed
        );
    }

    #[test]
    fn bare_request_stays_active() {
        let group = request_group(false, false, false);
        assert_eq!(derive_request_state(&group, AFTER_EXPIRY), LifecycleState::Requested);
        assert_eq!(
            derive_request_state(&group, AFTER_EXPIRY).display_status(),
            DisplayStatus::Active
        );
    }

    #[test]
    fn derivation_is_idempotent_at_fixed_now() {
        let group = request_group(true, false, false);
        let first = derive_request_state(&group, BEFORE_EXPIRY);
        for _ in 0..3 {
            assert_eq!(derive_request_state(&group, BEFORE_EXPIRY), first);
        }
    }

    #[test]
    fn undisputed_assertion_expires() {
        let made = sample_assertion_made(1);
        let expiry = made.expiration_timestamp;
        let group = AssertionGroup {
            made: Some(made),
            dispute: None,
            settle: None,
        };
        assert_eq!(derive_assertion_state(&group, expiry - 1), LifecycleState::Requested);
        assert_eq!(derive_assertion_state(&group, expiry), LifecycleState::Expired);
        assert_eq!(
            derive_assertion_state(&group, expiry).display_status(),
            DisplayStatus::Ended
        );
    }

    #[test]
    fn assertion_settlement_outranks_dispute() {
        let group = AssertionGroup {
            made: Some(sample_assertion_made(1)),
            dispute: Some(sample_assertion_disputed(1)),
            settle: Some(sample_assertion_settled(1)),
        };
        assert_eq!(derive_assertion_state(&group, 0), LifecycleState::Settled);
    }

    #[test]
    fn time_left_formats_by_magnitude() {
        assert_eq!(time_left(90, 0).as_deref(), Some("1m 30s left"));
        assert_eq!(time_left(7_200, 600).as_deref(), Some("1h 50m left"));
        assert_eq!(time_left(200_000, 0).as_deref(), Some("2d 7h left"));
        assert_eq!(time_left(100, 100), None);
        assert_eq!(time_left(100, 200), None);
    }
}
