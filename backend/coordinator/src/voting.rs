//! Quorum arithmetic for community votings.
//!
//! Everything here is a pure function of its inputs: the same tally and the
//! same clock reading always produce the same [`VotingReport`].

use serde::Serialize;

use crate::types::{Balance, Timestamp, VoteResult, Voting};

/// Minimum share of the eligible weight that must take part.
pub const MIN_PARTICIPATION: f64 = 0.5;

/// Inputs of a quorum evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub yes: Balance,
    pub no: Balance,
    pub eligible: Balance,
    /// Required approval percentage of the votes cast.
    pub quorum_required: u8,
    pub result: VoteResult,
    pub end_time: Timestamp,
}

impl From<&Voting> for Tally {
    fn from(v: &Voting) -> Self {
        Self {
            yes: v.votes_yes,
            no: v.votes_no,
            eligible: v.total_eligible,
            quorum_required: v.quorum_required,
            result: v.result,
            end_time: v.end_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VotingReport {
    /// Fraction of the eligible weight that voted, `0.0..=1.0`.
    pub participation: f64,
    /// Fraction of the cast weight that voted yes, `0.0..=1.0`.
    pub approval_rate: f64,
    pub is_active: bool,
    pub quorum_met: bool,
    /// Result a finalization would record right now.
    pub outcome: VoteResult,
    pub time_left_ms: i64,
}

pub fn total_votes(yes: Balance, no: Balance) -> Balance {
    yes.saturating_add(no)
}

pub fn participation(total_votes: Balance, eligible: Balance) -> f64 {
    if eligible == 0 {
        return 0.0;
    }
    total_votes as f64 / eligible as f64
}

pub fn approval_rate(yes: Balance, total_votes: Balance) -> f64 {
    if total_votes == 0 {
        return 0.0;
    }
    yes as f64 / total_votes as f64
}

pub fn is_active(result: VoteResult, now: Timestamp, end_time: Timestamp) -> bool {
    result == VoteResult::Pending && now < end_time
}

pub fn quorum_met(participation: f64, approval_rate: f64, quorum_required: u8) -> bool {
    participation >= MIN_PARTICIPATION && approval_rate * 100.0 >= f64::from(quorum_required)
}

/// Result recorded when a voting with this tally is finalized.
pub fn outcome(tally: &Tally) -> VoteResult {
    let total = total_votes(tally.yes, tally.no);
    let p = participation(total, tally.eligible);
    let a = approval_rate(tally.yes, total);
    if quorum_met(p, a, tally.quorum_required) {
        VoteResult::Approved
    } else {
        VoteResult::Rejected
    }
}

pub fn evaluate(tally: &Tally, now: Timestamp) -> VotingReport {
    let total = total_votes(tally.yes, tally.no);
    let participation = participation(total, tally.eligible);
    let approval_rate = approval_rate(tally.yes, total);
    VotingReport {
        participation,
        approval_rate,
        is_active: is_active(tally.result, now, tally.end_time),
        quorum_met: quorum_met(participation, approval_rate, tally.quorum_required),
        outcome: outcome(tally),
        time_left_ms: (tally.end_time - now).max(0),
    }
}
