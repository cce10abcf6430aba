#![allow(dead_code)]

use crate::ledger::ProjectLedger;
use crate::types::{Balance, ProjectId, VoteResult, Voting};

/// The vault total equals the sum of the project's guarantee records, and the
/// project mirrors both the total and the status.
pub fn assert_vault_matches_records(ledger: &ProjectLedger, project: ProjectId) {
    let vault = ledger
        .vault(project)
        .unwrap_or_else(|| panic!("project {project} has no vault"));
    let p = ledger
        .project(project)
        .unwrap_or_else(|| panic!("project {project} not registered"));
    let sum: Balance = ledger.records(project).iter().map(|r| r.amount).sum();

    assert_eq!(
        vault.total, sum,
        "vault total {} of project {} differs from its records ({})",
        vault.total, project, sum
    );
    assert_eq!(
        vault.total,
        vault.total_native + vault.total_psp22 + Balance::from(vault.nft_collateral_count),
        "vault total of project {project} differs from its per-kind split"
    );
    assert_eq!(p.total_guarantee, vault.total, "project total out of sync");
    assert_eq!(p.status, vault.status, "vault status out of sync");
}

/// No record of a depositor is ever zero; zero records are removed.
pub fn assert_no_empty_records(ledger: &ProjectLedger, project: ProjectId) {
    for r in ledger.records(project) {
        assert!(r.amount > 0, "empty record left for {}", r.depositor);
    }
}

/// Claimed never exceeds claimable.
pub fn assert_claims_consistent(ledger: &ProjectLedger, project: ProjectId) {
    let depositors: Vec<String> = ledger
        .records(project)
        .into_iter()
        .map(|r| r.depositor)
        .collect();
    for user in depositors {
        if let Some(claim) = ledger.user_claim(project, &user) {
            assert!(
                claim.claimable_amount >= claim.claimed_amount,
                "claim of {user} over-paid: {} > {}",
                claim.claimed_amount,
                claim.claimable_amount
            );
        }
    }
}

/// A finalized voting is inactive and carries a decided result.
pub fn assert_voting_settled(voting: &Voting) {
    assert!(!voting.active, "voting {} still active", voting.voting_id);
    assert_ne!(
        voting.result,
        VoteResult::Pending,
        "voting {} finalized without a result",
        voting.voting_id
    );
}

/// Deposits add exactly the deposited amount.
pub fn assert_deposit_delta(before: Balance, after: Balance, amount: Balance) {
    assert_eq!(
        after,
        before + amount,
        "deposit of {amount} moved the total from {before} to {after}"
    );
}

/// Scores never go down on a deposit.
pub fn assert_score_monotonic(before: u8, after: u8) {
    assert!(after >= before, "score decreased from {before} to {after}");
}
