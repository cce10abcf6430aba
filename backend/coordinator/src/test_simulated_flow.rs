use std::sync::Arc;
use std::time::Duration;

use crate::clock::ManualClock;
use crate::gateway::{LedgerGateway, LocalSigner, SimulatedGateway};
use crate::invariants::{assert_deposit_delta, assert_score_monotonic, assert_voting_settled};
use crate::ledger::{GovernanceParams, ProjectLedger};
use crate::score::ProjectProfile;
use crate::service::{ProjectDraft, ProjectService};
use crate::types::{
    ApprovalAction, ApprovalStatus, NewProject, ProjectId, ProjectStatus, TxOutcome, VoteResult,
    DAY_MS, NATIVE_TOKEN, PSP22_TOKEN,
};
use crate::CoordinatorError;

const OWNER: &str = "owner";
const ALICE: &str = "alice";
const BOB: &str = "bob";
const START: i64 = 1_700_000_000_000;

fn setup() -> (Arc<SimulatedGateway>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let gateway = Arc::new(SimulatedGateway::new(
        ProjectLedger::new(),
        GovernanceParams::default(),
        Duration::ZERO,
        clock.clone(),
    ));
    (gateway, clock)
}

async fn act_as(gateway: &SimulatedGateway, who: &str) {
    gateway.set_signer(Arc::new(LocalSigner::new(who))).await;
}

async fn connected_with_project() -> (Arc<SimulatedGateway>, Arc<ManualClock>, ProjectId) {
    let (gateway, clock) = setup();
    gateway.connect().await.unwrap();
    act_as(&gateway, OWNER).await;
    let reg = gateway
        .register_project(NewProject {
            name: "Solar Farm".into(),
            metadata_uri: "ipfs://solar".into(),
            owner: OWNER.into(),
            pair_token: None,
        })
        .await
        .unwrap();
    (gateway, clock, reg.project_id.unwrap())
}

#[tokio::test]
async fn test_deposit_then_withdraw_round() {
    let (gw, _, id) = connected_with_project().await;
    act_as(&gw, ALICE).await;

    let before = gw.get_project_vault(id).await.unwrap().unwrap().total;
    let score_before = gw.get_project_score(id).await.unwrap().unwrap();
    let tx = gw.add_guarantee(id, NATIVE_TOKEN, 1_000).await.unwrap();
    assert_eq!(tx.outcome, TxOutcome::Confirmed);

    let after = gw.get_project_vault(id).await.unwrap().unwrap().total;
    assert_deposit_delta(before, after, 1_000);
    assert_score_monotonic(score_before, gw.get_project_score(id).await.unwrap().unwrap());

    gw.withdraw_guarantee(id, NATIVE_TOKEN, 300).await.unwrap();
    assert_eq!(gw.get_user_guarantee(id, NATIVE_TOKEN, ALICE).await.unwrap(), 700);

    let err = gw.withdraw_guarantee(id, NATIVE_TOKEN, 701).await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::InsufficientBalance {
            requested: 701,
            available: 700
        }
    ));
    assert_eq!(gw.get_project_vault(id).await.unwrap().unwrap().total, 700);
}

#[tokio::test]
async fn test_unknown_project_reads_are_none() {
    let (gw, _, _) = connected_with_project().await;
    assert!(gw.get_project_info(99).await.unwrap().is_none());
    assert!(gw.get_project_vault(99).await.unwrap().is_none());
    assert!(gw.get_project_score(99).await.unwrap().is_none());
    assert!(gw.get_active_voting(99).await.unwrap().is_none());
    let err = gw.add_guarantee(99, NATIVE_TOKEN, 1).await.unwrap_err();
    assert_eq!(err.code(), "PROJECT_NOT_FOUND");
}

#[tokio::test]
async fn test_voting_approves_with_quorum() {
    let (gw, clock, id) = connected_with_project().await;
    act_as(&gw, ALICE).await;
    gw.add_guarantee(id, NATIVE_TOKEN, 900).await.unwrap();
    act_as(&gw, BOB).await;
    gw.add_guarantee(id, PSP22_TOKEN, 100).await.unwrap();

    let started = gw.start_annual_voting(id).await.unwrap();
    let voting_id = started.voting_id.unwrap();
    let voting = gw.get_active_voting(id).await.unwrap().unwrap();
    assert_eq!(voting.total_eligible, 1_000);
    assert_eq!(voting.end_time, START + 7 * DAY_MS);
    assert_eq!(voting.quorum_required, 75);
    assert_eq!(
        gw.get_project_info(id).await.unwrap().unwrap().status,
        ProjectStatus::Voting
    );

    act_as(&gw, ALICE).await;
    gw.vote(id, true).await.unwrap();
    assert!(gw.has_voted(id, ALICE).await.unwrap());
    assert!(!gw.has_voted(id, BOB).await.unwrap());

    let err = gw.vote(id, false).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    clock.advance(DAY_MS);
    let fin = gw.finalize_voting(id).await.unwrap();
    assert_eq!(fin.result, VoteResult::Approved);

    let voting = gw.get_voting_info(voting_id).await.unwrap().unwrap();
    assert_voting_settled(&voting);
    assert_eq!(voting.votes_yes, 900);
    assert!(gw.get_active_voting(id).await.unwrap().is_none());
    assert_eq!(
        gw.get_project_info(id).await.unwrap().unwrap().status,
        ProjectStatus::Active
    );
}

#[tokio::test]
async fn test_voting_window_expiry() {
    let (gw, clock, id) = connected_with_project().await;
    act_as(&gw, ALICE).await;
    gw.add_guarantee(id, NATIVE_TOKEN, 500).await.unwrap();
    gw.start_annual_voting(id).await.unwrap();

    clock.advance(7 * DAY_MS);
    assert!(gw.get_active_voting(id).await.unwrap().is_none());
    let err = gw.vote(id, true).await.unwrap_err();
    assert_eq!(err.code(), "NO_ACTIVE_VOTING");

    // An expired voting can still be closed; nobody voted, so it is rejected.
    let fin = gw.finalize_voting(id).await.unwrap();
    assert_eq!(fin.result, VoteResult::Rejected);
    let err = gw.finalize_voting(id).await.unwrap_err();
    assert_eq!(err.code(), "NO_ACTIVE_VOTING");
}

#[tokio::test]
async fn test_rejection_liquidates_and_claims_pay_out() {
    let (gw, clock, id) = connected_with_project().await;
    act_as(&gw, ALICE).await;
    gw.add_guarantee(id, NATIVE_TOKEN, 600).await.unwrap();
    act_as(&gw, BOB).await;
    gw.add_guarantee(id, NATIVE_TOKEN, 400).await.unwrap();

    gw.start_annual_voting(id).await.unwrap();
    gw.vote(id, false).await.unwrap();
    act_as(&gw, ALICE).await;
    gw.vote(id, false).await.unwrap();
    assert_eq!(gw.finalize_voting(id).await.unwrap().result, VoteResult::Rejected);

    let project = gw.get_project_info(id).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Liquidating);

    // Collateral is locked for claims.
    let err = gw.add_guarantee(id, NATIVE_TOKEN, 1).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    let err = gw.withdraw_guarantee(id, NATIVE_TOKEN, 1).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let claim = gw.get_user_claim(id, ALICE).await.unwrap().unwrap();
    assert_eq!(claim.claimable_amount, 600);
    assert_eq!(claim.claim_deadline, START + 30 * DAY_MS);

    clock.advance(DAY_MS);
    let receipt = gw.process_claim(id).await.unwrap();
    assert_eq!(receipt.amount, Some(600));
    assert_eq!(gw.get_user_claim(id, ALICE).await.unwrap().unwrap().claimed_amount, 600);

    act_as(&gw, BOB).await;
    gw.process_claim(id).await.unwrap();
    let project = gw.get_project_info(id).await.unwrap().unwrap();
    assert_eq!(project.status, ProjectStatus::Closed);
    assert_eq!(project.total_guarantee, 0);
}

#[tokio::test]
async fn test_approval_workflow_through_gateway() {
    let (gw, _, id) = connected_with_project().await;

    let err = gw.submit_for_approval(id).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    gw.add_guarantee(id, NATIVE_TOKEN, 10).await.unwrap();
    let r = gw.submit_for_approval(id).await.unwrap();
    assert_eq!(r.status, ApprovalStatus::PendingApproval);

    let err = gw.reject_project(id, "   ").await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let r = gw.reject_project(id, "no audit").await.unwrap();
    assert_eq!(r.status, ApprovalStatus::Rejected);
    assert_eq!(r.reason.as_deref(), Some("no audit"));

    let err = gw.approve_project(id).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSITION");
    let p = gw.get_project_info(id).await.unwrap().unwrap();
    assert_eq!(p.approval, ApprovalStatus::Rejected);
    assert_eq!(p.rejection_reason.as_deref(), Some("no audit"));

    assert_eq!(
        gw.resubmit_project(id).await.unwrap().status,
        ApprovalStatus::PendingApproval
    );
    assert_eq!(gw.approve_project(id).await.unwrap().status, ApprovalStatus::Approved);
}

// ─── Service ───────────────────────────────────────────────

fn service(gw: Arc<SimulatedGateway>, clock: Arc<ManualClock>) -> ProjectService {
    ProjectService::with_clock(gw, clock)
}

#[tokio::test]
async fn test_service_register_estimates_and_defaults_owner() {
    let (gw, clock) = setup();
    gw.connect().await.unwrap();
    act_as(&gw, OWNER).await;
    let svc = service(gw.clone(), clock);

    let registered = svc
        .register(ProjectDraft {
            name: "Wind".into(),
            metadata_uri: String::new(),
            owner: None,
            pair_token: None,
            profile: ProjectProfile {
                has_audit: true,
                ..Default::default()
            },
        })
        .await
        .unwrap();

    assert_eq!(registered.estimated_score, 70);
    assert!((registered.deposit.minimum - 130.0).abs() < 1e-9);
    let id = registered.registration.project_id.unwrap();
    let p = gw.get_project_info(id).await.unwrap().unwrap();
    assert_eq!(p.owner, OWNER);
    // The ledger score is independent of the estimate.
    assert_eq!(p.score, 50);
}

#[tokio::test]
async fn test_service_funding_submits_for_approval() {
    let (gw, clock, id) = connected_with_project().await;
    let svc = service(gw.clone(), clock);

    let err = svc
        .fund_initial_deposit(id, PSP22_TOKEN, 100.0, 50)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let funding = svc
        .fund_initial_deposit(id, PSP22_TOKEN, 150.0, 50)
        .await
        .unwrap();
    assert_eq!(funding.deposit.tx.outcome, TxOutcome::Confirmed);
    assert_eq!(funding.deposit.vault_total, 150_000_000);
    assert_eq!(
        funding.approval.unwrap().status,
        ApprovalStatus::PendingApproval
    );
}

#[tokio::test]
async fn test_service_overview_reports_voting() {
    let (gw, clock, id) = connected_with_project().await;
    gw.add_guarantee(id, NATIVE_TOKEN, 1_000).await.unwrap();
    gw.start_annual_voting(id).await.unwrap();
    gw.vote(id, true).await.unwrap();
    let svc = service(gw.clone(), clock.clone());

    clock.advance(DAY_MS);
    let overview = svc.overview(id).await.unwrap();
    let report = overview.report.unwrap();
    assert_eq!(report.participation, 1.0);
    assert!(report.quorum_met);
    assert_eq!(report.outcome, VoteResult::Approved);
    assert_eq!(report.time_left_ms, 6 * DAY_MS);
    assert_eq!(overview.project.score, 55);
    assert_eq!(overview.available_actions, vec![ApprovalAction::SubmitForApproval]);

    assert_eq!(overview.collateral_score, Some(0));

    let err = svc.overview(404).await.unwrap_err();
    assert_eq!(err.code(), "PROJECT_NOT_FOUND");
}

#[tokio::test]
async fn test_service_overview_scores_collateral() {
    const LUNES: u128 = 1_000_000_000_000_000_000;
    let (gw, clock, id) = connected_with_project().await;
    gw.add_guarantee(id, NATIVE_TOKEN, 60_000 * LUNES).await.unwrap();
    let svc = service(gw.clone(), clock);

    // 60k LUNES earn 57 of the 95 LUNES points.
    let overview = svc.overview(id).await.unwrap();
    assert_eq!(overview.collateral_score, Some(57));
    assert_eq!(overview.project.score, 55);
}
