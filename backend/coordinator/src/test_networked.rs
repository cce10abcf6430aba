use std::sync::Arc;

use axum::{routing::post, Json, Router};
use reqwest::Client;
use serde_json::{json, Value};

use crate::clock::ManualClock;
use crate::gateway::{LedgerGateway, LocalSigner, NetworkedGateway};
use crate::ledger::GovernanceParams;
use crate::rpc::RpcClient;
use crate::types::{ApprovalStatus, ProjectStatus, TxOutcome, VoteResult};
use crate::voting::{self, Tally};
use crate::CoordinatorError;

const CONTRACT: &str = "5ContractAddressForTests";
const DEAD_ENDPOINT: &str = "http://127.0.0.1:9";
const NOW: i64 = 1_700_000_000_000;
const VOTING_END: i64 = 1_700_604_800_000;

// ─── Mock node ─────────────────────────────────────────────

fn project_info(id: u64) -> Value {
    match id {
        1 => json!({
            "name": "Lunes DeFi Protocol",
            "owner": "5Owner",
            "metadataUri": "ipfs://defi",
            "pairPsp22": null,
            "qtdVoteYes": "1,250,000",
            "qtdVoteNo": "180,000",
            "status": true,
            "creationTimestamp": "1,600,000,000,000"
        }),
        2 => json!({
            "name": "Paused Project",
            "owner": "5Other",
            "qtdVoteYes": 0,
            "qtdVoteNo": 0,
            "status": false,
            "creationTimestamp": 0
        }),
        _ => Value::Null,
    }
}

fn project_vault(id: u64) -> Value {
    match id {
        1 => json!({
            "projectId": 1,
            "creationTimestamp": "1,600,000,000,000",
            "status": "VotingPeriod",
            "currentVotingId": "7",
            "lastAnnualVote": 0
        }),
        2 => json!({
            "projectId": 2,
            "creationTimestamp": 0,
            "status": "Active",
            "currentVotingId": null,
            "lastAnnualVote": 0
        }),
        _ => Value::Null,
    }
}

fn contract_output(message: &str, args: &[Value]) -> Value {
    let arg_u64 = |i: usize| args.get(i).and_then(Value::as_u64).unwrap_or(0);
    let ok = |v: Value| json!({ "Ok": v });

    match message {
        "get_next_project_id" => ok(json!("3")),
        "get_project_info" => ok(project_info(arg_u64(0))),
        "get_project_vault" => ok(project_vault(arg_u64(0))),
        "get_project_total_guarantee" => match (arg_u64(0), arg_u64(1)) {
            (1, 0) => ok(json!("1,250,000")),
            (1, 1) => ok(json!("750,000")),
            _ => ok(json!(0)),
        },
        "get_project_score" => match arg_u64(0) {
            1 | 2 => ok(json!(60)),
            9 => ok(json!("sixty")),
            _ => ok(Value::Null),
        },
        "get_user_guarantee" => ok(json!("500")),
        "has_voted" => ok(json!(true)),
        "get_voting_info" => match arg_u64(0) {
            7 => ok(json!({
                "projectId": "1",
                "startTimestamp": NOW - 1_000,
                "endTimestamp": VOTING_END,
                "yesVotes": "1,250,000",
                "noVotes": "180,000",
                "totalEligible": "2,000,000",
                "result": "Pending"
            })),
            _ => ok(Value::Null),
        },
        "get_user_claim" => match args.get(1).and_then(Value::as_str) {
            Some("trap") => json!({ "Err": "ContractTrapped" }),
            Some("claimer") => ok(json!({
                "claimableAmount": "2,000",
                "claimedAmount": "500",
                "claimDeadline": VOTING_END
            })),
            _ => ok(Value::Null),
        },
        _ => json!({ "Err": format!("unknown message {message}") }),
    }
}

async fn rpc_handler(Json(req): Json<Value>) -> Json<Value> {
    let method = req["method"].as_str().unwrap_or_default();
    let params = req["params"].as_array().cloned().unwrap_or_default();

    let result = match method {
        "system_chain" => json!("Lunes Testnet"),
        "contracts_getInfo" => {
            if params.first().and_then(Value::as_str) == Some(CONTRACT) {
                json!({ "codeHash": "0x01" })
            } else {
                Value::Null
            }
        }
        "contracts_call" => {
            let call = params.first().cloned().unwrap_or_default();
            let message = call["message"].as_str().unwrap_or_default().to_string();
            let args = call["args"].as_array().cloned().unwrap_or_default();
            contract_output(&message, &args)
        }
        _ => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32601, "message": "Method not found" }
            }))
        }
    };
    Json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

async fn spawn_node() -> String {
    let app = Router::new().route("/", post(rpc_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn gateway(endpoints: Vec<String>, contract: &str) -> NetworkedGateway {
    NetworkedGateway::new(
        RpcClient::new(Client::new(), endpoints),
        contract.to_string(),
        GovernanceParams::default(),
        Arc::new(ManualClock::new(NOW)),
    )
}

async fn setup() -> NetworkedGateway {
    let url = spawn_node().await;
    let gw = gateway(vec![url], CONTRACT);
    gw.connect().await.unwrap();
    gw.set_signer(Arc::new(LocalSigner::new("5Alice"))).await;
    gw
}

// ─── Connection ────────────────────────────────────────────

#[tokio::test]
async fn test_connect_falls_back_to_next_endpoint() {
    let url = spawn_node().await;
    let gw = gateway(vec![DEAD_ENDPOINT.to_string(), url], CONTRACT);
    assert!(!gw.is_connected().await);
    assert!(gw.connect().await.unwrap());
    assert!(gw.is_connected().await);
}

#[tokio::test]
async fn test_connect_fails_without_endpoints_or_contract() {
    let gw = gateway(vec![DEAD_ENDPOINT.to_string()], CONTRACT);
    assert_eq!(gw.connect().await.unwrap_err().code(), "CONNECTION_ERROR");

    let url = spawn_node().await;
    let gw = gateway(vec![url.clone()], "5NothingDeployedHere");
    assert_eq!(gw.connect().await.unwrap_err().code(), "CONNECTION_ERROR");

    let gw = gateway(vec![url], "");
    assert_eq!(gw.connect().await.unwrap_err().code(), "CONNECTION_ERROR");
}

#[tokio::test]
async fn test_reads_before_connect_fail() {
    let url = spawn_node().await;
    let gw = gateway(vec![url], CONTRACT);
    let err = gw.get_project_info(1).await.unwrap_err();
    assert_eq!(err.code(), "CONNECTION_ERROR");
}

// ─── Reads ─────────────────────────────────────────────────

#[tokio::test]
async fn test_project_info_is_decoded() {
    let gw = setup().await;
    let p = gw.get_project_info(1).await.unwrap().unwrap();
    assert_eq!(p.name, "Lunes DeFi Protocol");
    assert_eq!(p.status, ProjectStatus::Voting);
    assert_eq!(p.approval, ApprovalStatus::PendingDeposit);
    assert_eq!(p.score, 60);
    assert_eq!(p.total_guarantee, 2_000_000);
    assert_eq!(p.vote_yes, 1_250_000);
    assert_eq!(p.creation_timestamp, 1_600_000_000_000);

    let vault = gw.get_project_vault(1).await.unwrap().unwrap();
    assert_eq!(vault.total_native, 1_250_000);
    assert_eq!(vault.total_psp22, 750_000);
    assert_eq!(vault.current_voting_id, Some(7));

    let paused = gw.get_project_info(2).await.unwrap().unwrap();
    assert_eq!(paused.status, ProjectStatus::Paused);

    assert!(gw.get_project_info(5).await.unwrap().is_none());
}

#[tokio::test]
async fn test_all_projects_walks_the_id_range() {
    let gw = setup().await;
    let projects = gw.get_all_projects().await.unwrap();
    let ids: Vec<u64> = projects.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_active_voting_and_quorum() {
    let gw = setup().await;
    let voting = gw.get_active_voting(1).await.unwrap().unwrap();
    assert_eq!(voting.voting_id, 7);
    assert!(voting.active);
    assert_eq!(voting.quorum_required, 75);

    let report = voting::evaluate(&Tally::from(&voting), NOW);
    assert!(report.quorum_met);
    assert_eq!(report.outcome, VoteResult::Approved);

    assert!(gw.get_active_voting(2).await.unwrap().is_none());
    assert!(gw.has_voted(1, "5Alice").await.unwrap());
}

#[tokio::test]
async fn test_claims_are_decoded() {
    let gw = setup().await;
    let claim = gw.get_user_claim(1, "claimer").await.unwrap().unwrap();
    assert_eq!(claim.outstanding(), 1_500);
    assert!(gw.get_user_claim(1, "nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_output_is_a_decode_error() {
    let gw = setup().await;
    let err = gw.get_project_score(9).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Decode(_)));
}

#[tokio::test]
async fn test_reverted_query_is_a_transaction_error() {
    let gw = setup().await;
    let err = gw.get_user_claim(1, "trap").await.unwrap_err();
    assert_eq!(err.code(), "TRANSACTION_ERROR");
}

// ─── Mutations ─────────────────────────────────────────────

#[tokio::test]
async fn test_mutations_are_pending() {
    let gw = setup().await;

    let reg = gw
        .register_project(crate::types::NewProject {
            name: "New".into(),
            metadata_uri: String::new(),
            owner: "5Alice".into(),
            pair_token: None,
        })
        .await
        .unwrap();
    assert_eq!(reg.project_id, None);
    assert_eq!(reg.tx.outcome, TxOutcome::Pending);
    assert_eq!(reg.tx.hash, "0x0000000000000001");

    let tx = gw.add_guarantee(1, 0, 10).await.unwrap();
    assert_eq!(tx.outcome, TxOutcome::Pending);

    let fin = gw.finalize_voting(1).await.unwrap();
    assert_eq!(fin.result, VoteResult::Pending);

    let claim = gw.process_claim(1).await.unwrap();
    assert_eq!(claim.amount, None);
}

#[tokio::test]
async fn test_mutation_without_signer_is_an_account_error() {
    let url = spawn_node().await;
    let gw = gateway(vec![url], CONTRACT);
    gw.connect().await.unwrap();
    let err = gw.add_guarantee(1, 0, 10).await.unwrap_err();
    assert_eq!(err.code(), "ACCOUNT_ERROR");
    assert!(gw.account().await.is_none());
}

#[tokio::test]
async fn test_withdraw_is_checked_before_submitting() {
    let gw = setup().await;
    let err = gw.withdraw_guarantee(1, 0, 501).await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::InsufficientBalance {
            requested: 501,
            available: 500
        }
    ));
    let tx = gw.withdraw_guarantee(1, 0, 500).await.unwrap();
    assert_eq!(tx.outcome, TxOutcome::Pending);

    let err = gw.add_guarantee(1, 42, 1).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_voting_needs_an_active_voting() {
    let gw = setup().await;
    assert_eq!(gw.vote(2, true).await.unwrap_err().code(), "NO_ACTIVE_VOTING");
    assert_eq!(gw.finalize_voting(2).await.unwrap_err().code(), "NO_ACTIVE_VOTING");
    assert_eq!(gw.finalize_voting(5).await.unwrap_err().code(), "PROJECT_NOT_FOUND");
    assert_eq!(gw.vote(1, true).await.unwrap().outcome, TxOutcome::Pending);
}

#[tokio::test]
async fn test_approval_book() {
    let gw = setup().await;

    // Project 2 holds no collateral.
    let err = gw.submit_for_approval(2).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    assert_eq!(
        gw.submit_for_approval(1).await.unwrap().status,
        ApprovalStatus::PendingApproval
    );
    let r = gw.reject_project(1, "needs audit").await.unwrap();
    assert_eq!(r.reason.as_deref(), Some("needs audit"));

    let p = gw.get_project_info(1).await.unwrap().unwrap();
    assert_eq!(p.approval, ApprovalStatus::Rejected);
    assert_eq!(p.rejection_reason.as_deref(), Some("needs audit"));

    let err = gw.approve_project(1).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSITION");
    gw.resubmit_project(1).await.unwrap();
    assert_eq!(
        gw.approve_project(1).await.unwrap().status,
        ApprovalStatus::Approved
    );
}
