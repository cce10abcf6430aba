//! Axum REST API handlers.
//!
//! Every failure renders as `{"code": ..., "error": ...}` with the status
//! given by [`status_for`].

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::Network;
use crate::errors::CoordinatorError;
use crate::guarantee::DepositRequirement;
use crate::rpc::human_balance;
use crate::score::{CollateralMix, ProjectProfile, ScoreEstimator};
use crate::service::{ProjectDraft, ProjectService};
use crate::types::{ApprovalAction, Balance, ProjectId, TokenId, Voting, VotingId};
use crate::voting::{self, Tally, VotingReport};

pub struct ApiState {
    pub service: ProjectService,
    pub network: Network,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/:id", get(get_project))
        .route("/projects/:id/vault", get(get_vault))
        .route("/projects/:id/guarantees", post(add_guarantee))
        .route("/projects/:id/funding", post(fund_project))
        .route("/projects/:id/withdrawals", post(withdraw_guarantee))
        .route("/projects/:id/votes", post(vote))
        .route("/projects/:id/voting", post(start_voting))
        .route("/projects/:id/voting/finalize", post(finalize_voting))
        .route("/projects/:id/claims", post(process_claim))
        .route("/projects/:id/claims/:user", get(get_claim))
        .route("/projects/:id/approval/:action", post(approval))
        .route("/votings/:id", get(get_voting))
        .route("/score/estimate", post(estimate_score))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AmountRequest {
    pub token_id: TokenId,
    /// Smallest units; a number or a digit-grouped string.
    #[serde(deserialize_with = "human_balance")]
    pub amount: Balance,
}

#[derive(Deserialize)]
pub struct FundingRequest {
    pub token_id: TokenId,
    /// Whole tokens.
    pub amount: f64,
    pub estimated_score: u8,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub approve: bool,
}

#[derive(Deserialize, Default)]
pub struct ApprovalRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct EstimateRequest {
    #[serde(flatten)]
    pub profile: ProjectProfile,
    /// Whole tokens; adds a collateral-based preview when present.
    #[serde(default)]
    pub collateral: Option<CollateralMix>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub mode: String,
    pub network: String,
    pub connected: bool,
}

#[derive(Serialize)]
pub struct ProjectsResponse<T> {
    pub count: usize,
    pub projects: Vec<T>,
}

/// A receipt plus the explorer link of its transaction.
#[derive(Serialize)]
pub struct Submitted<T> {
    #[serde(flatten)]
    pub receipt: T,
    pub explorer_url: String,
}

#[derive(Serialize)]
pub struct VotingResponse {
    pub voting: Voting,
    pub report: VotingReport,
}

#[derive(Serialize)]
pub struct EstimateResponse {
    pub score: u8,
    pub deposit: DepositRequirement,
    pub collateral_score: Option<u8>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub error: String,
}

// ─────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────

pub fn status_for(e: &CoordinatorError) -> StatusCode {
    match e {
        CoordinatorError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoordinatorError::Account(_) => StatusCode::UNAUTHORIZED,
        CoordinatorError::Validation(_) => StatusCode::BAD_REQUEST,
        CoordinatorError::InsufficientBalance { .. }
        | CoordinatorError::InvalidTransition { .. }
        | CoordinatorError::NoActiveVoting(_) => StatusCode::CONFLICT,
        CoordinatorError::Transaction(_) | CoordinatorError::Decode(_) => StatusCode::BAD_GATEWAY,
        CoordinatorError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
        CoordinatorError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub struct ApiError(CoordinatorError);

impl From<CoordinatorError> for ApiError {
    fn from(e: CoordinatorError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("{}", self.0);
        } else {
            warn!("{}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                code: self.0.code(),
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult = std::result::Result<Response, ApiError>;

fn not_found(what: String) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            code: "NOT_FOUND",
            error: what,
        }),
    )
        .into_response()
}

fn submitted<T: Serialize>(state: &ApiState, status: StatusCode, receipt: T, hash: &str) -> Response {
    let body = Submitted {
        receipt,
        explorer_url: state.network.explorer_tx_url(hash),
    };
    (status, Json(body)).into_response()
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let gateway = state.service.gateway();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mode: gateway.mode().to_string(),
        network: state.network.to_string(),
        connected: gateway.is_connected().await,
    })
}

/// `GET /projects`
pub async fn list_projects(State(state): State<Arc<ApiState>>) -> ApiResult {
    let projects = state.service.gateway().get_all_projects().await?;
    Ok(Json(ProjectsResponse {
        count: projects.len(),
        projects,
    })
    .into_response())
}

/// `POST /projects`
pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    Json(draft): Json<ProjectDraft>,
) -> ApiResult {
    let registered = state.service.register(draft).await?;
    let hash = registered.registration.tx.hash.clone();
    Ok(submitted(&state, StatusCode::CREATED, registered, &hash))
}

/// `GET /projects/:id`
pub async fn get_project(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<ProjectId>,
) -> ApiResult {
    Ok(Json(state.service.overview(id).await?).into_response())
}

/// `GET /projects/:id/vault`
pub async fn get_vault(State(state): State<Arc<ApiState>>, Path(id): Path<ProjectId>) -> ApiResult {
    match state.service.gateway().get_project_vault(id).await? {
        Some(vault) => Ok(Json(vault).into_response()),
        None => Err(CoordinatorError::ProjectNotFound(id).into()),
    }
}

/// `POST /projects/:id/guarantees`
pub async fn add_guarantee(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<ProjectId>,
    Json(req): Json<AmountRequest>,
) -> ApiResult {
    let tracked = state.service.deposit(id, req.token_id, req.amount).await?;
    let hash = tracked.tx.hash.clone();
    Ok(submitted(&state, StatusCode::OK, tracked, &hash))
}

/// `POST /projects/:id/funding`
pub async fn fund_project(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<ProjectId>,
    Json(req): Json<FundingRequest>,
) -> ApiResult {
    let funding = state
        .service
        .fund_initial_deposit(id, req.token_id, req.amount, req.estimated_score)
        .await?;
    let hash = funding.deposit.tx.hash.clone();
    Ok(submitted(&state, StatusCode::OK, funding, &hash))
}

/// `POST /projects/:id/withdrawals`
pub async fn withdraw_guarantee(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<ProjectId>,
    Json(req): Json<AmountRequest>,
) -> ApiResult {
    let tx = state
        .service
        .gateway()
        .withdraw_guarantee(id, req.token_id, req.amount)
        .await?;
    let hash = tx.hash.clone();
    Ok(submitted(&state, StatusCode::OK, tx, &hash))
}

/// `POST /projects/:id/votes`
pub async fn vote(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<ProjectId>,
    Json(req): Json<VoteRequest>,
) -> ApiResult {
    let tx = state.service.gateway().vote(id, req.approve).await?;
    let hash = tx.hash.clone();
    Ok(submitted(&state, StatusCode::OK, tx, &hash))
}

/// `POST /projects/:id/voting`
pub async fn start_voting(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<ProjectId>,
) -> ApiResult {
    let started = state.service.gateway().start_annual_voting(id).await?;
    let hash = started.tx.hash.clone();
    Ok(submitted(&state, StatusCode::CREATED, started, &hash))
}

/// `POST /projects/:id/voting/finalize`
pub async fn finalize_voting(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<ProjectId>,
) -> ApiResult {
    let fin = state.service.gateway().finalize_voting(id).await?;
    let hash = fin.tx.hash.clone();
    Ok(submitted(&state, StatusCode::OK, fin, &hash))
}

/// `POST /projects/:id/claims`
pub async fn process_claim(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<ProjectId>,
) -> ApiResult {
    let receipt = state.service.gateway().process_claim(id).await?;
    let hash = receipt.tx.hash.clone();
    Ok(submitted(&state, StatusCode::OK, receipt, &hash))
}

/// `GET /projects/:id/claims/:user`
pub async fn get_claim(
    State(state): State<Arc<ApiState>>,
    Path((id, user)): Path<(ProjectId, String)>,
) -> ApiResult {
    match state.service.gateway().get_user_claim(id, &user).await? {
        Some(claim) => Ok(Json(claim).into_response()),
        None => Ok(not_found(format!("{user} has no claim in project {id}"))),
    }
}

/// `POST /projects/:id/approval/:action`
///
/// `action` is one of `submit`, `approve`, `reject`, `resubmit`; `reject`
/// takes `{"reason": "..."}`.
pub async fn approval(
    State(state): State<Arc<ApiState>>,
    Path((id, action)): Path<(ProjectId, String)>,
    body: Option<Json<ApprovalRequest>>,
) -> ApiResult {
    let action = ApprovalAction::from_segment(&action).ok_or_else(|| {
        CoordinatorError::validation(format!("unknown approval action {action:?}"))
    })?;
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let gateway = state.service.gateway();

    let receipt = match action {
        ApprovalAction::SubmitForApproval => gateway.submit_for_approval(id).await?,
        ApprovalAction::Approve => gateway.approve_project(id).await?,
        ApprovalAction::Reject => {
            gateway
                .reject_project(id, req.reason.as_deref().unwrap_or_default())
                .await?
        }
        ApprovalAction::Resubmit => gateway.resubmit_project(id).await?,
    };
    Ok(Json(receipt).into_response())
}

/// `GET /votings/:id`
pub async fn get_voting(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<VotingId>,
) -> ApiResult {
    match state.service.gateway().get_voting_info(id).await? {
        Some(v) => {
            let report = voting::evaluate(&Tally::from(&v), state.service.now());
            Ok(Json(VotingResponse { voting: v, report }).into_response())
        }
        None => Ok(not_found(format!("voting {id} not found"))),
    }
}

/// `POST /score/estimate`
pub async fn estimate_score(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<EstimateRequest>,
) -> impl IntoResponse {
    let score = ScoreEstimator::estimate(&req.profile);
    Json(EstimateResponse {
        score,
        deposit: state.service.policy().requirement(score),
        collateral_score: req.collateral.as_ref().map(ScoreEstimator::from_collateral),
    })
}
