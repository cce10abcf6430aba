//! In-process gateway over an owned [`ProjectLedger`].
//!
//! Every operation first waits the configured latency, then runs atomically
//! under the ledger lock. Outcomes are `confirmed` because the effect is
//! already visible to the next read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::signer::nonce_hash;
use super::{GatewayMode, LedgerGateway, Signer};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::errors::{CoordinatorError, Result};
use crate::guarantee::GuaranteeAccount;
use crate::ledger::{GovernanceParams, ProjectLedger};
use crate::types::{
    AccountId, ApprovalAction, ApprovalReceipt, Balance, ClaimInfo, ClaimReceipt, Finalization,
    NewProject, Project, ProjectId, ProjectVault, Registration, TokenId, TokenKind, TxOutcome,
    TxRef, Voting, VotingId, VotingStarted,
};
use crate::voting;

struct SimState {
    ledger: ProjectLedger,
    connected: bool,
    signer: Option<Arc<dyn Signer>>,
}

pub struct SimulatedGateway {
    state: RwLock<SimState>,
    guarantees: GuaranteeAccount,
    params: GovernanceParams,
    latency: Duration,
    clock: Arc<dyn Clock>,
    nonce: AtomicU64,
}

impl SimulatedGateway {
    pub fn new(
        ledger: ProjectLedger,
        params: GovernanceParams,
        latency: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: RwLock::new(SimState {
                ledger,
                connected: false,
                signer: None,
            }),
            guarantees: GuaranteeAccount::default(),
            params,
            latency,
            clock,
            nonce: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ledger = if config.seed_demo {
            info!("Seeding simulated ledger with demo projects");
            ProjectLedger::with_demo_projects(&config.governance, clock.now())?
        } else {
            ProjectLedger::new()
        };
        Ok(Self::new(
            ledger,
            config.governance,
            Duration::from_millis(config.sim_latency_ms),
            clock,
        ))
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn confirmed(&self) -> TxRef {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        TxRef {
            hash: nonce_hash(nonce),
            outcome: TxOutcome::Confirmed,
        }
    }

    fn token_kind(&self, token: TokenId) -> TokenKind {
        self.guarantees
            .tokens()
            .get(token)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Native)
    }

    /// Copy of `v` with `active` reflecting the current clock.
    fn observed(&self, v: &Voting) -> Voting {
        let mut v = v.clone();
        v.active = voting::is_active(v.result, self.clock.now(), v.end_time);
        v
    }

    async fn approval(
        &self,
        project: ProjectId,
        action: ApprovalAction,
        reason: Option<&str>,
    ) -> Result<ApprovalReceipt> {
        self.pause().await;
        let mut state = self.state.write().await;
        require_account(&state)?;
        let receipt = state.ledger.apply_approval(project, action, reason)?;
        info!("Project {project}: {action} -> {}", receipt.status);
        Ok(receipt)
    }
}

fn require_connected(state: &SimState) -> Result<()> {
    if !state.connected {
        return Err(CoordinatorError::Connection(
            "simulated ledger not connected".to_string(),
        ));
    }
    Ok(())
}

fn require_account(state: &SimState) -> Result<AccountId> {
    require_connected(state)?;
    state
        .signer
        .as_ref()
        .map(|s| s.address().to_string())
        .ok_or_else(|| CoordinatorError::Account("no account selected".to_string()))
}

#[async_trait]
impl LedgerGateway for SimulatedGateway {
    fn mode(&self) -> GatewayMode {
        GatewayMode::Simulated
    }

    async fn connect(&self) -> Result<bool> {
        self.pause().await;
        let mut state = self.state.write().await;
        if !state.connected {
            state.connected = true;
            info!("Simulated ledger connected");
        }
        Ok(true)
    }

    async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    async fn set_signer(&self, signer: Arc<dyn Signer>) {
        debug!("Acting account set to {}", signer.address());
        self.state.write().await.signer = Some(signer);
    }

    async fn account(&self) -> Option<AccountId> {
        let state = self.state.read().await;
        state.signer.as_ref().map(|s| s.address().to_string())
    }

    async fn register_project(&self, project: NewProject) -> Result<Registration> {
        self.pause().await;
        let mut state = self.state.write().await;
        require_account(&state)?;
        let id = state.ledger.register(project, self.clock.now())?;
        info!("Registered project {id}");
        Ok(Registration {
            project_id: Some(id),
            tx: self.confirmed(),
        })
    }

    async fn get_project_info(&self, id: ProjectId) -> Result<Option<Project>> {
        self.pause().await;
        let state = self.state.read().await;
        require_connected(&state)?;
        Ok(state.ledger.project(id).cloned())
    }

    async fn get_all_projects(&self) -> Result<Vec<Project>> {
        self.pause().await;
        let state = self.state.read().await;
        require_connected(&state)?;
        Ok(state.ledger.projects())
    }

    async fn get_project_vault(&self, id: ProjectId) -> Result<Option<ProjectVault>> {
        self.pause().await;
        let state = self.state.read().await;
        require_connected(&state)?;
        Ok(state.ledger.vault(id).cloned())
    }

    async fn get_project_score(&self, id: ProjectId) -> Result<Option<u8>> {
        self.pause().await;
        let state = self.state.read().await;
        require_connected(&state)?;
        Ok(state.ledger.project(id).map(|p| p.score))
    }

    async fn add_guarantee(
        &self,
        project: ProjectId,
        token: TokenId,
        amount: Balance,
    ) -> Result<TxRef> {
        self.pause().await;
        let mut state = self.state.write().await;
        let account = require_account(&state)?;
        let score = self
            .guarantees
            .deposit(&mut state.ledger, project, token, &account, amount)?;
        debug!("Deposit of {amount} (token {token}) into project {project}; score {score}");
        Ok(self.confirmed())
    }

    async fn withdraw_guarantee(
        &self,
        project: ProjectId,
        token: TokenId,
        amount: Balance,
    ) -> Result<TxRef> {
        self.pause().await;
        let mut state = self.state.write().await;
        let account = require_account(&state)?;
        self.guarantees
            .withdraw(&mut state.ledger, project, token, &account, amount)?;
        debug!("Withdrawal of {amount} (token {token}) from project {project}");
        Ok(self.confirmed())
    }

    async fn get_user_guarantee(
        &self,
        project: ProjectId,
        token: TokenId,
        user: &str,
    ) -> Result<Balance> {
        self.pause().await;
        let state = self.state.read().await;
        require_connected(&state)?;
        Ok(state.ledger.user_guarantee(project, token, user))
    }

    async fn vote(&self, project: ProjectId, approve: bool) -> Result<TxRef> {
        self.pause().await;
        let mut state = self.state.write().await;
        let account = require_account(&state)?;
        let weight = state
            .ledger
            .cast_vote(project, &account, approve, self.clock.now())?;
        debug!("Vote on project {project}: approve={approve} weight={weight}");
        Ok(self.confirmed())
    }

    async fn has_voted(&self, project: ProjectId, user: &str) -> Result<bool> {
        self.pause().await;
        let state = self.state.read().await;
        require_connected(&state)?;
        Ok(state.ledger.has_voted(project, user))
    }

    async fn start_annual_voting(&self, project: ProjectId) -> Result<VotingStarted> {
        self.pause().await;
        let mut state = self.state.write().await;
        require_account(&state)?;
        let voting_id = state
            .ledger
            .start_voting(project, &self.params, self.clock.now())?;
        info!("Voting {voting_id} opened for project {project}");
        Ok(VotingStarted {
            voting_id: Some(voting_id),
            tx: self.confirmed(),
        })
    }

    async fn get_voting_info(&self, voting_id: VotingId) -> Result<Option<Voting>> {
        self.pause().await;
        let state = self.state.read().await;
        require_connected(&state)?;
        Ok(state.ledger.voting(voting_id).map(|v| self.observed(v)))
    }

    async fn get_active_voting(&self, project: ProjectId) -> Result<Option<Voting>> {
        self.pause().await;
        let state = self.state.read().await;
        require_connected(&state)?;
        Ok(state
            .ledger
            .current_voting(project)
            .map(|v| self.observed(v))
            .filter(|v| v.active))
    }

    async fn finalize_voting(&self, project: ProjectId) -> Result<Finalization> {
        self.pause().await;
        let mut state = self.state.write().await;
        require_account(&state)?;
        let result = state
            .ledger
            .finalize_voting(project, &self.params, self.clock.now())?;
        info!("Voting on project {project} finalized: {result:?}");
        Ok(Finalization {
            result,
            tx: self.confirmed(),
        })
    }

    async fn process_claim(&self, project: ProjectId) -> Result<ClaimReceipt> {
        self.pause().await;
        let mut state = self.state.write().await;
        let account = require_account(&state)?;
        let amount = state.ledger.process_claim(
            project,
            &account,
            |t| self.token_kind(t),
            self.clock.now(),
        )?;
        info!("Claim of {amount} paid to {account} from project {project}");
        Ok(ClaimReceipt {
            tx: self.confirmed(),
            amount: Some(amount),
        })
    }

    async fn get_user_claim(&self, project: ProjectId, user: &str) -> Result<Option<ClaimInfo>> {
        self.pause().await;
        let state = self.state.read().await;
        require_connected(&state)?;
        Ok(state.ledger.user_claim(project, user).cloned())
    }

    async fn submit_for_approval(&self, project: ProjectId) -> Result<ApprovalReceipt> {
        self.approval(project, ApprovalAction::SubmitForApproval, None)
            .await
    }

    async fn approve_project(&self, project: ProjectId) -> Result<ApprovalReceipt> {
        self.approval(project, ApprovalAction::Approve, None).await
    }

    async fn reject_project(&self, project: ProjectId, reason: &str) -> Result<ApprovalReceipt> {
        self.approval(project, ApprovalAction::Reject, Some(reason))
            .await
    }

    async fn resubmit_project(&self, project: ProjectId) -> Result<ApprovalReceipt> {
        self.approval(project, ApprovalAction::Resubmit, None).await
    }
}
