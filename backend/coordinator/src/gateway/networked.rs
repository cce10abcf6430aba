//! Gateway backed by a live node.
//!
//! Reads are dry-run `contracts_call` queries, decoded from the node's
//! human-readable output. Mutations are handed to the installed [`Signer`]
//! and return as soon as the ledger reports inclusion, with
//! [`TxOutcome::Pending`]: their domain effect is unknown until a read
//! observes it.
//!
//! The contract has no notion of administrative approval, so approval
//! statuses live in an in-process book keyed by project.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{ContractCall, GatewayMode, LedgerGateway, Signer};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, DEV_ACCOUNT};
use crate::errors::{CoordinatorError, Result};
use crate::ledger::GovernanceParams;
use crate::rpc::{self, RawClaim, RawProjectInfo, RawVault, RawVoting, RpcClient};
use crate::score::{BASE_SCORE, MAX_SCORE};
use crate::status::ProjectStatusMachine;
use crate::types::{
    AccountId, ApprovalAction, ApprovalReceipt, ApprovalStatus, Balance, ClaimInfo, ClaimReceipt,
    Finalization, NewProject, Project, ProjectId, ProjectStatus, ProjectVault, Registration,
    TokenId, TokenKind, TokenRegistry, TxOutcome, TxRef, VoteResult, Voting, VotingId,
    VotingStarted,
};
use crate::voting;

/// Upper bound on projects listed by `get_all_projects`.
pub const MAX_LISTED_PROJECTS: u64 = 100;

#[derive(Debug, Clone)]
struct ApprovalEntry {
    status: ApprovalStatus,
    reason: Option<String>,
}

pub struct NetworkedGateway {
    rpc: RpcClient,
    contract: String,
    tokens: TokenRegistry,
    params: GovernanceParams,
    clock: Arc<dyn Clock>,
    signer: RwLock<Option<Arc<dyn Signer>>>,
    connected: AtomicBool,
    approvals: RwLock<BTreeMap<ProjectId, ApprovalEntry>>,
}

impl NetworkedGateway {
    pub fn new(
        rpc: RpcClient,
        contract: String,
        params: GovernanceParams,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rpc,
            contract,
            tokens: TokenRegistry::default(),
            params,
            clock,
            signer: RwLock::new(None),
            connected: AtomicBool::new(false),
            approvals: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn from_config(config: &Config, client: Client) -> Self {
        Self::new(
            RpcClient::new(client, config.rpc_urls.clone()),
            config.contract_address.clone(),
            config.governance,
            Arc::new(SystemClock),
        )
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(CoordinatorError::Connection(
                "not connected to a node".to_string(),
            ));
        }
        Ok(())
    }

    async fn signer(&self) -> Result<Arc<dyn Signer>> {
        self.signer
            .read()
            .await
            .clone()
            .ok_or_else(|| CoordinatorError::Account("no signer configured".to_string()))
    }

    async fn origin(&self) -> String {
        match self.signer.read().await.as_ref() {
            Some(s) => s.address().to_string(),
            None => DEV_ACCOUNT.to_string(),
        }
    }

    fn token_kind(&self, token: TokenId) -> Result<TokenKind> {
        self.tokens
            .get(token)
            .map(|t| t.kind)
            .ok_or_else(|| CoordinatorError::validation(format!("unknown token {token}")))
    }

    async fn query(&self, message: &str, args: Vec<Value>) -> Result<Value> {
        self.ensure_connected()?;
        let origin = self.origin().await;
        debug!("Query {message} {args:?}");
        self.rpc.query(&origin, &self.contract, message, args).await
    }

    async fn submit(&self, message: &'static str, args: Vec<Value>) -> Result<TxRef> {
        self.ensure_connected()?;
        let signer = self.signer().await?;
        let call = ContractCall {
            dest: self.contract.clone(),
            message,
            args,
        };
        let hash = signer.sign_and_submit(call).await.map_err(|e| match e {
            CoordinatorError::Transaction(_) => e,
            other => CoordinatorError::Transaction(format!("{message}: {other}")),
        })?;
        info!("{message} included: {hash}");
        Ok(TxRef {
            hash,
            outcome: TxOutcome::Pending,
        })
    }

    // ── Decoded reads ───────────────────────────────────────────────

    async fn raw_project(&self, id: ProjectId) -> Result<Option<RawProjectInfo>> {
        rpc::decode(self.query("get_project_info", vec![json!(id)]).await?)
    }

    async fn raw_vault(&self, id: ProjectId) -> Result<Option<RawVault>> {
        rpc::decode(self.query("get_project_vault", vec![json!(id)]).await?)
    }

    async fn total_for_token(&self, id: ProjectId, token: TokenId) -> Result<Balance> {
        let v = self
            .query("get_project_total_guarantee", vec![json!(id), json!(token)])
            .await?;
        rpc::parse_human(&v)
    }

    async fn build_vault(&self, raw: RawVault) -> Result<ProjectVault> {
        let mut vault = ProjectVault::new(raw.project_id, raw.creation_timestamp);
        vault.status = rpc::vault_status(&raw.status)?;
        vault.current_voting_id = raw.current_voting_id;
        vault.last_voting_timestamp = raw.last_annual_vote;

        for token in self.tokens.iter() {
            let amount = self.total_for_token(raw.project_id, token.id).await?;
            match token.kind {
                TokenKind::Native => vault.total_native += amount,
                TokenKind::Psp22 => vault.total_psp22 += amount,
                TokenKind::Nft => {
                    vault.nft_collateral_count += u64::try_from(amount).map_err(|_| {
                        CoordinatorError::Decode(format!("NFT count {amount} overflows"))
                    })?
                }
            }
            vault.total = vault.total.saturating_add(amount);
        }
        Ok(vault)
    }

    async fn approval_entry(&self, id: ProjectId) -> ApprovalEntry {
        self.approvals
            .read()
            .await
            .get(&id)
            .cloned()
            .unwrap_or(ApprovalEntry {
                status: ApprovalStatus::PendingDeposit,
                reason: None,
            })
    }

    async fn approval(
        &self,
        project: ProjectId,
        action: ApprovalAction,
        reason: Option<&str>,
    ) -> Result<ApprovalReceipt> {
        self.signer().await?;
        let mut p = self
            .get_project_info(project)
            .await?
            .ok_or(CoordinatorError::ProjectNotFound(project))?;

        ProjectStatusMachine::check(&p, action, reason)?;
        if action == ApprovalAction::SubmitForApproval && p.total_guarantee == 0 {
            return Err(CoordinatorError::validation(format!(
                "project {project} needs a guarantee deposit before approval"
            )));
        }
        let status = ProjectStatusMachine::apply(&mut p, action, reason)?;

        self.approvals.write().await.insert(
            project,
            ApprovalEntry {
                status,
                reason: p.rejection_reason.clone(),
            },
        );
        info!("Project {project}: {action} -> {status}");
        Ok(ApprovalReceipt {
            project_id: project,
            status,
            reason: p.rejection_reason,
        })
    }
}

#[async_trait]
impl LedgerGateway for NetworkedGateway {
    fn mode(&self) -> GatewayMode {
        GatewayMode::Networked
    }

    async fn connect(&self) -> Result<bool> {
        if self.contract.trim().is_empty() {
            return Err(CoordinatorError::Connection(
                "no contract address configured for this network".to_string(),
            ));
        }
        let chain = self.rpc.connect().await?;
        if self.rpc.contract_info(&self.contract).await?.is_none() {
            return Err(CoordinatorError::Connection(format!(
                "no contract deployed at {}",
                self.contract
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        info!("Connected to {chain}, contract {}", self.contract);
        Ok(true)
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn set_signer(&self, signer: Arc<dyn Signer>) {
        debug!("Signer set to {}", signer.address());
        *self.signer.write().await = Some(signer);
    }

    async fn account(&self) -> Option<AccountId> {
        self.signer
            .read()
            .await
            .as_ref()
            .map(|s| s.address().to_string())
    }

    async fn register_project(&self, project: NewProject) -> Result<Registration> {
        if project.name.trim().is_empty() {
            return Err(CoordinatorError::validation("project name must not be empty"));
        }
        if project.owner.trim().is_empty() {
            return Err(CoordinatorError::validation("project owner must not be empty"));
        }
        let token_contract = project
            .pair_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| project.owner.clone());

        let tx = self
            .submit(
                "register_project",
                vec![
                    json!(project.name),
                    json!(project.metadata_uri),
                    json!(token_contract),
                    json!(project.owner),
                ],
            )
            .await?;
        Ok(Registration {
            project_id: None,
            tx,
        })
    }

    async fn get_project_info(&self, id: ProjectId) -> Result<Option<Project>> {
        let Some(raw) = self.raw_project(id).await? else {
            return Ok(None);
        };
        let vault = self.get_project_vault(id).await?;
        let score = self.get_project_score(id).await?.unwrap_or(BASE_SCORE as u8);
        let approval = self.approval_entry(id).await;

        let status = match (&vault, raw.status) {
            (_, false) => ProjectStatus::Paused,
            (Some(v), true) => v.status,
            (None, true) => ProjectStatus::Active,
        };

        Ok(Some(Project {
            id,
            name: raw.name,
            metadata_uri: raw.metadata_uri,
            owner: raw.owner,
            pair_token: raw.pair_psp22,
            status,
            approval: approval.status,
            rejection_reason: approval.reason,
            score,
            total_guarantee: vault.as_ref().map(|v| v.total).unwrap_or(0),
            vote_yes: raw.qtd_vote_yes,
            vote_no: raw.qtd_vote_no,
            creation_timestamp: raw.creation_timestamp,
        }))
    }

    async fn get_all_projects(&self) -> Result<Vec<Project>> {
        let next = rpc::parse_human(&self.query("get_next_project_id", vec![]).await?)?;
        let last = u64::try_from(next.saturating_sub(1))
            .unwrap_or(u64::MAX)
            .min(MAX_LISTED_PROJECTS);

        let mut projects = Vec::new();
        for id in 1..=last {
            if let Some(p) = self.get_project_info(id).await? {
                projects.push(p);
            }
        }
        Ok(projects)
    }

    async fn get_project_vault(&self, id: ProjectId) -> Result<Option<ProjectVault>> {
        match self.raw_vault(id).await? {
            Some(raw) => Ok(Some(self.build_vault(raw).await?)),
            None => Ok(None),
        }
    }

    async fn get_project_score(&self, id: ProjectId) -> Result<Option<u8>> {
        let v = self.query("get_project_score", vec![json!(id)]).await?;
        if v.is_null() {
            return Ok(None);
        }
        let score = rpc::parse_human(&v)?;
        if score > u128::from(MAX_SCORE) {
            return Err(CoordinatorError::Decode(format!("score {score} out of range")));
        }
        Ok(Some(score as u8))
    }

    async fn add_guarantee(
        &self,
        project: ProjectId,
        token: TokenId,
        amount: Balance,
    ) -> Result<TxRef> {
        if amount == 0 {
            return Err(CoordinatorError::validation("deposit amount must be positive"));
        }
        self.token_kind(token)?;
        self.submit(
            "add_guarantee",
            vec![json!(project), json!(token), json!(amount.to_string())],
        )
        .await
    }

    async fn withdraw_guarantee(
        &self,
        project: ProjectId,
        token: TokenId,
        amount: Balance,
    ) -> Result<TxRef> {
        if amount == 0 {
            return Err(CoordinatorError::validation("withdrawal amount must be positive"));
        }
        self.token_kind(token)?;
        let account = self.signer().await?.address().to_string();

        let available = self.get_user_guarantee(project, token, &account).await?;
        if amount > available {
            return Err(CoordinatorError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        self.submit(
            "withdraw_guarantee",
            vec![json!(project), json!(token), json!(amount.to_string())],
        )
        .await
    }

    async fn get_user_guarantee(
        &self,
        project: ProjectId,
        token: TokenId,
        user: &str,
    ) -> Result<Balance> {
        let v = self
            .query(
                "get_user_guarantee",
                vec![json!(project), json!(token), json!(user)],
            )
            .await?;
        rpc::parse_human(&v)
    }

    async fn vote(&self, project: ProjectId, approve: bool) -> Result<TxRef> {
        self.signer().await?;
        if self.get_active_voting(project).await?.is_none() {
            return Err(CoordinatorError::NoActiveVoting(project));
        }
        self.submit("vote_on_proposal", vec![json!(project), json!(approve)])
            .await
    }

    async fn has_voted(&self, project: ProjectId, user: &str) -> Result<bool> {
        rpc::decode(
            self.query("has_voted", vec![json!(project), json!(user)])
                .await?,
        )
    }

    async fn start_annual_voting(&self, project: ProjectId) -> Result<VotingStarted> {
        let tx = self
            .submit("start_annual_voting", vec![json!(project)])
            .await?;
        Ok(VotingStarted {
            voting_id: None,
            tx,
        })
    }

    async fn get_voting_info(&self, voting_id: VotingId) -> Result<Option<Voting>> {
        let raw: Option<RawVoting> =
            rpc::decode(self.query("get_voting_info", vec![json!(voting_id)]).await?)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let result = rpc::vote_result(&raw.result)?;
        Ok(Some(Voting {
            voting_id,
            project_id: raw.project_id,
            start_time: raw.start_timestamp,
            end_time: raw.end_timestamp,
            votes_yes: raw.yes_votes,
            votes_no: raw.no_votes,
            total_eligible: raw.total_eligible,
            quorum_required: self.params.quorum_percent,
            result,
            active: voting::is_active(result, self.clock.now(), raw.end_timestamp),
        }))
    }

    async fn get_active_voting(&self, project: ProjectId) -> Result<Option<Voting>> {
        let Some(voting_id) = self
            .raw_vault(project)
            .await?
            .and_then(|v| v.current_voting_id)
        else {
            return Ok(None);
        };
        Ok(self
            .get_voting_info(voting_id)
            .await?
            .filter(|v| v.active))
    }

    async fn finalize_voting(&self, project: ProjectId) -> Result<Finalization> {
        self.signer().await?;
        let vault = self
            .raw_vault(project)
            .await?
            .ok_or(CoordinatorError::ProjectNotFound(project))?;
        if vault.current_voting_id.is_none() {
            return Err(CoordinatorError::NoActiveVoting(project));
        }
        let tx = self.submit("finalize_voting", vec![json!(project)]).await?;
        Ok(Finalization {
            result: VoteResult::Pending,
            tx,
        })
    }

    async fn process_claim(&self, project: ProjectId) -> Result<ClaimReceipt> {
        let tx = self.submit("process_claim", vec![json!(project)]).await?;
        Ok(ClaimReceipt { tx, amount: None })
    }

    async fn get_user_claim(&self, project: ProjectId, user: &str) -> Result<Option<ClaimInfo>> {
        let raw: Option<RawClaim> = rpc::decode(
            self.query("get_user_claim", vec![json!(project), json!(user)])
                .await?,
        )?;
        Ok(raw.map(|c| ClaimInfo {
            project_id: project,
            user: user.to_string(),
            claimable_amount: c.claimable_amount,
            claimed_amount: c.claimed_amount,
            claim_deadline: c.claim_deadline,
        }))
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
