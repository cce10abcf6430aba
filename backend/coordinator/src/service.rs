//! Orchestration over a [`LedgerGateway`].
//!
//! Flows that span several gateway calls live here: registration with a
//! score estimate, deposits reconciled by read-back, and the initial funding
//! that moves a project into the approval queue.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::errors::{CoordinatorError, Result};
use crate::gateway::LedgerGateway;
use crate::guarantee::{from_token_units, to_token_units, DepositPolicy, DepositRequirement};
use crate::score::{CollateralMix, ProjectProfile, ScoreEstimator};
use crate::status::ProjectStatusMachine;
use crate::types::{
    AccountId, ApprovalAction, ApprovalReceipt, Balance, NewProject, Project, ProjectId,
    ProjectVault, Registration, Timestamp, TokenId, TokenRegistry, TxOutcome, TxRef, Voting,
    NATIVE_TOKEN, PSP22_TOKEN,
};
use crate::voting::{self, Tally, VotingReport};

/// Input of [`ProjectService::register`].
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    #[serde(default)]
    pub metadata_uri: String,
    /// Defaults to the gateway's acting account.
    #[serde(default)]
    pub owner: Option<AccountId>,
    #[serde(default)]
    pub pair_token: Option<AccountId>,
    #[serde(default)]
    pub profile: ProjectProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredProject {
    pub registration: Registration,
    pub estimated_score: u8,
    pub deposit: DepositRequirement,
}

/// A receipt whose outcome was reconciled against a read-back.
#[derive(Debug, Clone, Serialize)]
pub struct Tracked {
    pub tx: TxRef,
    /// Vault total observed after submission.
    pub vault_total: Balance,
}

#[derive(Debug, Clone, Serialize)]
pub struct Funding {
    pub deposit: Tracked,
    /// Present once the deposit was observed and the project submitted.
    pub approval: Option<ApprovalReceipt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectOverview {
    pub project: Project,
    pub vault: Option<ProjectVault>,
    pub voting: Option<Voting>,
    pub report: Option<VotingReport>,
    pub deposit: DepositRequirement,
    /// Collateral-based preview of the vault; independent of `project.score`.
    pub collateral_score: Option<u8>,
    pub available_actions: Vec<ApprovalAction>,
}

pub struct ProjectService {
    gateway: Arc<dyn LedgerGateway>,
    policy: DepositPolicy,
    tokens: TokenRegistry,
    clock: Arc<dyn Clock>,
}

impl ProjectService {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self::with_clock(gateway, Arc::new(SystemClock))
    }

    pub fn with_clock(gateway: Arc<dyn LedgerGateway>, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            policy: DepositPolicy::default(),
            tokens: TokenRegistry::default(),
            clock,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn LedgerGateway> {
        &self.gateway
    }

    pub fn policy(&self) -> &DepositPolicy {
        &self.policy
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub async fn register(&self, draft: ProjectDraft) -> Result<RegisteredProject> {
        let owner = match draft.owner.filter(|o| !o.trim().is_empty()) {
            Some(owner) => owner,
            None => self
                .gateway
                .account()
                .await
                .ok_or_else(|| CoordinatorError::Account("no account selected".to_string()))?,
        };
        let estimated_score = ScoreEstimator::estimate(&draft.profile);

        let registration = self
            .gateway
            .register_project(NewProject {
                name: draft.name,
                metadata_uri: draft.metadata_uri,
                owner,
                pair_token: draft.pair_token,
            })
            .await?;

        Ok(RegisteredProject {
            registration,
            estimated_score,
            deposit: self.policy.requirement(estimated_score),
        })
    }

    async fn vault_total(&self, project: ProjectId) -> Result<Balance> {
        self.gateway
            .get_project_vault(project)
            .await?
            .map(|v| v.total)
            .ok_or(CoordinatorError::ProjectNotFound(project))
    }

    /// Deposit and confirm the effect by reading the vault back.
    pub async fn deposit(
        &self,
        project: ProjectId,
        token: TokenId,
        amount: Balance,
    ) -> Result<Tracked> {
        let before = self.vault_total(project).await?;
        let mut tx = self.gateway.add_guarantee(project, token, amount).await?;
        let after = self.vault_total(project).await?;

        if matches!(tx.outcome, TxOutcome::Pending | TxOutcome::Confirmed) {
            tx.outcome = if after >= before.saturating_add(amount) {
                TxOutcome::Confirmed
            } else {
                TxOutcome::Pending
            };
        }
        Ok(Tracked {
            tx,
            vault_total: after,
        })
    }

    /// First deposit of a freshly registered project.
    ///
    /// `amount` is in whole tokens and must meet the minimum for
    /// `estimated_score`. The project is submitted for approval once the
    /// deposit is observed.
    pub async fn fund_initial_deposit(
        &self,
        project: ProjectId,
        token: TokenId,
        amount: f64,
        estimated_score: u8,
    ) -> Result<Funding> {
        self.policy.check(amount, estimated_score)?;
        let decimals = self
            .tokens
            .get(token)
            .map(|t| t.decimals)
            .ok_or_else(|| CoordinatorError::validation(format!("unknown token {token}")))?;
        let units = to_token_units(amount, decimals)?;

        let deposit = self.deposit(project, token, units).await?;
        let approval = if deposit.tx.outcome == TxOutcome::Confirmed {
            Some(self.gateway.submit_for_approval(project).await?)
        } else {
            warn!("Deposit into project {project} not observed yet; approval deferred");
            None
        };
        info!("Project {project} funded with {units} units of token {token}");
        Ok(Funding { deposit, approval })
    }

    /// Whole-token view of a vault, split the way the collateral estimate
    /// expects it.
    pub fn collateral_mix(&self, vault: &ProjectVault) -> CollateralMix {
        let whole = |units: Balance, token: TokenId| {
            let decimals = self.tokens.get(token).map(|t| t.decimals).unwrap_or(0);
            from_token_units(units, decimals)
        };
        CollateralMix {
            lunes: whole(vault.total_native, NATIVE_TOKEN),
            other: whole(vault.total_psp22, PSP22_TOKEN),
            nft: vault.nft_collateral_count as f64,
        }
    }

    pub async fn overview(&self, project: ProjectId) -> Result<ProjectOverview> {
        let p = self
            .gateway
            .get_project_info(project)
            .await?
            .ok_or(CoordinatorError::ProjectNotFound(project))?;
        let vault = self.gateway.get_project_vault(project).await?;
        let active = self.gateway.get_active_voting(project).await?;
        let report = active
            .as_ref()
            .map(|v| voting::evaluate(&Tally::from(v), self.clock.now()));

        Ok(ProjectOverview {
            deposit: self.policy.requirement(p.score),
            collateral_score: vault
                .as_ref()
                .map(|v| ScoreEstimator::from_collateral(&self.collateral_mix(v))),
            available_actions: ProjectStatusMachine::available_actions(p.approval),
            project: p,
            vault,
            voting: active,
            report,
        })
    }
}
