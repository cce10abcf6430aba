//! # Project ledger
//!
//! The in-process record set the simulated gateway operates on. One
//! [`ProjectLedger`] is owned by one gateway instance; nothing here is global.
//!
//! ## Records
//!
//! | Map          | Key                              | Value            |
//! |--------------|----------------------------------|------------------|
//! | `projects`   | `ProjectId`                      | [`Project`]      |
//! | `vaults`     | `ProjectId`                      | [`ProjectVault`] |
//! | `guarantees` | `(ProjectId, TokenId, AccountId)`| `Balance`        |
//! | `votings`    | `VotingId`                       | [`Voting`]       |
//! | `ballots`    | `(VotingId, AccountId)`          | `bool` (yes/no)  |
//! | `claims`     | `(ProjectId, AccountId)`         | [`ClaimInfo`]    |
//!
//! ## Invariants
//!
//! - `vault.total == Σ guarantees[(project, *, *)]`, and `project.total_guarantee`
//!   mirrors it.
//! - `vault.status == project.status`.
//! - `claim.claimable_amount >= claim.claimed_amount`.
//!
//! The primitives that touch balances ([`ProjectLedger::credit`] and
//! [`ProjectLedger::debit`]) keep the first invariant; business rules
//! (amount validation, score updates) live in [`crate::guarantee`].

use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::{CoordinatorError, Result};
use crate::score::BASE_SCORE;
use crate::status::ProjectStatusMachine;
use crate::types::{
    AccountId, ApprovalAction, ApprovalReceipt, ApprovalStatus, Balance, ClaimInfo,
    GuaranteeRecord, NewProject, Project, ProjectId, ProjectStatus, ProjectVault, Timestamp,
    TokenId, TokenKind, VoteResult, Voting, VotingId, DAY_MS,
};
use crate::voting::{self, Tally};

/// Governance constants applied to new votings and claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernanceParams {
    pub quorum_percent: u8,
    pub voting_window_ms: i64,
    pub claims_period_ms: i64,
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            quorum_percent: 75,
            voting_window_ms: 7 * DAY_MS,
            claims_period_ms: 30 * DAY_MS,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProjectLedger {
    projects: BTreeMap<ProjectId, Project>,
    vaults: BTreeMap<ProjectId, ProjectVault>,
    guarantees: BTreeMap<(ProjectId, TokenId, AccountId), Balance>,
    votings: BTreeMap<VotingId, Voting>,
    ballots: BTreeMap<(VotingId, AccountId), bool>,
    claims: BTreeMap<(ProjectId, AccountId), ClaimInfo>,
    last_project_id: ProjectId,
    last_voting_id: VotingId,
}

impl ProjectLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Projects ────────────────────────────────────────────────────

    pub fn register(&mut self, new: NewProject, now: Timestamp) -> Result<ProjectId> {
        if new.name.trim().is_empty() {
            return Err(CoordinatorError::validation("project name must not be empty"));
        }
        if new.owner.trim().is_empty() {
            return Err(CoordinatorError::validation("project owner must not be empty"));
        }

        self.last_project_id += 1;
        let id = self.last_project_id;

        let project = Project {
            id,
            name: new.name,
            metadata_uri: new.metadata_uri,
            owner: new.owner,
            pair_token: new.pair_token.filter(|t| !t.is_empty()),
            status: ProjectStatus::Active,
            approval: ApprovalStatus::PendingDeposit,
            rejection_reason: None,
            score: BASE_SCORE as u8,
            total_guarantee: 0,
            vote_yes: 0,
            vote_no: 0,
            creation_timestamp: now,
        };
        self.projects.insert(id, project);
        self.vaults.insert(id, ProjectVault::new(id, now));
        debug!("registered project {id}");
        Ok(id)
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    pub fn projects(&self) -> Vec<Project> {
        self.projects.values().cloned().collect()
    }

    pub fn vault(&self, id: ProjectId) -> Option<&ProjectVault> {
        self.vaults.get(&id)
    }

    pub(crate) fn project_mut(&mut self, id: ProjectId) -> Result<&mut Project> {
        self.projects
            .get_mut(&id)
            .ok_or(CoordinatorError::ProjectNotFound(id))
    }

    fn require_project(&self, id: ProjectId) -> Result<&Project> {
        self.projects
            .get(&id)
            .ok_or(CoordinatorError::ProjectNotFound(id))
    }

    fn set_status(&mut self, id: ProjectId, status: ProjectStatus) {
        if let Some(p) = self.projects.get_mut(&id) {
            p.status = status;
        }
        if let Some(v) = self.vaults.get_mut(&id) {
            v.status = status;
        }
    }

    // ── Guarantees ──────────────────────────────────────────────────

    pub fn user_guarantee(&self, project: ProjectId, token: TokenId, user: &str) -> Balance {
        self.guarantees
            .get(&(project, token, user.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Total guarantee of `user` in `project` across every token.
    pub fn user_total(&self, project: ProjectId, user: &str) -> Balance {
        self.guarantees
            .iter()
            .filter(|((p, _, a), _)| *p == project && a == user)
            .map(|(_, amount)| *amount)
            .sum()
    }

    pub fn records(&self, project: ProjectId) -> Vec<GuaranteeRecord> {
        self.guarantees
            .iter()
            .filter(|((p, _, _), _)| *p == project)
            .map(|((p, t, a), amount)| GuaranteeRecord {
                project_id: *p,
                token_id: *t,
                depositor: a.clone(),
                amount: *amount,
            })
            .collect()
    }

    /// Add `amount` to a record and to the vault aggregates.
    ///
    /// Every new value is computed before anything is written, so a
    /// failed credit leaves the ledger untouched.
    pub(crate) fn credit(
        &mut self,
        project: ProjectId,
        token: TokenId,
        kind: TokenKind,
        account: &str,
        amount: Balance,
    ) -> Result<Balance> {
        let overflow = || CoordinatorError::validation("guarantee amount overflows");

        let vault = self
            .vaults
            .get(&project)
            .ok_or(CoordinatorError::ProjectNotFound(project))?;
        let new_total = vault.total.checked_add(amount).ok_or_else(overflow)?;
        let (native, psp22, nft) = match kind {
            TokenKind::Native => (
                vault.total_native.checked_add(amount).ok_or_else(overflow)?,
                vault.total_psp22,
                vault.nft_collateral_count,
            ),
            TokenKind::Psp22 => (
                vault.total_native,
                vault.total_psp22.checked_add(amount).ok_or_else(overflow)?,
                vault.nft_collateral_count,
            ),
            TokenKind::Nft => (
                vault.total_native,
                vault.total_psp22,
                u64::try_from(amount)
                    .ok()
                    .and_then(|units| vault.nft_collateral_count.checked_add(units))
                    .ok_or_else(overflow)?,
            ),
        };

        let key = (project, token, account.to_string());
        let record = self
            .guarantees
            .get(&key)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(overflow)?;

        self.guarantees.insert(key, record);
        if let Some(vault) = self.vaults.get_mut(&project) {
            vault.total_native = native;
            vault.total_psp22 = psp22;
            vault.nft_collateral_count = nft;
            vault.total = new_total;
        }
        if let Some(p) = self.projects.get_mut(&project) {
            p.total_guarantee = new_total;
        }
        Ok(new_total)
    }

    /// Remove `amount` from a record and from the vault aggregates.
    pub(crate) fn debit(
        &mut self,
        project: ProjectId,
        token: TokenId,
        kind: TokenKind,
        account: &str,
        amount: Balance,
    ) -> Result<Balance> {
        let key = (project, token, account.to_string());
        let available = self.guarantees.get(&key).copied().unwrap_or(0);
        if amount > available {
            return Err(CoordinatorError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        let units = match kind {
            TokenKind::Nft => u64::try_from(amount).map_err(|_| {
                CoordinatorError::validation(format!("{amount} NFT units exceed the vault count"))
            })?,
            _ => 0,
        };
        let vault = self
            .vaults
            .get_mut(&project)
            .ok_or(CoordinatorError::ProjectNotFound(project))?;

        if available == amount {
            self.guarantees.remove(&key);
        } else {
            self.guarantees.insert(key, available - amount);
        }

        match kind {
            TokenKind::Native => vault.total_native = vault.total_native.saturating_sub(amount),
            TokenKind::Psp22 => vault.total_psp22 = vault.total_psp22.saturating_sub(amount),
            TokenKind::Nft => {
                vault.nft_collateral_count = vault.nft_collateral_count.saturating_sub(units)
            }
        }
        vault.total = vault.total.saturating_sub(amount);
        let new_total = vault.total;
        if let Some(p) = self.projects.get_mut(&project) {
            p.total_guarantee = new_total;
        }
        Ok(new_total)
    }

    // ── Votings ─────────────────────────────────────────────────────

    pub fn voting(&self, id: VotingId) -> Option<&Voting> {
        self.votings.get(&id)
    }

    /// The voting of `project` that has not been finalized yet.
    pub fn current_voting(&self, project: ProjectId) -> Option<&Voting> {
        self.vaults
            .get(&project)
            .and_then(|v| v.current_voting_id)
            .and_then(|id| self.votings.get(&id))
    }

    /// Most recent voting of `project`, finalized or not.
    pub fn latest_voting(&self, project: ProjectId) -> Option<&Voting> {
        self.votings.values().rev().find(|v| v.project_id == project)
    }

    pub fn has_voted(&self, project: ProjectId, user: &str) -> bool {
        self.latest_voting(project)
            .map(|v| self.ballots.contains_key(&(v.voting_id, user.to_string())))
            .unwrap_or(false)
    }

    pub fn start_voting(
        &mut self,
        project: ProjectId,
        params: &GovernanceParams,
        now: Timestamp,
    ) -> Result<VotingId> {
        let p = self.require_project(project)?;
        if p.status != ProjectStatus::Active {
            return Err(CoordinatorError::validation(format!(
                "project {project} is {} and cannot enter a voting",
                p.status.as_str()
            )));
        }
        if self.current_voting(project).is_some() {
            return Err(CoordinatorError::validation(format!(
                "project {project} already has a voting in progress"
            )));
        }
        let eligible = p.total_guarantee;

        self.last_voting_id += 1;
        let voting_id = self.last_voting_id;
        self.votings.insert(
            voting_id,
            Voting {
                voting_id,
                project_id: project,
                start_time: now,
                end_time: now.saturating_add(params.voting_window_ms),
                votes_yes: 0,
                votes_no: 0,
                total_eligible: eligible,
                quorum_required: params.quorum_percent,
                result: VoteResult::Pending,
                active: true,
            },
        );

        if let Some(vault) = self.vaults.get_mut(&project) {
            vault.current_voting_id = Some(voting_id);
        }
        if let Some(p) = self.projects.get_mut(&project) {
            p.vote_yes = 0;
            p.vote_no = 0;
        }
        self.set_status(project, ProjectStatus::Voting);
        Ok(voting_id)
    }

    /// Record a ballot weighted by the voter's guarantee. Returns the weight.
    pub fn cast_vote(
        &mut self,
        project: ProjectId,
        voter: &str,
        approve: bool,
        now: Timestamp,
    ) -> Result<Balance> {
        self.require_project(project)?;
        let voting = self
            .current_voting(project)
            .filter(|v| voting::is_active(v.result, now, v.end_time))
            .ok_or(CoordinatorError::NoActiveVoting(project))?;
        let voting_id = voting.voting_id;

        if self.ballots.contains_key(&(voting_id, voter.to_string())) {
            return Err(CoordinatorError::validation(format!(
                "{voter} already voted on project {project}"
            )));
        }
        let weight = self.user_total(project, voter);
        if weight == 0 {
            return Err(CoordinatorError::validation(format!(
                "{voter} holds no guarantee in project {project} and cannot vote"
            )));
        }

        let (yes, no) = match self.votings.get_mut(&voting_id) {
            Some(v) => {
                if approve {
                    v.votes_yes = v.votes_yes.saturating_add(weight);
                } else {
                    v.votes_no = v.votes_no.saturating_add(weight);
                }
                (v.votes_yes, v.votes_no)
            }
            None => return Err(CoordinatorError::NoActiveVoting(project)),
        };
        self.ballots.insert((voting_id, voter.to_string()), approve);
        if let Some(p) = self.projects.get_mut(&project) {
            p.vote_yes = yes;
            p.vote_no = no;
        }
        Ok(weight)
    }

    /// Close the current voting and apply its outcome.
    ///
    /// Approval returns the project to `active`; rejection moves it to
    /// `liquidating` and opens a claim for every depositor.
    pub fn finalize_voting(
        &mut self,
        project: ProjectId,
        params: &GovernanceParams,
        now: Timestamp,
    ) -> Result<VoteResult> {
        self.require_project(project)?;
        let voting_id = self
            .current_voting(project)
            .filter(|v| v.result == VoteResult::Pending)
            .map(|v| v.voting_id)
            .ok_or(CoordinatorError::NoActiveVoting(project))?;

        let result = match self.votings.get_mut(&voting_id) {
            Some(v) => {
                let result = voting::outcome(&Tally::from(&*v));
                v.result = result;
                v.active = false;
                result
            }
            None => return Err(CoordinatorError::NoActiveVoting(project)),
        };

        if let Some(vault) = self.vaults.get_mut(&project) {
            vault.current_voting_id = None;
            vault.last_voting_timestamp = now;
        }

        match result {
            VoteResult::Approved => self.set_status(project, ProjectStatus::Active),
            _ => {
                self.set_status(project, ProjectStatus::Liquidating);
                self.open_claims(project, now.saturating_add(params.claims_period_ms));
            }
        }
        Ok(result)
    }

    // ── Claims ──────────────────────────────────────────────────────

    fn open_claims(&mut self, project: ProjectId, deadline: Timestamp) {
        let mut entitlements: BTreeMap<AccountId, Balance> = BTreeMap::new();
        for ((p, _, account), amount) in &self.guarantees {
            if *p == project {
                *entitlements.entry(account.clone()).or_insert(0) += *amount;
            }
        }
        for (user, claimable) in entitlements {
            self.claims.insert(
                (project, user.clone()),
                ClaimInfo {
                    project_id: project,
                    user,
                    claimable_amount: claimable,
                    claimed_amount: 0,
                    claim_deadline: deadline,
                },
            );
        }
        if self.claims.keys().all(|(p, _)| *p != project) {
            // Nothing was deposited, so nothing is left to pay out.
            self.set_status(project, ProjectStatus::Closed);
        }
    }

    pub fn user_claim(&self, project: ProjectId, user: &str) -> Option<&ClaimInfo> {
        self.claims.get(&(project, user.to_string()))
    }

    /// Pay out `user`'s outstanding claim. Returns the amount paid.
    pub fn process_claim(
        &mut self,
        project: ProjectId,
        user: &str,
        kinds: impl Fn(TokenId) -> TokenKind,
        now: Timestamp,
    ) -> Result<Balance> {
        let p = self.require_project(project)?;
        if p.status != ProjectStatus::Liquidating {
            return Err(CoordinatorError::validation(format!(
                "claims are not open for project {project}"
            )));
        }
        let claim = self
            .user_claim(project, user)
            .ok_or_else(|| CoordinatorError::validation(format!("{user} has nothing to claim")))?;
        if now > claim.claim_deadline {
            return Err(CoordinatorError::validation("the claim period has ended"));
        }
        let amount = claim.outstanding();
        if amount == 0 {
            return Err(CoordinatorError::validation("claim already paid"));
        }

        let held: Vec<(TokenId, Balance)> = self
            .guarantees
            .iter()
            .filter(|((p, _, a), _)| *p == project && a == user)
            .map(|((_, t, _), amount)| (*t, *amount))
            .collect();
        for (token, held_amount) in held {
            self.debit(project, token, kinds(token), user, held_amount)?;
        }

        if let Some(claim) = self.claims.get_mut(&(project, user.to_string())) {
            claim.claimed_amount = claim.claimable_amount;
        }

        let settled = self
            .claims
            .values()
            .filter(|c| c.project_id == project)
            .all(|c| c.outstanding() == 0);
        if settled {
            self.set_status(project, ProjectStatus::Closed);
        }
        Ok(amount)
    }

    // ── Approval ────────────────────────────────────────────────────

    pub fn apply_approval(
        &mut self,
        project: ProjectId,
        action: ApprovalAction,
        reason: Option<&str>,
    ) -> Result<ApprovalReceipt> {
        let p = self.require_project(project)?;
        ProjectStatusMachine::check(p, action, reason)?;
        if action == ApprovalAction::SubmitForApproval && p.total_guarantee == 0 {
            return Err(CoordinatorError::validation(format!(
                "project {project} needs a guarantee deposit before approval"
            )));
        }

        let p = self.project_mut(project)?;
        let status = ProjectStatusMachine::apply(p, action, reason)?;
        Ok(ApprovalReceipt {
            project_id: project,
            status,
            reason: p.rejection_reason.clone(),
        })
    }

    // ── Demo data ───────────────────────────────────────────────────

    /// A ledger pre-populated with a few projects, for local demos.
    pub fn with_demo_projects(params: &GovernanceParams, now: Timestamp) -> Result<Self> {
        const UNIT: Balance = 1_000_000_000_000_000_000;
        let mut ledger = Self::new();

        let demo = [
            ("Lunes DeFi Protocol", "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY", 2_500_000),
            ("Lunes NFT Marketplace", "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty", 1_800_000),
            ("Lunes Gaming Platform", "5DAAnrj7VHTznn2AWBemMuyBwZWs6FNFjdyVXUeYum3PTXFy", 1_200_000),
        ];
        for (name, owner, units) in demo {
            let id = ledger.register(
                NewProject {
                    name: name.to_string(),
                    metadata_uri: String::new(),
                    owner: owner.to_string(),
                    pair_token: None,
                },
                now - 200 * DAY_MS,
            )?;
            ledger.credit(id, 0, TokenKind::Native, owner, units * UNIT)?;
            ledger.apply_approval(id, ApprovalAction::SubmitForApproval, None)?;
            ledger.apply_approval(id, ApprovalAction::Approve, None)?;
        }

        let last = ledger.last_project_id;
        ledger.start_voting(last, params, now)?;
        Ok(ledger)
    }
}
