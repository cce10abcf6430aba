//! # Types
//!
//! Shared data structures used across all modules of the coordinator.
//!
//! ## Design decisions
//!
//! ### Two status axes
//!
//! A [`Project`] carries two independent statuses:
//!
//! - [`ProjectStatus`]: the ledger lifecycle driven by deposits, votings and
//!   claims (`active`, `voting`, `liquidating`, `closed`, `paused`).
//! - [`ApprovalStatus`]: the administrative lifecycle enforced by
//!   [`crate::status::ProjectStatusMachine`]:
//!
//! ```text
//! PendingDeposit ──► PendingApproval ──► Approved
//!                        ▲      │
//!                        │      ▼
//!                        └── Rejected
//! ```
//!
//! ### Outcomes before confirmation
//!
//! Mutating gateway calls return a [`TxRef`] whose [`TxOutcome`] is
//! `Confirmed` only when the effect is already visible in the ledger state
//! (simulated mode). Networked inclusion yields `Pending`; callers reconcile
//! through a read-back.

use std::fmt;

use serde::{Deserialize, Serialize};

pub type ProjectId = u64;
pub type VotingId = u64;
pub type TokenId = u32;
/// Amount in the smallest unit of a token.
pub type Balance = u128;
pub type AccountId = String;
/// Unix time in milliseconds.
pub type Timestamp = i64;

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Ledger lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Accepting guarantees.
    Active,
    /// An annual voting is running.
    Voting,
    /// Voting rejected the project; depositors may claim.
    Liquidating,
    /// Every claim was paid out.
    Closed,
    /// Frozen by the ledger.
    Paused,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Voting => "voting",
            Self::Liquidating => "liquidating",
            Self::Closed => "closed",
            Self::Paused => "paused",
        }
    }
}

/// Administrative approval status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    PendingDeposit,
    PendingApproval,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PendingDeposit => "pending_deposit",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        })
    }
}

/// Operations of the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    SubmitForApproval,
    Approve,
    Reject,
    Resubmit,
}

impl ApprovalAction {
    /// Parse the path segment used by the HTTP surface.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "submit" => Some(Self::SubmitForApproval),
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "resubmit" => Some(Self::Resubmit),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SubmitForApproval => "submit for approval",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Resubmit => "resubmit",
        })
    }
}

/// Result of a voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteResult {
    Pending,
    Approved,
    Rejected,
}

/// A registered project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Sequential identifier, starting at 1.
    pub id: ProjectId,
    pub name: String,
    /// Link to off-chain metadata (IPFS / JSON).
    pub metadata_uri: String,
    pub owner: AccountId,
    /// Paired PSP22 token contract, if any.
    pub pair_token: Option<AccountId>,
    pub status: ProjectStatus,
    pub approval: ApprovalStatus,
    /// Reason given by the last rejection.
    pub rejection_reason: Option<String>,
    /// Ledger score, `0..=100`.
    pub score: u8,
    pub total_guarantee: Balance,
    pub vote_yes: Balance,
    pub vote_no: Balance,
    pub creation_timestamp: Timestamp,
}

/// Per-project collateral aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectVault {
    pub project_id: ProjectId,
    pub total_native: Balance,
    pub total_psp22: Balance,
    pub nft_collateral_count: u64,
    /// Sum of every guarantee record of the project.
    pub total: Balance,
    pub creation_timestamp: Timestamp,
    pub last_voting_timestamp: Timestamp,
    pub current_voting_id: Option<VotingId>,
    pub status: ProjectStatus,
}

impl ProjectVault {
    pub fn new(project_id: ProjectId, now: Timestamp) -> Self {
        Self {
            project_id,
            total_native: 0,
            total_psp22: 0,
            nft_collateral_count: 0,
            total: 0,
            creation_timestamp: now,
            last_voting_timestamp: 0,
            current_voting_id: None,
            status: ProjectStatus::Active,
        }
    }
}

/// One depositor's guarantee in one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuaranteeRecord {
    pub project_id: ProjectId,
    pub token_id: TokenId,
    pub depositor: AccountId,
    pub amount: Balance,
}

/// A community voting on a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voting {
    pub voting_id: VotingId,
    pub project_id: ProjectId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub votes_yes: Balance,
    pub votes_no: Balance,
    /// Total voting weight that could have been cast.
    pub total_eligible: Balance,
    /// Required approval percentage of the votes cast.
    pub quorum_required: u8,
    pub result: VoteResult,
    /// Cleared exactly once, on finalization.
    pub active: bool,
}

/// Claim entitlement of a depositor in a liquidating project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimInfo {
    pub project_id: ProjectId,
    pub user: AccountId,
    pub claimable_amount: Balance,
    pub claimed_amount: Balance,
    pub claim_deadline: Timestamp,
}

impl ClaimInfo {
    pub fn outstanding(&self) -> Balance {
        self.claimable_amount.saturating_sub(self.claimed_amount)
    }
}

// ── Tokens ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// The ledger's native token.
    Native,
    /// A PSP22 fungible token.
    Psp22,
    /// NFT collateral; amounts count units.
    Nft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: TokenId,
    pub symbol: String,
    pub decimals: u32,
    pub kind: TokenKind,
}

/// Collateral tokens accepted by the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRegistry {
    tokens: Vec<TokenInfo>,
}

pub const NATIVE_TOKEN: TokenId = 0;
pub const PSP22_TOKEN: TokenId = 1;
pub const NFT_TOKEN: TokenId = 2;

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new(vec![
            TokenInfo {
                id: NATIVE_TOKEN,
                symbol: "LUNES".into(),
                decimals: 18,
                kind: TokenKind::Native,
            },
            TokenInfo {
                id: PSP22_TOKEN,
                symbol: "LUSDT".into(),
                decimals: 6,
                kind: TokenKind::Psp22,
            },
            TokenInfo {
                id: NFT_TOKEN,
                symbol: "NFT".into(),
                decimals: 0,
                kind: TokenKind::Nft,
            },
        ])
    }
}

impl TokenRegistry {
    pub fn new(tokens: Vec<TokenInfo>) -> Self {
        Self { tokens }
    }

    pub fn get(&self, id: TokenId) -> Option<&TokenInfo> {
        self.tokens.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenInfo> {
        self.tokens.iter()
    }
}

// ── Receipts ─────────────────────────────────────────────────────────

/// Three-valued outcome of a submitted intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TxOutcome {
    /// Submitted/included, effect not yet observed.
    Pending,
    /// Effect observed in ledger state.
    Confirmed,
    /// Rejected; `code` is a [`crate::errors::CoordinatorError::code`].
    Failed { code: String },
}

/// Reference to a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRef {
    pub hash: String,
    pub outcome: TxOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// `None` until a read confirms the identifier the ledger assigned.
    pub project_id: Option<ProjectId>,
    pub tx: TxRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingStarted {
    pub voting_id: Option<VotingId>,
    pub tx: TxRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalization {
    /// `Pending` when the ledger has not reported the result yet.
    pub result: VoteResult,
    pub tx: TxRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub tx: TxRef,
    pub amount: Option<Balance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalReceipt {
    pub project_id: ProjectId,
    pub status: ApprovalStatus,
    pub reason: Option<String>,
}

/// Parameters of `register_project`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub metadata_uri: String,
    pub owner: AccountId,
    pub pair_token: Option<AccountId>,
}
