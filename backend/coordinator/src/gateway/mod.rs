//! # Ledger gateway
//!
//! One trait, two backends, picked once at startup by [`build`]:
//!
//! - [`SimulatedGateway`]: an owned [`crate::ledger::ProjectLedger`] behind a
//!   lock, with artificial latency and confirmed outcomes.
//! - [`NetworkedGateway`]: dry-run queries and signed contract calls against a
//!   node's JSON-RPC endpoint; mutations come back `pending`.
//!
//! Callers hold an `Arc<dyn LedgerGateway>` and never learn which backend is
//! in use.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::{CoordinatorError, Result};
use crate::types::{
    AccountId, ApprovalReceipt, Balance, ClaimInfo, ClaimReceipt, Finalization, NewProject,
    Project, ProjectId, ProjectVault, Registration, TokenId, TxRef, Voting, VotingId,
    VotingStarted,
};

pub mod networked;
pub mod signer;
pub mod simulated;

pub use networked::NetworkedGateway;
pub use signer::{LocalSigner, RemoteSigner, Signer};
pub use simulated::SimulatedGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayMode {
    Simulated,
    Networked,
}

impl FromStr for GatewayMode {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" | "mock" => Ok(Self::Simulated),
            "networked" | "real" => Ok(Self::Networked),
            other => Err(CoordinatorError::Config(format!(
                "Invalid GATEWAY_MODE: {other}"
            ))),
        }
    }
}

impl fmt::Display for GatewayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simulated => "simulated",
            Self::Networked => "networked",
        })
    }
}

/// A contract message ready to be signed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractCall {
    pub dest: AccountId,
    pub message: &'static str,
    pub args: Vec<Value>,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    fn mode(&self) -> GatewayMode;

    /// Establish the ledger connection. Idempotent.
    async fn connect(&self) -> Result<bool>;

    async fn is_connected(&self) -> bool;

    /// Install the acting account.
    async fn set_signer(&self, signer: Arc<dyn Signer>);

    async fn account(&self) -> Option<AccountId>;

    // ── Projects ──

    async fn register_project(&self, project: NewProject) -> Result<Registration>;

    async fn get_project_info(&self, id: ProjectId) -> Result<Option<Project>>;

    async fn get_all_projects(&self) -> Result<Vec<Project>>;

    async fn get_project_vault(&self, id: ProjectId) -> Result<Option<ProjectVault>>;

    async fn get_project_score(&self, id: ProjectId) -> Result<Option<u8>>;

    // ── Guarantees ──

    async fn add_guarantee(&self, project: ProjectId, token: TokenId, amount: Balance)
        -> Result<TxRef>;

    async fn withdraw_guarantee(
        &self,
        project: ProjectId,
        token: TokenId,
        amount: Balance,
    ) -> Result<TxRef>;

    async fn get_user_guarantee(
        &self,
        project: ProjectId,
        token: TokenId,
        user: &str,
    ) -> Result<Balance>;

    // ── Votings ──

    async fn vote(&self, project: ProjectId, approve: bool) -> Result<TxRef>;

    async fn has_voted(&self, project: ProjectId, user: &str) -> Result<bool>;

    async fn start_annual_voting(&self, project: ProjectId) -> Result<VotingStarted>;

    async fn get_voting_info(&self, voting_id: VotingId) -> Result<Option<Voting>>;

    async fn get_active_voting(&self, project: ProjectId) -> Result<Option<Voting>>;

    async fn finalize_voting(&self, project: ProjectId) -> Result<Finalization>;

    // ── Claims ──

    async fn process_claim(&self, project: ProjectId) -> Result<ClaimReceipt>;

    async fn get_user_claim(&self, project: ProjectId, user: &str) -> Result<Option<ClaimInfo>>;

    // ── Approval ──

    async fn submit_for_approval(&self, project: ProjectId) -> Result<ApprovalReceipt>;

    async fn approve_project(&self, project: ProjectId) -> Result<ApprovalReceipt>;

    async fn reject_project(&self, project: ProjectId, reason: &str) -> Result<ApprovalReceipt>;

    async fn resubmit_project(&self, project: ProjectId) -> Result<ApprovalReceipt>;
}

/// Build the gateway selected by `config.mode` and install its signer.
pub async fn build(config: &Config, client: Client) -> Result<Arc<dyn LedgerGateway>> {
    let gateway: Arc<dyn LedgerGateway> = match config.mode {
        GatewayMode::Simulated => Arc::new(SimulatedGateway::from_config(config)?),
        GatewayMode::Networked => Arc::new(NetworkedGateway::from_config(config, client.clone())),
    };

    let signer: Option<Arc<dyn Signer>> = match (config.mode, &config.signer_url) {
        (GatewayMode::Networked, Some(url)) => Some(Arc::new(RemoteSigner::new(
            client,
            url.clone(),
            config.account_address.clone(),
        ))),
        (GatewayMode::Networked, None) => {
            warn!("SIGNER_URL not set; networked gateway is read-only");
            None
        }
        (GatewayMode::Simulated, _) => {
            Some(Arc::new(LocalSigner::new(config.account_address.clone())))
        }
    };
    if let Some(signer) = signer {
        gateway.set_signer(signer).await;
    }

    info!(
        "Gateway ready: mode={} network={} account={}",
        config.mode, config.network, config.account_address
    );
    Ok(gateway)
}
