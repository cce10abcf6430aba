//! Guarantee deposits and withdrawals, plus the deposit policy.

use serde::Serialize;

use crate::errors::{CoordinatorError, Result};
use crate::ledger::ProjectLedger;
use crate::score::MAX_SCORE;
use crate::types::{
    Balance, ProjectId, ProjectStatus, TokenId, TokenInfo, TokenKind, TokenRegistry,
};

/// Score gained by a project on every accepted deposit.
pub const SCORE_STEP: u8 = 5;

/// Applies deposits and withdrawals to a [`ProjectLedger`].
#[derive(Debug, Clone, Default)]
pub struct GuaranteeAccount {
    tokens: TokenRegistry,
}

impl GuaranteeAccount {
    pub fn new(tokens: TokenRegistry) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    fn token(&self, id: TokenId) -> Result<&TokenInfo> {
        self.tokens
            .get(id)
            .ok_or_else(|| CoordinatorError::validation(format!("unknown token {id}")))
    }

    /// Credit `amount` of `token` to `account` in `project`.
    ///
    /// Returns the project's score after the deposit.
    pub fn deposit(
        &self,
        ledger: &mut ProjectLedger,
        project: ProjectId,
        token: TokenId,
        account: &str,
        amount: Balance,
    ) -> Result<u8> {
        if amount == 0 {
            return Err(CoordinatorError::validation("deposit amount must be positive"));
        }
        let kind = self.token(token)?.kind;
        if kind == TokenKind::Nft && u64::try_from(amount).is_err() {
            return Err(CoordinatorError::validation(format!(
                "{amount} NFT units exceed the supported count"
            )));
        }
        let status = ledger
            .project(project)
            .ok_or(CoordinatorError::ProjectNotFound(project))?
            .status;
        // Collateral is frozen while a voting runs.
        if matches!(
            status,
            ProjectStatus::Voting
                | ProjectStatus::Liquidating
                | ProjectStatus::Closed
                | ProjectStatus::Paused
        ) {
            return Err(CoordinatorError::validation(format!(
                "project {project} is {} and does not accept deposits",
                status.as_str()
            )));
        }

        ledger.credit(project, token, kind, account, amount)?;

        let p = ledger.project_mut(project)?;
        p.score = p.score.saturating_add(SCORE_STEP).min(MAX_SCORE as u8);
        Ok(p.score)
    }

    /// Debit `amount` of `token` from `account` in `project`.
    ///
    /// Returns the vault total after the withdrawal.
    pub fn withdraw(
        &self,
        ledger: &mut ProjectLedger,
        project: ProjectId,
        token: TokenId,
        account: &str,
        amount: Balance,
    ) -> Result<Balance> {
        if amount == 0 {
            return Err(CoordinatorError::validation("withdrawal amount must be positive"));
        }
        let kind = self.token(token)?.kind;
        let status = ledger
            .project(project)
            .ok_or(CoordinatorError::ProjectNotFound(project))?
            .status;
        match status {
            ProjectStatus::Voting => {
                return Err(CoordinatorError::validation(format!(
                    "project {project} is voting; collateral is locked until finalization"
                )))
            }
            ProjectStatus::Liquidating | ProjectStatus::Closed => {
                return Err(CoordinatorError::validation(format!(
                    "project {project} is {}; collateral is held for claims",
                    status.as_str()
                )))
            }
            _ => {}
        }

        let available = ledger.user_guarantee(project, token, account);
        if amount > available {
            return Err(CoordinatorError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        ledger.debit(project, token, kind, account, amount)
    }
}

// ─── Deposit policy ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepositPolicy {
    /// Lowest minimum deposit, whatever the score.
    pub base_floor: f64,
    /// Minimum deposit of a project scoring 100.
    pub base_amount: f64,
}

impl Default for DepositPolicy {
    fn default() -> Self {
        Self {
            base_floor: 50.0,
            base_amount: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepositRequirement {
    pub score: u8,
    pub minimum: f64,
    pub recommended: f64,
}

impl DepositPolicy {
    /// Lower scores require larger deposits.
    pub fn minimum_deposit(&self, score: u8) -> f64 {
        let score = f64::from(score.min(MAX_SCORE as u8));
        let scaled = self.base_amount * (1.0 + (100.0 - score) / 100.0);
        scaled.max(self.base_floor)
    }

    pub fn recommended_deposit(&self, score: u8) -> f64 {
        self.minimum_deposit(score) * 1.5
    }

    pub fn requirement(&self, score: u8) -> DepositRequirement {
        DepositRequirement {
            score,
            minimum: self.minimum_deposit(score),
            recommended: self.recommended_deposit(score),
        }
    }

    /// Reject `amount` if it is below the minimum for `score`.
    pub fn check(&self, amount: f64, score: u8) -> Result<()> {
        let minimum = self.minimum_deposit(score);
        if !amount.is_finite() || amount < minimum {
            return Err(CoordinatorError::validation(format!(
                "deposit of {amount} is below the minimum of {minimum} for score {score}"
            )));
        }
        Ok(())
    }
}

/// Convert a human amount into the token's smallest unit.
pub fn to_token_units(amount: f64, decimals: u32) -> Result<Balance> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(CoordinatorError::validation(format!(
            "amount must be a positive number, got {amount}"
        )));
    }
    let units = (amount * 10f64.powi(decimals as i32)).floor();
    if units < 1.0 {
        return Err(CoordinatorError::validation(format!(
            "amount {amount} is below the smallest unit of a {decimals}-decimal token"
        )));
    }
    if units >= u128::MAX as f64 {
        return Err(CoordinatorError::validation(format!("amount {amount} is too large")));
    }
    Ok(units as Balance)
}

pub fn from_token_units(units: Balance, decimals: u32) -> f64 {
    units as f64 / 10f64.powi(decimals as i32)
}
