//! Application-wide error types.
//!
//! Every variant maps to a stable machine-readable code (see
//! [`CoordinatorError::code`]) so callers can pick kind-appropriate messaging
//! without matching on the human-readable text.

use thiserror::Error;

use crate::types::{ApprovalAction, ApprovalStatus, Balance, ProjectId};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Account error: {0}")]
    Account(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Balance, available: Balance },

    #[error("Invalid transition: cannot {action} a project that is {from}")]
    InvalidTransition {
        from: ApprovalStatus,
        action: ApprovalAction,
    },

    #[error("No active voting for project {0}")]
    NoActiveVoting(ProjectId),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Project {0} not found")]
    ProjectNotFound(ProjectId),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoordinatorError {
    /// Stable identifier for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Account(_) => "ACCOUNT_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NoActiveVoting(_) => "NO_ACTIVE_VOTING",
            Self::Transaction(_) => "TRANSACTION_ERROR",
            Self::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<serde_json::Error> for CoordinatorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
