//! Administrative approval workflow.
//!
//! ```text
//! pending_deposit ──submit──► pending_approval ──approve──► approved
//!                                  ▲      │
//!                          resubmit│      │reject(reason)
//!                                  │      ▼
//!                                  └── rejected
//! ```
//!
//! Every edge lives in [`TRANSITIONS`]; an action without an edge from the
//! current status fails with [`CoordinatorError::InvalidTransition`] and the
//! project is left untouched.

use crate::errors::{CoordinatorError, Result};
use crate::types::{ApprovalAction, ApprovalStatus, Project};

use ApprovalAction::*;
use ApprovalStatus::*;

pub const TRANSITIONS: &[(ApprovalStatus, ApprovalAction, ApprovalStatus)] = &[
    (PendingDeposit, SubmitForApproval, PendingApproval),
    (PendingApproval, Approve, Approved),
    (PendingApproval, Reject, Rejected),
    (Rejected, Resubmit, PendingApproval),
];

pub struct ProjectStatusMachine;

impl ProjectStatusMachine {
    /// Target of `action` from `from`, if the edge exists.
    pub fn next(from: ApprovalStatus, action: ApprovalAction) -> Option<ApprovalStatus> {
        TRANSITIONS
            .iter()
            .find(|(f, a, _)| *f == from && *a == action)
            .map(|(_, _, to)| *to)
    }

    pub fn is_valid_transition(from: ApprovalStatus, to: ApprovalStatus) -> bool {
        TRANSITIONS.iter().any(|(f, _, t)| *f == from && *t == to)
    }

    pub fn available_actions(status: ApprovalStatus) -> Vec<ApprovalAction> {
        TRANSITIONS
            .iter()
            .filter(|(f, _, _)| *f == status)
            .map(|(_, a, _)| *a)
            .collect()
    }

    pub fn describe(status: ApprovalStatus) -> &'static str {
        match status {
            PendingDeposit => "Awaiting guarantee deposit",
            PendingApproval => "Awaiting administrative approval",
            Approved => "Approved and active",
            Rejected => "Rejected",
        }
    }

    /// Validate `action` against `project` without mutating it.
    ///
    /// Returns the target status and, for `Reject`, the trimmed reason.
    pub fn check(
        project: &Project,
        action: ApprovalAction,
        reason: Option<&str>,
    ) -> Result<(ApprovalStatus, Option<String>)> {
        let reason = match action {
            Reject => {
                let reason = reason.map(str::trim).unwrap_or_default();
                if reason.is_empty() {
                    return Err(CoordinatorError::validation(
                        "a rejection requires a non-empty reason",
                    ));
                }
                Some(reason.to_string())
            }
            _ => None,
        };

        let to = Self::next(project.approval, action).ok_or(CoordinatorError::InvalidTransition {
            from: project.approval,
            action,
        })?;
        Ok((to, reason))
    }

    /// Validate and apply `action` to `project`.
    pub fn apply(
        project: &mut Project,
        action: ApprovalAction,
        reason: Option<&str>,
    ) -> Result<ApprovalStatus> {
        let (to, reason) = Self::check(project, action, reason)?;
        project.approval = to;
        if reason.is_some() {
            project.rejection_reason = reason;
        }
        Ok(to)
    }

    pub fn submit_for_approval(project: &mut Project) -> Result<ApprovalStatus> {
        Self::apply(project, SubmitForApproval, None)
    }

    pub fn approve(project: &mut Project) -> Result<ApprovalStatus> {
        Self::apply(project, Approve, None)
    }

    pub fn reject(project: &mut Project, reason: &str) -> Result<ApprovalStatus> {
        Self::apply(project, Reject, Some(reason))
    }

    pub fn resubmit(project: &mut Project) -> Result<ApprovalStatus> {
        Self::apply(project, Resubmit, None)
    }
}
