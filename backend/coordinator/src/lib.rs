//! # Guarantee Coordinator
//!
//! Client-side coordination for a collateral-guarantee protocol: projects
//! register, backers lock collateral in per-project vaults, holders vote on
//! the project once a year, and a rejected project enters liquidation where
//! depositors claim back their share.
//!
//! | Concern              | Module                                   |
//! |----------------------|------------------------------------------|
//! | Ledger access        | [`gateway`] (simulated or networked)     |
//! | Local record set     | [`ledger`]                               |
//! | Deposits/withdrawals | [`guarantee`]                            |
//! | Quorum arithmetic    | [`voting`]                               |
//! | Approval workflow    | [`status`]                               |
//! | Score estimate       | [`score`]                                |
//! | Multi-step flows     | [`service`]                              |
//! | REST surface         | [`api`]                                  |
//!
//! The gateway backend is chosen once, from [`config::Config`]; every other
//! component talks to `Arc<dyn gateway::LedgerGateway>`.

pub mod api;
pub mod clock;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod guarantee;
pub mod ledger;
pub mod rpc;
pub mod score;
pub mod service;
pub mod status;
pub mod types;
pub mod voting;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_networked;
#[cfg(test)]
mod test_simulated_flow;

pub use errors::{CoordinatorError, Result};
pub use gateway::LedgerGateway;
