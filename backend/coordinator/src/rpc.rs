//! Node JSON-RPC client and contract output decoding.
//!
//! ## Endpoints
//!
//! [`RpcClient::connect`] walks the configured endpoints in order and keeps
//! the first one that answers `system_chain`. Later requests go to that
//! endpoint only. Failed requests are not retried; the caller decides.
//!
//! ## Numbers
//!
//! Query output comes in the node's human-readable form: small integers as
//! JSON numbers, balances as strings with digit grouping (`"1,250,000"`).
//! [`parse_human`] accepts both and rejects anything else with a
//! [`CoordinatorError::Decode`].

use reqwest::Client;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::{CoordinatorError, Result};
use crate::types::{Balance, ProjectStatus, Timestamp, VoteResult};

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Dry-run result of `contracts_call`.
#[derive(Debug, Deserialize)]
pub enum CallOutcome {
    #[serde(rename = "Ok")]
    Success(Value),
    #[serde(rename = "Err")]
    Failure(Value),
}

/// Low-level failure of a single request.
#[derive(Debug, Error)]
pub enum RpcFault {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("request timed out: {0}")]
    TimedOut(String),

    #[error("node error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<RpcFault> for CoordinatorError {
    fn from(f: RpcFault) -> Self {
        match f {
            RpcFault::Unreachable(_) => Self::Connection(f.to_string()),
            RpcFault::TimedOut(_) | RpcFault::Remote { .. } => Self::Transaction(f.to_string()),
            RpcFault::Malformed(_) => Self::Decode(f.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────

/// POST one JSON-RPC request to `url` and decode its `result`.
pub async fn send<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    method: &str,
    params: Value,
) -> std::result::Result<T, RpcFault> {
    let response = client
        .post(url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                RpcFault::TimedOut(format!("{method} at {url}"))
            } else {
                RpcFault::Unreachable(format!("{url}: {e}"))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(RpcFault::Remote {
            code: i64::from(status.as_u16()),
            message: format!("HTTP {status} from {url}"),
        });
    }

    let body: RpcResponse<T> = response
        .json()
        .await
        .map_err(|e| RpcFault::Malformed(format!("{method}: {e}")))?;

    if let Some(err) = body.error {
        return Err(RpcFault::Remote {
            code: err.code,
            message: err.message,
        });
    }
    body.result
        .ok_or_else(|| RpcFault::Malformed(format!("empty result from {method}")))
}

pub struct RpcClient {
    client: Client,
    endpoints: Vec<String>,
    active: RwLock<Option<String>>,
}

impl RpcClient {
    pub fn new(client: Client, endpoints: Vec<String>) -> Self {
        Self {
            client,
            endpoints,
            active: RwLock::new(None),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub async fn active_endpoint(&self) -> Option<String> {
        self.active.read().await.clone()
    }

    /// Select the first endpoint that answers. Returns the chain name.
    pub async fn connect(&self) -> Result<String> {
        for url in &self.endpoints {
            match send::<String>(&self.client, url, "system_chain", json!([])).await {
                Ok(chain) => {
                    debug!("Connected to {chain} via {url}");
                    *self.active.write().await = Some(url.clone());
                    return Ok(chain);
                }
                Err(e) => warn!("Endpoint {url} failed: {e}"),
            }
        }
        Err(CoordinatorError::Connection(format!(
            "none of {} endpoint(s) answered",
            self.endpoints.len()
        )))
    }

    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let url = self
            .active_endpoint()
            .await
            .ok_or_else(|| CoordinatorError::Connection("not connected".to_string()))?;
        Ok(send(&self.client, &url, method, params).await?)
    }

    /// `contracts_getInfo`; `None` when nothing is deployed at `address`.
    pub async fn contract_info(&self, address: &str) -> Result<Option<Value>> {
        let info: Value = match self.request("contracts_getInfo", json!([address])).await {
            Ok(v) => v,
            Err(CoordinatorError::Decode(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok((!info.is_null()).then_some(info))
    }

    /// Dry-run `message` on `dest` and return its output value.
    pub async fn query(
        &self,
        origin: &str,
        dest: &str,
        message: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        let outcome: CallOutcome = self
            .request(
                "contracts_call",
                json!([{
                    "origin": origin,
                    "dest": dest,
                    "message": message,
                    "args": args,
                }]),
            )
            .await?;

        match outcome {
            CallOutcome::Success(v) => Ok(v),
            CallOutcome::Failure(reason) => Err(CoordinatorError::Transaction(format!(
                "{message} reverted: {}",
                reason_text(&reason)
            ))),
        }
    }
}

fn reason_text(reason: &Value) -> String {
    match reason {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────
// Human-readable numbers
// ─────────────────────────────────────────────────────────

/// Parse a number that may arrive as JSON number, digit-grouped string, or
/// `0x` hex string.
pub fn parse_human(value: &Value) -> Result<u128> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| CoordinatorError::Decode(format!("not an unsigned integer: {n}"))),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',' && *c != '_').collect();
            let cleaned = cleaned.trim();
            let parsed = match cleaned.strip_prefix("0x") {
                Some(hex) => u128::from_str_radix(hex, 16),
                None => cleaned.parse::<u128>(),
            };
            parsed.map_err(|_| CoordinatorError::Decode(format!("not a number: {s:?}")))
        }
        other => Err(CoordinatorError::Decode(format!("expected a number, got {other}"))),
    }
}

pub fn human_balance<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Balance, D::Error> {
    let v = Value::deserialize(d)?;
    parse_human(&v).map_err(D::Error::custom)
}

pub fn human_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    let v = Value::deserialize(d)?;
    let n = parse_human(&v).map_err(D::Error::custom)?;
    u64::try_from(n).map_err(|_| D::Error::custom(format!("{n} overflows u64")))
}

pub fn human_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Timestamp, D::Error> {
    let n = human_u64(d)?;
    Timestamp::try_from(n).map_err(|_| D::Error::custom(format!("{n} is not a timestamp")))
}

pub fn human_opt_u64<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<u64>, D::Error> {
    let v = Value::deserialize(d)?;
    if v.is_null() {
        return Ok(None);
    }
    let n = parse_human(&v).map_err(D::Error::custom)?;
    u64::try_from(n)
        .map(Some)
        .map_err(|_| D::Error::custom(format!("{n} overflows u64")))
}

/// Decode a dry-run output into `T`.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

// ─────────────────────────────────────────────────────────
// Contract output shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProjectInfo {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub metadata_uri: String,
    #[serde(default)]
    pub pair_psp22: Option<String>,
    #[serde(deserialize_with = "human_balance")]
    pub qtd_vote_yes: Balance,
    #[serde(deserialize_with = "human_balance")]
    pub qtd_vote_no: Balance,
    /// `false` when the project is paused.
    pub status: bool,
    #[serde(deserialize_with = "human_timestamp")]
    pub creation_timestamp: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVault {
    #[serde(deserialize_with = "human_u64")]
    pub project_id: u64,
    #[serde(deserialize_with = "human_timestamp")]
    pub creation_timestamp: Timestamp,
    pub status: String,
    #[serde(default, deserialize_with = "human_opt_u64")]
    pub current_voting_id: Option<u64>,
    #[serde(deserialize_with = "human_timestamp")]
    pub last_annual_vote: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVoting {
    #[serde(deserialize_with = "human_u64")]
    pub project_id: u64,
    #[serde(deserialize_with = "human_timestamp")]
    pub start_timestamp: Timestamp,
    #[serde(deserialize_with = "human_timestamp")]
    pub end_timestamp: Timestamp,
    #[serde(deserialize_with = "human_balance")]
    pub yes_votes: Balance,
    #[serde(deserialize_with = "human_balance")]
    pub no_votes: Balance,
    #[serde(deserialize_with = "human_balance")]
    pub total_eligible: Balance,
    pub result: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClaim {
    #[serde(deserialize_with = "human_balance")]
    pub claimable_amount: Balance,
    #[serde(deserialize_with = "human_balance")]
    pub claimed_amount: Balance,
    #[serde(deserialize_with = "human_timestamp")]
    pub claim_deadline: Timestamp,
}

/// Map the contract's vault status onto the ledger lifecycle.
pub fn vault_status(raw: &str) -> Result<ProjectStatus> {
    match raw {
        "Active" | "Approved" => Ok(ProjectStatus::Active),
        "VotingPeriod" => Ok(ProjectStatus::Voting),
        "Rejected" | "Liquidation" | "ClaimsOpen" => Ok(ProjectStatus::Liquidating),
        "Closed" => Ok(ProjectStatus::Closed),
        "Emergency" => Ok(ProjectStatus::Paused),
        other => Err(CoordinatorError::Decode(format!("unknown vault status {other:?}"))),
    }
}

pub fn vote_result(raw: &str) -> Result<VoteResult> {
    match raw.to_ascii_lowercase().as_str() {
        "pending" => Ok(VoteResult::Pending),
        "approved" => Ok(VoteResult::Approved),
        "rejected" => Ok(VoteResult::Rejected),
        other => Err(CoordinatorError::Decode(format!("unknown vote result {other:?}"))),
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
