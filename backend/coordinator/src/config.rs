//! Application configuration loaded from environment variables.

use std::fmt;
use std::str::FromStr;

use crate::errors::{CoordinatorError, Result};
use crate::gateway::GatewayMode;
use crate::ledger::GovernanceParams;

/// Development account used when no `ACCOUNT_ADDRESS` is set.
pub const DEV_ACCOUNT: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Local,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mainnet => "Lunes Mainnet",
            Self::Testnet => "Lunes Testnet",
            Self::Local => "Local Node",
        }
    }

    pub fn rpc_urls(&self) -> Vec<String> {
        let urls: &[&str] = match self {
            Self::Mainnet => &[
                "https://ws-lunes-main-01.lunes.io",
                "https://ws-lunes-main-02.lunes.io",
            ],
            Self::Testnet => &["https://testnet.lunes.io"],
            Self::Local => &["http://127.0.0.1:9944"],
        };
        urls.iter().map(|u| u.to_string()).collect()
    }

    /// Address of the deployed contract; empty until deployed.
    pub fn contract_address(&self) -> &'static str {
        match self {
            Self::Mainnet | Self::Testnet => "",
            Self::Local => DEV_ACCOUNT,
        }
    }

    pub fn explorer_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://explorer.lunes.io",
            Self::Testnet => "https://testnet-explorer.lunes.io",
            Self::Local => "http://localhost:3000",
        }
    }

    pub fn explorer_tx_url(&self, hash: &str) -> String {
        format!("{}/tx/{hash}", self.explorer_url())
    }
}

impl FromStr for Network {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "local" => Ok(Self::Local),
            other => Err(CoordinatorError::Config(format!("Invalid NETWORK: {other}"))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Local => "local",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Which gateway backend to build.
    pub mode: GatewayMode,
    pub network: Network,
    /// Node JSON-RPC endpoints, tried in order on connect.
    pub rpc_urls: Vec<String>,
    pub contract_address: String,
    /// Acting account.
    pub account_address: String,
    /// Wallet bridge used to sign networked transactions.
    pub signer_url: Option<String>,
    /// Port for the REST API server
    pub api_port: u16,
    /// Artificial delay of every simulated operation
    pub sim_latency_ms: u64,
    pub governance: GovernanceParams,
    pub http_timeout_secs: u64,
    /// Pre-populate the simulated ledger
    pub seed_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        let network = Network::Testnet;
        Config {
            mode: GatewayMode::Simulated,
            network,
            rpc_urls: network.rpc_urls(),
            contract_address: network.contract_address().to_string(),
            account_address: DEV_ACCOUNT.to_string(),
            signer_url: None,
            api_port: 3001,
            sim_latency_ms: 150,
            governance: GovernanceParams::default(),
            http_timeout_secs: 30,
            seed_demo: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; used by `from_env` and tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let network: Network = var("NETWORK")
            .unwrap_or_else(|| "testnet".to_string())
            .parse()?;

        let rpc_urls = match var("RPC_URLS") {
            Some(list) => list
                .split(',')
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect(),
            None => network.rpc_urls(),
        };
        if rpc_urls.is_empty() {
            return Err(CoordinatorError::Config("RPC_URLS lists no endpoint".to_string()));
        }

        let quorum_percent: u8 = parse_var(&var, "QUORUM_PERCENT", "75")?;
        if !(1..=100).contains(&quorum_percent) {
            return Err(CoordinatorError::Config(format!(
                "QUORUM_PERCENT must be within 1..=100, got {quorum_percent}"
            )));
        }
        let voting_window_secs: i64 = parse_var(&var, "VOTING_WINDOW_SECS", "604800")?;
        let claims_period_secs: i64 = parse_var(&var, "CLAIMS_PERIOD_SECS", "2592000")?;
        if voting_window_secs <= 0 || claims_period_secs <= 0 {
            return Err(CoordinatorError::Config(
                "VOTING_WINDOW_SECS and CLAIMS_PERIOD_SECS must be positive".to_string(),
            ));
        }

        let to_ms = |key: &str, secs: i64| {
            secs.checked_mul(1000)
                .ok_or_else(|| CoordinatorError::Config(format!("Invalid {key}: out of range")))
        };
        let voting_window_ms = to_ms("VOTING_WINDOW_SECS", voting_window_secs)?;
        let claims_period_ms = to_ms("CLAIMS_PERIOD_SECS", claims_period_secs)?;

        Ok(Config {
            mode: var("GATEWAY_MODE")
                .unwrap_or_else(|| "simulated".to_string())
                .parse()?,
            network,
            rpc_urls,
            contract_address: var("CONTRACT_ADDRESS")
                .unwrap_or_else(|| network.contract_address().to_string()),
            account_address: var("ACCOUNT_ADDRESS").unwrap_or_else(|| DEV_ACCOUNT.to_string()),
            signer_url: var("SIGNER_URL"),
            api_port: parse_var(&var, "API_PORT", "3001")?,
            sim_latency_ms: parse_var(&var, "SIM_LATENCY_MS", "150")?,
            governance: GovernanceParams {
                quorum_percent,
                voting_window_ms,
                claims_period_ms,
            },
            http_timeout_secs: parse_var(&var, "HTTP_TIMEOUT_SECS", "30")?,
            seed_demo: parse_var(&var, "SEED_DEMO", "false")?,
        })
    }
}

fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T> {
    var(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .map_err(|_| CoordinatorError::Config(format!("Invalid {key}")))
}
