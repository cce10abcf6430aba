//! Signing capability.
//!
//! The coordinator never holds keys. A [`Signer`] names the acting account
//! and turns a [`ContractCall`] into an included transaction.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::ContractCall;
use crate::errors::{CoordinatorError, Result};
use crate::rpc;

#[async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> &str;

    /// Sign and submit `call`; resolves with the inclusion hash.
    async fn sign_and_submit(&self, call: ContractCall) -> Result<String>;
}

/// `0x`-prefixed hex of a nonce, as used for locally produced references.
pub fn nonce_hash(nonce: u64) -> String {
    format!("0x{}", hex::encode(nonce.to_be_bytes()))
}

/// Signer for the simulated ledger and for tests. Never leaves the process.
#[derive(Debug)]
pub struct LocalSigner {
    address: String,
    nonce: AtomicU64,
}

impl LocalSigner {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            nonce: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign_and_submit(&self, call: ContractCall) -> Result<String> {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Local signature #{nonce} for {}", call.message);
        Ok(nonce_hash(nonce))
    }
}

/// Forwards calls to a wallet bridge speaking JSON-RPC
/// (`author_signAndSubmit`).
pub struct RemoteSigner {
    client: Client,
    url: String,
    address: String,
}

impl RemoteSigner {
    pub fn new(client: Client, url: String, address: String) -> Self {
        Self {
            client,
            url,
            address,
        }
    }
}

#[async_trait]
impl Signer for RemoteSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign_and_submit(&self, call: ContractCall) -> Result<String> {
        let message = call.message;
        rpc::send::<String>(
            &self.client,
            &self.url,
            "author_signAndSubmit",
            json!([self.address, call]),
        )
        .await
        .map_err(|e| CoordinatorError::Transaction(format!("{message}: {e}")))
    }
}
