//! Client for the node daemon that keeps the token ledger.
//!
//! Every call here is best-effort. Failures are classified so they can be
//! logged usefully, but nothing in the request path ever waits on them
//! succeeding.

use ai4all_core::config::LedgerConfig;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger request timed out")]
    Timeout,

    #[error("ledger unreachable: {0}")]
    Connect(String),

    #[error("ledger returned status {0}")]
    Status(u16),

    #[error("ledger response could not be decoded: {0}")]
    Decode(String),

    #[error("ledger request failed: {0}")]
    Other(String),
}

impl LedgerError {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Timeout => "timeout",
            LedgerError::Connect(_) => "connect",
            LedgerError::Status(_) => "status",
            LedgerError::Decode(_) => "decode",
            LedgerError::Other(_) => "other",
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LedgerError::Timeout
        } else if e.is_connect() {
            LedgerError::Connect(e.to_string())
        } else if e.is_decode() {
            LedgerError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            LedgerError::Status(status.as_u16())
        } else {
            LedgerError::Other(e.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct LedgerEntry<'a> {
    amount: u32,
    memo: &'a str,
}

/// Where usage and grants get booked
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Debit tokens for work done on the caller's behalf
    async fn spend(&self, amount: u32, memo: &str) -> Result<(), LedgerError>;

    /// Credit tokens
    async fn earn(&self, amount: u32, memo: &str) -> Result<(), LedgerError>;
}

#[derive(Debug, Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    config: LedgerConfig,
}

impl LedgerClient {
    /// The client carries the short ledger timeout, so a dead node daemon
    /// costs at most that long per call.
    pub fn new(config: &LedgerConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    async fn post_entry(&self, path: &str, amount: u32, memo: &str) -> Result<(), LedgerError> {
        self.http
            .post(self.config.endpoint(path))
            .json(&LedgerEntry { amount, memo })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn get_json(&self, path: &str) -> Result<Value, LedgerError> {
        let value = self
            .http
            .get(self.config.endpoint(path))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(value)
    }

    /// Current balance as reported by the node daemon
    pub async fn balance(&self) -> Result<Value, LedgerError> {
        self.get_json("/v1/tokens").await
    }

    pub async fn node_status(&self) -> Result<Value, LedgerError> {
        self.get_json("/v1/node/status").await
    }
}

#[async_trait]
impl Ledger for LedgerClient {
    async fn spend(&self, amount: u32, memo: &str) -> Result<(), LedgerError> {
        self.post_entry("/v1/tokens/spend", amount, memo).await
    }

    async fn earn(&self, amount: u32, memo: &str) -> Result<(), LedgerError> {
        self.post_entry("/v1/tokens/earn", amount, memo).await
    }
}
