//! Chain module - read access to the chain and confirmation tracking
//!
//! This module provides:
//! - The `ChainClient` seam over the chain's LCD (REST) endpoint
//! - Contract address resolution per network
//! - Confirmation polling for broadcast transactions

pub mod confirmation;
pub mod lcd;
pub mod registry;

pub use confirmation::{ConfirmationPoller, PollSchedule};
pub use lcd::LcdClient;
pub use registry::ContractRegistry;

use crate::error::{GatewayError, GatewayResult};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Network the connected wallet is on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    pub chain_id: String,
    pub lcd_url: String,
}

/// Transaction hash as reported by the chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Parse a user supplied hash, normalizing to upper-case hex
    pub fn parse(input: &str) -> GatewayResult<Self> {
        let trimmed = input.trim().trim_start_matches("0x");
        hex::decode(trimmed)
            .map_err(|e| GatewayError::InvalidRequest(format!("Invalid tx hash {:?}: {}", input, e)))?;
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusion record of a transaction (`tx_response` on the LCD)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxInfo {
    pub txhash: String,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub height: u64,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    pub gas_wanted: u64,
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    pub gas_used: u64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TxInfo {
    /// Whether the chain executed the transaction without error
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Cosmos REST encodes 64-bit integers as strings
pub(crate) fn u64_from_str_or_num<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Read-only access to a chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Run a smart query against `contract`, returning the decoded payload
    async fn contract_query(&self, contract: &str, msg: &Value) -> GatewayResult<Value>;

    /// Look up a transaction by hash
    async fn tx_info(&self, tx_hash: &TxHash) -> GatewayResult<TxInfo>;

    /// Latest block height, used for health checks
    async fn latest_height(&self) -> GatewayResult<u64>;
}

#[cfg(test)]
pub(crate) fn sample_tx_info(hash: &str, height: u64) -> TxInfo {
    TxInfo {
        txhash: hash.to_string(),
        height,
        code: 0,
        raw_log: "[]".to_string(),
        gas_wanted: 150_000,
        gas_used: 120_000,
        timestamp: None,
    }
}
