//! Wallet-connection context: the signing capability bound to the user's key
//!
//! The gateway never holds keys. It hands an unsigned request to the wallet,
//! which signs and broadcasts it and returns the transaction hash.

use super::sender::TxRequest;
use crate::chain::{NetworkInfo, TxHash};
use crate::config::WalletConfig;
use crate::error::{GatewayError, GatewayResult};

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Signing capability plus the network it is connected to
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Account address of the connected key
    fn address(&self) -> String;

    /// Network the wallet is connected to
    fn network(&self) -> NetworkInfo;

    /// Sign and broadcast; returns as soon as the chain accepted the hash
    async fn post(&self, tx: &TxRequest) -> GatewayResult<TxHash>;
}

/// Wallet backed by an external signer bridge over HTTP
pub struct BridgeWallet {
    address: String,
    network: NetworkInfo,
    post_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct PostResult {
    txhash: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl BridgeWallet {
    pub fn new(config: &WalletConfig, request_timeout: Duration) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let wallet = Self {
            address: config.address.clone(),
            network: NetworkInfo {
                chain_id: config.chain_id.clone(),
                lcd_url: config.lcd_url.clone(),
            },
            post_url: format!("{}/post", config.bridge_url.trim_end_matches('/')),
            http,
        };

        info!(
            "Wallet {} connected to {}",
            short_address(&wallet.address),
            wallet.network.chain_id
        );

        Ok(wallet)
    }
}

#[async_trait]
impl Wallet for BridgeWallet {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn network(&self) -> NetworkInfo {
        self.network.clone()
    }

    async fn post(&self, tx: &TxRequest) -> GatewayResult<TxHash> {
        let response = self
            .http
            .post(&self.post_url)
            .json(tx)
            .send()
            .await
            .map_err(|e| GatewayError::Submission(format!("Signer bridge unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Submission(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Submission(format!(
                "Signer bridge returned {}: {}",
                status,
                body.trim()
            )));
        }

        let result: PostResult = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Submission(format!("Malformed bridge response: {}", e)))?;

        match (result.txhash, result.error) {
            (_, Some(error)) => Err(GatewayError::Submission(error)),
            (Some(hash), None) if !hash.is_empty() => {
                debug!("Bridge broadcast {}", hash);
                Ok(TxHash::new(hash))
            }
            _ => Err(GatewayError::Submission(
                "Signer bridge returned no transaction hash".to_string(),
            )),
        }
    }
}

/// Abbreviate an address for display, e.g. `terra1a...x7k2mq`
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 13 {
        return address.to_string();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{}...{}", head, tail)
}
