//! LCD (REST) chain client

use super::{u64_from_str_or_num, ChainClient, NetworkInfo, TxHash, TxInfo};
use crate::config::QueryRoute;
use crate::error::{GatewayError, GatewayResult};

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// Chain client talking to a Cosmos SDK LCD endpoint
pub struct LcdClient {
    /// Network this client is bound to
    network: NetworkInfo,
    /// LCD base URL without trailing slash
    base_url: String,
    /// Smart query route flavour
    route: QueryRoute,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct TxResponseEnvelope {
    tx_response: TxInfo,
}

#[derive(Deserialize)]
struct LatestBlock {
    block: Block,
}

#[derive(Deserialize)]
struct Block {
    header: Header,
}

#[derive(Deserialize)]
struct Header {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    height: u64,
}

impl LcdClient {
    /// Create a new LCD client for the given network
    pub fn new(
        network: NetworkInfo,
        route: QueryRoute,
        request_timeout: Duration,
    ) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = network.lcd_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(GatewayError::Config("LCD URL is empty".to_string()));
        }

        Ok(Self {
            network,
            base_url,
            route,
            http,
        })
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        match self.latest_height().await {
            Ok(_) => true,
            Err(e) => {
                error!("Health check failed for network {}: {}", self.network.chain_id, e);
                false
            }
        }
    }

    async fn get_json(&self, request: reqwest::RequestBuilder) -> GatewayResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Remote(format!(
                "LCD returned {}: {}",
                status,
                body.trim()
            )));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl ChainClient for LcdClient {
    async fn contract_query(&self, contract: &str, msg: &Value) -> GatewayResult<Value> {
        let raw = serde_json::to_vec(msg)?;

        let (request, field) = match self.route {
            QueryRoute::Terra => {
                let url = format!(
                    "{}/terra/wasm/v1beta1/contracts/{}/store",
                    self.base_url, contract
                );
                let request = self
                    .http
                    .get(url)
                    .query(&[("query_msg", STANDARD.encode(&raw))]);
                (request, "query_result")
            }
            QueryRoute::Cosmwasm => {
                let url = format!(
                    "{}/cosmwasm/wasm/v1/contract/{}/smart/{}",
                    self.base_url,
                    contract,
                    URL_SAFE.encode(&raw)
                );
                (self.http.get(url), "data")
            }
        };

        let mut body = self.get_json(request).await?;
        debug!("Query against {} answered", contract);

        body.get_mut(field)
            .map(Value::take)
            .ok_or_else(|| GatewayError::Decode(format!("Query response has no '{}' field", field)))
    }

    async fn tx_info(&self, tx_hash: &TxHash) -> GatewayResult<TxInfo> {
        let url = format!("{}/cosmos/tx/v1beta1/txs/{}", self.base_url, tx_hash);
        let response = self.http.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::TxNotFound {
                tx_hash: tx_hash.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Some LCD versions answer 400 with code 5 for unknown hashes
            if body.contains("not found") {
                return Err(GatewayError::TxNotFound {
                    tx_hash: tx_hash.to_string(),
                });
            }
            return Err(GatewayError::Remote(format!(
                "LCD returned {}: {}",
                status,
                body.trim()
            )));
        }

        let envelope: TxResponseEnvelope = response.json().await?;
        Ok(envelope.tx_response)
    }

    async fn latest_height(&self) -> GatewayResult<u64> {
        let url = format!(
            "{}/cosmos/base/tendermint/v1beta1/blocks/latest",
            self.base_url
        );
        let body = self.get_json(self.http.get(url)).await?;
        let latest: LatestBlock = serde_json::from_value(body)?;
        Ok(latest.block.header.height)
    }
}
