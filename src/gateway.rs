//! Chain gateway - turns logical intents into contract queries and calls
//!
//! Every request addresses the contract resolved for the wallet's current
//! network; there is no fallback address.

use crate::chain::{ChainClient, ConfirmationPoller, ContractRegistry, NetworkInfo, TxHash, TxInfo};
use crate::contract::{ExecuteMsg, QueryMsg};
use crate::error::{GatewayError, GatewayResult};
use crate::tx::TransactionSender;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ChainGateway {
    /// Read access to the chain
    client: Arc<dyn ChainClient>,
    /// Contract address per network
    registry: ContractRegistry,
    /// Signed submissions
    sender: TransactionSender,
    /// Inclusion polling
    poller: ConfirmationPoller,
}

impl ChainGateway {
    pub fn new(
        client: Arc<dyn ChainClient>,
        registry: ContractRegistry,
        sender: TransactionSender,
        poller: ConfirmationPoller,
    ) -> Self {
        Self {
            client,
            registry,
            sender,
            poller,
        }
    }

    pub fn network(&self) -> NetworkInfo {
        self.sender.wallet().network()
    }

    pub fn wallet_address(&self) -> String {
        self.sender.wallet().address()
    }

    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    /// Contract address for the wallet's current network
    pub fn contract_address(&self) -> GatewayResult<String> {
        let network = self.network();
        self.registry
            .resolve(&network.chain_id)
            .map(str::to_string)
    }

    /// Read-only query; the payload is returned exactly as decoded
    pub async fn query_raw(&self, msg: &QueryMsg) -> GatewayResult<Value> {
        let contract = self.contract_address()?;
        let payload = serde_json::to_value(msg)?;

        debug!("Query {} against {}", msg.name(), contract);
        match self.client.contract_query(&contract, &payload).await {
            Ok(response) => {
                crate::metrics::record_query(msg.name(), true);
                Ok(response)
            }
            Err(e) => {
                warn!("Query {} failed: {}", msg.name(), e);
                crate::metrics::record_query(msg.name(), false);
                Err(e)
            }
        }
    }

    /// Read-only query decoded into a response type
    pub async fn query<R: DeserializeOwned>(&self, msg: &QueryMsg) -> GatewayResult<R> {
        let response = self.query_raw(msg).await?;
        serde_json::from_value(response).map_err(|e| {
            GatewayError::Decode(format!("Unexpected {} response: {}", msg.name(), e))
        })
    }

    /// Sign and broadcast one contract call; returns the hash without waiting
    pub async fn submit(&self, msg: &ExecuteMsg, bet: Option<u128>) -> GatewayResult<TxHash> {
        let contract = self.contract_address()?;
        self.sender.send(&contract, msg, bet).await
    }

    /// Single lookup of a transaction, without polling
    pub async fn tx_info(&self, tx_hash: &TxHash) -> GatewayResult<TxInfo> {
        self.client.tx_info(tx_hash).await
    }

    /// Wait for a submitted transaction to be included
    pub async fn confirm(&self, tx_hash: &TxHash) -> GatewayResult<TxInfo> {
        self.poller.wait_for(tx_hash).await
    }

    pub async fn health_check(&self) -> bool {
        match self.client.latest_height().await {
            Ok(height) => {
                crate::metrics::record_chain_height(height);
                true
            }
            Err(e) => {
                warn!("Chain health check failed: {}", e);
                false
            }
        }
    }
}
