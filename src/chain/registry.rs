//! Contract address resolution per network

use crate::error::{GatewayError, GatewayResult};

use std::collections::HashMap;

/// Deployed contract address for each known network
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    addresses: HashMap<String, String>,
}

impl ContractRegistry {
    pub fn new(addresses: HashMap<String, String>) -> Self {
        Self { addresses }
    }

    /// Resolve the contract address for a chain id
    ///
    /// An unknown network is a configuration error; callers must not retry.
    pub fn resolve(&self, chain_id: &str) -> GatewayResult<&str> {
        self.addresses
            .get(chain_id)
            .map(String::as_str)
            .filter(|address| !address.is_empty())
            .ok_or_else(|| GatewayError::UnknownNetwork {
                chain_id: chain_id.to_string(),
            })
    }

    pub fn networks(&self) -> Vec<&str> {
        let mut networks: Vec<&str> = self.addresses.keys().map(String::as_str).collect();
        networks.sort_unstable();
        networks
    }
}
