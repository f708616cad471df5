//! Fixed fee policy per request kind

use crate::config::{FeeConfig, FeePolicy};
use crate::contract::{Coin, RequestKind};

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Fee attached to a signed request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fee {
    pub gas_limit: u64,
    pub amount: Vec<Coin>,
}

/// Static fee table; fees are never estimated per request
#[derive(Debug, Clone)]
pub struct FeeTable {
    config: FeeConfig,
}

impl FeeTable {
    pub fn new(config: FeeConfig) -> Self {
        Self { config }
    }

    pub fn policy(&self, kind: RequestKind) -> &FeePolicy {
        match kind {
            RequestKind::CreateGame => &self.config.create_game,
            RequestKind::JoinGame => &self.config.join_game,
            RequestKind::MakeMove => &self.config.make_move,
            RequestKind::WithdrawPrice => &self.config.withdraw_price,
            RequestKind::CancelGame => &self.config.cancel_game,
        }
    }

    /// Fee for a request kind
    pub fn fee_for(&self, kind: RequestKind) -> Fee {
        let policy = self.policy(kind);
        debug!(
            "Fee for {}: {} gas, {}{}",
            kind, policy.gas_limit, policy.amount, policy.denom
        );
        Fee {
            gas_limit: policy.gas_limit,
            amount: vec![Coin::new(policy.denom.clone(), u128::from(policy.amount))],
        }
    }

    pub fn gas_adjustment(&self) -> Option<f64> {
        self.config.gas_adjustment
    }

    pub fn gas_prices(&self) -> &BTreeMap<String, f64> {
        &self.config.gas_prices
    }
}

impl Default for FeeTable {
    fn default() -> Self {
        Self::new(FeeConfig::default())
    }
}
