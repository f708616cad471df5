//! Configuration management for the tic-tac-toe gateway
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub wallet: WalletConfig,
    #[serde(default)]
    pub lcd: LcdConfig,
    /// Contract address per network, keyed by chain id
    pub contracts: HashMap<String, String>,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub game: GameConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

/// Wallet-connection context: who signs and which network they are on
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub address: String,
    pub chain_id: String,
    pub lcd_url: String,
    /// Signer bridge that signs and broadcasts on behalf of `address`
    pub bridge_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LcdConfig {
    #[serde(default)]
    pub query_route: QueryRoute,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Interval of the background LCD health check
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
}

impl Default for LcdConfig {
    fn default() -> Self {
        Self {
            query_route: QueryRoute::default(),
            request_timeout_secs: default_request_timeout_secs(),
            health_check_interval_secs: default_health_check_interval_secs(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_health_check_interval_secs() -> u64 {
    30
}

/// Which LCD route serves smart contract queries
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryRoute {
    /// `/terra/wasm/v1beta1/contracts/{addr}/store`
    #[default]
    Terra,
    /// `/cosmwasm/wasm/v1/contract/{addr}/smart/{msg}`
    Cosmwasm,
}

/// Flat fee for one request kind
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeePolicy {
    pub gas_limit: u64,
    pub amount: u64,
    pub denom: String,
}

impl FeePolicy {
    fn new(gas_limit: u64, amount: u64, denom: &str) -> Self {
        Self {
            gas_limit,
            amount,
            denom: denom.to_string(),
        }
    }
}

/// Fee policy per execute request kind
#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    #[serde(default)]
    pub gas_adjustment: Option<f64>,
    #[serde(default)]
    pub gas_prices: BTreeMap<String, f64>,
    #[serde(default = "default_funded_fee")]
    pub create_game: FeePolicy,
    #[serde(default = "default_funded_fee")]
    pub join_game: FeePolicy,
    #[serde(default = "default_plain_fee")]
    pub make_move: FeePolicy,
    #[serde(default = "default_plain_fee")]
    pub withdraw_price: FeePolicy,
    #[serde(default = "default_plain_fee")]
    pub cancel_game: FeePolicy,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            gas_adjustment: Some(1.15),
            gas_prices: BTreeMap::from([("uusd".to_string(), 0.15)]),
            create_game: default_funded_fee(),
            join_game: default_funded_fee(),
            make_move: default_plain_fee(),
            withdraw_price: default_plain_fee(),
            cancel_game: default_plain_fee(),
        }
    }
}

fn default_funded_fee() -> FeePolicy {
    FeePolicy::new(250_000, 50_000, "uusd")
}

fn default_plain_fee() -> FeePolicy {
    FeePolicy::new(150_000, 35_000, "uusd")
}

/// Confirmation polling schedule
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    pub fast_interval_ms: u64,
    pub fast_window_secs: u64,
    pub slow_interval_secs: u64,
    pub give_up_after_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            fast_interval_ms: 500,
            fast_window_secs: 60,
            slow_interval_secs: 10,
            give_up_after_secs: 3600,
        }
    }
}

impl PollerConfig {
    pub fn fast_interval(&self) -> Duration {
        Duration::from_millis(self.fast_interval_ms)
    }

    pub fn fast_window(&self) -> Duration {
        Duration::from_secs(self.fast_window_secs)
    }

    pub fn slow_interval(&self) -> Duration {
        Duration::from_secs(self.slow_interval_secs)
    }

    pub fn give_up_after(&self) -> Duration {
        Duration::from_secs(self.give_up_after_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    pub bet_denom: String,
    pub default_bet: u128,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            bet_denom: "uluna".to_string(),
            default_bet: 100_000,
        }
    }
}

impl Settings {
    /// Load settings from the configuration file
    pub fn load() -> Result<Self> {
        let config_path = env::var("TICTACTOE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.wallet.lcd_url.is_empty() {
            anyhow::bail!("Wallet has no LCD URL configured");
        }
        if self.wallet.bridge_url.is_empty() {
            anyhow::bail!("Wallet has no signer bridge URL configured");
        }
        if self.wallet.address.is_empty() {
            anyhow::bail!("Wallet has no address configured");
        }

        match self.contracts.get(&self.wallet.chain_id) {
            Some(address) if !address.is_empty() => {}
            _ => anyhow::bail!(
                "No contract address configured for network {}",
                self.wallet.chain_id
            ),
        }

        for (chain_id, address) in &self.contracts {
            if address.is_empty() {
                tracing::warn!("Network {} has an empty contract address", chain_id);
            }
        }

        if self.lcd.health_check_interval_secs == 0 {
            anyhow::bail!("Health check interval must be positive");
        }

        let poller = &self.poller;
        if poller.fast_interval_ms == 0 || poller.slow_interval_secs == 0 {
            anyhow::bail!("Poll intervals must be positive");
        }
        if poller.fast_window_secs > poller.give_up_after_secs {
            anyhow::bail!("Poll fast window must not exceed the give-up deadline");
        }

        if self.game.bet_denom.is_empty() {
            anyhow::bail!("Bet denomination must not be empty");
        }

        Ok(())
    }
}

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
