//! Tic-tac-toe gateway - wallet-connected client for the on-chain game contract
//!
//! Resolves the contract for the connected wallet's network, serves game
//! queries from the LCD, and runs game actions as signed contract calls that
//! are polled until they are included in a block.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

mod api;
mod chain;
mod config;
mod contract;
mod error;
mod game;
mod gateway;
mod metrics;
mod tx;

use chain::{ChainClient, ConfirmationPoller, ContractRegistry, LcdClient, NetworkInfo, PollSchedule};
use config::Settings;
use game::GameService;
use gateway::ChainGateway;
use metrics::MetricsServer;
use tx::{short_address, BridgeWallet, FeeTable, TransactionSender};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting tic-tac-toe gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    let request_timeout = Duration::from_secs(settings.lcd.request_timeout_secs);
    info!(
        "Loaded configuration for {} networks, wallet {} on {}",
        settings.contracts.len(),
        short_address(&settings.wallet.address),
        settings.wallet.chain_id
    );

    // LCD client for the wallet's network
    let network = NetworkInfo {
        chain_id: settings.wallet.chain_id.clone(),
        lcd_url: settings.wallet.lcd_url.clone(),
    };
    let lcd = Arc::new(LcdClient::new(network, settings.lcd.query_route, request_timeout)?);
    if !lcd.health_check().await {
        warn!("LCD {} is not reachable yet", settings.wallet.lcd_url);
    }
    let client: Arc<dyn ChainClient> = lcd;

    // Signer and submission path
    let wallet = Arc::new(BridgeWallet::new(&settings.wallet, request_timeout)?);
    let sender = TransactionSender::new(
        wallet,
        FeeTable::new(settings.fees.clone()),
        settings.game.bet_denom.clone(),
    );
    let poller = ConfirmationPoller::new(client.clone(), PollSchedule::from(&settings.poller));

    let registry = ContractRegistry::new(settings.contracts.clone());
    let gateway = Arc::new(ChainGateway::new(client, registry, sender, poller));
    info!("Contract {} resolved", gateway.contract_address()?);

    let service = Arc::new(GameService::new(gateway.clone(), &settings.game));

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let service = service.clone();
        async move {
            if let Err(e) = api::run_server(config, service).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Health check loop
    let health_handle = tokio::spawn({
        let gateway = gateway.clone();
        let interval = settings.lcd.health_check_interval_secs;
        async move {
            loop {
                tokio::time::sleep(Duration::from_secs(interval)).await;

                let healthy = gateway.health_check().await;
                if !healthy {
                    warn!("LCD health check failed for {}", gateway.network().chain_id);
                }
                metrics::record_health_check(healthy);
            }
        }
    });

    info!("Tic-tac-toe gateway is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    if !service.receipts().is_empty() {
        warn!(
            "{} transactions still awaiting confirmation",
            service.receipts().len()
        );
    }
    for receipt in service.receipts().pending() {
        warn!(
            "Leaving {} {} unconfirmed; check its status on chain",
            receipt.kind(),
            receipt.hash()
        );
    }

    // Abort background tasks
    api_handle.abort();
    health_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Tic-tac-toe gateway stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tictactoe_gateway=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
