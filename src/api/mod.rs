//! HTTP API for game actions, health checks, and status

use crate::chain::{TxHash, TxInfo};
use crate::config::ApiConfig;
use crate::contract::{CellState, Coin, Game, GameId, GameState};
use crate::error::{GatewayError, GatewayResult};
use crate::game::{ActionOutcome, GameService};
use crate::tx::short_address;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GameService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: Arc<GameService>) -> Self {
        Self {
            service,
            started_at: Instant::now(),
        }
    }
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, service: Arc<GameService>) -> GatewayResult<()> {
    let app = router(AppState::new(service));

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Config(format!("Cannot bind API address {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| GatewayError::Internal(format!("API server stopped: {}", e)))?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/status", get(get_status))
        .route("/games", get(list_games).post(start_game))
        .route("/games/:id", get(get_game))
        .route("/games/:id/board", get(get_board))
        .route("/games/:id/join", post(join_game))
        .route("/games/:id/moves", post(make_move))
        .route("/games/:id/withdraw", post(withdraw_price))
        .route("/games/:id/cancel", post(cancel_game))
        .route("/players/:address/games", get(player_games))
        .route("/players/:address/wins", get(player_wins))
        .route("/me/games", get(my_games))
        .route("/me/wins", get(my_wins))
        .route("/contract", get(contract_info))
        .route("/txs/pending", get(pending_txs))
        .route("/txs/:hash", get(get_tx))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Gateway error rendered as an HTTP response
pub struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Execution { .. } => StatusCode::CONFLICT,
            GatewayError::SubmissionQueued { .. } => StatusCode::ACCEPTED,
            GatewayError::TxNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Submission(_) => StatusCode::BAD_GATEWAY,
            e if e.is_remote() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self.0 {
            GatewayError::SubmissionQueued { tx_hash } | GatewayError::Execution { tx_hash, .. } => {
                json!({ "error": self.0.to_string(), "tx_hash": tx_hash })
            }
            other => json!({ "error": other.to_string() }),
        };

        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_game_id(raw: &str) -> Result<GameId, ApiError> {
    Ok(raw.parse::<GameId>()?)
}

/// Bet from an optional JSON body; only an empty body falls back to the default
fn parse_bet(headers: &HeaderMap, body: &Bytes) -> Result<Option<u128>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return Err(GatewayError::InvalidRequest(
            "Bet body must be sent as application/json".to_string(),
        )
        .into());
    }

    let request: BetRequest = serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid bet body: {}", e)))?;
    Ok(request.bet)
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - LCD reachable and contract resolvable
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = state.service.gateway();
    let lcd = gateway.health_check().await;
    let contract = gateway.contract_address().is_ok();
    let ready = lcd && contract;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready,
            lcd,
            contract,
        }),
    )
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = state.service.gateway();
    let network = gateway.network();

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        chain_id: network.chain_id,
        lcd_url: network.lcd_url,
        wallet: short_address(&gateway.wallet_address()),
        contract: gateway.contract_address().ok(),
        known_networks: gateway
            .registry()
            .networks()
            .into_iter()
            .map(str::to_string)
            .collect(),
        pending_transactions: state.service.receipts().len(),
        default_bet: state.service.default_bet().to_string(),
    })
}

async fn list_games(State(state): State<AppState>) -> ApiResult<Vec<Game>> {
    Ok(Json(state.service.list_games().await?))
}

async fn get_game(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Game> {
    let game_id = parse_game_id(&id)?;
    Ok(Json(state.service.load_game(game_id).await?))
}

/// Board as symbols plus whose turn it is
async fn get_board(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<BoardResponse> {
    let game_id = parse_game_id(&id)?;
    let game = state.service.load_game(game_id).await?;
    let wallet = state.service.gateway().wallet_address();

    Ok(Json(BoardResponse {
        game_id: game.game_id,
        state: game.state.clone(),
        rows: game
            .board()
            .iter()
            .map(|row| row.iter().map(CellState::symbol).collect())
            .collect(),
        free_cells: game
            .board()
            .iter()
            .flatten()
            .filter(|cell| cell.is_empty())
            .count(),
        next_player: game.next_player.clone(),
        my_turn: game.is_turn_of(&wallet),
        bet_amount: game.bet.amount_u128()?,
        updated_at: game.updated_at_time(),
        bet: game.bet,
    }))
}

async fn player_games(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Vec<Game>> {
    Ok(Json(state.service.games_of(&address).await?))
}

async fn player_wins(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<WinsResponse> {
    let win_count = state.service.win_count(&address).await?;
    Ok(Json(WinsResponse { address, win_count }))
}

async fn my_games(State(state): State<AppState>) -> ApiResult<Vec<Game>> {
    Ok(Json(state.service.my_games().await?))
}

async fn my_wins(State(state): State<AppState>) -> ApiResult<WinsResponse> {
    let win_count = state.service.my_win_count().await?;
    Ok(Json(WinsResponse {
        address: state.service.gateway().wallet_address(),
        win_count,
    }))
}

async fn start_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ActionOutcome> {
    let bet = parse_bet(&headers, &body)?;
    Ok(Json(state.service.start_game(bet).await?))
}

async fn join_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ActionOutcome> {
    let game_id = parse_game_id(&id)?;
    let bet = parse_bet(&headers, &body)?;
    Ok(Json(state.service.join_game(game_id, bet).await?))
}

async fn make_move(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<ActionOutcome> {
    let game_id = parse_game_id(&id)?;
    Ok(Json(state.service.make_move(game_id, req.x, req.y).await?))
}

async fn withdraw_price(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ActionOutcome> {
    let game_id = parse_game_id(&id)?;
    Ok(Json(state.service.withdraw_price(game_id).await?))
}

async fn cancel_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ActionOutcome> {
    let game_id = parse_game_id(&id)?;
    Ok(Json(state.service.cancel_game(game_id).await?))
}

async fn pending_txs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.receipts().pending())
}

async fn get_tx(State(state): State<AppState>, Path(hash): Path<String>) -> ApiResult<TxInfo> {
    let tx_hash = TxHash::parse(&hash)?;
    Ok(Json(state.service.gateway().tx_info(&tx_hash).await?))
}

async fn contract_info(State(state): State<AppState>) -> ApiResult<ContractResponse> {
    let gateway = state.service.gateway();
    Ok(Json(ContractResponse {
        address: gateway.contract_address()?,
        locked: state.service.is_locked().await?,
        admin: state.service.admin().await?,
    }))
}

// Request types

#[derive(Debug, Deserialize)]
struct BetRequest {
    /// Bet in the smallest unit of the bet denom
    #[serde(default)]
    bet: Option<u128>,
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    x: u8,
    y: u8,
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    lcd: bool,
    contract: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_seconds: u64,
    chain_id: String,
    lcd_url: String,
    wallet: String,
    contract: Option<String>,
    known_networks: Vec<String>,
    pending_transactions: usize,
    default_bet: String,
}

#[derive(Serialize)]
struct BoardResponse {
    game_id: GameId,
    state: GameState,
    rows: Vec<Vec<&'static str>>,
    free_cells: usize,
    next_player: String,
    my_turn: bool,
    bet: Coin,
    bet_amount: u128,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct ContractResponse {
    address: String,
    locked: bool,
    admin: Option<String>,
}

#[derive(Serialize)]
struct WinsResponse {
    address: String,
    win_count: u64,
}
