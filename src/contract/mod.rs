//! Contract message and response types
//!
//! Mirrors the JSON interface of the tic-tac-toe contract: query and execute
//! messages are externally tagged by their snake_case intent name, e.g.
//! `{"make_move":{"game_id":7,"x":1,"y":2}}`.

use crate::error::{GatewayError, GatewayResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Game identifier assigned by the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl FromStr for GameId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(GameId)
            .map_err(|_| GatewayError::InvalidRequest(format!("Invalid game id: {:?}", s)))
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Native coin amount; the amount is an integer string on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.to_string(),
        }
    }

    /// Parse the amount as an integer
    pub fn amount_u128(&self) -> GatewayResult<u128> {
        self.amount
            .parse()
            .map_err(|_| GatewayError::Decode(format!("Invalid coin amount: {}", self.amount)))
    }
}

/// Read-only requests understood by the contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    GetGames {},
    GetGameById { id: GameId },
    GetGamesByAddress { address: String },
    GetLeaderboard { address: String },
    IsLocked {},
    GetAdmin {},
}

impl QueryMsg {
    /// Intent name, used for logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            QueryMsg::GetGames {} => "get_games",
            QueryMsg::GetGameById { .. } => "get_game_by_id",
            QueryMsg::GetGamesByAddress { .. } => "get_games_by_address",
            QueryMsg::GetLeaderboard { .. } => "get_leaderboard",
            QueryMsg::IsLocked {} => "is_locked",
            QueryMsg::GetAdmin {} => "get_admin",
        }
    }
}

/// State-changing requests; these are signed and broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    CreateGame {},
    JoinGame { game_id: GameId },
    MakeMove { game_id: GameId, x: u8, y: u8 },
    WithdrawPrice { game_id: GameId },
    CancelGame { game_id: GameId },
}

impl ExecuteMsg {
    pub fn kind(&self) -> RequestKind {
        match self {
            ExecuteMsg::CreateGame {} => RequestKind::CreateGame,
            ExecuteMsg::JoinGame { .. } => RequestKind::JoinGame,
            ExecuteMsg::MakeMove { .. } => RequestKind::MakeMove,
            ExecuteMsg::WithdrawPrice { .. } => RequestKind::WithdrawPrice,
            ExecuteMsg::CancelGame { .. } => RequestKind::CancelGame,
        }
    }
}

/// Execute request kinds, keyed for fee policy and funds handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    CreateGame,
    JoinGame,
    MakeMove,
    WithdrawPrice,
    CancelGame,
}

impl RequestKind {
    /// Whether the request moves the bet into escrow
    pub fn attaches_bet(&self) -> bool {
        matches!(self, RequestKind::CreateGame | RequestKind::JoinGame)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::CreateGame => "create_game",
            RequestKind::JoinGame => "join_game",
            RequestKind::MakeMove => "make_move",
            RequestKind::WithdrawPrice => "withdraw_price",
            RequestKind::CancelGame => "cancel_game",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a game as reported by the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    New,
    InProgress,
    Completed,
    PriceWithdrawn,
    Cancelled,
}

/// Decoded cell code of the board grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    /// Host mark
    PlayerOne,
    /// Opponent mark
    PlayerTwo,
    Unknown(i64),
}

impl CellState {
    pub const EMPTY: i64 = 0;
    pub const PLAYER_ONE: i64 = 1;
    pub const PLAYER_TWO: i64 = 100;

    pub fn from_code(code: i64) -> Self {
        match code {
            Self::EMPTY => CellState::Empty,
            Self::PLAYER_ONE => CellState::PlayerOne,
            Self::PLAYER_TWO => CellState::PlayerTwo,
            other => CellState::Unknown(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellState::Empty)
    }

    /// Board symbol: `X` for the host, `O` for the opponent
    pub fn symbol(&self) -> &'static str {
        match self {
            CellState::Empty => "",
            CellState::PlayerOne => "X",
            CellState::PlayerTwo => "O",
            CellState::Unknown(_) => "?",
        }
    }
}

/// Snapshot of a game, owned and mutated only by the contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub game_id: GameId,
    pub host: String,
    pub bet: Coin,
    pub state: GameState,
    pub grid: Vec<Vec<i64>>,
    #[serde(default)]
    pub opponent: String,
    pub next_player: String,
    /// Block time in nanoseconds, as an integer string
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub winner: String,
}

impl Game {
    /// Cell at row `x`, column `y`
    pub fn cell(&self, x: usize, y: usize) -> Option<CellState> {
        self.grid
            .get(x)
            .and_then(|row| row.get(y))
            .map(|&code| CellState::from_code(code))
    }

    /// Decoded board, row by row
    pub fn board(&self) -> Vec<Vec<CellState>> {
        (0..self.grid.len())
            .map(|x| {
                (0..self.grid[x].len())
                    .filter_map(|y| self.cell(x, y))
                    .collect()
            })
            .collect()
    }

    pub fn is_turn_of(&self, address: &str) -> bool {
        self.next_player == address
    }

    pub fn updated_at_time(&self) -> Option<DateTime<Utc>> {
        let nanos: i64 = self.updated_at.parse().ok()?;
        Some(DateTime::from_timestamp_nanos(nanos))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamesResponse {
    pub games: Vec<Game>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResponse {
    pub game: Game,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub win_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedResponse {
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminResponse {
    pub admin: Option<String>,
}
