//! User-facing game actions
//!
//! Each state-changing action submits one contract call, waits for it to be
//! confirmed, and only then refreshes the game state it affects. Actions from
//! the same wallet are serialized so account sequences never race.

use super::receipts::{ReceiptRegistry, TxReceipt};
use crate::chain::TxInfo;
use crate::config::GameConfig;
use crate::contract::{
    AdminResponse, ExecuteMsg, Game, GameId, GameResponse, GamesResponse, LeaderboardResponse,
    LockedResponse, QueryMsg,
};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::ChainGateway;

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Result of a confirmed action plus the refreshed state it touched
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub tx_hash: String,
    pub height: u64,
    pub gas_used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<Game>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub games: Option<Vec<Game>>,
}

impl ActionOutcome {
    fn from_tx(info: &TxInfo) -> Self {
        Self {
            tx_hash: info.txhash.clone(),
            height: info.height,
            gas_used: info.gas_used,
            game: None,
            games: None,
        }
    }
}

pub struct GameService {
    gateway: Arc<ChainGateway>,
    receipts: Arc<ReceiptRegistry>,
    /// Held from submission until the poll reaches a terminal state
    action_lock: Arc<Mutex<()>>,
    default_bet: u128,
}

impl GameService {
    pub fn new(gateway: Arc<ChainGateway>, config: &GameConfig) -> Self {
        Self {
            gateway,
            receipts: Arc::new(ReceiptRegistry::new()),
            action_lock: Arc::new(Mutex::new(())),
            default_bet: config.default_bet,
        }
    }

    pub fn gateway(&self) -> &ChainGateway {
        &self.gateway
    }

    pub fn receipts(&self) -> &ReceiptRegistry {
        &self.receipts
    }

    pub fn default_bet(&self) -> u128 {
        self.default_bet
    }

    pub async fn list_games(&self) -> GatewayResult<Vec<Game>> {
        let response: GamesResponse = self.gateway.query(&QueryMsg::GetGames {}).await?;
        Ok(response.games)
    }

    pub async fn load_game(&self, game_id: GameId) -> GatewayResult<Game> {
        let response: GameResponse = self
            .gateway
            .query(&QueryMsg::GetGameById { id: game_id })
            .await?;
        Ok(response.game)
    }

    pub async fn games_of(&self, address: &str) -> GatewayResult<Vec<Game>> {
        let response: GamesResponse = self
            .gateway
            .query(&QueryMsg::GetGamesByAddress {
                address: address.to_string(),
            })
            .await?;
        Ok(response.games)
    }

    pub async fn my_games(&self) -> GatewayResult<Vec<Game>> {
        self.games_of(&self.gateway.wallet_address()).await
    }

    pub async fn win_count(&self, address: &str) -> GatewayResult<u64> {
        let response: LeaderboardResponse = self
            .gateway
            .query(&QueryMsg::GetLeaderboard {
                address: address.to_string(),
            })
            .await?;
        Ok(response.win_count)
    }

    pub async fn my_win_count(&self) -> GatewayResult<u64> {
        self.win_count(&self.gateway.wallet_address()).await
    }

    pub async fn is_locked(&self) -> GatewayResult<bool> {
        let response: LockedResponse = self.gateway.query(&QueryMsg::IsLocked {}).await?;
        Ok(response.locked)
    }

    pub async fn admin(&self) -> GatewayResult<Option<String>> {
        let response: AdminResponse = self.gateway.query(&QueryMsg::GetAdmin {}).await?;
        Ok(response.admin)
    }

    /// Create a game staking `bet` (or the default bet), then list games
    pub async fn start_game(&self, bet: Option<u128>) -> GatewayResult<ActionOutcome> {
        let bet = bet.unwrap_or(self.default_bet);
        let info = self.execute(ExecuteMsg::CreateGame {}, Some(bet)).await?;

        let mut outcome = ActionOutcome::from_tx(&info);
        outcome.games = Some(self.list_games().await?);
        Ok(outcome)
    }

    /// Join a game matching its bet, then reload it
    pub async fn join_game(&self, game_id: GameId, bet: Option<u128>) -> GatewayResult<ActionOutcome> {
        let bet = bet.unwrap_or(self.default_bet);
        let info = self
            .execute(ExecuteMsg::JoinGame { game_id }, Some(bet))
            .await?;

        let mut outcome = ActionOutcome::from_tx(&info);
        outcome.game = Some(self.load_game(game_id).await?);
        Ok(outcome)
    }

    /// Mark cell (`x`, `y`), then reload the game
    pub async fn make_move(&self, game_id: GameId, x: u8, y: u8) -> GatewayResult<ActionOutcome> {
        let info = self
            .execute(ExecuteMsg::MakeMove { game_id, x, y }, None)
            .await?;

        let mut outcome = ActionOutcome::from_tx(&info);
        outcome.game = Some(self.load_game(game_id).await?);
        Ok(outcome)
    }

    pub async fn withdraw_price(&self, game_id: GameId) -> GatewayResult<ActionOutcome> {
        let info = self
            .execute(ExecuteMsg::WithdrawPrice { game_id }, None)
            .await?;
        Ok(ActionOutcome::from_tx(&info))
    }

    pub async fn cancel_game(&self, game_id: GameId) -> GatewayResult<ActionOutcome> {
        let info = self
            .execute(ExecuteMsg::CancelGame { game_id }, None)
            .await?;
        Ok(ActionOutcome::from_tx(&info))
    }

    /// Submit and wait for confirmation
    ///
    /// Once a hash exists the poll runs on its own task, so a dropped caller
    /// never abandons it; the action lock travels with that task.
    async fn execute(&self, msg: ExecuteMsg, bet: Option<u128>) -> GatewayResult<TxInfo> {
        let kind = msg.kind();
        let guard = self.action_lock.clone().lock_owned().await;

        let tx_hash = self.gateway.submit(&msg, bet).await?;
        self.receipts.track(TxReceipt::new(tx_hash.clone(), kind));

        let confirmation = tokio::spawn({
            let gateway = self.gateway.clone();
            let receipts = self.receipts.clone();
            let tx_hash = tx_hash.clone();
            async move {
                let outcome = gateway.confirm(&tx_hash).await;
                receipts.resolve(&tx_hash, &outcome);
                drop(guard);
                outcome
            }
        });

        let info = confirmation
            .await
            .map_err(|e| GatewayError::Internal(format!("Confirmation task for {} failed: {}", tx_hash, e)))??;

        if !info.is_success() {
            warn!(
                "{} {} rejected by contract (code {}): {}",
                kind, tx_hash, info.code, info.raw_log
            );
            return Err(GatewayError::Execution {
                tx_hash: tx_hash.to_string(),
                code: info.code,
                log: info.raw_log,
            });
        }

        info!("{} {} confirmed at height {}", kind, tx_hash, info.height);
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{sample_tx_info, MockChainClient, TxHash};
    use crate::contract::fixtures;
    use crate::gateway::testing::{gateway, mock_wallet, PLAYER, TESTNET_CONTRACT};
    use crate::game::receipts::ReceiptStatus;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn service(client: MockChainClient, wallet: crate::tx::MockWallet) -> GameService {
        GameService::new(Arc::new(gateway(client, wallet)), &GameConfig::default())
    }

    #[tokio::test]
    async fn test_start_game_posts_default_bet_then_lists() {
        let order = Arc::new(StdMutex::new(Vec::new()));

        let mut wallet = mock_wallet("bombay-12");
        let seen = order.clone();
        wallet.expect_post().times(1).returning(move |tx| {
            assert_eq!(tx.msgs[0].coins[0].amount, "100000");
            assert_eq!(tx.msgs[0].coins[0].denom, "uluna");
            seen.lock().unwrap().push("post");
            Ok(TxHash::new("ABC123"))
        });

        let mut client = MockChainClient::new();
        let seen = order.clone();
        client.expect_tx_info().times(1).returning(move |hash| {
            seen.lock().unwrap().push("poll");
            Ok(sample_tx_info(hash.as_str(), 100))
        });
        let seen = order.clone();
        client
            .expect_contract_query()
            .withf(|contract, msg| contract == TESTNET_CONTRACT && msg == &json!({ "get_games": {} }))
            .times(1)
            .returning(move |_, _| {
                seen.lock().unwrap().push("query");
                Ok(json!({ "games": [fixtures::game_json(1), fixtures::game_json(2)] }))
            });

        let service = service(client, wallet);
        let outcome = service.start_game(None).await.unwrap();

        assert_eq!(outcome.tx_hash, "ABC123");
        assert_eq!(outcome.height, 100);
        assert_eq!(outcome.games.unwrap().len(), 2);
        assert_eq!(*order.lock().unwrap(), vec!["post", "poll", "query"]);
        assert!(service.receipts().is_empty());
    }

    #[tokio::test]
    async fn test_join_game_reloads_game() {
        let mut wallet = mock_wallet("bombay-12");
        wallet.expect_post().returning(|tx| {
            assert_eq!(tx.msgs[0].execute_msg, json!({ "join_game": { "game_id": 7 } }));
            assert_eq!(tx.msgs[0].coins[0].amount, "250000");
            Ok(TxHash::new("JOIN"))
        });

        let mut client = MockChainClient::new();
        client
            .expect_tx_info()
            .returning(|hash| Ok(sample_tx_info(hash.as_str(), 8)));
        client
            .expect_contract_query()
            .withf(|_, msg| msg == &json!({ "get_game_by_id": { "id": 7 } }))
            .returning(|_, _| Ok(json!({ "game": fixtures::game_json(7) })));

        let outcome = service(client, wallet)
            .join_game(GameId(7), Some(250_000))
            .await
            .unwrap();
        assert_eq!(outcome.game.unwrap().game_id, GameId(7));
        assert!(outcome.games.is_none());
    }

    #[tokio::test]
    async fn test_move_sends_no_funds() {
        let mut wallet = mock_wallet("bombay-12");
        wallet.expect_post().returning(|tx| {
            assert!(tx.msgs[0].coins.is_empty());
            assert_eq!(
                tx.msgs[0].execute_msg,
                json!({ "make_move": { "game_id": 7, "x": 2, "y": 1 } })
            );
            Ok(TxHash::new("MOVE"))
        });

        let mut client = MockChainClient::new();
        client
            .expect_tx_info()
            .returning(|hash| Ok(sample_tx_info(hash.as_str(), 9)));
        client
            .expect_contract_query()
            .returning(|_, _| Ok(json!({ "game": fixtures::game_json(7) })));

        let outcome = service(client, wallet)
            .make_move(GameId(7), 2, 1)
            .await
            .unwrap();
        assert_eq!(outcome.tx_hash, "MOVE");
    }

    #[tokio::test]
    async fn test_rejected_move_is_execution_error() {
        let mut wallet = mock_wallet("bombay-12");
        wallet
            .expect_post()
            .returning(|_| Ok(TxHash::new("BAD")));

        let mut client = MockChainClient::new();
        client.expect_tx_info().returning(|hash| {
            let mut info = sample_tx_info(hash.as_str(), 9);
            info.code = 5;
            info.raw_log = "NotYourTurn".to_string();
            Ok(info)
        });
        client.expect_contract_query().never();

        let err = service(client, wallet)
            .make_move(GameId(7), 0, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Execution { code: 5, ref log, .. } if log == "NotYourTurn"));
    }

    #[tokio::test]
    async fn test_submission_failure_skips_polling() {
        let mut wallet = mock_wallet("bombay-12");
        wallet
            .expect_post()
            .returning(|_| Err(GatewayError::Submission("User denied".into())));

        let mut client = MockChainClient::new();
        client.expect_tx_info().never();

        let service = service(client, wallet);
        let err = service.withdraw_price(GameId(7)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Submission(_)));
        assert!(service.receipts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_action_reports_hash() {
        let mut wallet = mock_wallet("bombay-12");
        wallet
            .expect_post()
            .returning(|_| Ok(TxHash::new("ABC123")));

        let mut client = MockChainClient::new();
        client.expect_tx_info().returning(|hash| {
            Err(GatewayError::TxNotFound {
                tx_hash: hash.to_string(),
            })
        });

        let service = service(client, wallet);
        let err = service.cancel_game(GameId(3)).await.unwrap_err();
        assert!(err.to_string().contains("ABC123"));
        assert!(service.receipts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_action_still_resolves_receipt() {
        let mut wallet = mock_wallet("bombay-12");
        wallet
            .expect_post()
            .times(1)
            .returning(|_| Ok(TxHash::new("ABC123")));

        let mut client = MockChainClient::new();
        client.expect_tx_info().returning(|hash| {
            Err(GatewayError::TxNotFound {
                tx_hash: hash.to_string(),
            })
        });
        client.expect_contract_query().never();

        let service = service(client, wallet);
        let abandoned =
            tokio::time::timeout(Duration::from_secs(30), service.start_game(None)).await;
        assert!(abandoned.is_err());

        // Caller is gone but the poll keeps going
        assert_eq!(service.receipts().len(), 1);
        assert_eq!(
            service.receipts().pending()[0].status(),
            &ReceiptStatus::Submitted
        );

        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert!(service.receipts().is_empty());
        assert!(service.action_lock.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_reads_default_to_wallet_address() {
        let mut client = MockChainClient::new();
        client
            .expect_contract_query()
            .withf(|_, msg| msg == &json!({ "get_games_by_address": { "address": PLAYER } }))
            .returning(|_, _| Ok(json!({ "games": [fixtures::game_json(4)] })));
        client
            .expect_contract_query()
            .withf(|_, msg| msg == &json!({ "get_leaderboard": { "address": PLAYER } }))
            .returning(|_, _| Ok(json!({ "win_count": 3 })));

        let service = service(client, mock_wallet("bombay-12"));
        assert_eq!(service.my_games().await.unwrap()[0].game_id, GameId(4));
        assert_eq!(service.my_win_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_contract_status_queries() {
        let mut client = MockChainClient::new();
        client
            .expect_contract_query()
            .withf(|_, msg| msg == &json!({ "is_locked": {} }))
            .returning(|_, _| Ok(json!({ "locked": false })));
        client
            .expect_contract_query()
            .withf(|_, msg| msg == &json!({ "get_admin": {} }))
            .returning(|_, _| Ok(json!({ "admin": "terra1admin" })));

        let service = service(client, mock_wallet("bombay-12"));
        assert!(!service.is_locked().await.unwrap());
        assert_eq!(service.admin().await.unwrap().as_deref(), Some("terra1admin"));
    }
}
