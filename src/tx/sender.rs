//! Transaction construction and submission through the wallet

use super::fee::{Fee, FeeTable};
use super::wallet::Wallet;
use crate::chain::TxHash;
use crate::contract::{Coin, ExecuteMsg};
use crate::error::{GatewayError, GatewayResult};

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

const MSG_EXECUTE_CONTRACT: &str = "/terra.wasm.v1beta1.MsgExecuteContract";

/// A single contract call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MsgExecuteContract {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub sender: String,
    pub contract: String,
    pub execute_msg: Value,
    pub coins: Vec<Coin>,
}

impl MsgExecuteContract {
    pub fn new(
        sender: &str,
        contract: &str,
        msg: &ExecuteMsg,
        coins: Vec<Coin>,
    ) -> GatewayResult<Self> {
        Ok(Self {
            type_url: MSG_EXECUTE_CONTRACT.to_string(),
            sender: sender.to_string(),
            contract: contract.to_string(),
            execute_msg: serde_json::to_value(msg)
                .map_err(|e| GatewayError::Internal(e.to_string()))?,
            coins,
        })
    }
}

/// Unsigned request handed to the wallet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxRequest {
    pub msgs: Vec<MsgExecuteContract>,
    pub fee: Fee,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_adjustment: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub gas_prices: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Builds execute requests and submits them through the wallet
pub struct TransactionSender {
    /// Signing capability
    wallet: Arc<dyn Wallet>,
    /// Fee policy per request kind
    fees: FeeTable,
    /// Denomination bets are paid in
    bet_denom: String,
}

impl TransactionSender {
    pub fn new(wallet: Arc<dyn Wallet>, fees: FeeTable, bet_denom: impl Into<String>) -> Self {
        Self {
            wallet,
            fees,
            bet_denom: bet_denom.into(),
        }
    }

    /// Build the request for one contract call
    ///
    /// Funds are attached only for kinds that move the bet into escrow, and
    /// then always exactly the bet.
    pub fn build(
        &self,
        contract: &str,
        msg: &ExecuteMsg,
        bet: Option<u128>,
    ) -> GatewayResult<TxRequest> {
        let kind = msg.kind();

        let coins = if kind.attaches_bet() {
            match bet {
                Some(0) => {
                    return Err(GatewayError::InvalidRequest(format!(
                        "{} requires a positive bet",
                        kind
                    )))
                }
                Some(amount) => vec![Coin::new(self.bet_denom.clone(), amount)],
                None => {
                    return Err(GatewayError::InvalidRequest(format!(
                        "{} requires a bet",
                        kind
                    )))
                }
            }
        } else {
            if bet.is_some() {
                warn!("Ignoring bet passed for {}; it moves no funds", kind);
            }
            Vec::new()
        };

        let msg = MsgExecuteContract::new(&self.wallet.address(), contract, msg, coins)?;

        Ok(TxRequest {
            msgs: vec![msg],
            fee: self.fees.fee_for(kind),
            gas_adjustment: self.fees.gas_adjustment(),
            gas_prices: self.fees.gas_prices().clone(),
            memo: None,
        })
    }

    /// Sign and broadcast a contract call; does not wait for inclusion
    pub async fn send(
        &self,
        contract: &str,
        msg: &ExecuteMsg,
        bet: Option<u128>,
    ) -> GatewayResult<TxHash> {
        let kind = msg.kind();
        let request = self.build(contract, msg, bet)?;

        match self.wallet.post(&request).await {
            Ok(tx_hash) => {
                info!("Submitted {} as {}", kind, tx_hash);
                crate::metrics::record_tx_submitted(kind);
                Ok(tx_hash)
            }
            Err(e) => {
                error!("Failed to submit {}: {}", kind, e);
                crate::metrics::record_submission_failed(kind);
                Err(match e {
                    GatewayError::Submission(_) => e,
                    other => GatewayError::Submission(other.to_string()),
                })
            }
        }
    }

    pub fn wallet(&self) -> &Arc<dyn Wallet> {
        &self.wallet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::GameId;
    use crate::tx::wallet::MockWallet;
    use serde_json::json;
    use std::sync::Mutex;

    const PLAYER: &str = "terra1playerxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";

    fn mock_wallet() -> MockWallet {
        let mut wallet = MockWallet::new();
        wallet.expect_address().return_const(PLAYER.to_string());
        wallet
    }

    fn sender(wallet: MockWallet) -> TransactionSender {
        TransactionSender::new(Arc::new(wallet), FeeTable::default(), "uluna")
    }

    #[test]
    fn test_create_and_join_attach_exact_bet() {
        let sender = sender(mock_wallet());

        for msg in [
            ExecuteMsg::CreateGame {},
            ExecuteMsg::JoinGame { game_id: GameId(3) },
        ] {
            let request = sender.build("terra1contract", &msg, Some(123_456)).unwrap();
            assert_eq!(request.msgs.len(), 1);
            assert_eq!(request.msgs[0].coins, vec![Coin::new("uluna", 123_456)]);
            assert_eq!(request.msgs[0].coins[0].amount, "123456");
            assert_eq!(request.fee.gas_limit, 250_000);
        }
    }

    #[test]
    fn test_move_and_withdraw_never_attach_funds() {
        let sender = sender(mock_wallet());

        for msg in [
            ExecuteMsg::MakeMove {
                game_id: GameId(3),
                x: 0,
                y: 2,
            },
            ExecuteMsg::WithdrawPrice { game_id: GameId(3) },
            ExecuteMsg::CancelGame { game_id: GameId(3) },
        ] {
            let request = sender.build("terra1contract", &msg, Some(999)).unwrap();
            assert!(request.msgs[0].coins.is_empty());
            assert_eq!(request.fee.gas_limit, 150_000);
        }
    }

    #[test]
    fn test_funded_kind_without_bet_rejected() {
        let sender = sender(mock_wallet());
        assert!(matches!(
            sender.build("terra1contract", &ExecuteMsg::CreateGame {}, None),
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            sender.build("terra1contract", &ExecuteMsg::CreateGame {}, Some(0)),
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_message_wire_shape() {
        let sender = sender(mock_wallet());
        let request = sender
            .build(
                "terra1contract",
                &ExecuteMsg::MakeMove {
                    game_id: GameId(7),
                    x: 1,
                    y: 2,
                },
                None,
            )
            .unwrap();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "msgs": [{
                    "@type": "/terra.wasm.v1beta1.MsgExecuteContract",
                    "sender": PLAYER,
                    "contract": "terra1contract",
                    "execute_msg": { "make_move": { "game_id": 7, "x": 1, "y": 2 } },
                    "coins": []
                }],
                "fee": { "gas_limit": 150000, "amount": [{ "denom": "uusd", "amount": "35000" }] },
                "gas_adjustment": 1.15,
                "gas_prices": { "uusd": 0.15 }
            })
        );
    }

    #[tokio::test]
    async fn test_send_posts_built_request() {
        let posted = Arc::new(Mutex::new(Vec::new()));
        let posted_in_mock = posted.clone();

        let mut wallet = mock_wallet();
        wallet.expect_post().times(1).returning(move |tx| {
            posted_in_mock.lock().unwrap().push(tx.clone());
            Ok(TxHash::new("ABC123"))
        });

        let sender = sender(wallet);
        let hash = sender
            .send("terra1contract", &ExecuteMsg::CreateGame {}, Some(100_000))
            .await
            .unwrap();

        assert_eq!(hash.as_str(), "ABC123");
        let posted = posted.lock().unwrap();
        assert_eq!(posted[0].msgs[0].contract, "terra1contract");
        assert_eq!(posted[0].msgs[0].coins[0].amount, "100000");
    }

    #[tokio::test]
    async fn test_send_failure_is_submission_error() {
        let mut wallet = mock_wallet();
        wallet
            .expect_post()
            .returning(|_| Err(GatewayError::Remote("broadcast timed out".into())));

        let err = sender(wallet)
            .send(
                "terra1contract",
                &ExecuteMsg::WithdrawPrice { game_id: GameId(1) },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Submission(ref m) if m.contains("broadcast timed out")));
    }
}
