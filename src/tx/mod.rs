//! Transaction submission module with fixed fee policy and wallet signing

mod fee;
mod sender;
mod wallet;

pub use fee::FeeTable;
pub use sender::TransactionSender;
pub use wallet::{short_address, BridgeWallet};

#[cfg(test)]
pub use wallet::MockWallet;
