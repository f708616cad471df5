//! Error types for the tic-tac-toe gateway

use thiserror::Error;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No contract address configured for network {chain_id}")]
    UnknownNetwork { chain_id: String },

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Transaction {tx_hash} not found")]
    TxNotFound { tx_hash: String },

    #[error("Submission error: {0}")]
    Submission(String),

    #[error(
        "Transaction queued. To verify the status, please check the transaction hash: {tx_hash}"
    )]
    SubmissionQueued { tx_hash: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transaction {tx_hash} failed with code {code}: {log}")]
    Execution {
        tx_hash: String,
        code: u32,
        log: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Check if a confirmation poll should try again after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Remote(_) | GatewayError::Decode(_) | GatewayError::TxNotFound { .. }
        )
    }

    /// Check if the error came from talking to the chain
    pub fn is_remote(&self) -> bool {
        matches!(self, GatewayError::Remote(_) | GatewayError::Decode(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Remote(e.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Decode(e.to_string())
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
