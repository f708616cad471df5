//! Receipts for submitted transactions that are still being confirmed

use crate::chain::{TxHash, TxInfo};
use crate::contract::RequestKind;
use crate::error::GatewayResult;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReceiptStatus {
    Submitted,
    Confirmed { height: u64 },
    Unresolved,
}

/// A submitted transaction; the hash never changes after submission
#[derive(Debug, Clone, Serialize)]
pub struct TxReceipt {
    hash: TxHash,
    kind: RequestKind,
    submitted_at: DateTime<Utc>,
    status: ReceiptStatus,
}

impl TxReceipt {
    pub fn new(hash: TxHash, kind: RequestKind) -> Self {
        Self {
            hash,
            kind,
            submitted_at: Utc::now(),
            status: ReceiptStatus::Submitted,
        }
    }

    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn status(&self) -> &ReceiptStatus {
        &self.status
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, ReceiptStatus::Submitted)
    }

    /// Apply the poll outcome; terminal receipts stay as they are
    pub fn resolve(&mut self, outcome: &GatewayResult<TxInfo>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = match outcome {
            Ok(info) => ReceiptStatus::Confirmed {
                height: info.height,
            },
            Err(_) => ReceiptStatus::Unresolved,
        };
        true
    }
}

/// In-flight receipts, dropped as soon as they resolve
#[derive(Default)]
pub struct ReceiptRegistry {
    in_flight: DashMap<TxHash, TxReceipt>,
}

impl ReceiptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, receipt: TxReceipt) {
        debug!("Tracking {} ({})", receipt.hash(), receipt.kind());
        self.in_flight.insert(receipt.hash().clone(), receipt);
        crate::metrics::record_in_flight(self.in_flight.len());
    }

    /// Resolve and forget a receipt, returning its terminal form
    pub fn resolve(&self, hash: &TxHash, outcome: &GatewayResult<TxInfo>) -> Option<TxReceipt> {
        let (_, mut receipt) = self.in_flight.remove(hash)?;
        receipt.resolve(outcome);
        debug!("Receipt {} resolved: {:?}", hash, receipt.status());
        crate::metrics::record_in_flight(self.in_flight.len());
        Some(receipt)
    }

    /// Receipts still waiting for confirmation, oldest first
    pub fn pending(&self) -> Vec<TxReceipt> {
        let mut pending: Vec<TxReceipt> = self
            .in_flight
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by_key(|receipt| receipt.submitted_at());
        pending
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}
