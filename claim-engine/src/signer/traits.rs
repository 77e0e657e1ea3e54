//! Core traits for transaction signers.
//!
//! This module defines the `TransactionSigner` trait - the opaque
//! submit/confirm boundary to the external ledger. The ledger's own logic
//! is out of reach; only submission and receipts cross this line.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error types for signer operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    /// The participant declined to sign
    #[error("User rejected the transaction")]
    UserRejected,

    /// Transport failure talking to the node/wallet
    #[error("Network error: {0}")]
    Network(String),

    /// No receipt within the allowed time
    #[error("Timed out waiting for receipt")]
    Timeout,

    /// Submission refused before broadcast (bad nonce, insufficient gas, ...)
    #[error("Submission failed: {0}")]
    Submission(String),
}

/// Signs and broadcasts claim transactions.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Signer identifier (wallet address or backend name).
    fn id(&self) -> &str;

    /// Sign and broadcast; returns the transaction id.
    async fn submit(&self, request: TxRequest) -> Result<String, SignerError>;

    /// Wait up to `timeout` for the transaction's receipt.
    async fn wait_for_receipt(
        &self,
        transaction_id: &str,
        timeout: Duration,
    ) -> Result<TxReceipt, SignerError>;
}

/// A claim transaction to sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    /// Attempt id, doubles as a client-side nonce
    pub attempt_id: String,
    pub quest_id: String,
    /// Canonical participant id
    pub participant_id: String,
    pub referrer_id: Option<String>,
}

/// Final state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Confirmed,
    Rejected,
}

/// Receipt returned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_id: String,
    pub status: TxStatus,
    /// Raw event log lines
    #[serde(default)]
    pub logs: Vec<String>,
}

impl TxReceipt {
    pub fn confirmed(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            status: TxStatus::Confirmed,
            logs: Vec::new(),
        }
    }

    pub fn rejected(transaction_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            status: TxStatus::Rejected,
            logs: vec![reason.into()],
        }
    }

    /// First log line, used as the failure reason for rejected receipts.
    pub fn reason(&self) -> String {
        self.logs
            .first()
            .cloned()
            .unwrap_or_else(|| "reverted".to_string())
    }
}
