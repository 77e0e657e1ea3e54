//! Mock signer for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::traits::*;

/// Scripted response to a `wait_for_receipt` call.
#[derive(Debug, Clone)]
pub enum ReceiptScript {
    Confirm,
    Reject(String),
    Timeout,
    NetworkError(String),
    /// Sleep, then confirm (exercises the orchestrator's own timeout)
    Hang(Duration),
}

/// Mock signer for testing.
///
/// Submissions succeed with sequential transaction ids unless a submit
/// error is scripted; receipts follow the receipt script and fall back to
/// `Confirm` once it is exhausted.
pub struct MockSigner {
    signer_id: String,
    submit_error: Mutex<Option<SignerError>>,
    receipts: Mutex<VecDeque<ReceiptScript>>,
    submitted: Mutex<Vec<TxRequest>>,
    submit_count: AtomicU32,
    receipt_count: AtomicU32,
}

impl MockSigner {
    /// Create a new mock signer.
    pub fn new(signer_id: impl Into<String>) -> Self {
        Self {
            signer_id: signer_id.into(),
            submit_error: Mutex::new(None),
            receipts: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            submit_count: AtomicU32::new(0),
            receipt_count: AtomicU32::new(0),
        }
    }

    /// Fail every submission with `error`.
    pub fn with_submit_error(self, error: SignerError) -> Self {
        *self.submit_error.lock().unwrap_or_else(|p| p.into_inner()) = Some(error);
        self
    }

    /// Queue receipt responses.
    pub fn with_receipts(self, script: impl IntoIterator<Item = ReceiptScript>) -> Self {
        self.push_receipts(script);
        self
    }

    /// Queue more receipt responses after construction.
    pub fn push_receipts(&self, script: impl IntoIterator<Item = ReceiptScript>) {
        self.receipts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend(script);
    }

    /// Number of successful or failed submit calls.
    pub fn submit_count(&self) -> u32 {
        self.submit_count.load(Ordering::SeqCst)
    }

    /// Number of wait_for_receipt calls.
    pub fn receipt_count(&self) -> u32 {
        self.receipt_count.load(Ordering::SeqCst)
    }

    /// Requests that were accepted for broadcast.
    pub fn submitted(&self) -> Vec<TxRequest> {
        self.submitted.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new("mock-signer")
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    fn id(&self) -> &str {
        &self.signer_id
    }

    async fn submit(&self, request: TxRequest) -> Result<String, SignerError> {
        let n = self.submit_count.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(err) = self.submit_error.lock().unwrap_or_else(|p| p.into_inner()).clone() {
            return Err(err);
        }

        self.submitted
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request);
        Ok(format!("0xtx{n:04}"))
    }

    async fn wait_for_receipt(
        &self,
        transaction_id: &str,
        timeout: Duration,
    ) -> Result<TxReceipt, SignerError> {
        self.receipt_count.fetch_add(1, Ordering::SeqCst);

        let next = self
            .receipts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .unwrap_or(ReceiptScript::Confirm);

        match next {
            ReceiptScript::Confirm => Ok(TxReceipt::confirmed(transaction_id)),
            ReceiptScript::Reject(reason) => Ok(TxReceipt::rejected(transaction_id, reason)),
            ReceiptScript::Timeout => Err(SignerError::Timeout),
            ReceiptScript::NetworkError(msg) => Err(SignerError::Network(msg)),
            ReceiptScript::Hang(delay) => {
                tokio::time::sleep(delay.min(timeout * 10)).await;
                Ok(TxReceipt::confirmed(transaction_id))
            }
        }
    }
}
