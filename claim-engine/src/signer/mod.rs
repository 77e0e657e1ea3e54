//! Transaction signer abstraction layer.
//!
//! The external ledger is reached only through [`TransactionSigner`]:
//! - Wallet/broadcaster implementations live with the host application
//! - [`MockSigner`] provides scripted receipts for testing

pub mod mock;
pub mod traits;

pub use mock::{MockSigner, ReceiptScript};
pub use traits::{SignerError, TransactionSigner, TxReceipt, TxRequest, TxStatus};
