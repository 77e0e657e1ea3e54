//! Claim Engine - quest claim orchestration
//!
//! Drives a quest claim from request to recorded reward:
//! - Location and proof checks against the latest device sample
//! - Eligibility from claim history, expiry and capacity
//! - Transaction submission through an injected [`TransactionSigner`]
//! - A single reward draw per accepted attempt
//! - Idempotent, retried reconciliation into a [`ClaimStore`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           ClaimOrchestrator             │
//! │   (claim state machine, pending map)    │
//! └───┬───────────┬───────────┬─────────┬───┘
//!     │           │           │         │
//!     ▼           ▼           ▼         ▼
//! ┌────────┐ ┌─────────┐ ┌──────────┐ ┌────────────┐
//! │Location│ │Transact-│ │Eligibil- │ │  Ledger    │
//! │Source  │ │ionSigner│ │ityTracker│ │ Reconciler │
//! └────────┘ └─────────┘ └────┬─────┘ └─────┬──────┘
//!                             └──────┬──────┘
//!                                    ▼
//!                              ┌───────────┐
//!                              │ ClaimStore│
//!                              │(memory/db)│
//!                              └───────────┘
//! ```
//!
//! Pure domain rules (geofence math, reward tables, eligibility states)
//! come from `quest-core`.

pub mod attempt;
pub mod clock;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod location;
pub mod orchestrator;
pub mod reconciler;
pub mod referral;
pub mod signer;
pub mod store;

// Re-export main types for convenience
pub use attempt::{AttemptLog, ClaimAttempt, ClaimStage};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClaimConfig;
pub use eligibility::EligibilityTracker;
pub use error::ClaimError;
pub use location::{LocationFeed, LocationSource};
pub use orchestrator::{ClaimOrchestrator, ClaimOutcome, ClaimReceipt, ClaimRequest};
pub use reconciler::{Backoff, LedgerReconciler, Settlement};
pub use referral::ReferralAttributor;
pub use signer::{MockSigner, ReceiptScript, SignerError, TransactionSigner, TxReceipt, TxRequest, TxStatus};
pub use store::{
    ClaimStore, ClaimWrite, CounterDelta, MemoryClaimStore, SqliteClaimStore, StoreError,
    UpsertOutcome,
};
