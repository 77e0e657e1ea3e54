//! Ledger reconciliation - records confirmed claims in the store.
//!
//! The external ledger is authoritative. Once a transaction confirms, the
//! claim record and its counters must land in the store exactly once, no
//! matter how many times the write is retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use quest_core::referral::credit_for;
use quest_core::{ClaimRecord, Quest, ReferralCredit, RewardOutcome};

use crate::config::ReconciliationConfig;
use crate::error::ClaimError;
use crate::store::{ClaimStore, ClaimWrite, CounterDelta, StoreError, UpsertOutcome};

/// Exponential backoff between reconciliation attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: u32) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: multiplier.max(1),
        }
    }

    pub fn from_config(config: &ReconciliationConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
            config.multiplier,
        )
    }

    /// Delay after the `retry`-th failure (0-based), capped at the maximum.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&ReconciliationConfig::default())
    }
}

/// A confirmed claim ready to be recorded.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub quest: Quest,
    /// Canonical participant id
    pub participant_id: String,
    pub transaction_id: String,
    pub confirmed_at: DateTime<Utc>,
    /// Drawn once, before the first write
    pub reward: RewardOutcome,
    pub referrer_id: Option<String>,
}

impl Settlement {
    /// Referrer credit for this claim, if a referrer is attached.
    pub fn referral_credit(&self) -> Option<ReferralCredit> {
        self.referrer_id
            .as_ref()
            .map(|referrer| credit_for(&self.quest, referrer.clone(), self.reward.amount()))
    }
}

/// Writes confirmed claims to the store with idempotent upserts.
#[derive(Clone)]
pub struct LedgerReconciler {
    store: Arc<dyn ClaimStore>,
    backoff: Backoff,
}

impl LedgerReconciler {
    pub fn new(store: Arc<dyn ClaimStore>) -> Self {
        Self {
            store,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Build the record and counter delta for a settlement.
    ///
    /// Deterministic: building twice yields the same write, so retries are
    /// safe under the `(quest, participant, transaction)` key.
    pub fn build_write(&self, settlement: &Settlement) -> ClaimWrite {
        let payout = settlement.reward.payout();
        let credit = settlement.referral_credit();
        let referral_bonus = credit.as_ref().map(|c| c.bonus).unwrap_or(0);

        let record = ClaimRecord {
            quest_id: settlement.quest.quest_id.clone(),
            participant_id: settlement.participant_id.clone(),
            transaction_id: settlement.transaction_id.clone(),
            claimed_at: settlement.confirmed_at,
            xp_granted: payout.xp,
            reward: settlement.reward.clone(),
            referrer_id: settlement.referrer_id.clone(),
            referral_bonus,
        };

        let counters = CounterDelta {
            quest_id: settlement.quest.quest_id.clone(),
            max_claims: settlement.quest.max_claims,
            participant_id: settlement.participant_id.clone(),
            xp: payout.xp,
            item: payout.item.clone(),
            referrer_id: settlement.referrer_id.clone(),
            referral_bonus,
        };

        ClaimWrite { record, counters }
    }

    /// One upsert attempt.
    pub async fn reconcile_once(&self, write: &ClaimWrite) -> Result<UpsertOutcome, ClaimError> {
        let outcome = self
            .store
            .upsert_claim(write)
            .await
            .map_err(ledger_write_failed)?;

        match outcome {
            UpsertOutcome::Inserted => info!(
                quest_id = %write.record.quest_id,
                participant_id = %write.record.participant_id,
                transaction_id = %write.record.transaction_id,
                xp = write.counters.xp,
                "Claim reconciled"
            ),
            UpsertOutcome::AlreadyExisted => debug!(
                transaction_id = %write.record.transaction_id,
                "Claim already recorded"
            ),
        }
        Ok(outcome)
    }

    /// Retry the upsert with backoff.
    ///
    /// `max_attempts: None` retries until the write lands. Every failure is
    /// retried: the transaction has confirmed, so giving up would leave the
    /// store behind the ledger.
    pub async fn reconcile_with_retry(
        &self,
        write: &ClaimWrite,
        max_attempts: Option<u32>,
    ) -> Result<UpsertOutcome, ClaimError> {
        let mut attempt: u32 = 0;
        loop {
            let err = match self.reconcile_once(write).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => e,
            };
            attempt += 1;

            if max_attempts.is_some_and(|max| attempt >= max) {
                return Err(err);
            }

            let delay = self.backoff.delay(attempt - 1);
            if matches!(err, ClaimError::LedgerWriteFailed { retryable: false, .. }) {
                error!(
                    transaction_id = %write.record.transaction_id,
                    attempt,
                    error = %err,
                    "Non-retryable ledger write failure, retrying anyway"
                );
            } else {
                warn!(
                    transaction_id = %write.record.transaction_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Ledger write failed, backing off"
                );
            }
            tokio::time::sleep(delay).await;
        }
    }
}

fn ledger_write_failed(err: StoreError) -> ClaimError {
    ClaimError::LedgerWriteFailed {
        retryable: err.is_retryable(),
        reason: err.to_string(),
    }
}
