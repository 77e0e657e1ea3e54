//! ClaimOrchestrator - drives a claim from request to recorded reward.
//!
//! ```text
//! INIT → VERIFYING_LOCATION → CHECKING_ELIGIBILITY → SUBMITTING_TX
//!      → AWAITING_CONFIRMATION ─┬→ RESOLVING_REWARD → RECONCILING_LEDGER → COMPLETE
//!                               └→ PENDING (recheck) ─┘
//! ```
//!
//! Everything before RECONCILING_LEDGER is validation and may end in
//! FAILED without side effects. Once a transaction confirms the claim is
//! final: the reward is drawn once and reconciliation is retried until the
//! store has the record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use quest_core::{
    canonical_participant, ClaimProof, EligibilityState, LocationVerifier, Quest, ReferralCapture,
    ReferralCredit, RewardOutcome, RewardResolver, StdRngSampler, UnitSampler,
};

use crate::attempt::{
    AttemptLease, AttemptLog, CapacityLedger, ClaimAttempt, ClaimStage, InFlightRegistry,
};
use crate::clock::{Clock, SystemClock};
use crate::config::ClaimConfig;
use crate::eligibility::EligibilityTracker;
use crate::error::ClaimError;
use crate::location::LocationSource;
use crate::reconciler::{Backoff, LedgerReconciler, Settlement};
use crate::referral::ReferralAttributor;
use crate::signer::{SignerError, TransactionSigner, TxRequest, TxStatus};
use crate::store::{ClaimStore, UpsertOutcome};

/// A participant asking to claim a quest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub quest_id: String,
    pub participant_id: String,
    /// Referral code or share payload sent with the claim
    pub referral_code: Option<String>,
    pub proof: ClaimProof,
}

impl ClaimRequest {
    pub fn new(quest_id: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            quest_id: quest_id.into(),
            participant_id: participant_id.into(),
            referral_code: None,
            proof: ClaimProof::none(),
        }
    }

    pub fn with_referral_code(mut self, code: impl Into<String>) -> Self {
        self.referral_code = Some(code.into());
        self
    }

    pub fn with_proof(mut self, proof: ClaimProof) -> Self {
        self.proof = proof;
        self
    }
}

/// What the participant got for a confirmed claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimReceipt {
    pub attempt_id: String,
    pub quest_id: String,
    pub participant_id: String,
    pub transaction_id: String,
    pub reward: RewardOutcome,
    pub xp_granted: u64,
    pub referral: Option<ReferralCredit>,
    /// The store already held this transaction's record
    pub already_recorded: bool,
}

/// Result of a claim or a recheck.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// Confirmed and recorded
    Completed(ClaimReceipt),
    /// Confirmed; the store write continues in the background
    Reconciling(ClaimReceipt),
    /// Submitted but not yet confirmed; recheck with the transaction id
    Pending {
        attempt_id: String,
        transaction_id: String,
    },
}

impl ClaimOutcome {
    pub fn receipt(&self) -> Option<&ClaimReceipt> {
        match self {
            Self::Completed(receipt) | Self::Reconciling(receipt) => Some(receipt),
            Self::Pending { .. } => None,
        }
    }

    pub fn transaction_id(&self) -> &str {
        match self {
            Self::Completed(receipt) | Self::Reconciling(receipt) => &receipt.transaction_id,
            Self::Pending { transaction_id, .. } => transaction_id,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

enum Confirmation {
    Confirmed,
    Rejected(String),
    Unconfirmed(String),
}

/// An attempt past submission, holding its locks.
struct InFlightClaim {
    attempt: ClaimAttempt,
    transaction_id: String,
    quest: Quest,
    referrer_id: Option<String>,
    lease: AttemptLease,
}

/// Drives claim attempts against injected collaborators.
///
/// Cheap to clone; clones share locks, pending claims and history.
#[derive(Clone)]
pub struct ClaimOrchestrator {
    config: Arc<ClaimConfig>,
    signer: Arc<dyn TransactionSigner>,
    store: Arc<dyn ClaimStore>,
    location: Arc<dyn LocationSource>,
    clock: Arc<dyn Clock>,
    verifier: LocationVerifier,
    tracker: EligibilityTracker,
    referrals: ReferralAttributor,
    resolver: RewardResolver,
    reconciler: LedgerReconciler,
    in_flight: Arc<InFlightRegistry>,
    capacity: Arc<CapacityLedger>,
    pending: Arc<DashMap<String, InFlightClaim>>,
    background: Arc<Mutex<Vec<JoinHandle<()>>>>,
    history: AttemptLog,
}

impl ClaimOrchestrator {
    /// Create an orchestrator; the reward RNG comes from `config.reward`.
    pub fn new(
        config: ClaimConfig,
        signer: Arc<dyn TransactionSigner>,
        store: Arc<dyn ClaimStore>,
        location: Arc<dyn LocationSource>,
    ) -> Self {
        let sampler: Arc<dyn UnitSampler> = match config.reward.rng_seed {
            Some(seed) => Arc::new(StdRngSampler::seeded(seed)),
            None => Arc::new(StdRngSampler::from_entropy()),
        };

        info!(
            engine_id = %config.engine_id,
            signer = %signer.id(),
            "Creating claim orchestrator"
        );

        Self {
            verifier: LocationVerifier::new(config.location.max_sample_age()),
            tracker: EligibilityTracker::new(store.clone()),
            referrals: ReferralAttributor::new(store.clone()),
            resolver: RewardResolver::new(sampler)
                .with_minimum_full_turns(config.reward.wheel_minimum_full_turns),
            reconciler: LedgerReconciler::new(store.clone())
                .with_backoff(Backoff::from_config(&config.reconciliation)),
            in_flight: Arc::new(InFlightRegistry::new()),
            capacity: Arc::new(CapacityLedger::new()),
            pending: Arc::new(DashMap::new()),
            background: Arc::new(Mutex::new(Vec::new())),
            history: AttemptLog::with_max_entries(config.history.capacity),
            clock: Arc::new(SystemClock),
            config: Arc::new(config),
            signer,
            store,
            location,
        }
    }

    /// Replace the reward sampler.
    pub fn with_sampler(mut self, sampler: Arc<dyn UnitSampler>) -> Self {
        self.resolver = RewardResolver::new(sampler)
            .with_minimum_full_turns(self.config.reward.wheel_minimum_full_turns);
        self
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn engine_id(&self) -> &str {
        &self.config.engine_id
    }

    /// Run a claim attempt.
    ///
    /// Returns `Pending` rather than an error when confirmation times out,
    /// and `Reconciling` when the store write has to continue in the
    /// background.
    pub async fn claim(&self, request: ClaimRequest) -> Result<ClaimOutcome, ClaimError> {
        let quest_id = request.quest_id.trim().to_string();
        let participant_id = canonical_participant(&request.participant_id);
        let mut attempt = ClaimAttempt::new(&quest_id, &participant_id, self.clock.now());

        let Some(guard) = self
            .in_flight
            .acquire(&quest_id, &participant_id, &attempt.attempt_id)
        else {
            warn!(
                quest_id = %quest_id,
                participant_id = %participant_id,
                holder = ?self.in_flight.holder(&quest_id, &participant_id),
                "Claim attempt already in flight"
            );
            return Err(ClaimError::AttemptInFlight);
        };
        let mut lease = AttemptLease::new(guard);

        debug!(
            attempt_id = %attempt.attempt_id,
            quest_id = %quest_id,
            participant_id = %participant_id,
            "Starting claim attempt"
        );

        let (quest, referrer_id) = match self.prepare(&mut attempt, &mut lease, &request).await {
            Ok(prepared) => prepared,
            Err(e) => return Err(self.fail(attempt, e).await),
        };

        attempt.advance(ClaimStage::SubmittingTx);
        let transaction_id = match self.submit(&attempt, referrer_id.clone()).await {
            Ok(tx) => tx,
            Err(e) => return Err(self.fail(attempt, e).await),
        };
        attempt.transaction_id = Some(transaction_id.clone());
        info!(
            attempt_id = %attempt.attempt_id,
            transaction_id = %transaction_id,
            "Claim transaction submitted"
        );

        self.confirm(InFlightClaim {
            attempt,
            transaction_id,
            quest,
            referrer_id,
            lease,
        })
        .await
    }

    /// Re-await a pending claim's transaction. Never resubmits.
    pub async fn recheck(&self, transaction_id: &str) -> Result<ClaimOutcome, ClaimError> {
        let Some((_, parked)) = self.pending.remove(transaction_id) else {
            return Err(ClaimError::UnknownTransaction(transaction_id.to_string()));
        };
        debug!(transaction_id = %transaction_id, "Rechecking pending claim");
        self.confirm(parked).await
    }

    /// Recheck every pending claim.
    pub async fn recheck_all(&self) -> Vec<(String, Result<ClaimOutcome, ClaimError>)> {
        let transaction_ids: Vec<String> =
            self.pending.iter().map(|entry| entry.key().clone()).collect();

        let checks = transaction_ids.into_iter().map(|tx| async move {
            let result = self.recheck(&tx).await;
            (tx, result)
        });
        join_all(checks).await
    }

    /// Recheck pending claims every `confirmation.recheck_interval`.
    pub fn spawn_recheck_loop(&self) -> JoinHandle<()> {
        let orchestrator = self.clone();
        let interval = self.config.confirmation.recheck_interval();

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if orchestrator.pending.is_empty() {
                    continue;
                }
                let results = orchestrator.recheck_all().await;
                let settled = results
                    .iter()
                    .filter(|(_, r)| !matches!(r, Ok(ClaimOutcome::Pending { .. })))
                    .count();
                debug!(checked = results.len(), settled, "Rechecked pending claims");
            }
        })
    }

    /// Wait for every background reconciliation started so far.
    ///
    /// Returns the number of tasks awaited.
    pub async fn drain_reconciliations(&self) -> usize {
        let handles = std::mem::take(&mut *self.background.lock().await);
        let count = handles.len();
        for result in join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Background reconciliation task failed");
            }
        }
        count
    }

    /// Capture the referral carried by a share link the participant opened.
    pub async fn record_quest_view(
        &self,
        participant_id: &str,
        payload: &str,
        viewed_quest: Option<&str>,
    ) -> Result<Option<ReferralCapture>, ClaimError> {
        self.referrals
            .record_quest_view(participant_id, payload, viewed_quest, self.clock.now())
            .await
    }

    /// Read-only eligibility check, for showing claim buttons.
    pub async fn eligibility(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<EligibilityState, ClaimError> {
        let quest = self.load_quest(quest_id).await?;
        self.tracker
            .check(&quest, participant_id, self.clock.now())
            .await
    }

    /// Transaction ids of parked claims.
    pub fn pending_transactions(&self) -> Vec<String> {
        self.pending.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of (quest, participant) pairs with an unfinished attempt.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Finished attempts, newest first.
    pub async fn recent_attempts(&self, limit: usize) -> Vec<ClaimAttempt> {
        self.history.recent(limit).await
    }

    /// A finished attempt by id.
    pub async fn attempt(&self, attempt_id: &str) -> Option<ClaimAttempt> {
        self.history.get(attempt_id).await
    }

    // --- stages ---

    /// VERIFYING_LOCATION and CHECKING_ELIGIBILITY.
    async fn prepare(
        &self,
        attempt: &mut ClaimAttempt,
        lease: &mut AttemptLease,
        request: &ClaimRequest,
    ) -> Result<(Quest, Option<String>), ClaimError> {
        attempt.advance(ClaimStage::VerifyingLocation);
        let quest = self.load_quest(&attempt.quest_id).await?;
        self.verify_presence(&quest, &request.proof)?;

        attempt.advance(ClaimStage::CheckingEligibility);
        let quest = self
            .check_eligibility(&attempt.quest_id, &attempt.participant_id, lease)
            .await?;
        let referrer_id = self
            .referrals
            .resolve(&quest, &attempt.participant_id, request.referral_code.as_deref())
            .await;

        Ok((quest, referrer_id))
    }

    async fn load_quest(&self, quest_id: &str) -> Result<Quest, ClaimError> {
        self.store
            .get_quest(quest_id)
            .await?
            .ok_or_else(|| ClaimError::QuestNotFound(quest_id.to_string()))
    }

    fn verify_presence(&self, quest: &Quest, proof: &ClaimProof) -> Result<(), ClaimError> {
        let sample = self.location.latest();
        self.verifier
            .verify(quest.geofence.as_ref(), sample.as_ref(), self.clock.now())?;
        proof.verify(quest)?;
        Ok(())
    }

    /// Evaluate against fresh quest state, then reserve a capacity slot.
    ///
    /// Slots held by other unfinished attempts count as claims. The slot is
    /// only taken if no slot was taken or returned since the snapshot that
    /// preceded the quest read, so concurrent attempts cannot push
    /// `claims_made` past `max_claims`. A slot is returned only after its
    /// claim is in the store or the attempt has failed.
    /// When only held slots fill the quest, waits up to the confirmation
    /// timeout for one of them to be returned before refusing.
    async fn check_eligibility(
        &self,
        quest_id: &str,
        participant_id: &str,
        lease: &mut AttemptLease,
    ) -> Result<Quest, ClaimError> {
        let deadline = tokio::time::Instant::now() + self.config.confirmation.timeout();
        loop {
            let released = self.capacity.released();
            let seen = self.capacity.snapshot(quest_id);
            let quest = self.load_quest(quest_id).await?;
            quest.validate()?;

            let mut view = quest.clone();
            view.claims_made = quest.claims_made.saturating_add(seen.held);
            match self
                .tracker
                .check(&view, participant_id, self.clock.now())
                .await
            {
                Err(ClaimError::QuestAtCapacity) if seen.held > 0 && !quest.is_at_capacity() => {
                    debug!(
                        quest_id = %quest_id,
                        reserved = seen.held,
                        "Capacity held by unfinished attempts, waiting"
                    );
                    if tokio::time::timeout_at(deadline, released).await.is_err() {
                        return Err(ClaimError::QuestAtCapacity);
                    }
                    continue;
                }
                result => {
                    result?;
                }
            }

            match self.capacity.try_reserve(quest_id, seen) {
                Some(reservation) => {
                    lease.hold_capacity(reservation);
                    return Ok(quest);
                }
                None => debug!(quest_id = %quest_id, "Capacity moved during check, re-evaluating"),
            }
        }
    }

    async fn submit(
        &self,
        attempt: &ClaimAttempt,
        referrer_id: Option<String>,
    ) -> Result<String, ClaimError> {
        let request = TxRequest {
            attempt_id: attempt.attempt_id.clone(),
            quest_id: attempt.quest_id.clone(),
            participant_id: attempt.participant_id.clone(),
            referrer_id,
        };

        self.signer.submit(request).await.map_err(|e| match e {
            SignerError::UserRejected => ClaimError::SignerRejected,
            other => ClaimError::TransactionFailed(other.to_string()),
        })
    }

    /// AWAITING_CONFIRMATION, then settle, fail or park.
    async fn confirm(&self, claim: InFlightClaim) -> Result<ClaimOutcome, ClaimError> {
        let InFlightClaim {
            mut attempt,
            transaction_id,
            quest,
            referrer_id,
            lease,
        } = claim;
        attempt.advance(ClaimStage::AwaitingConfirmation);

        match self.await_confirmation(&transaction_id).await {
            Confirmation::Confirmed => {
                self.settle(attempt, transaction_id, quest, referrer_id, lease)
                    .await
            }
            Confirmation::Rejected(reason) => {
                Err(self.fail(attempt, ClaimError::TransactionFailed(reason)).await)
            }
            Confirmation::Unconfirmed(reason) => {
                attempt.advance(ClaimStage::Pending);
                info!(
                    attempt_id = %attempt.attempt_id,
                    transaction_id = %transaction_id,
                    reason = %reason,
                    "Claim pending confirmation"
                );
                let outcome = ClaimOutcome::Pending {
                    attempt_id: attempt.attempt_id.clone(),
                    transaction_id: transaction_id.clone(),
                };
                self.pending.insert(
                    transaction_id.clone(),
                    InFlightClaim {
                        attempt,
                        transaction_id,
                        quest,
                        referrer_id,
                        lease,
                    },
                );
                Ok(outcome)
            }
        }
    }

    async fn await_confirmation(&self, transaction_id: &str) -> Confirmation {
        let timeout = self.config.confirmation.timeout();
        let waited = tokio::time::timeout(
            timeout,
            self.signer.wait_for_receipt(transaction_id, timeout),
        )
        .await;

        match waited {
            Err(_) => Confirmation::Unconfirmed(ClaimError::TransactionPendingTimeout.to_string()),
            Ok(Err(SignerError::Timeout)) => {
                Confirmation::Unconfirmed(ClaimError::TransactionPendingTimeout.to_string())
            }
            Ok(Err(SignerError::Network(msg))) => Confirmation::Unconfirmed(msg),
            Ok(Err(e)) => Confirmation::Rejected(e.to_string()),
            Ok(Ok(receipt)) => match receipt.status {
                TxStatus::Confirmed => Confirmation::Confirmed,
                TxStatus::Rejected => Confirmation::Rejected(receipt.reason()),
            },
        }
    }

    /// RESOLVING_REWARD and RECONCILING_LEDGER.
    async fn settle(
        &self,
        mut attempt: ClaimAttempt,
        transaction_id: String,
        quest: Quest,
        referrer_id: Option<String>,
        lease: AttemptLease,
    ) -> Result<ClaimOutcome, ClaimError> {
        attempt.advance(ClaimStage::ResolvingReward);
        let reward = match self.resolver.resolve(&quest.reward) {
            Ok(reward) => reward,
            Err(e) => return Err(self.fail(attempt, e.into()).await),
        };
        attempt.reward = Some(reward.clone());

        attempt.advance(ClaimStage::ReconcilingLedger);
        let settlement = Settlement {
            quest,
            participant_id: attempt.participant_id.clone(),
            transaction_id,
            confirmed_at: whole_seconds(self.clock.now()),
            reward,
            referrer_id,
        };
        let write = self.reconciler.build_write(&settlement);
        let mut receipt = ClaimReceipt {
            attempt_id: attempt.attempt_id.clone(),
            quest_id: write.record.quest_id.clone(),
            participant_id: write.record.participant_id.clone(),
            transaction_id: write.record.transaction_id.clone(),
            reward: write.record.reward.clone(),
            xp_granted: write.record.xp_granted,
            referral: settlement.referral_credit(),
            already_recorded: false,
        };

        let inline_attempts = self.config.reconciliation.inline_attempts.max(1);
        match self
            .reconciler
            .reconcile_with_retry(&write, Some(inline_attempts))
            .await
        {
            Ok(outcome) => {
                receipt.already_recorded = outcome == UpsertOutcome::AlreadyExisted;
                attempt.complete(self.clock.now());
                info!(
                    attempt_id = %attempt.attempt_id,
                    transaction_id = %receipt.transaction_id,
                    xp = receipt.xp_granted,
                    "Claim complete"
                );
                self.history.record(attempt).await;
                drop(lease);
                Ok(ClaimOutcome::Completed(receipt))
            }
            Err(e) => {
                warn!(
                    attempt_id = %attempt.attempt_id,
                    transaction_id = %receipt.transaction_id,
                    error = %e,
                    "Deferring reconciliation to background"
                );
                let reconciler = self.reconciler.clone();
                let history = self.history.clone();
                let clock = self.clock.clone();
                let handle = tokio::spawn(async move {
                    let _lease = lease;
                    match reconciler.reconcile_with_retry(&write, None).await {
                        Ok(_) => attempt.complete(clock.now()),
                        Err(e) => {
                            error!(
                                transaction_id = %write.record.transaction_id,
                                error = %e,
                                "Background reconciliation stopped"
                            );
                            attempt.error = Some(e);
                            attempt.finished_at = Some(clock.now());
                        }
                    }
                    history.record(attempt).await;
                });
                self.background.lock().await.push(handle);
                Ok(ClaimOutcome::Reconciling(receipt))
            }
        }
    }

    /// Move the attempt to FAILED, record it and hand back the error.
    async fn fail(&self, mut attempt: ClaimAttempt, err: ClaimError) -> ClaimError {
        warn!(
            attempt_id = %attempt.attempt_id,
            quest_id = %attempt.quest_id,
            participant_id = %attempt.participant_id,
            stage = ?attempt.stage(),
            error = %err,
            "Claim failed"
        );
        attempt.fail(err.clone(), self.clock.now());
        self.history.record(attempt).await;
        err
    }
}

/// Store timestamps carry whole seconds.
fn whole_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::location::LocationFeed;
    use crate::signer::{MockSigner, ReceiptScript};
    use crate::store::MemoryClaimStore;
    use chrono::TimeZone;
    use quest_core::{Payout, RewardDescriptor, SequenceSampler};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    async fn orchestrator(signer: MockSigner) -> (ClaimOrchestrator, Arc<MemoryClaimStore>) {
        let store = Arc::new(MemoryClaimStore::new());
        let quest = Quest::new(
            "q-1",
            RewardDescriptor::Fixed {
                payout: Payout::new("Badge", 50, 10),
            },
            10,
        );
        store.put_quest(&quest).await.unwrap();

        let orchestrator = ClaimOrchestrator::new(
            ClaimConfig::new("test"),
            Arc::new(signer),
            store.clone(),
            Arc::new(LocationFeed::new()),
        )
        .with_clock(Arc::new(ManualClock::new(now())))
        .with_sampler(Arc::new(SequenceSampler::new([0.5])));
        (orchestrator, store)
    }

    #[tokio::test]
    async fn test_happy_path_stage_trail() {
        let (orchestrator, store) = orchestrator(MockSigner::default()).await;

        let outcome = orchestrator
            .claim(ClaimRequest::new("q-1", "0xABC"))
            .await
            .unwrap();
        let receipt = outcome.receipt().unwrap();
        assert_eq!(receipt.participant_id, "0xabc");
        assert_eq!(receipt.xp_granted, 50);
        assert!(matches!(outcome, ClaimOutcome::Completed(_)));

        let attempt = &orchestrator.recent_attempts(1).await[0];
        assert_eq!(
            attempt.stages,
            vec![
                ClaimStage::Init,
                ClaimStage::VerifyingLocation,
                ClaimStage::CheckingEligibility,
                ClaimStage::SubmittingTx,
                ClaimStage::AwaitingConfirmation,
                ClaimStage::ResolvingReward,
                ClaimStage::ReconcilingLedger,
                ClaimStage::Complete,
            ]
        );
        assert_eq!(store.claim_count().await, 1);
        assert_eq!(orchestrator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_quest_fails_before_submission() {
        let signer = Arc::new(MockSigner::default());
        let store = Arc::new(MemoryClaimStore::new());
        let orchestrator = ClaimOrchestrator::new(
            ClaimConfig::default(),
            signer.clone(),
            store,
            Arc::new(LocationFeed::new()),
        );

        let err = orchestrator
            .claim(ClaimRequest::new("missing", "0xabc"))
            .await
            .unwrap_err();
        assert_eq!(err, ClaimError::QuestNotFound("missing".into()));
        assert_eq!(signer.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_receipt_fails() {
        let signer = MockSigner::default().with_receipts([ReceiptScript::Reject("reverted".into())]);
        let (orchestrator, store) = orchestrator(signer).await;

        let err = orchestrator
            .claim(ClaimRequest::new("q-1", "0xabc"))
            .await
            .unwrap_err();
        assert_eq!(err, ClaimError::TransactionFailed("reverted".into()));
        assert_eq!(store.claim_count().await, 0);

        let attempt = &orchestrator.recent_attempts(1).await[0];
        assert_eq!(attempt.stage(), ClaimStage::Failed);
        assert!(attempt.reward.is_none());
    }

    #[tokio::test]
    async fn test_recheck_unknown_transaction() {
        let (orchestrator, _) = orchestrator(MockSigner::default()).await;
        assert_eq!(
            orchestrator.recheck("0xnope").await.unwrap_err(),
            ClaimError::UnknownTransaction("0xnope".into())
        );
    }

    #[test]
    fn test_whole_seconds() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(whole_seconds(at), now());
    }
}
