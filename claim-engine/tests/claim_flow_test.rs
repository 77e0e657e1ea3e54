//! End-to-end claim flow tests
//!
//! Drives the orchestrator against the scripted signer, the in-memory store
//! and a manual clock:
//! - Location and proof checks
//! - One-time and recurring eligibility
//! - Signer rejection, confirmation timeouts and rechecks
//! - Store outages after confirmation
//! - Single reward draws, referral credit and capacity under concurrency

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use claim_engine::{
    ClaimConfig, ClaimError, ClaimOrchestrator, ClaimOutcome, ClaimRequest, ClaimStage,
    ClaimStore, ClaimWrite, LocationFeed, ManualClock, MemoryClaimStore, MockSigner,
    ReceiptScript, SignerError, StoreError, UpsertOutcome,
};
use quest_core::{
    hash_verification_code, haversine_distance_m, ClaimMode, ClaimProof, ClaimRecord,
    EligibilityState, GeoFence, InventoryItem, LocationSample, ParticipantStats, Payout, Quest,
    ReferralCapture, RewardDescriptor, RewardOutcome, RewardTier, SequenceSampler,
};

const CENTER: (f64, f64) = (40.7128, -74.0060);

fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn config() -> ClaimConfig {
    let mut config = ClaimConfig::new("flow-test");
    config.confirmation.timeout_ms = 50;
    config.reconciliation.initial_backoff_ms = 1;
    config.reconciliation.max_backoff_ms = 5;
    config.reconciliation.inline_attempts = 2;
    config
}

fn fixed(quest_id: &str, xp: u64, amount: u64, max_claims: u32) -> Quest {
    Quest::new(
        quest_id,
        RewardDescriptor::Fixed {
            payout: Payout::new("Badge", xp, amount),
        },
        max_claims,
    )
}

struct Harness {
    orchestrator: ClaimOrchestrator,
    store: Arc<MemoryClaimStore>,
    signer: Arc<MockSigner>,
    feed: Arc<LocationFeed>,
    clock: Arc<ManualClock>,
    sampler: Arc<SequenceSampler>,
}

async fn harness(signer: MockSigner, quests: Vec<Quest>, rolls: Vec<f64>) -> Harness {
    let store = Arc::new(MemoryClaimStore::new());
    for quest in &quests {
        store.put_quest(quest).await.unwrap();
    }
    let signer = Arc::new(signer);
    let feed = Arc::new(LocationFeed::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let sampler = Arc::new(SequenceSampler::new(rolls));

    let orchestrator = ClaimOrchestrator::new(config(), signer.clone(), store.clone(), feed.clone())
        .with_clock(clock.clone())
        .with_sampler(sampler.clone());

    Harness {
        orchestrator,
        store,
        signer,
        feed,
        clock,
        sampler,
    }
}

// =============================================================================
// Location
// =============================================================================

#[tokio::test]
async fn test_spoofed_sample_rejected_inside_fence() {
    let quest = fixed("pier", 10, 0, 5).with_geofence(GeoFence::new(CENTER.0, CENTER.1, 100.0));
    let h = harness(MockSigner::default(), vec![quest], vec![]).await;
    h.feed
        .publish(LocationSample::new(CENTER.0, CENTER.1, t0()).mocked());

    let err = h
        .orchestrator
        .claim(ClaimRequest::new("pier", "0xabc"))
        .await
        .unwrap_err();
    assert_eq!(err, ClaimError::LocationSpoofed);
    assert!(!err.is_out_of_range());
    assert_eq!(h.signer.submit_count(), 0);
}

#[tokio::test]
async fn test_boundary_distance_passes_and_beyond_fails() {
    let sample = (CENTER.0 + 0.0009, CENTER.1);
    let distance = haversine_distance_m(sample.0, sample.1, CENTER.0, CENTER.1);

    let edge = fixed("edge", 10, 0, 5).with_geofence(GeoFence::new(CENTER.0, CENTER.1, distance));
    let short = fixed("short", 10, 0, 5)
        .with_geofence(GeoFence::new(CENTER.0, CENTER.1, distance - 1.0));
    let h = harness(MockSigner::default(), vec![edge, short], vec![]).await;
    h.feed.publish(LocationSample::new(sample.0, sample.1, t0()));

    let outcome = h
        .orchestrator
        .claim(ClaimRequest::new("edge", "0xabc"))
        .await
        .unwrap();
    assert!(matches!(outcome, ClaimOutcome::Completed(_)));

    let err = h
        .orchestrator
        .claim(ClaimRequest::new("short", "0xabc"))
        .await
        .unwrap_err();
    match err {
        ClaimError::OutOfRange {
            distance_m,
            radius_m,
        } => {
            assert_eq!(distance_m, distance);
            assert_eq!(radius_m, distance - 1.0);
        }
        other => panic!("expected OutOfRange, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_or_stale_location_is_unavailable() {
    let quest = fixed("pier", 10, 0, 5).with_geofence(GeoFence::new(CENTER.0, CENTER.1, 100.0));
    let h = harness(MockSigner::default(), vec![quest], vec![]).await;

    let err = h
        .orchestrator
        .claim(ClaimRequest::new("pier", "0xabc"))
        .await
        .unwrap_err();
    assert_eq!(err, ClaimError::LocationUnavailable);

    h.feed.publish(LocationSample::new(CENTER.0, CENTER.1, t0()));
    h.clock.advance(chrono::Duration::seconds(31));
    let err = h
        .orchestrator
        .claim(ClaimRequest::new("pier", "0xabc"))
        .await
        .unwrap_err();
    assert_eq!(err, ClaimError::LocationUnavailable);
}

// =============================================================================
// Proofs
// =============================================================================

#[tokio::test]
async fn test_scan_and_verification_proofs() {
    let scan = fixed("mural", 10, 0, 5).with_mode(ClaimMode::Scan);
    let code = fixed("booth", 10, 0, 5)
        .with_mode(ClaimMode::Verification)
        .with_verification_hash(hash_verification_code("LIGHTHOUSE-7"));
    let h = harness(MockSigner::default(), vec![scan, code], vec![]).await;

    let missing = h
        .orchestrator
        .claim(ClaimRequest::new("mural", "0xabc"))
        .await
        .unwrap_err();
    assert_eq!(missing, ClaimError::ProofMissing);

    let wrong = h
        .orchestrator
        .claim(ClaimRequest::new("mural", "0xabc").with_proof(ClaimProof::scanned("booth")))
        .await
        .unwrap_err();
    assert_eq!(wrong, ClaimError::ProofMismatch);

    h.orchestrator
        .claim(ClaimRequest::new("mural", "0xabc").with_proof(ClaimProof::scanned("mural")))
        .await
        .unwrap();

    let bad_code = h
        .orchestrator
        .claim(ClaimRequest::new("booth", "0xabc").with_proof(ClaimProof::code("LIGHTHOUSE-8")))
        .await
        .unwrap_err();
    assert_eq!(bad_code, ClaimError::ProofMismatch);

    h.orchestrator
        .claim(ClaimRequest::new("booth", "0xabc").with_proof(ClaimProof::code(" LIGHTHOUSE-7 ")))
        .await
        .unwrap();
    assert_eq!(h.signer.submit_count(), 2);
}

// =============================================================================
// Eligibility
// =============================================================================

#[tokio::test]
async fn test_second_claim_of_one_time_quest_is_terminal() {
    let h = harness(MockSigner::default(), vec![fixed("once", 10, 0, 5)], vec![]).await;

    h.orchestrator
        .claim(ClaimRequest::new("once", "0xabc"))
        .await
        .unwrap();
    let err = h
        .orchestrator
        .claim(ClaimRequest::new("once", "0xABC"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ClaimError::NotEligible {
            reason: EligibilityState::TerminalClaimed,
            retry_after_secs: None,
        }
    );
    assert_eq!(h.signer.submit_count(), 1);
}

#[tokio::test]
async fn test_recurring_quest_locks_for_interval() {
    let daily = fixed("daily", 10, 0, 100).recurring_every(86_400);
    let h = harness(MockSigner::default(), vec![daily], vec![]).await;

    h.orchestrator
        .claim(ClaimRequest::new("daily", "0xabc"))
        .await
        .unwrap();

    h.clock.advance(chrono::Duration::seconds(86_399));
    let err = h
        .orchestrator
        .claim(ClaimRequest::new("daily", "0xabc"))
        .await
        .unwrap_err();
    assert_eq!(err.retry_after_secs(), Some(1));

    h.clock.advance(chrono::Duration::seconds(1));
    assert_eq!(
        h.orchestrator.eligibility("daily", "0xabc").await.unwrap(),
        EligibilityState::EligibleAgain
    );
    h.orchestrator
        .claim(ClaimRequest::new("daily", "0xabc"))
        .await
        .unwrap();

    let records = h.store.claims_for("daily", "0xabc").await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_expired_and_invalid_quests_fail_before_submission() {
    let expired = fixed("gone", 10, 0, 5).expiring_at(t0() - chrono::Duration::seconds(1));
    let broken = Quest::new(
        "broken",
        RewardDescriptor::Chance { tiers: vec![] },
        5,
    );
    let h = harness(MockSigner::default(), vec![expired, broken], vec![]).await;

    let err = h
        .orchestrator
        .claim(ClaimRequest::new("gone", "0xabc"))
        .await
        .unwrap_err();
    assert_eq!(err, ClaimError::QuestExpired);

    let err = h
        .orchestrator
        .claim(ClaimRequest::new("broken", "0xabc"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::InvalidQuest(_)));
    assert_eq!(h.signer.submit_count(), 0);
}

// =============================================================================
// Signer Outcomes
// =============================================================================

#[tokio::test]
async fn test_signer_rejection_has_no_side_effects() {
    let signer = MockSigner::default().with_submit_error(SignerError::UserRejected);
    let h = harness(signer, vec![fixed("once", 10, 0, 5)], vec![0.5]).await;

    let err = h
        .orchestrator
        .claim(ClaimRequest::new("once", "0xabc"))
        .await
        .unwrap_err();
    assert_eq!(err, ClaimError::SignerRejected);

    assert_eq!(h.store.claim_count().await, 0);
    assert!(h.store.participant_stats("0xabc").await.unwrap().is_none());
    assert_eq!(h.store.get_quest("once").await.unwrap().unwrap().claims_made, 0);
    assert_eq!(h.sampler.calls(), 0);
    assert_eq!(h.orchestrator.in_flight_count(), 0);

    let attempt = &h.orchestrator.recent_attempts(1).await[0];
    assert_eq!(attempt.stage(), ClaimStage::Failed);
    assert_eq!(attempt.error, Some(ClaimError::SignerRejected));
}

#[tokio::test]
async fn test_timeout_goes_pending_and_recheck_never_resubmits() {
    let signer = MockSigner::default().with_receipts([ReceiptScript::Timeout]);
    let h = harness(signer, vec![fixed("once", 10, 0, 5)], vec![]).await;

    let outcome = h
        .orchestrator
        .claim(ClaimRequest::new("once", "0xabc"))
        .await
        .unwrap();
    assert!(outcome.is_pending());
    let tx = outcome.transaction_id().to_string();
    assert_eq!(h.orchestrator.pending_transactions(), vec![tx.clone()]);
    assert_eq!(h.store.claim_count().await, 0);

    // The pair stays locked while pending
    let err = h
        .orchestrator
        .claim(ClaimRequest::new("once", "0xabc"))
        .await
        .unwrap_err();
    assert_eq!(err, ClaimError::AttemptInFlight);

    let outcome = h.orchestrator.recheck(&tx).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::Completed(_)));
    assert_eq!(outcome.transaction_id(), tx);

    assert_eq!(h.signer.submit_count(), 1);
    assert_eq!(h.signer.receipt_count(), 2);
    assert_eq!(h.store.claim_count().await, 1);
    assert_eq!(h.orchestrator.in_flight_count(), 0);
    assert!(h.orchestrator.pending_transactions().is_empty());
}

#[tokio::test]
async fn test_hanging_receipt_is_cut_by_confirmation_timeout() {
    let signer = MockSigner::default().with_receipts([
        ReceiptScript::Hang(Duration::from_secs(5)),
        ReceiptScript::NetworkError("node unreachable".into()),
        ReceiptScript::Reject("nonce too low".into()),
    ]);
    let h = harness(signer, vec![fixed("once", 10, 0, 5)], vec![]).await;

    let outcome = h
        .orchestrator
        .claim(ClaimRequest::new("once", "0xabc"))
        .await
        .unwrap();
    let tx = outcome.transaction_id().to_string();
    assert!(outcome.is_pending());

    // Transport error while rechecking keeps the claim parked
    let results = h.orchestrator.recheck_all().await;
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0].1, Ok(ClaimOutcome::Pending { .. })));

    let err = h.orchestrator.recheck(&tx).await.unwrap_err();
    assert_eq!(err, ClaimError::TransactionFailed("nonce too low".into()));
    assert_eq!(h.orchestrator.in_flight_count(), 0);
    assert_eq!(h.store.claim_count().await, 0);

    let attempt = &h.orchestrator.recent_attempts(1).await[0];
    assert_eq!(
        attempt.stages,
        vec![
            ClaimStage::Init,
            ClaimStage::VerifyingLocation,
            ClaimStage::CheckingEligibility,
            ClaimStage::SubmittingTx,
            ClaimStage::AwaitingConfirmation,
            ClaimStage::Pending,
            ClaimStage::AwaitingConfirmation,
            ClaimStage::Pending,
            ClaimStage::AwaitingConfirmation,
            ClaimStage::Failed,
        ]
    );
}

#[tokio::test]
async fn test_recheck_loop_settles_pending_claims() {
    let signer = MockSigner::default().with_receipts([ReceiptScript::Timeout]);
    let h = harness(signer, vec![fixed("once", 10, 0, 5)], vec![]).await;

    let mut config = config();
    config.confirmation.recheck_interval_ms = 10;
    let orchestrator = ClaimOrchestrator::new(config, h.signer.clone(), h.store.clone(), h.feed.clone())
        .with_clock(h.clock.clone());

    let outcome = orchestrator
        .claim(ClaimRequest::new("once", "0xabc"))
        .await
        .unwrap();
    assert!(outcome.is_pending());

    let handle = orchestrator.spawn_recheck_loop();
    for _ in 0..100 {
        if orchestrator.pending_transactions().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();

    assert!(orchestrator.pending_transactions().is_empty());
    assert_eq!(h.store.claim_count().await, 1);
    assert_eq!(h.signer.submit_count(), 1);
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_store_outage_after_confirmation_records_once() {
    let h = harness(MockSigner::default(), vec![fixed("once", 10, 100, 5)], vec![]).await;
    h.store.fail_next_writes(1);

    let outcome = h
        .orchestrator
        .claim(ClaimRequest::new("once", "0xabc"))
        .await
        .unwrap();
    assert!(matches!(outcome, ClaimOutcome::Completed(_)));

    assert_eq!(h.store.upsert_calls(), 2);
    assert_eq!(h.store.claim_count().await, 1);
    assert_eq!(h.store.get_quest("once").await.unwrap().unwrap().claims_made, 1);
    let stats = h.store.participant_stats("0xabc").await.unwrap().unwrap();
    assert_eq!(stats.quests_completed, 1);
    assert_eq!(stats.xp_total, 10);
}

#[tokio::test]
async fn test_long_outage_moves_reconciliation_to_background() {
    let chance = Quest::new(
        "crate",
        RewardDescriptor::Chance {
            tiers: vec![
                RewardTier::new("RARE", 0.5, Payout::new("Rare", 100, 0)),
                RewardTier::new("COMMON", 0.5, Payout::new("Common", 10, 0)),
            ],
        },
        5,
    );
    let h = harness(MockSigner::default(), vec![chance], vec![0.25, 0.75]).await;
    h.store.fail_next_writes(5);

    let outcome = h
        .orchestrator
        .claim(ClaimRequest::new("crate", "0xabc"))
        .await
        .unwrap();
    let receipt = match &outcome {
        ClaimOutcome::Reconciling(receipt) => receipt.clone(),
        other => panic!("expected Reconciling, got {other:?}"),
    };
    assert_eq!(receipt.xp_granted, 100);
    assert_eq!(h.orchestrator.in_flight_count(), 1);

    assert_eq!(h.orchestrator.drain_reconciliations().await, 1);

    assert_eq!(h.store.upsert_calls(), 6);
    assert_eq!(h.store.claim_count().await, 1);
    assert_eq!(h.sampler.calls(), 1);
    assert_eq!(h.orchestrator.in_flight_count(), 0);

    let record = h.store.latest_claim("crate", "0xabc").await.unwrap().unwrap();
    assert_eq!(record.reward, receipt.reward);

    let attempt = &h.orchestrator.recent_attempts(1).await[0];
    assert_eq!(attempt.stage(), ClaimStage::Complete);
    assert_eq!(attempt.reward.as_ref(), Some(&receipt.reward));
}

// =============================================================================
// Rewards
// =============================================================================

#[tokio::test]
async fn test_chance_reward_drawn_once_per_claim() {
    let loot = Quest::new(
        "loot",
        RewardDescriptor::Chance {
            tiers: vec![
                RewardTier::new("LEGENDARY", 0.05, Payout::new("Legendary", 500, 0).with_item("crown")),
                RewardTier::new("RARE", 0.25, Payout::new("Rare", 100, 0)),
                RewardTier::new("COMMON", 0.70, Payout::new("Common", 10, 0)),
            ],
        },
        5,
    );
    let h = harness(MockSigner::default(), vec![loot], vec![0.04]).await;

    let outcome = h
        .orchestrator
        .claim(ClaimRequest::new("loot", "0xabc"))
        .await
        .unwrap();
    let receipt = outcome.receipt().unwrap();
    match &receipt.reward {
        RewardOutcome::Tier { label, roll, .. } => {
            assert_eq!(label, "LEGENDARY");
            assert_eq!(*roll, 0.04);
        }
        other => panic!("expected tier reward, got {other:?}"),
    }
    assert_eq!(h.sampler.calls(), 1);
    assert_eq!(h.store.inventory("0xabc").await.unwrap()[0].item, "crown");
}

#[tokio::test]
async fn test_wheel_reward_lands_on_segment_under_pointer() {
    let segments = (0..6)
        .map(|i| Payout::new(format!("Segment {i}"), i as u64 * 10, 0))
        .collect();
    let wheel = Quest::new(
        "wheel",
        RewardDescriptor::Wheel {
            segments,
            minimum_full_turns: None,
        },
        5,
    );
    // 5 turns + 30 degrees
    let h = harness(MockSigner::default(), vec![wheel], vec![30.0 / 360.0]).await;

    let outcome = h
        .orchestrator
        .claim(ClaimRequest::new("wheel", "0xabc"))
        .await
        .unwrap();
    match &outcome.receipt().unwrap().reward {
        RewardOutcome::Wheel {
            segment_index,
            rotation_deg,
            payout,
        } => {
            assert_eq!(*segment_index, 5);
            assert!((rotation_deg - 1830.0).abs() < 1e-9);
            assert_eq!(payout.label, "Segment 5");
        }
        other => panic!("expected wheel reward, got {other:?}"),
    }
}

// =============================================================================
// Referrals
// =============================================================================

#[tokio::test]
async fn test_captured_referral_credits_referrer() {
    let quest = fixed("market", 40, 1_000, 5).with_referral_bps(500);
    let h = harness(MockSigner::default(), vec![quest], vec![]).await;

    h.orchestrator
        .record_quest_view("0xBob", "questclaim://claim?quest=market&ref=0xAlice", None)
        .await
        .unwrap();

    let outcome = h
        .orchestrator
        .claim(ClaimRequest::new("market", "0xbob").with_referral_code("0xcarol"))
        .await
        .unwrap();
    let credit = outcome.receipt().unwrap().referral.clone().unwrap();
    assert_eq!(credit.referrer_id, "0xalice");
    assert_eq!(credit.bonus, 50);

    let alice = h.store.participant_stats("0xalice").await.unwrap().unwrap();
    assert_eq!(alice.referral_earnings, 50);
    assert_eq!(alice.referrals, 1);
    assert_eq!(h.signer.submitted()[0].referrer_id.as_deref(), Some("0xalice"));

    let bob = h.store.participant_stats("0xbob").await.unwrap().unwrap();
    assert_eq!(bob.xp_total, 40);
}

#[tokio::test]
async fn test_invalid_referral_never_blocks_claim() {
    let quest = fixed("market", 40, 1_000, 5).with_referral_bps(500);
    let h = harness(MockSigner::default(), vec![quest], vec![]).await;

    let selfie = h
        .orchestrator
        .record_quest_view("0xbob", "quest=market&ref=0xBOB", None)
        .await;
    assert!(matches!(selfie, Err(ClaimError::InvalidReferral(_))));

    let outcome = h
        .orchestrator
        .claim(ClaimRequest::new("market", "0xbob").with_referral_code("0xBob"))
        .await
        .unwrap();
    assert!(outcome.receipt().unwrap().referral.is_none());
    assert!(h.store.participant_stats("0xbob").await.unwrap().unwrap().referrals == 0);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_same_pair_attempts_are_exclusive() {
    let signer = MockSigner::default().with_receipts([ReceiptScript::Hang(Duration::from_millis(30))]);
    let h = harness(signer, vec![fixed("once", 10, 0, 5)], vec![]).await;

    let first = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.claim(ClaimRequest::new("once", "0xabc")).await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;

    let second = h
        .orchestrator
        .claim(ClaimRequest::new("once", "0xABC"))
        .await
        .unwrap_err();
    assert_eq!(second, ClaimError::AttemptInFlight);

    first.await.unwrap().unwrap();
    assert_eq!(h.signer.submit_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_never_exceed_capacity() {
    let h = harness(MockSigner::default(), vec![fixed("limited", 10, 0, 3)], vec![]).await;

    let mut handles = Vec::new();
    for i in 0..12 {
        let orchestrator = h.orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .claim(ClaimRequest::new("limited", format!("0xp{i:02}")))
                .await
        }));
    }

    let mut completed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => completed += 1,
            Err(e) => assert_eq!(e, ClaimError::QuestAtCapacity),
        }
    }

    assert_eq!(completed, 3);
    assert_eq!(h.store.get_quest("limited").await.unwrap().unwrap().claims_made, 3);
    assert_eq!(h.signer.submit_count(), 3);
}

/// Memory store that can hold one `get_quest` call after it has read the
/// quest, so a test can change the world under a stale read.
struct GatedStore {
    inner: Arc<MemoryClaimStore>,
    /// Calls to let through before holding one
    gate: Mutex<Option<usize>>,
    parked: Notify,
    resume: Notify,
}

impl GatedStore {
    fn new(inner: Arc<MemoryClaimStore>) -> Self {
        Self {
            inner,
            gate: Mutex::new(None),
            parked: Notify::new(),
            resume: Notify::new(),
        }
    }

    fn hold_after(&self, pass: usize) {
        *self.gate.lock().unwrap() = Some(pass);
    }

    fn should_hold(&self) -> bool {
        let mut gate = self.gate.lock().unwrap();
        match gate.as_mut() {
            Some(0) => {
                *gate = None;
                true
            }
            Some(n) => {
                *n -= 1;
                false
            }
            None => false,
        }
    }
}

#[async_trait]
impl ClaimStore for GatedStore {
    async fn get_quest(&self, quest_id: &str) -> Result<Option<Quest>, StoreError> {
        let quest = self.inner.get_quest(quest_id).await?;
        if self.should_hold() {
            self.parked.notify_one();
            self.resume.notified().await;
        }
        Ok(quest)
    }

    async fn put_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        self.inner.put_quest(quest).await
    }

    async fn latest_claim(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Option<ClaimRecord>, StoreError> {
        self.inner.latest_claim(quest_id, participant_id).await
    }

    async fn claims_for(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Vec<ClaimRecord>, StoreError> {
        self.inner.claims_for(quest_id, participant_id).await
    }

    async fn upsert_claim(&self, write: &ClaimWrite) -> Result<UpsertOutcome, StoreError> {
        self.inner.upsert_claim(write).await
    }

    async fn participant_stats(
        &self,
        participant_id: &str,
    ) -> Result<Option<ParticipantStats>, StoreError> {
        self.inner.participant_stats(participant_id).await
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<ParticipantStats>, StoreError> {
        self.inner.leaderboard(limit).await
    }

    async fn inventory(&self, participant_id: &str) -> Result<Vec<InventoryItem>, StoreError> {
        self.inner.inventory(participant_id).await
    }

    async fn save_referral_capture(&self, capture: &ReferralCapture) -> Result<bool, StoreError> {
        self.inner.save_referral_capture(capture).await
    }

    async fn referral_capture(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Option<ReferralCapture>, StoreError> {
        self.inner.referral_capture(quest_id, participant_id).await
    }
}

#[tokio::test]
async fn test_stale_quest_read_cannot_take_a_recycled_slot() {
    let memory = Arc::new(MemoryClaimStore::new());
    memory.put_quest(&fixed("pair", 10, 0, 2)).await.unwrap();
    let store = Arc::new(GatedStore::new(memory.clone()));
    let signer = Arc::new(MockSigner::default().with_receipts([
        ReceiptScript::Hang(Duration::from_secs(5)),
        ReceiptScript::Confirm,
        ReceiptScript::Hang(Duration::from_secs(5)),
    ]));
    let orchestrator = ClaimOrchestrator::new(
        config(),
        signer.clone(),
        store.clone(),
        Arc::new(LocationFeed::new()),
    )
    .with_clock(Arc::new(ManualClock::new(t0())));

    // A submits and stays unconfirmed, holding one slot
    let a = orchestrator
        .claim(ClaimRequest::new("pair", "0xa"))
        .await
        .unwrap();
    assert!(a.is_pending());

    // B counts A's slot, then reads claims_made = 0 and stalls
    store.hold_after(1);
    let b = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.claim(ClaimRequest::new("pair", "0xb")).await })
    };
    store.parked.notified().await;

    // A lands and returns its slot; C takes a slot, so one is held again
    let a = orchestrator.recheck(a.transaction_id()).await.unwrap();
    assert!(matches!(a, ClaimOutcome::Completed(_)));
    let c = orchestrator
        .claim(ClaimRequest::new("pair", "0xc"))
        .await
        .unwrap();
    assert!(c.is_pending());

    store.resume.notify_one();
    assert_eq!(b.await.unwrap().unwrap_err(), ClaimError::QuestAtCapacity);

    let c = orchestrator.recheck(c.transaction_id()).await.unwrap();
    assert!(matches!(c, ClaimOutcome::Completed(_)));

    assert_eq!(signer.submit_count(), 2);
    assert_eq!(memory.claim_count().await, 2);
    assert_eq!(memory.get_quest("pair").await.unwrap().unwrap().claims_made, 2);
}
