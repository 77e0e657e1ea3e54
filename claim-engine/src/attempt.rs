//! Claim attempt bookkeeping.
//!
//! Tracks the stage trail of each attempt, the per-pair exclusivity lock,
//! per-quest capacity reservations, and a bounded history of finished
//! attempts.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::futures::Notified;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, warn};

use quest_core::RewardOutcome;

use crate::error::ClaimError;

/// Default number of finished attempts kept in the history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1_000;

/// Stage of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStage {
    Init,
    VerifyingLocation,
    CheckingEligibility,
    SubmittingTx,
    AwaitingConfirmation,
    /// Confirmation timed out; parked until a recheck
    Pending,
    ResolvingReward,
    ReconcilingLedger,
    Complete,
    Failed,
}

impl ClaimStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Whether `next` is a legal successor of this stage.
    ///
    /// `Failed` is reachable from every non-terminal stage before
    /// `ReconcilingLedger`; once reconciling, the only way out is `Complete`.
    pub fn can_transition_to(&self, next: ClaimStage) -> bool {
        use ClaimStage::*;
        match (self, next) {
            (Complete | Failed, _) => false,
            (ReconcilingLedger, Complete) => true,
            (ReconcilingLedger, _) => false,
            (_, Failed) => true,
            (Init, VerifyingLocation)
            | (VerifyingLocation, CheckingEligibility)
            | (CheckingEligibility, SubmittingTx)
            | (SubmittingTx, AwaitingConfirmation)
            | (AwaitingConfirmation, Pending)
            | (AwaitingConfirmation, ResolvingReward)
            | (Pending, AwaitingConfirmation)
            | (ResolvingReward, ReconcilingLedger) => true,
            _ => false,
        }
    }
}

/// One claim attempt and everything it has done so far.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimAttempt {
    pub attempt_id: String,
    pub quest_id: String,
    /// Canonical participant id
    pub participant_id: String,
    /// Every stage entered, in order
    pub stages: Vec<ClaimStage>,
    pub transaction_id: Option<String>,
    /// Reward drawn for this attempt, reused by every reconciliation retry
    pub reward: Option<RewardOutcome>,
    /// Error that ended the attempt
    pub error: Option<ClaimError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ClaimAttempt {
    pub fn new(
        quest_id: impl Into<String>,
        participant_id: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            attempt_id: uuid::Uuid::new_v4().to_string(),
            quest_id: quest_id.into(),
            participant_id: participant_id.into(),
            stages: vec![ClaimStage::Init],
            transaction_id: None,
            reward: None,
            error: None,
            started_at,
            finished_at: None,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> ClaimStage {
        self.stages.last().copied().unwrap_or(ClaimStage::Init)
    }

    /// Move to `next`. Illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: ClaimStage) -> bool {
        let current = self.stage();
        if !current.can_transition_to(next) {
            warn!(
                attempt_id = %self.attempt_id,
                from = ?current,
                to = ?next,
                "Ignoring illegal claim stage transition"
            );
            return false;
        }
        debug!(
            attempt_id = %self.attempt_id,
            quest_id = %self.quest_id,
            participant_id = %self.participant_id,
            from = ?current,
            to = ?next,
            "Claim stage"
        );
        self.stages.push(next);
        true
    }

    /// Enter `Failed` with `error`.
    pub fn fail(&mut self, error: ClaimError, at: DateTime<Utc>) {
        self.advance(ClaimStage::Failed);
        self.error = Some(error);
        self.finished_at = Some(at);
    }

    /// Enter `Complete`.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.advance(ClaimStage::Complete);
        self.finished_at = Some(at);
    }
}

type PairKey = (String, String);

/// Attempts currently in flight, one per (quest, participant).
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    pairs: DashMap<PairKey, String>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the pair for `attempt_id`; `None` if another attempt holds it.
    pub fn acquire(
        self: &Arc<Self>,
        quest_id: &str,
        participant_id: &str,
        attempt_id: &str,
    ) -> Option<InFlightGuard> {
        let key = (quest_id.to_string(), participant_id.to_string());
        match self.pairs.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(attempt_id.to_string());
                Some(InFlightGuard {
                    registry: Arc::clone(self),
                    key,
                })
            }
        }
    }

    /// Attempt id holding the pair, if any.
    pub fn holder(&self, quest_id: &str, participant_id: &str) -> Option<String> {
        self.pairs
            .get(&(quest_id.to_string(), participant_id.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Releases the pair lock on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    key: PairKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.pairs.remove(&self.key);
    }
}

/// Capacity slots reserved by unfinished attempts, per quest.
///
/// Every reserve and release bumps the quest's generation, so a snapshot
/// taken before a store read goes stale as soon as any slot changes hands,
/// even if the held count comes back to the same number.
#[derive(Debug, Default)]
pub struct CapacityLedger {
    quests: DashMap<String, QuestSlots>,
    released: Notify,
}

#[derive(Debug, Default)]
struct QuestSlots {
    held: u32,
    generation: u64,
}

/// Held slots on one quest at one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacitySnapshot {
    pub held: u32,
    pub generation: u64,
}

impl CapacityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current held count and generation for `quest_id`.
    pub fn snapshot(&self, quest_id: &str) -> CapacitySnapshot {
        self.quests
            .get(quest_id)
            .map(|slots| CapacitySnapshot {
                held: slots.held,
                generation: slots.generation,
            })
            .unwrap_or(CapacitySnapshot {
                held: 0,
                generation: 0,
            })
    }

    /// Take one slot on `quest_id` if nothing moved since `seen`.
    ///
    /// Callers take a [`snapshot`](Self::snapshot), check it against fresh
    /// store state, then reserve; `None` means a slot was taken or returned
    /// in between and the check must be repeated.
    pub fn try_reserve(
        self: &Arc<Self>,
        quest_id: &str,
        seen: CapacitySnapshot,
    ) -> Option<CapacityReservation> {
        let mut slots = self.quests.entry(quest_id.to_string()).or_default();
        if slots.generation != seen.generation {
            return None;
        }
        slots.held += 1;
        slots.generation += 1;
        drop(slots);

        Some(CapacityReservation {
            ledger: Arc::clone(self),
            quest_id: quest_id.to_string(),
        })
    }

    /// Resolves when any slot is returned after this call.
    pub fn released(&self) -> Notified<'_> {
        self.released.notified()
    }
}

/// Returns its slot on drop.
#[derive(Debug)]
pub struct CapacityReservation {
    ledger: Arc<CapacityLedger>,
    quest_id: String,
}

impl Drop for CapacityReservation {
    fn drop(&mut self) {
        // Entries stay once created; removing one would restart its generation
        if let Some(mut slots) = self.ledger.quests.get_mut(&self.quest_id) {
            slots.held = slots.held.saturating_sub(1);
            slots.generation += 1;
        }
        self.ledger.released.notify_waiters();
    }
}

/// Locks held by an attempt until it finishes; dropping it releases both.
#[derive(Debug)]
pub struct AttemptLease {
    _in_flight: InFlightGuard,
    capacity: Option<CapacityReservation>,
}

impl AttemptLease {
    pub fn new(in_flight: InFlightGuard) -> Self {
        Self {
            _in_flight: in_flight,
            capacity: None,
        }
    }

    pub fn hold_capacity(&mut self, reservation: CapacityReservation) {
        self.capacity = Some(reservation);
    }
}

/// Bounded history of finished attempts (newest first).
#[derive(Debug, Clone)]
pub struct AttemptLog {
    entries: Arc<RwLock<VecDeque<ClaimAttempt>>>,
    max_entries: usize,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            max_entries: max_entries.max(1),
        }
    }

    pub async fn record(&self, attempt: ClaimAttempt) {
        let mut entries = self.entries.write().await;
        entries.push_front(attempt);

        while entries.len() > self.max_entries {
            entries.pop_back();
        }
    }

    pub async fn recent(&self, limit: usize) -> Vec<ClaimAttempt> {
        let entries = self.entries.read().await;
        entries.iter().take(limit).cloned().collect()
    }

    pub async fn get(&self, attempt_id: &str) -> Option<ClaimAttempt> {
        let entries = self.entries.read().await;
        entries.iter().find(|a| a.attempt_id == attempt_id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for AttemptLog {
    fn default() -> Self {
        Self::new()
    }
}
