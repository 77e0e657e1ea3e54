//! Persistent store contract.
//!
//! The store is the fast-read side (leaderboards, inventories, claim
//! history). The external ledger stays authoritative; this side is kept in
//! step by idempotent upserts keyed by `(quest, participant, transaction)`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quest_core::{ClaimRecord, InventoryItem, ParticipantStats, Quest, RecordError, ReferralCapture};

/// Error types for store operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Store cannot be reached right now
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A row could not be mapped to a typed record
    #[error(transparent)]
    Malformed(#[from] RecordError),

    /// Backend-specific failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same operation later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Backend(_))
    }
}

/// Aggregate changes applied together with a first-time claim insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDelta {
    /// Quest whose `claims_made` advances by one
    pub quest_id: String,
    /// `claims_made` never moves past this
    pub max_claims: u32,
    pub participant_id: String,
    pub xp: u64,
    /// Item added to the participant's inventory
    pub item: Option<String>,
    /// Referrer credited separately from the participant
    pub referrer_id: Option<String>,
    pub referral_bonus: u64,
}

/// A claim record with its aggregate side effects.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimWrite {
    pub record: ClaimRecord,
    pub counters: CounterDelta,
}

/// Result of an idempotent upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// Record written and counters applied
    Inserted,
    /// Key already present; nothing changed
    AlreadyExisted,
}

/// Persistent store used by the claim engine.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Load a quest with its current `claims_made`.
    async fn get_quest(&self, quest_id: &str) -> Result<Option<Quest>, StoreError>;

    /// Insert or replace a quest definition (authoring import).
    ///
    /// An existing quest keeps its stored `claims_made`.
    async fn put_quest(&self, quest: &Quest) -> Result<(), StoreError>;

    /// Most recent claim for the pair, by `claimed_at`.
    async fn latest_claim(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Option<ClaimRecord>, StoreError>;

    /// All claims for the pair, oldest first.
    async fn claims_for(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Vec<ClaimRecord>, StoreError>;

    /// Insert the record and apply its counters atomically, once per key.
    async fn upsert_claim(&self, write: &ClaimWrite) -> Result<UpsertOutcome, StoreError>;

    async fn participant_stats(
        &self,
        participant_id: &str,
    ) -> Result<Option<ParticipantStats>, StoreError>;

    /// Top participants by XP, then quests completed, then id.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<ParticipantStats>, StoreError>;

    async fn inventory(&self, participant_id: &str) -> Result<Vec<InventoryItem>, StoreError>;

    /// Remember a referral; returns `false` if one was already captured.
    async fn save_referral_capture(&self, capture: &ReferralCapture) -> Result<bool, StoreError>;

    async fn referral_capture(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Option<ReferralCapture>, StoreError>;
}

/// Ordering shared by every store's leaderboard.
pub(crate) fn leaderboard_order(a: &ParticipantStats, b: &ParticipantStats) -> std::cmp::Ordering {
    b.xp_total
        .cmp(&a.xp_total)
        .then(b.quests_completed.cmp(&a.quests_completed))
        .then(a.participant_id.cmp(&b.participant_id))
}
