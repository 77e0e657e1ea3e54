//! In-memory store for tests and demos.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use quest_core::{ClaimRecord, InventoryItem, ParticipantStats, Quest, ReferralCapture};

use super::traits::*;

type ClaimKey = (String, String, String);

#[derive(Default)]
struct MemoryState {
    quests: HashMap<String, Quest>,
    claims: HashMap<ClaimKey, ClaimRecord>,
    stats: HashMap<String, ParticipantStats>,
    inventory: HashMap<String, BTreeMap<String, u64>>,
    referrals: HashMap<(String, String), ReferralCapture>,
}

impl MemoryState {
    fn apply_counters(&mut self, delta: &CounterDelta) {
        match self.quests.get_mut(&delta.quest_id) {
            Some(quest) => {
                let cap = quest.max_claims.min(delta.max_claims);
                if quest.claims_made < cap {
                    quest.claims_made += 1;
                } else {
                    warn!(quest_id = %delta.quest_id, cap, "claims_made already at cap");
                }
            }
            None => warn!(quest_id = %delta.quest_id, "Counter update for unknown quest"),
        }

        let stats = self
            .stats
            .entry(delta.participant_id.clone())
            .or_insert_with(|| ParticipantStats::empty(&delta.participant_id));
        stats.xp_total = stats.xp_total.saturating_add(delta.xp);
        stats.quests_completed += 1;

        if let Some(item) = &delta.item {
            *self
                .inventory
                .entry(delta.participant_id.clone())
                .or_default()
                .entry(item.clone())
                .or_insert(0) += 1;
        }

        if let Some(referrer) = &delta.referrer_id {
            let stats = self
                .stats
                .entry(referrer.clone())
                .or_insert_with(|| ParticipantStats::empty(referrer));
            stats.referral_earnings = stats.referral_earnings.saturating_add(delta.referral_bonus);
            stats.referrals += 1;
        }
    }
}

/// In-memory [`ClaimStore`] with fault injection.
///
/// All state sits behind one lock, so an upsert and its counters are
/// applied atomically.
pub struct MemoryClaimStore {
    state: RwLock<MemoryState>,
    available: AtomicBool,
    failing_writes: AtomicU32,
    upsert_calls: AtomicU32,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            available: AtomicBool::new(true),
            failing_writes: AtomicU32::new(0),
            upsert_calls: AtomicU32::new(0),
        }
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fail the next `n` upserts with [`StoreError::Unavailable`].
    pub fn fail_next_writes(&self, n: u32) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Number of upsert calls, failed ones included.
    pub fn upsert_calls(&self) -> u32 {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Total stored claim records.
    pub async fn claim_count(&self) -> usize {
        self.state.read().await.claims.len()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        }
    }

    fn check_write(&self) -> Result<(), StoreError> {
        self.check_available()?;
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(_) => Err(StoreError::Unavailable("injected write failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

impl Default for MemoryClaimStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn get_quest(&self, quest_id: &str) -> Result<Option<Quest>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.quests.get(quest_id).cloned())
    }

    async fn put_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let mut quest = quest.clone();
        if let Some(existing) = state.quests.get(&quest.quest_id) {
            quest.claims_made = existing.claims_made;
        }
        state.quests.insert(quest.quest_id.clone(), quest);
        Ok(())
    }

    async fn latest_claim(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Option<ClaimRecord>, StoreError> {
        Ok(self.claims_for(quest_id, participant_id).await?.pop())
    }

    async fn claims_for(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Vec<ClaimRecord>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut records: Vec<ClaimRecord> = state
            .claims
            .values()
            .filter(|r| r.quest_id == quest_id && r.participant_id == participant_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.claimed_at
                .cmp(&b.claimed_at)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });
        Ok(records)
    }

    async fn upsert_claim(&self, write: &ClaimWrite) -> Result<UpsertOutcome, StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_write()?;

        let (q, p, tx) = write.record.key();
        let key = (q.to_string(), p.to_string(), tx.to_string());

        let mut state = self.state.write().await;
        if state.claims.contains_key(&key) {
            return Ok(UpsertOutcome::AlreadyExisted);
        }
        state.claims.insert(key, write.record.clone());
        state.apply_counters(&write.counters);
        Ok(UpsertOutcome::Inserted)
    }

    async fn participant_stats(
        &self,
        participant_id: &str,
    ) -> Result<Option<ParticipantStats>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.stats.get(participant_id).cloned())
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<ParticipantStats>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut rows: Vec<ParticipantStats> = state.stats.values().cloned().collect();
        rows.sort_by(leaderboard_order);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn inventory(&self, participant_id: &str) -> Result<Vec<InventoryItem>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .inventory
            .get(participant_id)
            .map(|items| {
                items
                    .iter()
                    .map(|(item, quantity)| InventoryItem {
                        item: item.clone(),
                        quantity: *quantity,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn save_referral_capture(&self, capture: &ReferralCapture) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let key = (capture.quest_id.clone(), capture.participant_id.clone());
        if state.referrals.contains_key(&key) {
            return Ok(false);
        }
        state.referrals.insert(key, capture.clone());
        Ok(true)
    }

    async fn referral_capture(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Option<ReferralCapture>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .referrals
            .get(&(quest_id.to_string(), participant_id.to_string()))
            .cloned())
    }
}
