//! Eligibility lookups against the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use quest_core::eligibility::evaluate;
use quest_core::{canonical_participant, EligibilityState, Quest};

use crate::error::ClaimError;
use crate::store::ClaimStore;

/// Decides whether a participant may claim a quest now.
///
/// Reads the participant's latest claim (one read, no writes) and evaluates
/// expiry, history and capacity in that order.
#[derive(Clone)]
pub struct EligibilityTracker {
    store: Arc<dyn ClaimStore>,
}

impl EligibilityTracker {
    pub fn new(store: Arc<dyn ClaimStore>) -> Self {
        Self { store }
    }

    /// Full check; `Ok` only when the claim may proceed.
    pub async fn check(
        &self,
        quest: &Quest,
        participant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EligibilityState, ClaimError> {
        let participant_id = canonical_participant(participant_id);
        let latest = self
            .store
            .latest_claim(&quest.quest_id, &participant_id)
            .await?;

        let state = evaluate(quest, latest.as_ref(), now)?;
        debug!(
            quest_id = %quest.quest_id,
            participant_id = %participant_id,
            state = ?state,
            "Eligibility checked"
        );
        Ok(state)
    }
}
