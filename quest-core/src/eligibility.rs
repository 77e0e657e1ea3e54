//! Claim eligibility state.
//!
//! Eligibility is never stored. It is recomputed from the quest and the
//! participant's most recent claim on every attempt, so evaluation here is
//! a pure function of its inputs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ClaimRecord, Quest};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Where a (quest, participant) pair stands given its claim history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EligibilityState {
    /// No prior claim
    NeverClaimed,
    /// Recurring quest whose interval has elapsed
    EligibleAgain,
    /// Recurring quest still cooling down
    LockedUntil {
        until: DateTime<Utc>,
        retry_after_secs: u64,
    },
    /// One-time quest already claimed
    TerminalClaimed,
}

impl EligibilityState {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::NeverClaimed | Self::EligibleAgain)
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::LockedUntil {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Why a claim may not proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ineligibility {
    Expired,
    AtCapacity,
    /// History-derived state that blocks the claim
    History(EligibilityState),
}

/// Derive the history state from the latest matching record.
pub fn history_state(
    quest: &Quest,
    latest: Option<&ClaimRecord>,
    now: DateTime<Utc>,
) -> EligibilityState {
    let Some(record) = latest else {
        return EligibilityState::NeverClaimed;
    };

    if !quest.recurring {
        return EligibilityState::TerminalClaimed;
    }

    let interval = quest.interval_secs;
    // A record stamped in the future (clock skew) counts as just claimed
    let elapsed = (now - record.claimed_at).num_seconds().max(0) as u64;
    if elapsed >= interval {
        EligibilityState::EligibleAgain
    } else {
        EligibilityState::LockedUntil {
            until: record.claimed_at + Duration::seconds(interval as i64),
            retry_after_secs: interval - elapsed,
        }
    }
}

/// Full eligibility check: expiry, then history, then capacity.
pub fn evaluate(
    quest: &Quest,
    latest: Option<&ClaimRecord>,
    now: DateTime<Utc>,
) -> Result<EligibilityState, Ineligibility> {
    if quest.is_expired(now) {
        return Err(Ineligibility::Expired);
    }

    let state = history_state(quest, latest, now);
    if !state.is_eligible() {
        return Err(Ineligibility::History(state));
    }

    if quest.is_at_capacity() {
        return Err(Ineligibility::AtCapacity);
    }

    Ok(state)
}
