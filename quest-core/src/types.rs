//! Core types for quests, location samples and claim records.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{QuestError, RecordError, RewardError};
use crate::reward::RewardOutcome;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Maximum basis points (100%).
pub const MAX_BPS: u32 = 10_000;

/// Canonical form of a participant or referrer identifier.
///
/// Wallet addresses arrive in mixed case from different clients; every
/// comparison and storage key uses the trimmed lower-case form.
pub fn canonical_participant(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}

/// How a participant proves presence for a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ClaimMode {
    /// Be inside the geofence
    #[default]
    Proximity,
    /// Scan the quest's QR code
    Scan,
    /// Enter a code handed out at the venue
    Verification,
}

/// Circular target area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct GeoFence {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in metres
    pub radius_m: f64,
}

impl GeoFence {
    pub fn new(latitude: f64, longitude: f64, radius_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_m,
        }
    }

    fn validate(&self) -> Result<(), QuestError> {
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err(QuestError::InvalidRadius(self.radius_m));
        }
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lng_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if !lat_ok || !lng_ok {
            return Err(QuestError::InvalidCenter {
                latitude: self.latitude,
                longitude: self.longitude,
            });
        }
        Ok(())
    }
}

/// What a participant receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Payout {
    /// Display label ("LEGENDARY", "50 XP", ...)
    pub label: String,
    /// Experience points toward the leaderboard
    #[serde(default)]
    pub xp: u64,
    /// Fungible token amount credited on the ledger
    #[serde(default)]
    pub amount: u64,
    /// Inventory item granted, if any
    #[serde(default)]
    pub item: Option<String>,
}

impl Payout {
    pub fn new(label: impl Into<String>, xp: u64, amount: u64) -> Self {
        Self {
            label: label.into(),
            xp,
            amount,
            item: None,
        }
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }
}

/// One entry of a chance-based reward table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct RewardTier {
    pub label: String,
    /// Relative weight; the table is normalised on draw
    pub weight: f64,
    pub payout: Payout,
}

impl RewardTier {
    pub fn new(label: impl Into<String>, weight: f64, payout: Payout) -> Self {
        Self {
            label: label.into(),
            weight,
            payout,
        }
    }
}

/// How a quest's reward is decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardDescriptor {
    /// Always the same payout
    Fixed { payout: Payout },
    /// Loot box: weighted draw over tiers
    Chance { tiers: Vec<RewardTier> },
    /// Prize wheel of equal segments, clockwise from the pointer
    Wheel {
        segments: Vec<Payout>,
        /// Overrides the configured minimum spin
        #[serde(default)]
        minimum_full_turns: Option<u32>,
    },
}

impl RewardDescriptor {
    /// Check that a draw against this descriptor can succeed.
    pub fn validate(&self) -> Result<(), RewardError> {
        match self {
            Self::Fixed { .. } => Ok(()),
            Self::Chance { tiers } => crate::reward::table::validate(tiers),
            Self::Wheel { segments, .. } => {
                if segments.is_empty() {
                    Err(RewardError::NoSegments)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// A quest as authored externally.
///
/// Read-only to the claim engine except `claims_made`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Quest {
    pub quest_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub claim_mode: ClaimMode,
    /// Target area; absent for non-geo quests
    #[serde(default)]
    pub geofence: Option<GeoFence>,
    #[serde(default)]
    pub recurring: bool,
    /// Minimum seconds between claims of a recurring quest
    #[serde(default)]
    pub interval_secs: u64,
    /// No claims after this instant
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub reward: RewardDescriptor,
    /// Referrer's share of the granted amount, in basis points
    #[serde(default)]
    pub referral_bps: u32,
    pub max_claims: u32,
    #[serde(default)]
    pub claims_made: u32,
    /// Hex SHA-256 of the verification code (verification mode)
    #[serde(default)]
    pub verification_hash: Option<String>,
}

impl Quest {
    /// Create a one-time proximity-free quest with a fixed payout.
    pub fn new(quest_id: impl Into<String>, reward: RewardDescriptor, max_claims: u32) -> Self {
        Self {
            quest_id: quest_id.into(),
            title: String::new(),
            claim_mode: ClaimMode::Proximity,
            geofence: None,
            recurring: false,
            interval_secs: 0,
            expires_at: None,
            reward,
            referral_bps: 0,
            max_claims,
            claims_made: 0,
            verification_hash: None,
        }
    }

    pub fn with_geofence(mut self, fence: GeoFence) -> Self {
        self.geofence = Some(fence);
        self
    }

    pub fn with_mode(mut self, mode: ClaimMode) -> Self {
        self.claim_mode = mode;
        self
    }

    pub fn recurring_every(mut self, interval_secs: u64) -> Self {
        self.recurring = true;
        self.interval_secs = interval_secs;
        self
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn with_referral_bps(mut self, bps: u32) -> Self {
        self.referral_bps = bps;
        self
    }

    pub fn with_verification_hash(mut self, hash: impl Into<String>) -> Self {
        self.verification_hash = Some(hash.into());
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now > at).unwrap_or(false)
    }

    pub fn is_at_capacity(&self) -> bool {
        self.claims_made >= self.max_claims
    }

    /// Sanity-check an externally authored quest.
    pub fn validate(&self) -> Result<(), QuestError> {
        if let Some(fence) = &self.geofence {
            fence.validate()?;
        }
        if self.referral_bps > MAX_BPS {
            return Err(QuestError::InvalidReferralBps(self.referral_bps));
        }
        if self.recurring && self.interval_secs == 0 {
            return Err(QuestError::MissingInterval);
        }
        if self.max_claims == 0 {
            return Err(QuestError::ZeroCapacity);
        }
        if self.claim_mode == ClaimMode::Verification && self.verification_hash.is_none() {
            return Err(QuestError::MissingVerificationHash);
        }
        self.reward.validate()?;
        Ok(())
    }
}

/// A location fix from the device's location stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported accuracy radius in metres
    pub accuracy_m: f64,
    /// Provider flagged this fix as mocked
    pub is_suspected_mock: bool,
    pub recorded_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: 0.0,
            is_suspected_mock: false,
            recorded_at,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = accuracy_m;
        self
    }

    pub fn mocked(mut self) -> Self {
        self.is_suspected_mock = true;
        self
    }
}

/// Persisted fact of one successful claim. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ClaimRecord {
    pub quest_id: String,
    /// Canonical participant id
    pub participant_id: String,
    pub transaction_id: String,
    pub claimed_at: DateTime<Utc>,
    pub xp_granted: u64,
    pub reward: RewardOutcome,
    pub referrer_id: Option<String>,
    #[serde(default)]
    pub referral_bonus: u64,
}

impl ClaimRecord {
    /// Idempotency key of the record.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.quest_id, &self.participant_id, &self.transaction_id)
    }
}

/// Loosely typed claim row as read from a persistent store.
#[derive(Debug, Clone, Default)]
pub struct RawClaimRow {
    pub quest_id: Option<String>,
    pub participant_id: Option<String>,
    pub transaction_id: Option<String>,
    /// Unix seconds
    pub claimed_at: Option<i64>,
    pub xp_granted: Option<i64>,
    /// JSON-encoded [`RewardOutcome`]
    pub reward: Option<String>,
    pub referrer_id: Option<String>,
    pub referral_bonus: Option<i64>,
}

fn required_text(field: &'static str, value: Option<String>) -> Result<String, RecordError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(RecordError::malformed(field, "is empty")),
        None => Err(RecordError::malformed(field, "is missing")),
    }
}

fn non_negative(field: &'static str, value: Option<i64>) -> Result<u64, RecordError> {
    match value {
        Some(v) => u64::try_from(v).map_err(|_| RecordError::malformed(field, format!("is negative ({v})"))),
        None => Err(RecordError::malformed(field, "is missing")),
    }
}

impl TryFrom<RawClaimRow> for ClaimRecord {
    type Error = RecordError;

    fn try_from(row: RawClaimRow) -> Result<Self, Self::Error> {
        let quest_id = required_text("quest_id", row.quest_id)?;
        let participant_id = canonical_participant(&required_text("participant_id", row.participant_id)?);
        let transaction_id = required_text("transaction_id", row.transaction_id)?;

        let secs = row
            .claimed_at
            .ok_or_else(|| RecordError::malformed("claimed_at", "is missing"))?;
        let claimed_at = Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| RecordError::malformed("claimed_at", format!("is out of range ({secs})")))?;

        let xp_granted = non_negative("xp_granted", row.xp_granted)?;

        let reward_json = required_text("reward", row.reward)?;
        let reward: RewardOutcome = serde_json::from_str(&reward_json)
            .map_err(|e| RecordError::malformed("reward", e.to_string()))?;

        let referrer_id = row
            .referrer_id
            .filter(|r| !r.trim().is_empty())
            .map(|r| canonical_participant(&r));
        let referral_bonus = match row.referral_bonus {
            Some(_) => non_negative("referral_bonus", row.referral_bonus)?,
            None => 0,
        };

        Ok(Self {
            quest_id,
            participant_id,
            transaction_id,
            claimed_at,
            xp_granted,
            reward,
            referrer_id,
            referral_bonus,
        })
    }
}

/// Leaderboard aggregate for one participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ParticipantStats {
    pub participant_id: String,
    pub xp_total: u64,
    pub quests_completed: u64,
    /// Sum of referral bonuses credited to this participant
    pub referral_earnings: u64,
    /// Number of claims attributed to this participant as referrer
    pub referrals: u64,
}

impl ParticipantStats {
    pub fn empty(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            ..Default::default()
        }
    }
}

/// Item held in a participant's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct InventoryItem {
    pub item: String,
    pub quantity: u64,
}
