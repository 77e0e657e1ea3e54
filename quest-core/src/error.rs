//! Error types for the quest domain.

/// Location check failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    /// No usable location sample at claim time
    #[error("Location unavailable")]
    Unavailable,

    /// The sample came from a mock/spoofed provider
    #[error("Location spoofing detected")]
    Spoofed,

    /// Participant is outside the quest geofence
    #[error("Out of range: {distance_m:.1}m from target, radius {radius_m:.1}m")]
    OutOfRange { distance_m: f64, radius_m: f64 },
}

/// Reward table and wheel configuration errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RewardError {
    /// Chance table has no tiers
    #[error("Reward table is empty")]
    EmptyTable,

    /// A tier weight is negative or not finite
    #[error("Invalid weight {weight} on tier {label}")]
    InvalidWeight { label: String, weight: f64 },

    /// Every tier has zero weight
    #[error("Reward table weights sum to zero")]
    ZeroTotalWeight,

    /// Prize wheel has no segments
    #[error("Prize wheel has no segments")]
    NoSegments,
}

/// Quest definition problems found during validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuestError {
    /// Geofence radius must be a positive, finite distance
    #[error("Invalid geofence radius: {0}")]
    InvalidRadius(f64),

    /// Geofence center is not a valid coordinate
    #[error("Invalid geofence center: ({latitude}, {longitude})")]
    InvalidCenter { latitude: f64, longitude: f64 },

    /// Referral share above 100%
    #[error("Referral bps {0} exceeds 10000")]
    InvalidReferralBps(u32),

    /// Recurring quest without a positive interval
    #[error("Recurring quest requires a positive interval")]
    MissingInterval,

    /// Quest cannot be claimed at all
    #[error("max_claims must be at least 1")]
    ZeroCapacity,

    /// Verification-mode quest without a code hash
    #[error("Verification quest has no code hash")]
    MissingVerificationHash,

    /// Reward descriptor is unusable
    #[error("Invalid reward: {0}")]
    Reward(#[from] RewardError),
}

/// A persisted row that cannot be mapped to a typed record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    /// Field missing or holding an unusable value
    #[error("Malformed claim row: field `{field}` {reason}")]
    Malformed { field: &'static str, reason: String },
}

impl RecordError {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            field,
            reason: reason.into(),
        }
    }
}
