//! Claim error taxonomy.

use serde::Serialize;

use quest_core::{
    EligibilityState, Ineligibility, LocationError, ProofError, QuestError, ReferralError,
    RewardError,
};

use crate::store::StoreError;

/// Everything a claim attempt can end with.
///
/// Verification and eligibility errors are terminal and never retried.
/// `TransactionPendingTimeout` is informational: the claim is parked, not
/// failed. `LedgerWriteFailed` is reported by a single reconciliation
/// attempt; a confirmed claim keeps reconciling until it is recorded, so it
/// never ends a claim. `InvalidReferral` never ends a claim either.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ClaimError {
    #[error("Location unavailable")]
    LocationUnavailable,

    #[error("Location spoofing detected")]
    LocationSpoofed,

    #[error("Out of range: {distance_m:.1}m from target, radius {radius_m:.1}m")]
    OutOfRange { distance_m: f64, radius_m: f64 },

    #[error("Not eligible: {reason:?}")]
    NotEligible {
        reason: EligibilityState,
        retry_after_secs: Option<u64>,
    },

    #[error("Quest expired")]
    QuestExpired,

    #[error("Quest has reached its claim limit")]
    QuestAtCapacity,

    #[error("Signer rejected the transaction")]
    SignerRejected,

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Transaction confirmation timed out; claim is pending")]
    TransactionPendingTimeout,

    #[error("Ledger write failed (retryable: {retryable}): {reason}")]
    LedgerWriteFailed { retryable: bool, reason: String },

    #[error("Invalid referral: {0}")]
    InvalidReferral(String),

    #[error("Quest not found: {0}")]
    QuestNotFound(String),

    #[error("Invalid quest: {0}")]
    InvalidQuest(String),

    #[error("Claim proof required")]
    ProofMissing,

    #[error("Claim proof does not match the quest")]
    ProofMismatch,

    #[error("A claim attempt for this quest is already in flight")]
    AttemptInFlight,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Unknown pending transaction: {0}")]
    UnknownTransaction(String),
}

impl ClaimError {
    /// Seconds until a locked recurring quest can be claimed again.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::NotEligible {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }

    /// Whether moving closer could fix the failure.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}

impl From<LocationError> for ClaimError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::Unavailable => Self::LocationUnavailable,
            LocationError::Spoofed => Self::LocationSpoofed,
            LocationError::OutOfRange {
                distance_m,
                radius_m,
            } => Self::OutOfRange {
                distance_m,
                radius_m,
            },
        }
    }
}

impl From<ProofError> for ClaimError {
    fn from(err: ProofError) -> Self {
        match err {
            ProofError::Missing => Self::ProofMissing,
            ProofError::Mismatch => Self::ProofMismatch,
        }
    }
}

impl From<Ineligibility> for ClaimError {
    fn from(reason: Ineligibility) -> Self {
        match reason {
            Ineligibility::Expired => Self::QuestExpired,
            Ineligibility::AtCapacity => Self::QuestAtCapacity,
            Ineligibility::History(state) => Self::NotEligible {
                reason: state,
                retry_after_secs: state.retry_after_secs(),
            },
        }
    }
}

impl From<QuestError> for ClaimError {
    fn from(err: QuestError) -> Self {
        Self::InvalidQuest(err.to_string())
    }
}

impl From<RewardError> for ClaimError {
    fn from(err: RewardError) -> Self {
        Self::InvalidQuest(err.to_string())
    }
}

impl From<ReferralError> for ClaimError {
    fn from(err: ReferralError) -> Self {
        Self::InvalidReferral(err.to_string())
    }
}

impl From<StoreError> for ClaimError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
