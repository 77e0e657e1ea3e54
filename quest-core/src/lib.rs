//! Quest Core - the claim domain model
//!
//! Pure, I/O-free building blocks for verifying and rewarding quest claims:
//!
//! - **Geofencing**: haversine distance against a quest's target area,
//!   with mock-location samples rejected outright
//! - **Eligibility**: one-time vs recurring claim state, recomputed from
//!   the latest claim record
//! - **Referrals**: share-link parsing and basis-point bonus math
//! - **Rewards**: fixed payouts, weighted tier draws and the prize wheel
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   location   │   │ eligibility  │   │    reward    │
//! │  (geofence)  │   │ (state calc) │   │ (tier/wheel) │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        └──────────────────┼──────────────────┘
//!                    ┌──────▼───────┐
//!                    │    types     │
//!                    │ Quest/Record │
//!                    └──────────────┘
//! ```
//!
//! Services that talk to signers and stores live in `claim-engine`.

pub mod eligibility;
pub mod error;
pub mod location;
pub mod proof;
pub mod referral;
pub mod reward;
pub mod types;

// Re-export main types
pub use eligibility::{EligibilityState, Ineligibility};
pub use error::{LocationError, QuestError, RecordError, RewardError};
pub use location::{haversine_distance_m, LocationVerifier};
pub use proof::{hash_verification_code, ClaimProof, ProofError};
pub use referral::{ReferralCapture, ReferralCredit, ReferralError, ReferralLink};
pub use reward::{RewardOutcome, RewardResolver, SequenceSampler, StdRngSampler, UnitSampler};
pub use types::*;
