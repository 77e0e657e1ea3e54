//! Reward resolution.
//!
//! Three descriptor kinds:
//! - **Fixed**: payout passed through unchanged
//! - **Chance**: one uniform draw against a normalised tier table
//! - **Wheel**: one uniform draw turned into a terminal rotation, then
//!   mapped to the segment under the pointer
//!
//! Each call to [`RewardResolver::resolve`] performs at most one draw. The
//! returned [`RewardOutcome`] is what gets persisted; callers that retry
//! persistence must reuse it rather than resolving again.

pub mod sampler;
pub mod table;
pub mod wheel;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RewardError;
use crate::types::{Payout, RewardDescriptor};

pub use sampler::{SequenceSampler, StdRngSampler, UnitSampler};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Default minimum number of full wheel turns per spin.
pub const DEFAULT_MINIMUM_FULL_TURNS: u32 = 5;

/// The reward actually granted for a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardOutcome {
    Fixed {
        payout: Payout,
    },
    Tier {
        tier_index: usize,
        label: String,
        /// The uniform draw that selected this tier
        roll: f64,
        payout: Payout,
    },
    Wheel {
        segment_index: usize,
        /// Clockwise terminal rotation, for client animation
        rotation_deg: f64,
        payout: Payout,
    },
}

impl RewardOutcome {
    pub fn payout(&self) -> &Payout {
        match self {
            Self::Fixed { payout } | Self::Tier { payout, .. } | Self::Wheel { payout, .. } => {
                payout
            }
        }
    }

    pub fn xp(&self) -> u64 {
        self.payout().xp
    }

    pub fn amount(&self) -> u64 {
        self.payout().amount
    }
}

/// Decides the reward for a claim.
#[derive(Clone)]
pub struct RewardResolver {
    sampler: Arc<dyn UnitSampler>,
    minimum_full_turns: u32,
}

impl RewardResolver {
    pub fn new(sampler: Arc<dyn UnitSampler>) -> Self {
        Self {
            sampler,
            minimum_full_turns: DEFAULT_MINIMUM_FULL_TURNS,
        }
    }

    pub fn with_minimum_full_turns(mut self, turns: u32) -> Self {
        self.minimum_full_turns = turns;
        self
    }

    /// Resolve `descriptor` into a concrete outcome.
    pub fn resolve(&self, descriptor: &RewardDescriptor) -> Result<RewardOutcome, RewardError> {
        match descriptor {
            RewardDescriptor::Fixed { payout } => Ok(RewardOutcome::Fixed {
                payout: payout.clone(),
            }),
            RewardDescriptor::Chance { tiers } => {
                table::validate(tiers)?;
                let roll = self.sampler.sample();
                let tier_index = table::select_tier(tiers, roll)?;
                let tier = &tiers[tier_index];
                debug!(roll, tier = %tier.label, "Resolved chance reward");
                Ok(RewardOutcome::Tier {
                    tier_index,
                    label: tier.label.clone(),
                    roll,
                    payout: tier.payout.clone(),
                })
            }
            RewardDescriptor::Wheel {
                segments,
                minimum_full_turns,
            } => {
                if segments.is_empty() {
                    return Err(RewardError::NoSegments);
                }
                let turns = minimum_full_turns.unwrap_or(self.minimum_full_turns);
                let rotation_deg = wheel::terminal_rotation(turns, self.sampler.sample());
                let segment_index =
                    wheel::segment_index(rotation_deg, segments.len()).ok_or(RewardError::NoSegments)?;
                debug!(rotation_deg, segment_index, "Resolved wheel reward");
                Ok(RewardOutcome::Wheel {
                    segment_index,
                    rotation_deg,
                    payout: segments[segment_index].clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RewardTier;

    fn segments(n: usize) -> Vec<Payout> {
        (0..n).map(|i| Payout::new(format!("S{i}"), i as u64, 0)).collect()
    }

    #[test]
    fn test_fixed_passes_through_without_draw() {
        let sampler = Arc::new(SequenceSampler::new([0.5]));
        let resolver = RewardResolver::new(sampler.clone());
        let payout = Payout::new("Badge", 25, 5).with_item("badge:gold");
        let outcome = resolver
            .resolve(&RewardDescriptor::Fixed {
                payout: payout.clone(),
            })
            .unwrap();
        assert_eq!(outcome.payout(), &payout);
        assert_eq!(sampler.calls(), 0);
    }

    #[test]
    fn test_chance_draws_once() {
        let sampler = Arc::new(SequenceSampler::new([0.10]));
        let resolver = RewardResolver::new(sampler.clone());
        let tiers = vec![
            RewardTier::new("LEGENDARY", 0.05, Payout::new("LEGENDARY", 500, 100)),
            RewardTier::new("RARE", 0.25, Payout::new("RARE", 100, 20)),
            RewardTier::new("COMMON", 0.70, Payout::new("COMMON", 10, 1)),
        ];
        let outcome = resolver.resolve(&RewardDescriptor::Chance { tiers }).unwrap();
        match outcome {
            RewardOutcome::Tier { label, roll, .. } => {
                assert_eq!(label, "RARE");
                assert_eq!(roll, 0.10);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(sampler.calls(), 1);
    }

    #[test]
    fn test_wheel_uses_configured_turns() {
        let sampler = Arc::new(SequenceSampler::new([30.0 / 360.0]));
        let resolver = RewardResolver::new(sampler).with_minimum_full_turns(5);
        let outcome = resolver
            .resolve(&RewardDescriptor::Wheel {
                segments: segments(6),
                minimum_full_turns: None,
            })
            .unwrap();
        match outcome {
            RewardOutcome::Wheel {
                segment_index,
                rotation_deg,
                payout,
            } => {
                assert!((rotation_deg - 1830.0).abs() < 1e-9);
                assert_eq!(segment_index, 5);
                assert_eq!(payout.label, "S5");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_invalid_table_draws_nothing() {
        let sampler = Arc::new(SequenceSampler::new([0.3]));
        let resolver = RewardResolver::new(sampler.clone());
        let result = resolver.resolve(&RewardDescriptor::Chance { tiers: vec![] });
        assert_eq!(result, Err(RewardError::EmptyTable));
        assert_eq!(sampler.calls(), 0);
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = RewardOutcome::Fixed {
            payout: Payout::new("Coin", 1, 2),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "fixed");
        let back: RewardOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, outcome);
    }
}
