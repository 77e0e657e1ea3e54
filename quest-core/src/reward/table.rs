//! Weighted tier tables (loot boxes).

use crate::error::RewardError;
use crate::types::RewardTier;

/// Reject tables a draw cannot be made from.
pub fn validate(tiers: &[RewardTier]) -> Result<(), RewardError> {
    if tiers.is_empty() {
        return Err(RewardError::EmptyTable);
    }
    for tier in tiers {
        if !tier.weight.is_finite() || tier.weight < 0.0 {
            return Err(RewardError::InvalidWeight {
                label: tier.label.clone(),
                weight: tier.weight,
            });
        }
    }
    if tiers.iter().map(|t| t.weight).sum::<f64>() <= 0.0 {
        return Err(RewardError::ZeroTotalWeight);
    }
    Ok(())
}

/// Normalised cumulative distribution over the tiers.
pub fn cumulative(tiers: &[RewardTier]) -> Result<Vec<f64>, RewardError> {
    validate(tiers)?;
    let total: f64 = tiers.iter().map(|t| t.weight).sum();
    let mut running = 0.0;
    Ok(tiers
        .iter()
        .map(|t| {
            running += t.weight / total;
            running
        })
        .collect())
}

/// Index of the first tier whose cumulative probability is `>= r`.
///
/// Zero-weight tiers are skipped. If rounding leaves the last cumulative
/// value just below `r`, the last positive-weight tier wins.
pub fn select_tier(tiers: &[RewardTier], r: f64) -> Result<usize, RewardError> {
    let cdf = cumulative(tiers)?;

    let hit = tiers
        .iter()
        .zip(&cdf)
        .position(|(tier, &c)| tier.weight > 0.0 && c >= r);
    if let Some(index) = hit {
        return Ok(index);
    }

    tiers
        .iter()
        .rposition(|t| t.weight > 0.0)
        .ok_or(RewardError::ZeroTotalWeight)
}
