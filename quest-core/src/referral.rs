//! Referral links and bonus attribution.
//!
//! A referral never blocks a claim: every failure here is a
//! [`ReferralError`] that callers log and then drop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{canonical_participant, Quest, MAX_BPS};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Reasons a referral is ignored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferralError {
    #[error("Referral payload could not be parsed: {0}")]
    Malformed(String),

    #[error("Referral payload has no referrer")]
    MissingReferrer,

    #[error("Participant cannot refer themselves")]
    SelfReferral,

    #[error("Referral was captured for quest {captured}, not {claimed}")]
    QuestMismatch { captured: String, claimed: String },
}

/// Decoded share payload: `(quest, referrer)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ReferralLink {
    /// Absent when only a bare referral code was shared
    pub quest_id: Option<String>,
    /// Canonical referrer id
    pub referrer_id: String,
}

impl ReferralLink {
    /// Parse a deep link (`questclaim://claim?quest=q1&ref=0xabc`), a bare
    /// query string (`quest=q1&ref=0xabc`) or a bare referrer code.
    pub fn parse(payload: &str) -> Result<Self, ReferralError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(ReferralError::MissingReferrer);
        }

        let query = match payload.split_once('?') {
            Some((_, query)) => query,
            None if payload.contains('=') => payload,
            None => {
                return Ok(Self {
                    quest_id: None,
                    referrer_id: canonical_participant(payload),
                })
            }
        };

        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| ReferralError::Malformed(e.to_string()))?;

        let mut quest_id = None;
        let mut referrer_id = None;
        for (key, value) in pairs {
            match key.as_str() {
                "quest" | "quest_id" => quest_id = Some(value),
                "ref" | "referrer" => referrer_id = Some(value),
                _ => {}
            }
        }

        let referrer_id = referrer_id
            .map(|r| canonical_participant(&r))
            .filter(|r| !r.is_empty())
            .ok_or(ReferralError::MissingReferrer)?;

        Ok(Self {
            quest_id: quest_id.filter(|q| !q.is_empty()),
            referrer_id,
        })
    }
}

/// A referral remembered from the moment a participant first viewed a quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ReferralCapture {
    pub quest_id: String,
    pub participant_id: String,
    pub referrer_id: String,
    pub captured_at: DateTime<Utc>,
}

/// Referrer credit recorded alongside the participant's reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ReferralCredit {
    pub referrer_id: String,
    pub bps: u32,
    pub bonus: u64,
}

/// `amount * bps / 10000`, rounded down, with bps capped at 100%.
pub fn referral_bonus(amount: u64, bps: u32) -> u64 {
    let bps = bps.min(MAX_BPS) as u128;
    (amount as u128 * bps / MAX_BPS as u128) as u64
}

/// Check a candidate referrer for `participant_id` on `quest`.
///
/// `captured_for` is the quest the referral was captured against, when known.
pub fn validate_referrer(
    quest: &Quest,
    participant_id: &str,
    referrer_id: &str,
    captured_for: Option<&str>,
) -> Result<String, ReferralError> {
    let referrer = canonical_participant(referrer_id);
    if referrer.is_empty() {
        return Err(ReferralError::MissingReferrer);
    }
    if referrer == canonical_participant(participant_id) {
        return Err(ReferralError::SelfReferral);
    }
    if let Some(captured) = captured_for {
        if captured != quest.quest_id {
            return Err(ReferralError::QuestMismatch {
                captured: captured.to_string(),
                claimed: quest.quest_id.clone(),
            });
        }
    }
    Ok(referrer)
}

/// Compute the credit for a validated referrer.
pub fn credit_for(quest: &Quest, referrer_id: String, granted_amount: u64) -> ReferralCredit {
    ReferralCredit {
        referrer_id,
        bps: quest.referral_bps,
        bonus: referral_bonus(granted_amount, quest.referral_bps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Payout, RewardDescriptor};

    fn quest() -> Quest {
        Quest::new(
            "q-1",
            RewardDescriptor::Fixed {
                payout: Payout::new("Coin", 10, 1_000),
            },
            10,
        )
        .with_referral_bps(250)
    }

    #[test]
    fn test_parse_deep_link() {
        let link = ReferralLink::parse("questclaim://claim?quest=q-1&ref=0xABC").unwrap();
        assert_eq!(link.quest_id.as_deref(), Some("q-1"));
        assert_eq!(link.referrer_id, "0xabc");
    }

    #[test]
    fn test_parse_query_and_bare_code() {
        let link = ReferralLink::parse("referrer=0xdef&quest_id=q-2").unwrap();
        assert_eq!(link.quest_id.as_deref(), Some("q-2"));
        assert_eq!(link.referrer_id, "0xdef");

        let bare = ReferralLink::parse(" 0xFEED ").unwrap();
        assert_eq!(bare.quest_id, None);
        assert_eq!(bare.referrer_id, "0xfeed");
    }

    #[test]
    fn test_parse_without_referrer() {
        assert_eq!(
            ReferralLink::parse("questclaim://claim?quest=q-1"),
            Err(ReferralError::MissingReferrer)
        );
        assert_eq!(ReferralLink::parse(""), Err(ReferralError::MissingReferrer));
    }

    #[test]
    fn test_bonus_math() {
        assert_eq!(referral_bonus(1_000, 250), 25);
        assert_eq!(referral_bonus(999, 1), 0);
        assert_eq!(referral_bonus(u64::MAX, 10_000), u64::MAX);
        assert_eq!(referral_bonus(100, 20_000), 100);
    }

    #[test]
    fn test_self_referral_rejected() {
        assert_eq!(
            validate_referrer(&quest(), "0xAbc", "0xabc", None),
            Err(ReferralError::SelfReferral)
        );
    }

    #[test]
    fn test_quest_mismatch_rejected() {
        assert!(matches!(
            validate_referrer(&quest(), "0xabc", "0xdef", Some("q-2")),
            Err(ReferralError::QuestMismatch { .. })
        ));
        let referrer = validate_referrer(&quest(), "0xabc", "0xDEF", Some("q-1")).unwrap();
        let credit = credit_for(&quest(), referrer, 1_000);
        assert_eq!(credit.referrer_id, "0xdef");
        assert_eq!(credit.bonus, 25);
    }
}
