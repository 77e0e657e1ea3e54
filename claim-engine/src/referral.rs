//! Referral capture and attribution.
//!
//! A referral is captured when the participant first views a quest and is
//! kept in the store, so it survives restarts. At claim time the stored
//! capture wins over any code sent with the request. Nothing in here can
//! fail a claim: problems are logged and the claim proceeds without credit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use quest_core::referral::validate_referrer;
use quest_core::{canonical_participant, Quest, ReferralCapture, ReferralError, ReferralLink};

use crate::error::ClaimError;
use crate::store::ClaimStore;

/// Resolves and validates the optional referrer of a claim.
#[derive(Clone)]
pub struct ReferralAttributor {
    store: Arc<dyn ClaimStore>,
}

impl ReferralAttributor {
    pub fn new(store: Arc<dyn ClaimStore>) -> Self {
        Self { store }
    }

    /// Remember the referral carried by `payload` for this participant.
    ///
    /// `viewed_quest` names the quest on screen; it is required when the
    /// payload is a bare referral code. Returns `Ok(None)` if a referral
    /// was already captured for the pair (first capture wins).
    pub async fn record_quest_view(
        &self,
        participant_id: &str,
        payload: &str,
        viewed_quest: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<ReferralCapture>, ClaimError> {
        let participant_id = canonical_participant(participant_id);
        let link = ReferralLink::parse(payload)?;

        let quest_id = match (link.quest_id.as_deref(), viewed_quest) {
            (Some(linked), Some(viewed)) if linked != viewed => {
                return Err(ReferralError::QuestMismatch {
                    captured: linked.to_string(),
                    claimed: viewed.to_string(),
                }
                .into());
            }
            (Some(linked), _) => linked.to_string(),
            (None, Some(viewed)) => viewed.to_string(),
            (None, None) => {
                return Err(ClaimError::InvalidReferral(
                    "referral code without a quest".to_string(),
                ))
            }
        };

        if link.referrer_id == participant_id {
            return Err(ReferralError::SelfReferral.into());
        }

        let capture = ReferralCapture {
            quest_id,
            participant_id,
            referrer_id: link.referrer_id,
            captured_at: now,
        };

        if self.store.save_referral_capture(&capture).await? {
            info!(
                quest_id = %capture.quest_id,
                participant_id = %capture.participant_id,
                referrer_id = %capture.referrer_id,
                "Referral captured"
            );
            Ok(Some(capture))
        } else {
            debug!(
                quest_id = %capture.quest_id,
                participant_id = %capture.participant_id,
                "Referral already captured, keeping the first"
            );
            Ok(None)
        }
    }

    /// Pick the referrer for a claim, or `None`.
    ///
    /// Uses the stored capture first, then `request_code`.
    pub async fn resolve(
        &self,
        quest: &Quest,
        participant_id: &str,
        request_code: Option<&str>,
    ) -> Option<String> {
        let participant_id = canonical_participant(participant_id);

        match self.store.referral_capture(&quest.quest_id, &participant_id).await {
            Ok(Some(capture)) => {
                match validate_referrer(
                    quest,
                    &participant_id,
                    &capture.referrer_id,
                    Some(&capture.quest_id),
                ) {
                    Ok(referrer) => return Some(referrer),
                    Err(e) => warn!(
                        quest_id = %quest.quest_id,
                        participant_id = %participant_id,
                        error = %e,
                        "Ignoring stored referral"
                    ),
                }
            }
            Ok(None) => {}
            Err(e) => warn!(
                quest_id = %quest.quest_id,
                error = %e,
                "Referral lookup failed"
            ),
        }

        let code = request_code.map(str::trim).filter(|c| !c.is_empty())?;
        let resolved = ReferralLink::parse(code).and_then(|link| {
            validate_referrer(
                quest,
                &participant_id,
                &link.referrer_id,
                link.quest_id.as_deref(),
            )
        });
        match resolved {
            Ok(referrer) => Some(referrer),
            Err(e) => {
                warn!(
                    quest_id = %quest.quest_id,
                    participant_id = %participant_id,
                    error = %e,
                    "Ignoring invalid referral"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryClaimStore;
    use quest_core::{Payout, RewardDescriptor};

    fn quest() -> Quest {
        Quest::new(
            "q-1",
            RewardDescriptor::Fixed {
                payout: Payout::new("Coin", 10, 1_000),
            },
            10,
        )
        .with_referral_bps(500)
    }

    fn attributor() -> (Arc<MemoryClaimStore>, ReferralAttributor) {
        let store = Arc::new(MemoryClaimStore::new());
        (store.clone(), ReferralAttributor::new(store))
    }

    #[tokio::test]
    async fn test_first_capture_wins() {
        let (_, attributor) = attributor();
        let now = Utc::now();

        let first = attributor
            .record_quest_view("0xBOB", "questclaim://claim?quest=q-1&ref=0xAlice", None, now)
            .await
            .unwrap();
        assert_eq!(first.unwrap().referrer_id, "0xalice");

        let second = attributor
            .record_quest_view("0xbob", "quest=q-1&ref=0xcarol", None, now)
            .await
            .unwrap();
        assert!(second.is_none());

        let referrer = attributor.resolve(&quest(), "0xbob", Some("0xcarol")).await;
        assert_eq!(referrer.as_deref(), Some("0xalice"));
    }

    #[tokio::test]
    async fn test_capture_rejects_self_referral_and_bare_code() {
        let (_, attributor) = attributor();
        let now = Utc::now();

        let selfie = attributor
            .record_quest_view("0xbob", "quest=q-1&ref=0xBOB", None, now)
            .await;
        assert!(matches!(selfie, Err(ClaimError::InvalidReferral(_))));

        let bare = attributor.record_quest_view("0xbob", "0xalice", None, now).await;
        assert!(matches!(bare, Err(ClaimError::InvalidReferral(_))));

        let viewed = attributor
            .record_quest_view("0xbob", "0xalice", Some("q-1"), now)
            .await
            .unwrap();
        assert_eq!(viewed.unwrap().quest_id, "q-1");
    }

    #[tokio::test]
    async fn test_request_code_fallback() {
        let (_, attributor) = attributor();
        let q = quest();

        assert_eq!(
            attributor.resolve(&q, "0xbob", Some("ref=0xalice")).await.as_deref(),
            Some("0xalice")
        );
        assert_eq!(attributor.resolve(&q, "0xbob", Some("0xBob")).await, None);
        assert_eq!(attributor.resolve(&q, "0xbob", Some("quest=other&ref=0xalice")).await, None);
        assert_eq!(attributor.resolve(&q, "0xbob", None).await, None);
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades() {
        let (store, attributor) = attributor();
        store.set_available(false);
        assert_eq!(
            attributor.resolve(&quest(), "0xbob", Some("0xalice")).await.as_deref(),
            Some("0xalice")
        );
    }
}
