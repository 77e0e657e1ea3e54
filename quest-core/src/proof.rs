//! Presence proofs for scan and verification quests.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{ClaimMode, Quest};

/// Proof failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    #[error("Claim proof required for this quest")]
    Missing,

    #[error("Claim proof does not match the quest")]
    Mismatch,
}

/// Evidence supplied with a claim request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimProof {
    /// Quest id decoded from a scanned QR code
    pub scanned_quest_id: Option<String>,
    /// Plaintext verification code
    pub verification_code: Option<String>,
}

impl ClaimProof {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn scanned(quest_id: impl Into<String>) -> Self {
        Self {
            scanned_quest_id: Some(quest_id.into()),
            verification_code: None,
        }
    }

    pub fn code(code: impl Into<String>) -> Self {
        Self {
            scanned_quest_id: None,
            verification_code: Some(code.into()),
        }
    }

    /// Check this proof against the quest's claim mode.
    pub fn verify(&self, quest: &Quest) -> Result<(), ProofError> {
        match quest.claim_mode {
            ClaimMode::Proximity => Ok(()),
            ClaimMode::Scan => {
                let scanned = self.scanned_quest_id.as_deref().ok_or(ProofError::Missing)?;
                if scanned.trim() == quest.quest_id {
                    Ok(())
                } else {
                    Err(ProofError::Mismatch)
                }
            }
            ClaimMode::Verification => {
                let code = self.verification_code.as_deref().ok_or(ProofError::Missing)?;
                let expected = quest.verification_hash.as_deref().ok_or(ProofError::Mismatch)?;
                if hash_verification_code(code).eq_ignore_ascii_case(expected.trim()) {
                    Ok(())
                } else {
                    Err(ProofError::Mismatch)
                }
            }
        }
    }
}

/// Hex SHA-256 of a trimmed verification code, as stored on the quest.
pub fn hash_verification_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().as_bytes());
    hex::encode(hasher.finalize())
}
