//! Operator commands against the claim store

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Subcommand;
use tracing::{info, warn};

use claim_engine::{ClaimConfig, ClaimStore, EligibilityTracker, ReferralAttributor};
use quest_core::reward::wheel;
use quest_core::{
    canonical_participant, EligibilityState, InventoryItem, ParticipantStats, Quest,
    StdRngSampler, UnitSampler,
};

/// Claim node commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import quest definitions from a JSON array
    ImportQuests {
        /// JSON file holding an array of quests
        file: PathBuf,
    },

    /// Show whether a participant may claim a quest now
    Eligibility {
        quest_id: String,
        participant_id: String,
    },

    /// Top participants by XP
    Leaderboard {
        /// Number of rows to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Items a participant holds
    Inventory { participant_id: String },

    /// Record the referral carried by a share link
    CaptureReferral {
        participant_id: String,
        /// Share link, query string or bare referrer id
        payload: String,
        /// Quest on screen, required for a bare referrer id
        #[arg(short, long)]
        quest: Option<String>,
    },

    /// Map a wheel rotation to its segment, or spin one
    Wheel {
        /// Number of equal segments
        #[arg(short, long)]
        segments: usize,
        /// Terminal rotation in degrees; spins with the configured RNG if absent
        #[arg(short, long)]
        rotation: Option<f64>,
    },

    /// Print the effective engine configuration as YAML
    ShowConfig,
}

/// What commands run against.
pub struct NodeContext {
    pub store: Arc<dyn ClaimStore>,
    pub config: ClaimConfig,
}

/// Execute a command and return its printable output.
pub async fn execute(ctx: &NodeContext, command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::ImportQuests { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let quests: Vec<Quest> = serde_json::from_str(&content)
                .with_context(|| format!("parsing quests from {}", file.display()))?;
            import_quests(ctx, quests).await
        }

        Commands::Eligibility {
            quest_id,
            participant_id,
        } => {
            let quest = ctx
                .store
                .get_quest(&quest_id)
                .await?
                .with_context(|| format!("quest {quest_id} not found"))?;
            let tracker = EligibilityTracker::new(ctx.store.clone());
            match tracker.check(&quest, &participant_id, Utc::now()).await {
                Ok(state) => Ok(format_eligibility(&quest_id, &state)),
                Err(e) => Ok(format!("{quest_id}: not claimable ({e})")),
            }
        }

        Commands::Leaderboard { limit } => {
            let board = ctx.store.leaderboard(limit).await?;
            Ok(format_leaderboard(&board))
        }

        Commands::Inventory { participant_id } => {
            let participant_id = canonical_participant(&participant_id);
            let items = ctx.store.inventory(&participant_id).await?;
            Ok(format_inventory(&participant_id, &items))
        }

        Commands::CaptureReferral {
            participant_id,
            payload,
            quest,
        } => {
            let attributor = ReferralAttributor::new(ctx.store.clone());
            let captured = attributor
                .record_quest_view(&participant_id, &payload, quest.as_deref(), Utc::now())
                .await
                .context("capturing referral")?;
            Ok(match captured {
                Some(capture) => format!(
                    "Captured {} as referrer of {} for {}",
                    capture.referrer_id, capture.participant_id, capture.quest_id
                ),
                None => "Referral already captured; kept the first".to_string(),
            })
        }

        Commands::Wheel { segments, rotation } => {
            if segments == 0 {
                bail!("a wheel needs at least one segment");
            }
            let rotation = match rotation {
                Some(deg) => deg,
                None => {
                    let sampler = match ctx.config.reward.rng_seed {
                        Some(seed) => StdRngSampler::seeded(seed),
                        None => StdRngSampler::from_entropy(),
                    };
                    wheel::terminal_rotation(
                        ctx.config.reward.wheel_minimum_full_turns,
                        sampler.sample(),
                    )
                }
            };
            let index = wheel::segment_index(rotation, segments)
                .with_context(|| format!("rotation {rotation} is not a finite angle"))?;
            Ok(format!("rotation {rotation:.2}° → segment {index} of {segments}"))
        }

        Commands::ShowConfig => Ok(ctx.config.to_yaml()?),
    }
}

async fn import_quests(ctx: &NodeContext, quests: Vec<Quest>) -> anyhow::Result<String> {
    let mut imported = 0;
    let mut skipped = Vec::new();

    for quest in quests {
        if let Err(e) = quest.validate() {
            warn!(quest_id = %quest.quest_id, error = %e, "Skipping invalid quest");
            skipped.push(format!("{}: {e}", quest.quest_id));
            continue;
        }
        ctx.store
            .put_quest(&quest)
            .await
            .with_context(|| format!("storing quest {}", quest.quest_id))?;
        imported += 1;
    }

    info!(imported, skipped = skipped.len(), "Quest import finished");

    let mut output = format!("Imported {imported} quest(s)");
    for line in skipped {
        output.push_str(&format!("\n  skipped {line}"));
    }
    Ok(output)
}

fn format_eligibility(quest_id: &str, state: &EligibilityState) -> String {
    match state {
        EligibilityState::NeverClaimed => format!("{quest_id}: eligible (never claimed)"),
        EligibilityState::EligibleAgain => format!("{quest_id}: eligible again"),
        EligibilityState::LockedUntil {
            until,
            retry_after_secs,
        } => format!(
            "{quest_id}: locked until {} (retry in {retry_after_secs}s)",
            until.to_rfc3339()
        ),
        EligibilityState::TerminalClaimed => format!("{quest_id}: already claimed"),
    }
}

fn format_leaderboard(board: &[ParticipantStats]) -> String {
    if board.is_empty() {
        return "No participants yet".to_string();
    }
    let mut output = format!(
        "{:<4} {:<44} {:>10} {:>8} {:>10}",
        "#", "PARTICIPANT", "XP", "QUESTS", "REF EARN"
    );
    for (rank, stats) in board.iter().enumerate() {
        output.push_str(&format!(
            "\n{:<4} {:<44} {:>10} {:>8} {:>10}",
            rank + 1,
            stats.participant_id,
            stats.xp_total,
            stats.quests_completed,
            stats.referral_earnings
        ));
    }
    output
}

fn format_inventory(participant_id: &str, items: &[InventoryItem]) -> String {
    if items.is_empty() {
        return format!("{participant_id} holds no items");
    }
    let mut output = format!("Inventory of {participant_id}:");
    for item in items {
        output.push_str(&format!("\n  {} x{}", item.item, item.quantity));
    }
    output
}
