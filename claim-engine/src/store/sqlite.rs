//! SQLite-backed claim store.
//!
//! Quests, claim records, leaderboard aggregates, inventories and referral
//! captures live in one database. Each upsert runs in a single transaction
//! so a claim record and its counters land together or not at all.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use quest_core::{
    ClaimRecord, InventoryItem, ParticipantStats, Quest, RawClaimRow, RecordError, ReferralCapture,
};

use super::traits::*;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS quests (
    quest_id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    max_claims INTEGER NOT NULL,
    claims_made INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS claims (
    quest_id TEXT NOT NULL,
    participant_id TEXT NOT NULL,
    transaction_id TEXT NOT NULL,
    claimed_at INTEGER NOT NULL,
    xp_granted INTEGER NOT NULL,
    reward TEXT NOT NULL,
    referrer_id TEXT,
    referral_bonus INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (quest_id, participant_id, transaction_id)
);
CREATE INDEX IF NOT EXISTS claims_by_pair ON claims (quest_id, participant_id, claimed_at);
CREATE TABLE IF NOT EXISTS participant_stats (
    participant_id TEXT PRIMARY KEY,
    xp_total INTEGER NOT NULL DEFAULT 0,
    quests_completed INTEGER NOT NULL DEFAULT 0,
    referral_earnings INTEGER NOT NULL DEFAULT 0,
    referrals INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS inventory (
    participant_id TEXT NOT NULL,
    item TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    PRIMARY KEY (participant_id, item)
);
CREATE TABLE IF NOT EXISTS referral_captures (
    quest_id TEXT NOT NULL,
    participant_id TEXT NOT NULL,
    referrer_id TEXT NOT NULL,
    captured_at INTEGER NOT NULL,
    PRIMARY KEY (quest_id, participant_id)
);
";

const CLAIM_COLUMNS: &str = "quest_id, participant_id, transaction_id, claimed_at, xp_granted, \
                             reward, referrer_id, referral_bonus";

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

fn to_db_int(field: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| {
        StoreError::Backend(format!("{field} value {value} exceeds SQLite integer range"))
    })
}

fn from_db_int(field: &'static str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| {
        StoreError::Malformed(RecordError::Malformed {
            field,
            reason: format!("is negative ({value})"),
        })
    })
}

fn raw_claim_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawClaimRow> {
    Ok(RawClaimRow {
        quest_id: row.get(0)?,
        participant_id: row.get(1)?,
        transaction_id: row.get(2)?,
        claimed_at: row.get(3)?,
        xp_granted: row.get(4)?,
        reward: row.get(5)?,
        referrer_id: row.get(6)?,
        referral_bonus: row.get(7)?,
    })
}

fn stats_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, i64, i64, i64, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn to_stats(raw: (String, i64, i64, i64, i64)) -> Result<ParticipantStats, StoreError> {
    let (participant_id, xp, completed, earnings, referrals) = raw;
    Ok(ParticipantStats {
        participant_id,
        xp_total: from_db_int("xp_total", xp)?,
        quests_completed: from_db_int("quests_completed", completed)?,
        referral_earnings: from_db_int("referral_earnings", earnings)?,
        referrals: from_db_int("referrals", referrals)?,
    })
}

/// [`ClaimStore`] on a local SQLite database.
pub struct SqliteClaimStore {
    db: Mutex<Connection>,
}

impl SqliteClaimStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("creating {}: {e}", parent.display())))?;
        }
        let db = Connection::open(path)?;

        // Enable WAL mode for concurrent read access
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        db.execute_batch(SCHEMA)?;

        info!(path = %path.display(), "Claim store initialized");
        Ok(Self { db: Mutex::new(db) })
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Connection::open_in_memory()?;
        db.execute_batch(SCHEMA)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn query_claims(
        db: &Connection,
        quest_id: &str,
        participant_id: &str,
        newest_first: bool,
        limit: i64,
    ) -> Result<Vec<ClaimRecord>, StoreError> {
        let order = if newest_first { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {CLAIM_COLUMNS} FROM claims WHERE quest_id = ?1 AND participant_id = ?2 \
             ORDER BY claimed_at {order}, transaction_id {order} LIMIT ?3"
        );
        let mut stmt = db.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![quest_id, participant_id, limit], raw_claim_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|raw| ClaimRecord::try_from(raw).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl ClaimStore for SqliteClaimStore {
    async fn get_quest(&self, quest_id: &str) -> Result<Option<Quest>, StoreError> {
        let db = self.db.lock().await;
        let row: Option<(String, i64)> = db
            .query_row(
                "SELECT body, claims_made FROM quests WHERE quest_id = ?1",
                [quest_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((body, claims_made)) = row else {
            return Ok(None);
        };
        let mut quest: Quest = serde_json::from_str(&body).map_err(|e| {
            StoreError::Malformed(RecordError::Malformed {
                field: "quest.body",
                reason: e.to_string(),
            })
        })?;
        quest.claims_made = u32::try_from(claims_made).map_err(|_| {
            StoreError::Malformed(RecordError::Malformed {
                field: "quest.claims_made",
                reason: format!("is out of range ({claims_made})"),
            })
        })?;
        Ok(Some(quest))
    }

    async fn put_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        let body = serde_json::to_string(quest).map_err(|e| StoreError::Backend(e.to_string()))?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO quests (quest_id, body, max_claims, claims_made) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(quest_id) DO UPDATE SET body = excluded.body, max_claims = excluded.max_claims",
            params![quest.quest_id, body, quest.max_claims, quest.claims_made],
        )?;
        debug!(quest_id = %quest.quest_id, "Stored quest");
        Ok(())
    }

    async fn latest_claim(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Option<ClaimRecord>, StoreError> {
        let db = self.db.lock().await;
        Ok(Self::query_claims(&db, quest_id, participant_id, true, 1)?.pop())
    }

    async fn claims_for(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Vec<ClaimRecord>, StoreError> {
        let db = self.db.lock().await;
        Self::query_claims(&db, quest_id, participant_id, false, -1)
    }

    async fn upsert_claim(&self, write: &ClaimWrite) -> Result<UpsertOutcome, StoreError> {
        let record = &write.record;
        let counters = &write.counters;
        let reward = serde_json::to_string(&record.reward).map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;

        let inserted = tx.execute(
            &format!("INSERT OR IGNORE INTO claims ({CLAIM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                record.quest_id,
                record.participant_id,
                record.transaction_id,
                record.claimed_at.timestamp(),
                to_db_int("xp_granted", record.xp_granted)?,
                reward,
                record.referrer_id,
                to_db_int("referral_bonus", record.referral_bonus)?,
            ],
        )?;
        if inserted == 0 {
            tx.commit()?;
            return Ok(UpsertOutcome::AlreadyExisted);
        }

        let bumped = tx.execute(
            "UPDATE quests SET claims_made = claims_made + 1
             WHERE quest_id = ?1 AND claims_made < MIN(max_claims, ?2)",
            params![counters.quest_id, counters.max_claims],
        )?;
        if bumped == 0 {
            warn!(quest_id = %counters.quest_id, "claims_made not advanced (unknown quest or at cap)");
        }

        tx.execute(
            "INSERT INTO participant_stats (participant_id, xp_total, quests_completed) VALUES (?1, ?2, 1)
             ON CONFLICT(participant_id) DO UPDATE SET
                 xp_total = xp_total + excluded.xp_total,
                 quests_completed = quests_completed + 1",
            params![counters.participant_id, to_db_int("xp", counters.xp)?],
        )?;

        if let Some(item) = &counters.item {
            tx.execute(
                "INSERT INTO inventory (participant_id, item, quantity) VALUES (?1, ?2, 1)
                 ON CONFLICT(participant_id, item) DO UPDATE SET quantity = quantity + 1",
                params![counters.participant_id, item],
            )?;
        }

        if let Some(referrer) = &counters.referrer_id {
            tx.execute(
                "INSERT INTO participant_stats (participant_id, referral_earnings, referrals) VALUES (?1, ?2, 1)
                 ON CONFLICT(participant_id) DO UPDATE SET
                     referral_earnings = referral_earnings + excluded.referral_earnings,
                     referrals = referrals + 1",
                params![referrer, to_db_int("referral_bonus", counters.referral_bonus)?],
            )?;
        }

        tx.commit()?;
        debug!(
            quest_id = %record.quest_id,
            participant_id = %record.participant_id,
            transaction_id = %record.transaction_id,
            "Claim recorded"
        );
        Ok(UpsertOutcome::Inserted)
    }

    async fn participant_stats(
        &self,
        participant_id: &str,
    ) -> Result<Option<ParticipantStats>, StoreError> {
        let db = self.db.lock().await;
        let raw = db
            .query_row(
                "SELECT participant_id, xp_total, quests_completed, referral_earnings, referrals
                 FROM participant_stats WHERE participant_id = ?1",
                [participant_id],
                stats_row,
            )
            .optional()?;
        raw.map(to_stats).transpose()
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<ParticipantStats>, StoreError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare_cached(
            "SELECT participant_id, xp_total, quests_completed, referral_earnings, referrals
             FROM participant_stats
             ORDER BY xp_total DESC, quests_completed DESC, participant_id ASC
             LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map([limit], stats_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(to_stats).collect()
    }

    async fn inventory(&self, participant_id: &str) -> Result<Vec<InventoryItem>, StoreError> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare_cached(
            "SELECT item, quantity FROM inventory WHERE participant_id = ?1 ORDER BY item",
        )?;
        let rows = stmt
            .query_map([participant_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(item, quantity)| {
                Ok(InventoryItem {
                    item,
                    quantity: from_db_int("quantity", quantity)?,
                })
            })
            .collect()
    }

    async fn save_referral_capture(&self, capture: &ReferralCapture) -> Result<bool, StoreError> {
        let db = self.db.lock().await;
        let inserted = db.execute(
            "INSERT OR IGNORE INTO referral_captures (quest_id, participant_id, referrer_id, captured_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                capture.quest_id,
                capture.participant_id,
                capture.referrer_id,
                capture.captured_at.timestamp(),
            ],
        )?;
        Ok(inserted == 1)
    }

    async fn referral_capture(
        &self,
        quest_id: &str,
        participant_id: &str,
    ) -> Result<Option<ReferralCapture>, StoreError> {
        let db = self.db.lock().await;
        let row: Option<(String, String, String, i64)> = db
            .query_row(
                "SELECT quest_id, participant_id, referrer_id, captured_at
                 FROM referral_captures WHERE quest_id = ?1 AND participant_id = ?2",
                params![quest_id, participant_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        row.map(|(quest_id, participant_id, referrer_id, secs)| {
            let captured_at = chrono::DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                StoreError::Malformed(RecordError::Malformed {
                    field: "captured_at",
                    reason: format!("is out of range ({secs})"),
                })
            })?;
            Ok(ReferralCapture {
                quest_id,
                participant_id,
                referrer_id,
                captured_at,
            })
        })
        .transpose()
    }
}
