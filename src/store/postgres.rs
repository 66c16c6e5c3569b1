use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{SettlementStore, StoreError};
use crate::types::{ParticipantOutcome, SettlementRecord, Side};

/// Postgres-backed settlement store. The `settlements` table carries a UNIQUE
/// constraint on market_id as the backstop against double-settlement.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent schema bootstrap, run once at startup.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settlements (
                id UUID PRIMARY KEY,
                market_id BIGINT NOT NULL UNIQUE,
                creator TEXT NOT NULL,
                deadline TIMESTAMPTZ NOT NULL,
                yes_votes BIGINT NOT NULL,
                no_votes BIGINT NOT NULL,
                total_staked TEXT NOT NULL,
                winner_side TEXT NOT NULL,
                creator_reward TEXT NOT NULL,
                voter_reward_pool TEXT NOT NULL,
                tx_hash TEXT NOT NULL,
                block_height BIGINT NOT NULL,
                gas_used TEXT NOT NULL,
                settled_at TIMESTAMPTZ NOT NULL,
                participants JSONB
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_record(row: &PgRow) -> Result<SettlementRecord, StoreError> {
    let winner: String = row.try_get("winner_side")?;
    let winner_side = winner.parse::<Side>().map_err(StoreError::Corrupt)?;

    let participants: Option<serde_json::Value> = row.try_get("participants")?;
    let participants = participants
        .map(serde_json::from_value::<Vec<ParticipantOutcome>>)
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("participant outcomes not decodable: {e}")))?;

    Ok(SettlementRecord {
        id: row.try_get("id")?,
        market_id: row.try_get::<i64, _>("market_id")? as u64,
        creator: row.try_get("creator")?,
        deadline: row.try_get("deadline")?,
        yes_votes: row.try_get::<i64, _>("yes_votes")? as u64,
        no_votes: row.try_get::<i64, _>("no_votes")? as u64,
        total_staked: row.try_get("total_staked")?,
        winner_side,
        creator_reward: row.try_get("creator_reward")?,
        voter_reward_pool: row.try_get("voter_reward_pool")?,
        tx_hash: row.try_get("tx_hash")?,
        block_height: row.try_get::<i64, _>("block_height")? as u64,
        gas_used: row.try_get("gas_used")?,
        settled_at: row.try_get("settled_at")?,
        participants,
    })
}

#[async_trait]
impl SettlementStore for PgStore {
    async fn exists(&self, market_id: u64) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM settlements WHERE market_id = $1")
            .bind(market_id as i64)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn insert(&self, record: &SettlementRecord) -> Result<(), StoreError> {
        let participants = record
            .participants
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("participant outcomes not serializable: {e}")))?;

        let result = sqlx::query(
            r#"
            INSERT INTO settlements
            (id, market_id, creator, deadline, yes_votes, no_votes, total_staked,
             winner_side, creator_reward, voter_reward_pool, tx_hash, block_height,
             gas_used, settled_at, participants)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(record.id)
        .bind(record.market_id as i64)
        .bind(&record.creator)
        .bind(record.deadline)
        .bind(record.yes_votes as i64)
        .bind(record.no_votes as i64)
        .bind(&record.total_staked)
        .bind(record.winner_side.as_str())
        .bind(&record.creator_reward)
        .bind(&record.voter_reward_pool)
        .bind(&record.tx_hash)
        .bind(record.block_height as i64)
        .bind(&record.gas_used)
        .bind(record.settled_at)
        .bind(participants)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some("23505") {
                        return Err(StoreError::Duplicate(record.market_id));
                    }
                }
                Err(StoreError::Database(e))
            }
        }
    }

    async fn find_by_market(
        &self,
        market_id: u64,
    ) -> Result<Option<SettlementRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM settlements WHERE market_id = $1")
            .bind(market_id as i64)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_by_participant(
        &self,
        address: &str,
    ) -> Result<Vec<SettlementRecord>, StoreError> {
        let needle = serde_json::json!([{ "address": address }]);

        let rows = sqlx::query(
            r#"
            SELECT * FROM settlements
            WHERE participants @> $1
            ORDER BY settled_at ASC
            "#,
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}
