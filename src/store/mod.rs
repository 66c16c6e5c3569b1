use async_trait::async_trait;
use thiserror::Error;

use crate::types::SettlementRecord;

pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A record for this market already exists. The unique key on market_id
    /// is the authoritative at-most-once guarantee for settlements.
    #[error("settlement record already exists for market {0}")]
    Duplicate(u64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt settlement data: {0}")]
    Corrupt(String),
}

/// Append-only persistence for settlement records, keyed by market id.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn exists(&self, market_id: u64) -> Result<bool, StoreError>;

    /// Insert a complete record; fails with [`StoreError::Duplicate`] if one
    /// already exists for the market.
    async fn insert(&self, record: &SettlementRecord) -> Result<(), StoreError>;

    async fn find_by_market(&self, market_id: u64)
    -> Result<Option<SettlementRecord>, StoreError>;

    /// Records whose participant outcomes include the given address.
    async fn find_by_participant(&self, address: &str)
    -> Result<Vec<SettlementRecord>, StoreError>;
}
