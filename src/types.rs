use chrono::{DateTime, Utc};
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of a market the majority (or a voter) landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Side::Yes),
            "no" => Ok(Side::No),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// Point-in-time view of a market as the ledger reports it. Never cached:
/// every settlement decision re-fetches a fresh snapshot.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub id: u64,
    pub creator: String,
    pub deadline: DateTime<Utc>,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub total_staked: U256,
    pub active: bool,
    pub metadata: String,
}

impl MarketSnapshot {
    /// Seconds until the voting deadline; non-positive once the market is
    /// eligible for settlement.
    pub fn time_left(&self, now: DateTime<Utc>) -> i64 {
        (self.deadline - now).num_seconds()
    }
}

/// One voter's stake as reported by the ledger.
#[derive(Debug, Clone)]
pub struct VoterStake {
    pub address: String,
    pub side: Side,
    pub stake: U256,
}

/// Per-voter outcome embedded in a settlement record. Amounts are decimal
/// strings so no precision is lost between the chain and the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantOutcome {
    pub address: String,
    pub side: Side,
    pub stake: String,
    pub payout: String,
    pub won: bool,
}

/// Durable audit entry written exactly once per market, after the finalize
/// transaction has confirmed. Never mutated or deleted.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementRecord {
    pub id: Uuid,
    pub market_id: u64,
    pub creator: String,
    pub deadline: DateTime<Utc>,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub total_staked: String,
    pub winner_side: Side,
    pub creator_reward: String,
    pub voter_reward_pool: String,
    pub tx_hash: String,
    pub block_height: u64,
    pub gas_used: String,
    pub settled_at: DateTime<Utc>,
    pub participants: Option<Vec<ParticipantOutcome>>,
}

/// Read-only view served by the status endpoint. Safe to compute at any time,
/// including while a scan is running.
#[derive(Debug, Clone, Serialize)]
pub struct StatusProjection {
    pub market_id: u64,
    pub active: bool,
    pub time_left_secs: i64,
    pub ready_for_settlement: bool,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub total_staked: String,
}
