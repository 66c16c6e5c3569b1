//! The settlement engine: decides which markets have crossed their deadline,
//! drives each one through finalize-and-confirm exactly once, and persists
//! the audit record.

use std::sync::Arc;

use chrono::Utc;
use ethers::types::U256;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ledger::{LedgerError, LedgerGateway};
use crate::store::{SettlementStore, StoreError};
use crate::types::{MarketSnapshot, SettlementRecord, StatusProjection};

pub mod rewards;

#[derive(Debug, Error)]
pub enum SettleError {
    #[error("snapshot fetch failed: {0}")]
    Snapshot(#[source] LedgerError),
    #[error("gas estimation failed: {0}")]
    Estimation(#[source] LedgerError),
    #[error("finalize submission failed: {0}")]
    Submission(#[source] LedgerError),
    #[error("a settlement record already exists for market {0}")]
    AlreadyRecorded(u64),
    /// The finalize confirmed on-chain but the record insert failed, leaving
    /// a settled market with no audit entry. Alertable; see the error log.
    #[error(
        "market {market_id} finalized on-chain (tx {tx_hash}) but the settlement record could not be persisted: {source}"
    )]
    AuditGap {
        market_id: u64,
        tx_hash: String,
        #[source]
        source: StoreError,
    },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SettleError {
    /// Losing a race against a concurrent settle (scheduled vs manual) is an
    /// expected outcome, not a fault.
    pub fn is_benign(&self) -> bool {
        match self {
            SettleError::AlreadyRecorded(_) => true,
            SettleError::Estimation(e) | SettleError::Submission(e) => e.is_benign_race(),
            _ => false,
        }
    }
}

/// Per-scan tally, logged when the scan finishes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub scanned: u64,
    pub settled: u64,
    pub skipped_inactive: u64,
    pub skipped_pending: u64,
    pub skipped_raced: u64,
    pub read_failures: u64,
    pub settle_failures: u64,
}

#[derive(Debug)]
pub enum ScanOutcome {
    /// Another scan already held the lock; this tick did nothing.
    Skipped,
    Completed(ScanSummary),
    /// Market enumeration itself failed; nothing was attempted.
    Aborted(LedgerError),
}

pub struct SettlementEngine {
    ledger: Arc<dyn LedgerGateway>,
    store: Arc<dyn SettlementStore>,
    gas_margin_pct: u64,
    // Guards scheduled scans against each other. Manual settles do not take
    // it; their double-settlement guard is the ledger precondition plus the
    // store's unique key.
    scan_lock: Mutex<()>,
}

impl SettlementEngine {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        store: Arc<dyn SettlementStore>,
        gas_margin_pct: u64,
    ) -> Self {
        Self {
            ledger,
            store,
            gas_margin_pct,
            scan_lock: Mutex::new(()),
        }
    }

    /// Scheduler entry point. Skips without side effects when a scan is
    /// already in flight; the guard releases the lock on every exit path.
    pub async fn run_scheduled_scan(&self) -> ScanOutcome {
        let Ok(_guard) = self.scan_lock.try_lock() else {
            info!("scan already in flight, skipping this tick");
            return ScanOutcome::Skipped;
        };

        match self.scan().await {
            Ok(summary) => ScanOutcome::Completed(summary),
            Err(e) => ScanOutcome::Aborted(e),
        }
    }

    /// One pass over every market, in increasing index order. A single
    /// market's failure never aborts the pass; only a failed enumeration
    /// does. Finalizes are awaited to confirmation one at a time so this
    /// process never has more than one ledger transaction in flight.
    async fn scan(&self) -> Result<ScanSummary, LedgerError> {
        let count = self.ledger.market_count().await?;
        let mut summary = ScanSummary::default();

        debug!(markets = count, "scan started");

        for market_id in 0..count {
            summary.scanned += 1;

            let snapshot = match self.ledger.market(market_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(market_id, error = %e, "snapshot fetch failed, skipping market");
                    summary.read_failures += 1;
                    continue;
                }
            };

            if !snapshot.active {
                summary.skipped_inactive += 1;
                continue;
            }

            if snapshot.time_left(Utc::now()) > 0 {
                summary.skipped_pending += 1;
                continue;
            }

            match self.finalize_and_record(&snapshot).await {
                Ok(()) => summary.settled += 1,
                Err(e) if e.is_benign() => {
                    debug!(market_id, reason = %e, "settlement raced, already handled elsewhere");
                    summary.skipped_raced += 1;
                }
                Err(e) => {
                    self.log_settle_failure(market_id, &e);
                    summary.settle_failures += 1;
                }
            }
        }

        info!(
            scanned = summary.scanned,
            settled = summary.settled,
            read_failures = summary.read_failures,
            settle_failures = summary.settle_failures,
            "scan finished"
        );

        Ok(summary)
    }

    /// Finalize one market on the ledger and persist its settlement record.
    /// All-or-nothing from the store's perspective: either the complete
    /// record is inserted after confirmation, or nothing is written.
    async fn finalize_and_record(&self, snapshot: &MarketSnapshot) -> Result<(), SettleError> {
        let market_id = snapshot.id;

        if self.store.exists(market_id).await? {
            return Err(SettleError::AlreadyRecorded(market_id));
        }

        let estimate = self
            .ledger
            .estimate_finalize(market_id)
            .await
            .map_err(SettleError::Estimation)?;
        // Safety margin against gas fluctuation between estimate and submit.
        let gas_limit = estimate * U256::from(100 + self.gas_margin_pct) / U256::from(100u64);

        let receipt = self
            .ledger
            .finalize(market_id, gas_limit)
            .await
            .map_err(SettleError::Submission)?;

        info!(
            market_id,
            tx_hash = %receipt.tx_hash,
            block = receipt.block_height,
            "market finalized on-chain"
        );

        let winner = rewards::winning_side(snapshot.yes_votes, snapshot.no_votes);
        let (creator_reward, voter_reward_pool) = rewards::split_rewards(snapshot.total_staked);

        // Participant outcomes are best-effort; settlement never blocks on them.
        let participants = match self.ledger.voters(market_id).await {
            Ok(voters) => Some(rewards::participant_outcomes(
                &voters,
                winner,
                voter_reward_pool,
            )),
            Err(e) => {
                warn!(
                    market_id,
                    error = %e,
                    "voter enumeration failed, recording settlement without participant outcomes"
                );
                None
            }
        };

        let record = SettlementRecord {
            id: Uuid::new_v4(),
            market_id,
            creator: snapshot.creator.clone(),
            deadline: snapshot.deadline,
            yes_votes: snapshot.yes_votes,
            no_votes: snapshot.no_votes,
            total_staked: snapshot.total_staked.to_string(),
            winner_side: winner,
            creator_reward: creator_reward.to_string(),
            voter_reward_pool: voter_reward_pool.to_string(),
            tx_hash: receipt.tx_hash.clone(),
            block_height: receipt.block_height,
            gas_used: receipt.gas_used.to_string(),
            settled_at: Utc::now(),
            participants,
        };

        match self.store.insert(&record).await {
            Ok(()) => {
                info!(market_id, winner = %winner, "settlement record persisted");
                Ok(())
            }
            Err(StoreError::Duplicate(_)) => Err(SettleError::AlreadyRecorded(market_id)),
            Err(e) => Err(SettleError::AuditGap {
                market_id,
                tx_hash: receipt.tx_hash,
                source: e,
            }),
        }
    }

    /// Operator-forced settlement. Fetches a fresh snapshot and bypasses the
    /// deadline check; whether forcing is appropriate is the caller's call.
    /// Returns false when the market turned out to be settled already.
    pub async fn manual_settle(&self, market_id: u64) -> Result<bool, SettleError> {
        let snapshot = self
            .ledger
            .market(market_id)
            .await
            .map_err(SettleError::Snapshot)?;

        match self.finalize_and_record(&snapshot).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_benign() => {
                debug!(market_id, reason = %e, "manual settle found market already handled");
                Ok(false)
            }
            Err(e) => {
                self.log_settle_failure(market_id, &e);
                Err(e)
            }
        }
    }

    /// Read-only status projection; no side effects.
    pub async fn status(&self, market_id: u64) -> Result<StatusProjection, SettleError> {
        let snapshot = self
            .ledger
            .market(market_id)
            .await
            .map_err(SettleError::Snapshot)?;

        let time_left_secs = snapshot.time_left(Utc::now());

        Ok(StatusProjection {
            market_id,
            active: snapshot.active,
            time_left_secs,
            ready_for_settlement: time_left_secs <= 0 && snapshot.active,
            yes_votes: snapshot.yes_votes,
            no_votes: snapshot.no_votes,
            total_staked: snapshot.total_staked.to_string(),
        })
    }

    fn log_settle_failure(&self, market_id: u64, err: &SettleError) {
        match err {
            SettleError::Estimation(LedgerError::InsufficientFunds)
            | SettleError::Submission(LedgerError::InsufficientFunds) => {
                error!(market_id, "settlement wallet is out of funds, all settlements stalled");
            }
            SettleError::AuditGap { tx_hash, .. } => {
                error!(
                    market_id,
                    tx_hash = %tx_hash,
                    "market finalized on-chain without a settlement record"
                );
            }
            _ => {
                warn!(market_id, error = %err, "settlement attempt failed, will retry next scan");
            }
        }
    }
}
