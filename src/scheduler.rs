//! Fixed-cadence trigger for settlement scans.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::engine::{ScanOutcome, SettlementEngine};

/// Fires a scan attempt on a fixed wall-clock cadence. A slow scan never
/// delays the next tick: every attempt runs as its own task, and the engine's
/// scan lock turns an overlapping attempt into a logged skip.
pub struct ScanScheduler {
    engine: Arc<SettlementEngine>,
    every: Duration,
    started: AtomicBool,
}

impl ScanScheduler {
    pub fn new(engine: Arc<SettlementEngine>, every: Duration) -> Self {
        Self {
            engine,
            every,
            started: AtomicBool::new(false),
        }
    }

    /// Idempotent: only the first call spawns the ticker, later calls return
    /// None and have no effect.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return None;
        }

        let engine = self.engine.clone();
        let every = self.every;

        Some(tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_secs = every.as_secs(), "settlement scan scheduler started");

            loop {
                ticker.tick().await;

                let engine = engine.clone();
                tokio::spawn(async move {
                    match engine.run_scheduled_scan().await {
                        ScanOutcome::Skipped | ScanOutcome::Completed(_) => {}
                        ScanOutcome::Aborted(e) => {
                            warn!(error = %e, "scan aborted, could not enumerate markets");
                        }
                    }
                });
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use async_trait::async_trait;
    use ethers::types::U256;

    use super::*;
    use crate::ledger::{FinalizeReceipt, LedgerError, LedgerGateway};
    use crate::store::{SettlementStore, StoreError};
    use crate::types::{MarketSnapshot, SettlementRecord, VoterStake};

    struct EmptyLedger;

    #[async_trait]
    impl LedgerGateway for EmptyLedger {
        async fn market_count(&self) -> Result<u64, LedgerError> {
            Ok(0)
        }
        async fn market(&self, id: u64) -> Result<MarketSnapshot, LedgerError> {
            Err(LedgerError::Rpc(anyhow!("no market {id}")))
        }
        async fn estimate_finalize(&self, _: u64) -> Result<U256, LedgerError> {
            Err(LedgerError::Rpc(anyhow!("nothing to estimate")))
        }
        async fn finalize(&self, _: u64, _: U256) -> Result<FinalizeReceipt, LedgerError> {
            Err(LedgerError::Rpc(anyhow!("nothing to finalize")))
        }
        async fn voters(&self, _: u64) -> Result<Vec<VoterStake>, LedgerError> {
            Ok(vec![])
        }
    }

    struct EmptyStore;

    #[async_trait]
    impl SettlementStore for EmptyStore {
        async fn exists(&self, _: u64) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn insert(&self, _: &SettlementRecord) -> Result<(), StoreError> {
            Ok(())
        }
        async fn find_by_market(&self, _: u64) -> Result<Option<SettlementRecord>, StoreError> {
            Ok(None)
        }
        async fn find_by_participant(&self, _: &str) -> Result<Vec<SettlementRecord>, StoreError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let engine = Arc::new(SettlementEngine::new(
            Arc::new(EmptyLedger),
            Arc::new(EmptyStore),
            20,
        ));
        let scheduler = ScanScheduler::new(engine, Duration::from_secs(300));

        let first = scheduler.start();
        let second = scheduler.start();

        assert!(first.is_some());
        assert!(second.is_none());

        first.unwrap().abort();
    }
}
