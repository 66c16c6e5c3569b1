use async_trait::async_trait;
use ethers::types::U256;
use thiserror::Error;

use crate::types::{MarketSnapshot, VoterStake};

pub mod client;

pub use client::EthLedger;

/// Failures talking to the voting-market contract, split so the engine can
/// tell a benign race from a condition that needs attention.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The contract rejected the finalize because voting has not ended yet.
    /// Expected when a manual settle races the deadline.
    #[error("market voting period has not ended")]
    NotYetEligible,
    /// The market was already finalized, typically by a concurrent settle.
    #[error("market already settled on the ledger")]
    AlreadySettled,
    /// The settlement wallet cannot pay for the transaction. Stalls every
    /// future settlement until refunded, so this is alertable.
    #[error("insufficient funds to submit the finalize transaction")]
    InsufficientFunds,
    /// The transaction was submitted but never mined.
    #[error("finalize transaction dropped before confirmation")]
    Dropped,
    #[error("ledger rpc error: {0}")]
    Rpc(#[from] anyhow::Error),
}

impl LedgerError {
    /// True for outcomes that mean "someone else finalized first" rather
    /// than a fault.
    pub fn is_benign_race(&self) -> bool {
        matches!(self, LedgerError::NotYetEligible | LedgerError::AlreadySettled)
    }
}

/// Confirmation data for a mined finalize transaction.
#[derive(Debug, Clone)]
pub struct FinalizeReceipt {
    pub tx_hash: String,
    pub block_height: u64,
    pub gas_used: U256,
}

/// Read/write access to the voting-market contract. The engine only consumes
/// this; the host process owns construction and the wallet behind it.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn market_count(&self) -> Result<u64, LedgerError>;

    async fn market(&self, market_id: u64) -> Result<MarketSnapshot, LedgerError>;

    /// Gas estimate for finalizing the market, without submitting anything.
    async fn estimate_finalize(&self, market_id: u64) -> Result<U256, LedgerError>;

    /// Submit the finalize transaction and wait for block inclusion.
    async fn finalize(&self, market_id: u64, gas_limit: U256)
    -> Result<FinalizeReceipt, LedgerError>;

    /// Enumerate voters and their stakes for a market.
    async fn voters(&self, market_id: u64) -> Result<Vec<VoterStake>, LedgerError>;
}
