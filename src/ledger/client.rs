use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::prelude::*;

use super::{FinalizeReceipt, LedgerError, LedgerGateway};
use crate::config::Config;
use crate::types::{MarketSnapshot, Side, VoterStake};

abigen!(
    VotingMarket,
    r#"[
        function marketCount() view returns (uint256)
        function getMarket(uint256 marketId) view returns (address creator, uint256 deadline, uint256 yesVotes, uint256 noVotes, uint256 totalStaked, bool active, string metadata)
        function getVoters(uint256 marketId) view returns (address[] voters, bool[] votedYes, uint256[] stakes)
        function finalizeMarket(uint256 marketId)
    ]"#
);

type Client = SignerMiddleware<Provider<Http>, Wallet<k256::ecdsa::SigningKey>>;

/// Ethers-backed implementation of [`LedgerGateway`] against the deployed
/// voting-market contract.
pub struct EthLedger {
    contract: VotingMarket<Client>,
}

impl EthLedger {
    pub fn connect(config: &Config) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())?;
        let wallet: LocalWallet = config.private_key.parse()?;
        let wallet = wallet.with_chain_id(config.chain_id);

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let address: Address = config.contract_address.parse()?;

        Ok(Self {
            contract: VotingMarket::new(address, client),
        })
    }
}

/// Map a contract/provider failure onto the error taxonomy by revert message.
/// The contract does not expose typed errors, so substring matching is the
/// only signal available.
fn classify(err: impl std::fmt::Display) -> LedgerError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();

    if lower.contains("voting period") || lower.contains("not ended") || lower.contains("too early")
    {
        LedgerError::NotYetEligible
    } else if lower.contains("already finalized")
        || lower.contains("already settled")
        || lower.contains("not active")
    {
        LedgerError::AlreadySettled
    } else if lower.contains("insufficient funds") {
        LedgerError::InsufficientFunds
    } else {
        LedgerError::Rpc(anyhow!(msg))
    }
}

fn to_u64(value: U256, what: &str) -> Result<u64, LedgerError> {
    if value > U256::from(u64::MAX) {
        return Err(LedgerError::Rpc(anyhow!("{what} overflows u64: {value}")));
    }
    Ok(value.as_u64())
}

fn to_datetime(secs: U256) -> Result<DateTime<Utc>, LedgerError> {
    let secs = to_u64(secs, "deadline")?;
    let secs = i64::try_from(secs).map_err(|_| LedgerError::Rpc(anyhow!("deadline out of range")))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| LedgerError::Rpc(anyhow!("deadline not a valid timestamp: {secs}")))
}

#[async_trait]
impl LedgerGateway for EthLedger {
    async fn market_count(&self) -> Result<u64, LedgerError> {
        let count = self.contract.market_count().call().await.map_err(classify)?;
        to_u64(count, "market count")
    }

    async fn market(&self, market_id: u64) -> Result<MarketSnapshot, LedgerError> {
        let (creator, deadline, yes_votes, no_votes, total_staked, active, metadata) = self
            .contract
            .get_market(U256::from(market_id))
            .call()
            .await
            .map_err(classify)?;

        Ok(MarketSnapshot {
            id: market_id,
            creator: format!("{creator:#x}"),
            deadline: to_datetime(deadline)?,
            yes_votes: to_u64(yes_votes, "yes votes")?,
            no_votes: to_u64(no_votes, "no votes")?,
            total_staked,
            active,
            metadata,
        })
    }

    async fn estimate_finalize(&self, market_id: u64) -> Result<U256, LedgerError> {
        self.contract
            .finalize_market(U256::from(market_id))
            .estimate_gas()
            .await
            .map_err(classify)
    }

    async fn finalize(
        &self,
        market_id: u64,
        gas_limit: U256,
    ) -> Result<FinalizeReceipt, LedgerError> {
        let call = self.contract.finalize_market(U256::from(market_id)).gas(gas_limit);

        let pending = call.send().await.map_err(classify)?;
        let receipt = pending
            .await
            .map_err(|e| LedgerError::Rpc(anyhow!(e)))?
            .ok_or(LedgerError::Dropped)?;

        Ok(FinalizeReceipt {
            tx_hash: format!("{:#x}", receipt.transaction_hash),
            block_height: receipt.block_number.map(|b| b.as_u64()).unwrap_or_default(),
            gas_used: receipt.gas_used.unwrap_or_default(),
        })
    }

    async fn voters(&self, market_id: u64) -> Result<Vec<VoterStake>, LedgerError> {
        let (voters, voted_yes, stakes) = self
            .contract
            .get_voters(U256::from(market_id))
            .call()
            .await
            .map_err(classify)?;

        if voters.len() != voted_yes.len() || voters.len() != stakes.len() {
            return Err(LedgerError::Rpc(anyhow!(
                "getVoters returned mismatched arrays for market {market_id}"
            )));
        }

        Ok(voters
            .into_iter()
            .zip(voted_yes)
            .zip(stakes)
            .map(|((address, yes), stake)| VoterStake {
                address: format!("{address:#x}"),
                side: if yes { Side::Yes } else { Side::No },
                stake,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_messages_classify_to_expected_variants() {
        assert!(matches!(
            classify("execution reverted: voting period not ended"),
            LedgerError::NotYetEligible
        ));
        assert!(matches!(
            classify("execution reverted: market already finalized"),
            LedgerError::AlreadySettled
        ));
        assert!(matches!(
            classify("execution reverted: market not active"),
            LedgerError::AlreadySettled
        ));
        assert!(matches!(
            classify("insufficient funds for gas * price + value"),
            LedgerError::InsufficientFunds
        ));
        assert!(matches!(classify("connection refused"), LedgerError::Rpc(_)));
    }

    #[test]
    fn oversized_chain_values_are_rejected_not_truncated() {
        assert!(to_u64(U256::from(u64::MAX), "count").is_ok());
        assert!(to_u64(U256::from(u64::MAX) + U256::one(), "count").is_err());
    }
}
