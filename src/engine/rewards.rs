//! Winner determination and reward-split arithmetic.
//!
//! All amounts are U256 so the math matches the contract exactly; division
//! floors, which is the intended rounding for both the creator cut and the
//! pro-rata voter payouts.

use ethers::types::U256;

use crate::types::{ParticipantOutcome, Side, VoterStake};

/// Creator's cut of the staked pool, in basis points (5%).
pub const CREATOR_FEE_BPS: u64 = 500;

/// Strict majority wins; a tie goes to No.
pub fn winning_side(yes_votes: u64, no_votes: u64) -> Side {
    if yes_votes > no_votes { Side::Yes } else { Side::No }
}

/// Split the staked pool into (creator_reward, voter_reward_pool). The two
/// always sum back to `total_staked`.
pub fn split_rewards(total_staked: U256) -> (U256, U256) {
    let creator_reward = total_staked * U256::from(CREATOR_FEE_BPS) / U256::from(10_000u64);
    (creator_reward, total_staked - creator_reward)
}

/// Per-voter outcomes: winners split the voter reward pool pro-rata by stake,
/// losers get zero. If nobody backed the winning side the pool is left to the
/// ledger's own distribution and every payout is zero.
pub fn participant_outcomes(
    voters: &[VoterStake],
    winner: Side,
    voter_reward_pool: U256,
) -> Vec<ParticipantOutcome> {
    let winning_stake = voters
        .iter()
        .filter(|v| v.side == winner)
        .fold(U256::zero(), |acc, v| acc + v.stake);

    voters
        .iter()
        .map(|v| {
            let won = v.side == winner;
            let payout = if won && !winning_stake.is_zero() {
                v.stake * voter_reward_pool / winning_stake
            } else {
                U256::zero()
            };

            ParticipantOutcome {
                address: v.address.clone(),
                side: v.side,
                stake: v.stake.to_string(),
                payout: payout.to_string(),
                won,
            }
        })
        .collect()
}
