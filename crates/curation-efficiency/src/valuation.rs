//! Vote value estimation from global reward pool state
//!
//! Network parameters are fetched fresh on every call; two calls made moments
//! apart may see different exchange rates.

use log::debug;

use crate::constants;
use crate::ledger::{Ledger, LedgerError};
use crate::model::{GlobalChainParameters, PriceFeed, RewardFund};

/// Estimated value of a vote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoteValue {
    /// In HIVE (Hive Power)
    pub value: f64,
    /// In HBD at the median price feed
    pub value_hbd: f64,
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Diminishing power curve: `(voting_power * |percent| * 100 / 10000 + 49) / 50`.
/// Downvotes are valued by magnitude.
pub fn weighted_power(voting_power: f64, vote_percent: f64) -> f64 {
    let weight = vote_percent.abs() * 100.0;
    (voting_power * weight / constants::FULL_VOTING_POWER + 49.0) / 50.0
}

/// Expected vote value in HIVE for a snapshot of network state, rounded to 4 decimals
pub fn vote_value(
    params: &GlobalChainParameters,
    fund: &RewardFund,
    effective_stake: f64,
    vote_percent: f64,
    voting_power: f64,
) -> f64 {
    let stake_value = effective_stake * params.exchange_rate();
    let power = weighted_power(voting_power, vote_percent);
    let value = stake_value * power * 100.0 * fund.balance_ratio();
    round_to(value, constants::VOTE_VALUE_DECIMALS)
}

/// Valuation backed by live ledger reads
pub struct RewardValuation<'a, L> {
    ledger: &'a L,
    reward_fund: String,
}

impl<'a, L: Ledger> RewardValuation<'a, L> {
    pub fn new(ledger: &'a L, reward_fund: impl Into<String>) -> Self {
        Self {
            ledger,
            reward_fund: reward_fund.into(),
        }
    }

    /// Expected value of a vote of `vote_percent` (-100..=100) cast with `effective_stake` VESTS
    pub async fn expected_value(
        &self,
        vote_percent: f64,
        effective_stake: f64,
        voting_power: f64,
    ) -> Result<VoteValue, LedgerError> {
        let params = self.ledger.fetch_global_parameters().await?;
        let fund = self.ledger.fetch_reward_fund(&self.reward_fund).await?;
        let price: PriceFeed = self.ledger.fetch_price_feed().await?;

        let value = vote_value(&params, &fund, effective_stake, vote_percent, voting_power);
        debug!(
            "Vote {:.2}% with {:.6} VESTS: {:.4} HIVE (rate {:.9}, pool ratio {:e})",
            vote_percent,
            effective_stake,
            value,
            params.exchange_rate(),
            fund.balance_ratio()
        );

        Ok(VoteValue {
            value,
            value_hbd: round_to(value * price.rate(), constants::VOTE_VALUE_DECIMALS),
        })
    }

    /// Convert VESTS to HIVE at the current exchange rate
    pub async fn convert_stake_to_value(&self, vests: f64) -> Result<f64, LedgerError> {
        let params = self.ledger.fetch_global_parameters().await?;
        Ok(vests * params.exchange_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLedger;

    #[test]
    fn test_weighted_power() {
        assert!((weighted_power(10_000.0, 100.0) - 200.98).abs() < 1e-12);
        assert!((weighted_power(10_000.0, 50.0) - 100.98).abs() < 1e-12);
        assert_eq!(weighted_power(10_000.0, -25.0), weighted_power(10_000.0, 25.0));
        assert!((weighted_power(10_000.0, 0.0) - 0.98).abs() < 1e-12);
    }

    #[test]
    fn test_vote_value_by_hand() {
        // rate = 100 / 50 = 2, stake value = 10 * 2 = 20
        // power = (10000 * 10000 / 10000 + 49) / 50 = 200.98
        // ratio = 10 / 1000 = 0.01
        // 20 * 200.98 * 100 * 0.01 = 4019.6
        let params = GlobalChainParameters {
            total_vesting_fund_hive: 100.0,
            total_vesting_shares: 50.0,
        };
        let fund = RewardFund {
            reward_balance: 10.0,
            recent_claims: 1000.0,
        };
        let value = vote_value(&params, &fund, 10.0, 100.0, 10_000.0);
        assert!((value - 4019.6).abs() < 1e-9);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(1.23454, 4), 1.2345);
        assert_eq!(round_to(-1.23456, 4), -1.2346);
    }

    #[tokio::test]
    async fn test_expected_value_uses_live_state() {
        let ledger = FakeLedger::default();
        let valuation = RewardValuation::new(&ledger, "post");

        let value = valuation.expected_value(100.0, 10.0, 10_000.0).await.unwrap();
        assert!((value.value - 4019.6).abs() < 1e-9);
        assert!((value.value_hbd - 1004.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_convert_stake_to_value() {
        let ledger = FakeLedger::default();
        let valuation = RewardValuation::new(&ledger, "post");
        assert_eq!(valuation.convert_stake_to_value(182.0).await.unwrap(), 364.0);
    }
}
