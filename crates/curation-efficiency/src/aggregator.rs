//! Per-vote efficiency and annualized curation yield
//!
//! Entry point of the analysis: reads the account's stake, scans its history
//! and folds the reconciled votes into an [AnalysisReport].

use chrono::{DateTime, Utc};
use log::info;

use crate::constants;
use crate::ledger::{Ledger, LedgerError};
use crate::model::{AnalysisReport, EfficiencyResult, ReconciledVote};
use crate::scanner::{HistoryScanner, ScanSettings, ScanStats};
use crate::valuation::RewardValuation;

/// Settings for one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub scan: ScanSettings,
    pub reward_fund: String,
    /// Voting power assumed for every vote (10000 = 100%)
    pub voting_power: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            scan: ScanSettings::default(),
            reward_fund: constants::DEFAULT_REWARD_FUND.to_string(),
            voting_power: constants::FULL_VOTING_POWER,
        }
    }
}

/// Report plus the context it was computed in
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub report: AnalysisReport,
    pub stats: ScanStats,
    /// Own + received - delegated VESTS
    pub effective_stake: f64,
}

/// Realized reward as a percentage of the expected one.
/// An expected value of zero yields an infinite or NaN result.
pub fn efficiency_percent(realized_value: f64, expected_value: f64) -> f64 {
    realized_value / expected_value * 100.0
}

/// Extrapolate realized rewards to a yearly rate on `stake_value`, treating
/// the total as one week's worth whatever the window length
pub fn annualized_yield_percent(total_realized: f64, stake_value: f64) -> f64 {
    (total_realized * constants::WEEKS_PER_YEAR / stake_value) * 100.0
}

pub struct Aggregator<'a, L> {
    valuation: RewardValuation<'a, L>,
    effective_stake: f64,
    voting_power: f64,
}

impl<'a, L: Ledger> Aggregator<'a, L> {
    pub fn new(ledger: &'a L, settings: &AnalysisSettings, effective_stake: f64) -> Self {
        Self {
            valuation: RewardValuation::new(ledger, settings.reward_fund.clone()),
            effective_stake,
            voting_power: settings.voting_power,
        }
    }

    /// Value one reconciled vote
    pub async fn evaluate(&self, vote: &ReconciledVote) -> Result<EfficiencyResult, LedgerError> {
        let realized_value = self
            .valuation
            .convert_stake_to_value(vote.event.reward_vests)
            .await?;
        let vote_percent = vote.vote.percent_value();
        let expected = self
            .valuation
            .expected_value(vote_percent, self.effective_stake, self.voting_power)
            .await?;

        Ok(EfficiencyResult {
            post_id: vote.event.post_id(),
            realized_value,
            vote_face_value: expected.value * constants::VOTE_VALUE_MULTIPLIER,
            expected_value: expected.value,
            expected_value_hbd: expected.value_hbd,
            efficiency_percent: efficiency_percent(realized_value, expected.value),
            vote_percent,
            vote_timestamp: vote.vote.time,
            vote_age_minutes: vote.vote_age_minutes,
        })
    }

    /// Fold reconciled votes into a report; any ledger failure aborts it
    pub async fn aggregate(&self, votes: &[ReconciledVote]) -> Result<AnalysisReport, LedgerError> {
        let mut results = Vec::with_capacity(votes.len());
        for vote in votes {
            results.push(self.evaluate(vote).await?);
        }

        if results.is_empty() {
            return Ok(AnalysisReport::default());
        }

        let total_realized: f64 = results.iter().map(|r| r.realized_value).sum();
        let stake_value = self.valuation.convert_stake_to_value(self.effective_stake).await?;

        Ok(AnalysisReport {
            annualized_yield_percent: annualized_yield_percent(total_realized, stake_value),
            results,
        })
    }
}

/// Run the full analysis for `account` over the window ending at `now`
pub async fn analyze<L: Ledger>(
    ledger: &L,
    account: &str,
    settings: &AnalysisSettings,
    now: DateTime<Utc>,
) -> Result<AnalysisRun, LedgerError> {
    let stake = ledger.fetch_account(account).await?;
    let effective_stake = stake.effective_stake();
    info!(
        "@{}: {:.6} VESTS own, {:.6} received, {:.6} delegated, {:.6} effective",
        account, stake.own_stake, stake.delegated_in, stake.delegated_out, effective_stake
    );

    let scanner = HistoryScanner::new(ledger, account, settings.scan.clone());
    let outcome = scanner.scan(now).await?;

    let aggregator = Aggregator::new(ledger, settings, effective_stake);
    let report = aggregator.aggregate(&outcome.votes).await?;

    Ok(AnalysisRun {
        report,
        stats: outcome.stats,
        effective_stake,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccountStakeSummary;
    use crate::testing::{self, ACCOUNT, FakeLedger, minutes_ago, reward_op, transfer_op, vote};

    #[test]
    fn test_efficiency_percent() {
        assert_eq!(efficiency_percent(10.0, 5.0), 200.0);
        assert!(efficiency_percent(1.0, 0.0).is_infinite());
        assert!(efficiency_percent(0.0, 0.0).is_nan());
    }

    #[test]
    fn test_annualized_yield() {
        assert_eq!(annualized_yield_percent(7.0, 364.0), 100.0);
        // the factor is 52 regardless of the analysis window
        assert_eq!(annualized_yield_percent(14.0, 364.0), 200.0);
    }

    #[tokio::test]
    async fn test_evaluate_single_vote() {
        let ledger = FakeLedger::default().with_post(
            "bob",
            "post",
            minutes_ago(60),
            vec![vote(ACCOUNT, 10000, minutes_ago(45))],
        );
        let history = vec![reward_op(0, minutes_ago(1), "bob", "post", 1000.0)];
        let ledger = FakeLedger { history, ..ledger };

        let run = analyze(&ledger, ACCOUNT, &AnalysisSettings::default(), testing::now())
            .await
            .unwrap();

        assert_eq!(run.effective_stake, 10.0);
        let result = &run.report.results[0];
        assert_eq!(result.post_id, "@bob/post");
        // 1000 VESTS * 2 HIVE/VEST
        assert_eq!(result.realized_value, 2000.0);
        assert!((result.expected_value - 4019.6).abs() < 1e-9);
        assert!((result.vote_face_value - 8039.2).abs() < 1e-9);
        assert!((result.efficiency_percent - 2000.0 / 4019.6 * 100.0).abs() < 1e-9);
        assert_eq!(result.vote_percent, 100.0);
        assert_eq!(result.vote_age_minutes, 15);

        // 2000 * 52 / (10 * 2) * 100
        assert!((run.report.annualized_yield_percent - 520_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_no_rewards_is_empty_report() {
        let history = (0..10).map(|id| transfer_op(id, minutes_ago(10 - id))).collect();
        let ledger = FakeLedger {
            history,
            ..Default::default()
        };

        let run = analyze(&ledger, ACCOUNT, &AnalysisSettings::default(), testing::now())
            .await
            .unwrap();

        assert!(run.report.is_empty());
        assert_eq!(run.report.annualized_yield_percent, 0.0);
    }

    #[tokio::test]
    async fn test_yield_uses_effective_stake() {
        let ledger = FakeLedger {
            account: AccountStakeSummary {
                own_stake: 200.0,
                delegated_out: 50.0,
                delegated_in: 32.0,
            },
            history: vec![
                reward_op(0, minutes_ago(20), "bob", "a", 1.5),
                reward_op(1, minutes_ago(10), "bob", "b", 2.0),
            ],
            ..Default::default()
        }
        .with_post("bob", "a", minutes_ago(30), vec![vote(ACCOUNT, 10000, minutes_ago(25))])
        .with_post("bob", "b", minutes_ago(30), vec![vote(ACCOUNT, -2500, minutes_ago(25))]);

        let run = analyze(&ledger, ACCOUNT, &AnalysisSettings::default(), testing::now())
            .await
            .unwrap();

        assert_eq!(run.effective_stake, 182.0);
        assert_eq!(run.report.results.len(), 2);
        assert_eq!(run.report.results[0].post_id, "@bob/b");
        assert_eq!(run.report.results[0].vote_percent, -25.0);

        // (3 + 4) HIVE realized, 182 VESTS = 364 HIVE
        assert!((run.report.annualized_yield_percent - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_yield_ignores_window_length() {
        let ledger = FakeLedger {
            account: AccountStakeSummary {
                own_stake: 182.0,
                delegated_out: 0.0,
                delegated_in: 0.0,
            },
            history: vec![reward_op(0, minutes_ago(60 * 24 * 10), "bob", "a", 3.5)],
            ..Default::default()
        }
        .with_post("bob", "a", minutes_ago(60 * 24 * 11), vec![vote(ACCOUNT, 10000, minutes_ago(60 * 24 * 11))]);
        let settings = AnalysisSettings {
            scan: ScanSettings {
                window: chrono::Duration::days(14),
                ..Default::default()
            },
            ..Default::default()
        };

        let run = analyze(&ledger, ACCOUNT, &settings, testing::now()).await.unwrap();

        // 7 HIVE realized on 364 HIVE of stake, times 52
        assert_eq!(run.report.results.len(), 1);
        assert!((run.report.annualized_yield_percent - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_ledger_failure_is_fatal() {
        let ledger = FakeLedger {
            history_down: true,
            ..Default::default()
        };

        let result = analyze(&ledger, ACCOUNT, &AnalysisSettings::default(), testing::now()).await;
        assert!(matches!(result, Err(LedgerError::NoReachableEndpoint { .. })));
    }
}
