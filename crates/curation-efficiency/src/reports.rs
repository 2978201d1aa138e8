//! Report generation (console summary, CSV and JSON outputs)

use anyhow::{Context, Result};
use csv::Writer;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::aggregator::AnalysisRun;
use crate::model::{AnalysisReport, EfficiencyResult};

/// Headline numbers for a report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub votes_analyzed: usize,
    pub average_efficiency: f64,
    pub best_efficiency: f64,
    pub total_realized: f64,
    pub annualized_yield_percent: f64,
}

impl ReportSummary {
    /// `None` for an empty report
    pub fn from_report(report: &AnalysisReport) -> Option<Self> {
        if report.is_empty() {
            return None;
        }

        let count = report.results.len();
        let average_efficiency = report.results.iter().map(|r| r.efficiency_percent).sum::<f64>() / count as f64;
        let best_efficiency = report
            .results
            .iter()
            .map(|r| r.efficiency_percent)
            .fold(f64::NEG_INFINITY, f64::max);
        let total_realized = report.results.iter().map(|r| r.realized_value).sum();

        Some(Self {
            votes_analyzed: count,
            average_efficiency,
            best_efficiency,
            total_realized,
            annualized_yield_percent: report.annualized_yield_percent,
        })
    }
}

/// Compact vote age: `42m`, `3h 5m`, `2d 4h`
pub fn format_vote_age(minutes: i64) -> String {
    if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 1440 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{}d {}h", minutes / 1440, (minutes % 1440) / 60)
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Print the per-vote table and summary
pub fn print_report(account: &str, window_days: u32, run: &AnalysisRun) {
    let report = &run.report;

    println!("\n============================================================");
    println!("         CURATION EFFICIENCY @{} ({} days)", account, window_days);
    println!("============================================================\n");

    let Some(summary) = ReportSummary::from_report(report) else {
        println!("No curation rewards found for @{} in the last {} days.", account, window_days);
        return;
    };

    println!(
        "{:<40} {:>12} {:>12} {:>12} {:>10} {:>7} {:<17} {:>8}",
        "Post", "Reward HP", "Vote HP", "Expected HP", "Effic.", "Vote %", "Voted (UTC)", "Age"
    );
    println!("{}", "-".repeat(126));

    for result in &report.results {
        print_row(result);
    }

    println!("{}", "-".repeat(126));
    println!("\n  Votes analyzed:     {}", summary.votes_analyzed);
    println!("  Average efficiency: {:.2}%", summary.average_efficiency);
    println!("  Best vote:          {:.2}%", summary.best_efficiency);
    println!("  Total rewards:      {:.4} HP", summary.total_realized);
    println!("  Estimated APR:      {:.2}%", summary.annualized_yield_percent);
    println!("  Effective stake:    {:.6} VESTS", run.effective_stake);

    let stats = &run.stats;
    if stats.malformed_events + stats.detail_failures + stats.unmatched_votes > 0 {
        println!(
            "\n  Skipped: {} malformed, {} lookup failures, {} without a matching vote",
            stats.malformed_events, stats.detail_failures, stats.unmatched_votes
        );
    }
    if stats.stopped_by_limit {
        println!("  Note: scan stopped at the configured limit, results are partial");
    }
}

fn print_row(result: &EfficiencyResult) {
    println!(
        "{:<40} {:>12.4} {:>12.4} {:>12.4} {:>9.2}% {:>7.2} {:<17} {:>8}",
        truncate(&result.post_id, 40),
        result.realized_value,
        result.vote_face_value,
        result.expected_value,
        result.efficiency_percent,
        result.vote_percent,
        result.vote_timestamp.format("%Y-%m-%d %H:%M"),
        format_vote_age(result.vote_age_minutes),
    );
}

/// Write one row per vote to a CSV file
pub fn write_csv(path: &Path, report: &AnalysisReport) -> Result<()> {
    let mut wtr = Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))?;

    wtr.write_record([
        "Post",
        "Reward_HP",
        "Vote_Value_HP",
        "Expected_HP",
        "Expected_HBD",
        "Efficiency_Pct",
        "Vote_Pct",
        "Vote_Time",
        "Vote_Age_Min",
    ])?;

    for result in &report.results {
        wtr.write_record([
            result.post_id.clone(),
            format!("{:.6}", result.realized_value),
            format!("{:.4}", result.vote_face_value),
            format!("{:.4}", result.expected_value),
            format!("{:.4}", result.expected_value_hbd),
            format!("{:.2}", result.efficiency_percent),
            format!("{:.2}", result.vote_percent),
            result.vote_timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            result.vote_age_minutes.to_string(),
        ])?;
    }

    wtr.flush()?;
    println!("  Generated: {}", path.display());
    Ok(())
}

/// Write the whole report as pretty JSON
pub fn write_json(path: &Path, report: &AnalysisReport) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("  Generated: {}", path.display());
    Ok(())
}
