//! Account history scanning for curation rewards
//!
//! History is walked backwards from the newest operation with a strictly
//! decreasing cursor. Each curation reward inside the window is matched
//! with the analyzed account's vote on the rewarded post.
//!
//! Scanning stops when:
//! - a curation reward older than the window start is reached
//! - the cursor would go negative
//! - a page comes back shorter than requested (or empty)
//! - an optional operation/time limit is hit

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::time::{Duration as StdDuration, Instant};

use crate::constants;
use crate::ledger::{Ledger, LedgerError, effective_page_size};
use crate::model::{CurationRewardEvent, Operation, ReconciledVote};

/// Optional hard caps on a scan; both inactive by default
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanLimits {
    pub max_operations: Option<usize>,
    pub max_duration: Option<StdDuration>,
}

impl ScanLimits {
    fn exceeded(&self, operations: usize, started: Instant) -> bool {
        self.max_operations.is_some_and(|max| operations >= max)
            || self.max_duration.is_some_and(|max| started.elapsed() >= max)
    }
}

/// Scan parameters
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub window: Duration,
    pub page_size: u32,
    pub limits: ScanLimits,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            window: Duration::days(constants::DEFAULT_WINDOW_DAYS as i64),
            page_size: constants::MAX_HISTORY_PAGE_SIZE,
            limits: ScanLimits::default(),
        }
    }
}

/// Counters collected during a scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    pub pages: usize,
    pub operations: usize,
    pub reward_events: usize,
    pub malformed_events: usize,
    pub detail_failures: usize,
    pub unmatched_votes: usize,
    pub stopped_by_limit: bool,
}

/// Reconciled votes in descending operation id order
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub votes: Vec<ReconciledVote>,
    pub stats: ScanStats,
}

/// Size to request for the page ending at `cursor`; nodes reject a limit
/// larger than the number of ids left below the cursor
pub fn page_request_size(cursor: i64, page_size: u32) -> u32 {
    let size = effective_page_size(page_size);
    if cursor < 0 {
        return size;
    }
    u32::try_from(cursor + 1).map_or(size, |remaining| size.min(remaining))
}

pub struct HistoryScanner<'a, L> {
    ledger: &'a L,
    account: &'a str,
    settings: ScanSettings,
}

impl<'a, L: Ledger> HistoryScanner<'a, L> {
    pub fn new(ledger: &'a L, account: &'a str, settings: ScanSettings) -> Self {
        Self {
            ledger,
            account,
            settings,
        }
    }

    /// Scan the window ending at `now`.
    ///
    /// History page failures abort the scan. Malformed reward events and
    /// failed vote/post lookups only skip the affected event.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<ScanOutcome, LedgerError> {
        let window_start = now - self.settings.window;
        let started = Instant::now();

        let mut outcome = ScanOutcome::default();
        let mut cursor = constants::HISTORY_CURSOR_LATEST;
        let mut within_window = true;

        info!(
            "Scanning history of @{} back to {}",
            self.account,
            window_start.format("%Y-%m-%d %H:%M:%S")
        );

        loop {
            let requested = page_request_size(cursor, self.settings.page_size);
            let mut page = self
                .ledger
                .fetch_history_page(self.account, cursor, requested)
                .await?;
            outcome.stats.pages += 1;

            if page.raw_len == 0 {
                break;
            }
            let page_cursor = cursor;

            // Nodes return pages oldest first
            page.operations.sort_by(|a, b| b.id.cmp(&a.id));
            debug!(
                "Page {}: {} of {} entries decoded, ids {}..={}",
                outcome.stats.pages,
                page.operations.len(),
                page.raw_len,
                page.operations.last().map_or(0, |op| op.id),
                page.operations.first().map_or(0, |op| op.id)
            );

            for op in &page.operations {
                if cursor >= 0 && op.id > cursor {
                    debug!("Ignoring operation {} above cursor {}", op.id, cursor);
                    continue;
                }

                if self.settings.limits.exceeded(outcome.stats.operations, started) {
                    warn!(
                        "Stopping scan early: limit reached after {} operations",
                        outcome.stats.operations
                    );
                    outcome.stats.stopped_by_limit = true;
                    break;
                }
                outcome.stats.operations += 1;

                if op.is_curation_reward() {
                    if op.timestamp < window_start {
                        within_window = false;
                        break;
                    }
                    if let Some(vote) = self.reconcile(op, &mut outcome.stats).await {
                        outcome.votes.push(vote);
                    }
                }

                cursor = op.id - 1;
                if cursor < 0 {
                    break;
                }
            }

            if !within_window || outcome.stats.stopped_by_limit {
                break;
            }

            // Undecodable entries below the last decoded one are passed over too
            let below_decoded = page
                .oldest_id
                .map(|oldest| oldest - 1)
                .filter(|next| cursor == constants::HISTORY_CURSOR_LATEST || *next < cursor);
            if let Some(next) = below_decoded {
                cursor = next;
            }

            if cursor < 0 || page.raw_len < requested as usize {
                break;
            }
            if cursor == page_cursor {
                warn!("History page made no progress at cursor {}, stopping", cursor);
                break;
            }
        }

        info!(
            "Scan finished: {} pages, {} operations, {} reward events, {} matched votes",
            outcome.stats.pages,
            outcome.stats.operations,
            outcome.stats.reward_events,
            outcome.votes.len()
        );

        Ok(outcome)
    }

    /// Match one reward operation with the account's vote; `None` skips it
    async fn reconcile(&self, op: &Operation, stats: &mut ScanStats) -> Option<ReconciledVote> {
        let event = match CurationRewardEvent::try_from(op) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping malformed curation reward: {}", e);
                stats.malformed_events += 1;
                return None;
            }
        };
        stats.reward_events += 1;

        let detail = match self
            .ledger
            .fetch_votes_and_post(&event.author, &event.permlink)
            .await
        {
            Ok(detail) => detail,
            Err(e) => {
                warn!("Skipping {}: {}", event.post_id(), e);
                stats.detail_failures += 1;
                return None;
            }
        };

        let Some(vote) = detail.vote_of(self.account).cloned() else {
            debug!("No vote by @{} on {}", self.account, event.post_id());
            stats.unmatched_votes += 1;
            return None;
        };
        let reconciled = ReconciledVote::new(event, vote, &detail.post);
        debug!(
            "Op {} at {}: {} created {}, vote {} ({} rshares) for {:.6} VESTS",
            reconciled.event.op_id,
            reconciled.event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            reconciled.event.post_id(),
            reconciled.post_created.format("%Y-%m-%d %H:%M:%S"),
            reconciled.vote.percent,
            reconciled.vote.weight,
            reconciled.event.reward_vests
        );

        Some(reconciled)
    }
}
