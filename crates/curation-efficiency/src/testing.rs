//! In-memory ledger for unit tests

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::ledger::{Ledger, LedgerError};
use crate::model::{
    AccountStakeSummary, GlobalChainParameters, HistoryPage, Operation, PostMetadata, PriceFeed, RewardFund,
    VoteRecord, VotesAndPost,
};

pub const ACCOUNT: &str = "alice";

/// Fixed instant all fixtures are relative to
pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-08T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn transfer_op(id: i64, timestamp: DateTime<Utc>) -> Operation {
    Operation {
        id,
        kind: "transfer".to_string(),
        timestamp,
        payload: json!({"from": ACCOUNT, "to": "bob", "amount": "1.000 HIVE", "memo": ""})
            .as_object()
            .cloned()
            .unwrap(),
    }
}

pub fn reward_op(id: i64, timestamp: DateTime<Utc>, author: &str, permlink: &str, vests: f64) -> Operation {
    let payload = json!({
        "curator": ACCOUNT,
        "author": author,
        "permlink": permlink,
        "reward": format!("{:.6} VESTS", vests),
    });
    Operation {
        id,
        kind: "curation_reward".to_string(),
        timestamp,
        payload: payload.as_object().cloned().unwrap(),
    }
}

pub fn raw_op(id: i64, timestamp: DateTime<Utc>, kind: &str, payload: Map<String, Value>) -> Operation {
    Operation {
        id,
        kind: kind.to_string(),
        timestamp,
        payload,
    }
}

pub fn vote(voter: &str, percent: i64, time: DateTime<Utc>) -> VoteRecord {
    VoteRecord {
        voter: voter.to_string(),
        weight: 1_000_000,
        percent,
        time,
    }
}

/// Ledger backed by plain collections; records history requests
pub struct FakeLedger {
    pub account: AccountStakeSummary,
    /// Operations in ascending id order
    pub history: Vec<Operation>,
    pub posts: HashMap<(String, String), VotesAndPost>,
    pub globals: GlobalChainParameters,
    pub reward_fund: RewardFund,
    pub price: PriceFeed,
    /// Fail every history request
    pub history_down: bool,
    pub history_requests: Mutex<Vec<(i64, u32)>>,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self {
            account: AccountStakeSummary {
                own_stake: 10.0,
                delegated_out: 0.0,
                delegated_in: 0.0,
            },
            history: Vec::new(),
            posts: HashMap::new(),
            globals: GlobalChainParameters {
                total_vesting_fund_hive: 100.0,
                total_vesting_shares: 50.0,
            },
            reward_fund: RewardFund {
                reward_balance: 10.0,
                recent_claims: 1000.0,
            },
            price: PriceFeed { base: 0.25, quote: 1.0 },
            history_down: false,
            history_requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeLedger {
    /// Register a post with a vote from the analyzed account
    pub fn with_post(mut self, author: &str, permlink: &str, created: DateTime<Utc>, votes: Vec<VoteRecord>) -> Self {
        self.posts.insert(
            (author.to_string(), permlink.to_string()),
            VotesAndPost {
                votes,
                post: PostMetadata { created },
            },
        );
        self
    }

    pub fn requests(&self) -> Vec<(i64, u32)> {
        self.history_requests.lock().unwrap().clone()
    }
}

fn unreachable(operation: &'static str) -> LedgerError {
    LedgerError::NoReachableEndpoint {
        operation,
        attempts: 1,
        last: None,
    }
}

impl Ledger for FakeLedger {
    async fn fetch_account(&self, _name: &str) -> Result<AccountStakeSummary, LedgerError> {
        Ok(self.account)
    }

    async fn fetch_history_page(
        &self,
        _name: &str,
        cursor: i64,
        page_size: u32,
    ) -> Result<HistoryPage, LedgerError> {
        self.history_requests.lock().unwrap().push((cursor, page_size));
        if self.history_down {
            return Err(unreachable("fetch_history_page"));
        }

        let eligible: Vec<&Operation> = self
            .history
            .iter()
            .filter(|op| cursor < 0 || op.id <= cursor)
            .collect();
        let skip = eligible.len().saturating_sub(page_size as usize);
        let operations: Vec<Operation> = eligible[skip..].iter().map(|op| (*op).clone()).collect();
        Ok(HistoryPage {
            raw_len: operations.len(),
            oldest_id: operations.iter().map(|op| op.id).min(),
            operations,
        })
    }

    async fn fetch_votes_and_post(&self, author: &str, permlink: &str) -> Result<VotesAndPost, LedgerError> {
        self.posts
            .get(&(author.to_string(), permlink.to_string()))
            .cloned()
            .ok_or_else(|| unreachable("fetch_votes_and_post"))
    }

    async fn fetch_global_parameters(&self) -> Result<GlobalChainParameters, LedgerError> {
        Ok(self.globals)
    }

    async fn fetch_reward_fund(&self, _kind: &str) -> Result<RewardFund, LedgerError> {
        Ok(self.reward_fund)
    }

    async fn fetch_price_feed(&self) -> Result<PriceFeed, LedgerError> {
        Ok(self.price)
    }
}

/// `minutes` before [now]
pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    now() - Duration::minutes(minutes)
}
