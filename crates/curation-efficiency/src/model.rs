//! Ledger records and analysis results
//!
//! Raw node responses are decoded here into typed records. Everything the
//! analysis produces ([`EfficiencyResult`], [`AnalysisReport`]) is plain data
//! handed back to the caller.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use log::warn;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::amount::{AmountError, Denom, parse_amount, parse_number};
use crate::constants;

/// Accepted names for the rewarded post's author
pub const AUTHOR_FIELDS: &[&str] = &["author", "comment_author"];

/// Accepted names for the rewarded post's permlink
pub const PERMLINK_FIELDS: &[&str] = &["permlink", "comment_permlink"];

/// Accepted names for the credited stake
pub const REWARD_FIELDS: &[&str] = &["reward"];

/// Error decoding a node response into a typed record.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot decode JSON")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("cannot parse timestamp {0:?}")]
    Timestamp(String),

    #[error("missing or invalid field `{0}`")]
    Field(&'static str),
}

/// A curation reward operation that cannot be turned into a [`CurationRewardEvent`].
#[derive(Debug, Error)]
pub enum EventError {
    #[error("operation {op_id} has none of the fields {aliases:?}")]
    MissingField {
        op_id: i64,
        aliases: &'static [&'static str],
    },

    #[error("operation {op_id} has a non-string `{field}`")]
    NotAString { op_id: i64, field: &'static str },

    #[error("operation {op_id} has an invalid reward amount")]
    InvalidAmount {
        op_id: i64,
        #[source]
        source: AmountError,
    },
}

// =============================================================================
// Timestamps
// =============================================================================

/// Parse a node timestamp (`2024-05-01T12:00:00`, always UTC)
pub fn parse_hive_time(s: &str) -> Result<DateTime<Utc>, DecodeError> {
    let trimmed = s.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, constants::HIVE_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| DecodeError::Timestamp(s.to_string()))
}

fn deserialize_hive_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_hive_time(&s).map_err(serde::de::Error::custom)
}

/// Integers some nodes send as strings
fn deserialize_lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| serde::de::Error::custom(format!("invalid integer {n}"))),
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("invalid integer {other}"))),
    }
}

// =============================================================================
// Account History
// =============================================================================

/// One entry of an account's operation history
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: i64,
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

impl Operation {
    /// Decode a history entry: `[id, {"timestamp": .., "op": [kind, payload]}]`.
    /// The `{"type": .., "value": ..}` op shape is accepted as well.
    pub fn from_history_entry(entry: &Value) -> Result<Self, DecodeError> {
        let id = entry
            .get(0)
            .and_then(Value::as_i64)
            .ok_or(DecodeError::Field("id"))?;
        let record = entry.get(1).ok_or(DecodeError::Field("operation"))?;

        let timestamp = record
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or(DecodeError::Field("timestamp"))
            .and_then(parse_hive_time)?;

        let op = record.get("op").ok_or(DecodeError::Field("op"))?;
        let (kind, payload) = match op {
            Value::Array(pair) => (pair.first(), pair.get(1)),
            Value::Object(map) => (map.get("type"), map.get("value")),
            _ => (None, None),
        };
        let kind = kind.and_then(Value::as_str).ok_or(DecodeError::Field("op.kind"))?;
        let payload = payload
            .and_then(Value::as_object)
            .cloned()
            .ok_or(DecodeError::Field("op.payload"))?;

        Ok(Operation {
            id,
            kind: kind.trim_end_matches("_operation").to_string(),
            timestamp,
            payload,
        })
    }

    pub fn is_curation_reward(&self) -> bool {
        self.kind == constants::CURATION_REWARD_OP
    }
}

/// One page of account history as returned by a node
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    /// Entries that decoded, in node order
    pub operations: Vec<Operation>,
    /// Entries the node returned, decodable or not
    pub raw_len: usize,
    /// Lowest id among all returned entries
    pub oldest_id: Option<i64>,
}

impl HistoryPage {
    /// Decode a raw page; undecodable entries are logged and dropped but
    /// still counted
    pub fn from_entries(entries: &[Value]) -> Self {
        let mut operations = Vec::with_capacity(entries.len());
        for entry in entries {
            match Operation::from_history_entry(entry) {
                Ok(op) => operations.push(op),
                Err(e) => warn!("Skipping undecodable history entry: {}", e),
            }
        }

        Self {
            operations,
            raw_len: entries.len(),
            oldest_id: entries.iter().filter_map(|entry| entry.get(0).and_then(Value::as_i64)).min(),
        }
    }
}

/// Return the first alias present in `payload`, with its value
pub fn lookup_field<'a>(
    payload: &'a Map<String, Value>,
    aliases: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    aliases
        .iter()
        .find_map(|name| payload.get(*name).map(|value| (*name, value)))
}

/// A curation reward credited to the analyzed account
#[derive(Debug, Clone, PartialEq)]
pub struct CurationRewardEvent {
    pub op_id: i64,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub permlink: String,
    /// Credited stake in VESTS
    pub reward_vests: f64,
}

impl CurationRewardEvent {
    /// `@author/permlink`
    pub fn post_id(&self) -> String {
        format!("@{}/{}", self.author, self.permlink)
    }
}

impl TryFrom<&Operation> for CurationRewardEvent {
    type Error = EventError;

    fn try_from(op: &Operation) -> Result<Self, Self::Error> {
        let string_field = |aliases: &'static [&'static str]| -> Result<String, EventError> {
            let (name, value) = lookup_field(&op.payload, aliases).ok_or(EventError::MissingField {
                op_id: op.id,
                aliases,
            })?;
            value
                .as_str()
                .map(str::to_string)
                .ok_or(EventError::NotAString {
                    op_id: op.id,
                    field: name,
                })
        };

        let author = string_field(AUTHOR_FIELDS)?;
        let permlink = string_field(PERMLINK_FIELDS)?;

        let (_, reward) = lookup_field(&op.payload, REWARD_FIELDS).ok_or(EventError::MissingField {
            op_id: op.id,
            aliases: REWARD_FIELDS,
        })?;
        let reward_vests = parse_amount(reward, Denom::Vests).map_err(|source| EventError::InvalidAmount {
            op_id: op.id,
            source,
        })?;

        Ok(CurationRewardEvent {
            op_id: op.id,
            timestamp: op.timestamp,
            author,
            permlink,
            reward_vests,
        })
    }
}

// =============================================================================
// Votes and Posts
// =============================================================================

/// An active vote on a post
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VoteRecord {
    pub voter: String,
    #[serde(deserialize_with = "deserialize_lenient_i64")]
    pub weight: i64,
    /// Vote strength in basis points (10000 = 100%), negative for downvotes
    #[serde(deserialize_with = "deserialize_lenient_i64")]
    pub percent: i64,
    #[serde(deserialize_with = "deserialize_hive_time")]
    pub time: DateTime<Utc>,
}

impl VoteRecord {
    /// Vote strength as a percentage (-100..=100)
    pub fn percent_value(&self) -> f64 {
        self.percent as f64 / 100.0
    }
}

/// The post fields the analysis needs
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PostMetadata {
    #[serde(deserialize_with = "deserialize_hive_time")]
    pub created: DateTime<Utc>,
}

/// Active votes and metadata of one post
#[derive(Debug, Clone)]
pub struct VotesAndPost {
    pub votes: Vec<VoteRecord>,
    pub post: PostMetadata,
}

impl VotesAndPost {
    pub fn vote_of(&self, voter: &str) -> Option<&VoteRecord> {
        self.votes.iter().find(|v| v.voter == voter)
    }
}

/// A reward event matched with the analyzed account's own vote
#[derive(Debug, Clone)]
pub struct ReconciledVote {
    pub event: CurationRewardEvent,
    pub vote: VoteRecord,
    pub post_created: DateTime<Utc>,
    /// Whole minutes between post creation and the vote
    pub vote_age_minutes: i64,
}

impl ReconciledVote {
    pub fn new(event: CurationRewardEvent, vote: VoteRecord, post: &PostMetadata) -> Self {
        let vote_age_minutes = vote_age_minutes(post.created, vote.time);
        Self {
            event,
            vote,
            post_created: post.created,
            vote_age_minutes,
        }
    }
}

/// Minutes from `created` to `voted`, floored
pub fn vote_age_minutes(created: DateTime<Utc>, voted: DateTime<Utc>) -> i64 {
    (voted - created).num_seconds().div_euclid(60)
}

// =============================================================================
// Network State
// =============================================================================

/// Global vesting state (stake-to-HIVE exchange rate)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalChainParameters {
    pub total_vesting_fund_hive: f64,
    pub total_vesting_shares: f64,
}

impl GlobalChainParameters {
    pub fn from_json(value: &Value) -> Result<Self, DecodeError> {
        let fund = value
            .get("total_vesting_fund_hive")
            .or_else(|| value.get("total_vesting_fund_steem"))
            .ok_or(DecodeError::Field("total_vesting_fund_hive"))?;
        let shares = value
            .get("total_vesting_shares")
            .ok_or(DecodeError::Field("total_vesting_shares"))?;

        Ok(Self {
            total_vesting_fund_hive: parse_amount(fund, Denom::Hive)?,
            total_vesting_shares: parse_amount(shares, Denom::Vests)?,
        })
    }

    /// HIVE per VEST
    pub fn exchange_rate(&self) -> f64 {
        self.total_vesting_fund_hive / self.total_vesting_shares
    }
}

/// Reward pool state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardFund {
    pub reward_balance: f64,
    pub recent_claims: f64,
}

impl RewardFund {
    pub fn from_json(value: &Value) -> Result<Self, DecodeError> {
        let balance = value
            .get("reward_balance")
            .ok_or(DecodeError::Field("reward_balance"))?;
        let claims = value
            .get("recent_claims")
            .ok_or(DecodeError::Field("recent_claims"))?;

        Ok(Self {
            reward_balance: parse_amount(balance, Denom::Hive)?,
            recent_claims: parse_number(claims)?,
        })
    }

    pub fn balance_ratio(&self) -> f64 {
        self.reward_balance / self.recent_claims
    }
}

/// Median HBD/HIVE price feed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceFeed {
    /// HBD side
    pub base: f64,
    /// HIVE side
    pub quote: f64,
}

impl PriceFeed {
    pub fn from_json(value: &Value) -> Result<Self, DecodeError> {
        let base = value.get("base").ok_or(DecodeError::Field("base"))?;
        let quote = value.get("quote").ok_or(DecodeError::Field("quote"))?;

        Ok(Self {
            base: parse_amount(base, Denom::Hbd)?,
            quote: parse_amount(quote, Denom::Hive)?,
        })
    }

    /// HBD per HIVE
    pub fn rate(&self) -> f64 {
        self.base / self.quote
    }
}

/// An account's own and delegated stake, in VESTS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountStakeSummary {
    pub own_stake: f64,
    pub delegated_out: f64,
    pub delegated_in: f64,
}

impl AccountStakeSummary {
    pub fn from_json(value: &Value) -> Result<Self, DecodeError> {
        let vests = |field: &'static str| -> Result<f64, DecodeError> {
            let raw = value.get(field).ok_or(DecodeError::Field(field))?;
            Ok(parse_amount(raw, Denom::Vests)?)
        };

        Ok(Self {
            own_stake: vests("vesting_shares")?,
            delegated_out: vests("delegated_vesting_shares")?,
            delegated_in: vests("received_vesting_shares")?,
        })
    }

    /// Stake that votes for the account
    pub fn effective_stake(&self) -> f64 {
        self.own_stake + self.delegated_in - self.delegated_out
    }
}

// =============================================================================
// Results
// =============================================================================

/// Efficiency of one curation vote
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EfficiencyResult {
    pub post_id: String,
    /// Realized curation reward (HP)
    pub realized_value: f64,
    /// Full vote value (HP)
    pub vote_face_value: f64,
    /// Expected curation share (HP)
    pub expected_value: f64,
    /// Expected curation share (HBD)
    pub expected_value_hbd: f64,
    pub efficiency_percent: f64,
    pub vote_percent: f64,
    pub vote_timestamp: DateTime<Utc>,
    pub vote_age_minutes: i64,
}

/// Output of one analysis run
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub results: Vec<EfficiencyResult>,
    pub annualized_yield_percent: f64,
}

impl AnalysisReport {
    /// Nothing was found in the window (not an error)
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
