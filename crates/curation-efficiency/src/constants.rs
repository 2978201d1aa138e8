//! Centralized constants for the curation efficiency analyzer
//!
//! Network-wide values that apply to every Hive account.
//! Per-run settings are loaded from config.toml and the command line.

// =============================================================================
// RPC Endpoints
// =============================================================================

/// Public Hive API nodes, tried in order
pub const DEFAULT_NODES: &[&str] = &[
    "https://api.deathwing.me",
    "https://api.hive.blog",
    "https://api.openhive.network",
    "https://rpc.ecency.com",
    "https://api.hivekings.com",
];

/// Per-request timeout for node calls (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

// =============================================================================
// RPC Methods (condenser API)
// =============================================================================

pub const METHOD_GET_ACCOUNTS: &str = "condenser_api.get_accounts";
pub const METHOD_GET_ACCOUNT_HISTORY: &str = "condenser_api.get_account_history";
pub const METHOD_GET_ACTIVE_VOTES: &str = "condenser_api.get_active_votes";
pub const METHOD_GET_CONTENT: &str = "condenser_api.get_content";
pub const METHOD_GET_DYNAMIC_GLOBAL_PROPERTIES: &str = "condenser_api.get_dynamic_global_properties";
pub const METHOD_GET_REWARD_FUND: &str = "condenser_api.get_reward_fund";
pub const METHOD_GET_MEDIAN_PRICE: &str = "condenser_api.get_current_median_history_price";

// =============================================================================
// Hive Protocol Constants
// =============================================================================

/// Maximum number of operations returned by one account history call
pub const MAX_HISTORY_PAGE_SIZE: u32 = 1000;

/// Cursor value meaning "start from the newest operation"
pub const HISTORY_CURSOR_LATEST: i64 = -1;

/// Operation kind of a curation reward virtual operation
pub const CURATION_REWARD_OP: &str = "curation_reward";

/// Full voting power (100.00%)
pub const FULL_VOTING_POWER: f64 = 10_000.0;

/// Reward fund used for post and comment payouts
pub const DEFAULT_REWARD_FUND: &str = "post";

/// Timestamp format used by the condenser API (UTC, no zone suffix)
pub const HIVE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// =============================================================================
// Analysis Defaults
// =============================================================================

/// Default trailing window (days)
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Weeks per year used for yield extrapolation
pub const WEEKS_PER_YEAR: f64 = 52.0;

/// Vote value is twice the expected curation share
pub const VOTE_VALUE_MULTIPLIER: f64 = 2.0;

/// Decimal places kept on an estimated vote value
pub const VOTE_VALUE_DECIMALS: i32 = 4;

// =============================================================================
// File Names
// =============================================================================

/// Default config file path
pub const CONFIG_FILENAME: &str = "config.toml";
