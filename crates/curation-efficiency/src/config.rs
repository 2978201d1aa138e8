//! Configuration for the curation efficiency analyzer

use anyhow::{Context, Result};
use chrono::Duration;
use log::warn;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration as StdDuration;

use crate::aggregator::AnalysisSettings;
use crate::constants;
use crate::ledger::effective_page_size;
use crate::scanner::{ScanLimits, ScanSettings};

// =============================================================================
// File-based Configuration (config.toml)
// =============================================================================

/// Configuration loaded from config.toml; every section is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub nodes: NodesConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// RPC node settings
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodesConfig {
    /// Node URLs in failover order (defaults to the public node list)
    #[serde(default)]
    pub urls: Vec<String>,
    /// Per-request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// Analysis settings
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub window_days: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub reward_fund: Option<String>,
    /// Stop after examining this many history operations
    #[serde(default)]
    pub max_operations: Option<usize>,
    /// Stop scanning after this many seconds
    #[serde(default)]
    pub max_scan_secs: Option<u64>,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| {
            "Invalid configuration. Check for:\n\
             - Unknown keys (only [nodes] and [analysis] sections are read)\n\
             - Invalid TOML syntax (missing quotes, brackets, etc.)\n\
             - Incorrect data types (strings vs numbers)"
        })
    }

    /// Load `path` if given, otherwise the default file when it exists
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(constants::CONFIG_FILENAME);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Command line values that take precedence over the file
#[derive(Debug, Default)]
pub struct Overrides {
    pub nodes: Vec<String>,
    pub window_days: Option<u32>,
    pub max_operations: Option<usize>,
    pub max_scan_secs: Option<u64>,
}

/// Main configuration struct with resolved values
#[derive(Debug)]
pub struct Config {
    /// Account under analysis (no leading `@`)
    pub account: String,
    /// Node URLs in failover order
    pub nodes: Vec<String>,
    pub request_timeout: StdDuration,
    pub window_days: u32,
    pub page_size: u32,
    pub reward_fund: String,
    pub limits: ScanLimits,
}

/// Strip a leading `@` and lowercase
pub fn normalize_account(name: &str) -> Result<String> {
    let name = name.trim().trim_start_matches('@').to_lowercase();
    if name.is_empty() {
        anyhow::bail!("Account name is empty");
    }
    Ok(name)
}

impl Config {
    /// Resolve defaults, file values and command line overrides
    pub fn from_file(file_config: &FileConfig, account: &str, overrides: Overrides) -> Result<Self> {
        let analysis = &file_config.analysis;

        let nodes = if !overrides.nodes.is_empty() {
            overrides.nodes
        } else if !file_config.nodes.urls.is_empty() {
            file_config.nodes.urls.clone()
        } else {
            constants::DEFAULT_NODES.iter().map(|s| s.to_string()).collect()
        };

        let window_days = overrides
            .window_days
            .or(analysis.window_days)
            .unwrap_or(constants::DEFAULT_WINDOW_DAYS);
        if window_days == 0 {
            anyhow::bail!("Analysis window must be at least one day");
        }

        let requested_page_size = analysis.page_size.unwrap_or(constants::MAX_HISTORY_PAGE_SIZE);
        let page_size = effective_page_size(requested_page_size);
        if page_size != requested_page_size {
            warn!(
                "History page size {} is outside 1..={}, using {}",
                requested_page_size,
                constants::MAX_HISTORY_PAGE_SIZE,
                page_size
            );
        }

        Ok(Self {
            account: normalize_account(account)?,
            nodes,

            request_timeout: StdDuration::from_secs(
                file_config
                    .nodes
                    .request_timeout_secs
                    .unwrap_or(constants::DEFAULT_REQUEST_TIMEOUT_SECS),
            ),

            window_days,

            page_size,

            reward_fund: analysis
                .reward_fund
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_REWARD_FUND.to_string()),

            // Scan guard, inactive unless configured
            limits: ScanLimits {
                max_operations: overrides.max_operations.or(analysis.max_operations),
                max_duration: overrides
                    .max_scan_secs
                    .or(analysis.max_scan_secs)
                    .map(StdDuration::from_secs),
            },
        })
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            scan: ScanSettings {
                window: Duration::days(self.window_days as i64),
                page_size: self.page_size,
                limits: self.limits,
            },
            reward_fund: self.reward_fund.clone(),
            voting_power: constants::FULL_VOTING_POWER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::from_file(&FileConfig::default(), "@Alice", Overrides::default()).unwrap();
        assert_eq!(config.account, "alice");
        assert_eq!(config.nodes.len(), constants::DEFAULT_NODES.len());
        assert_eq!(config.nodes[0], "https://api.deathwing.me");
        assert_eq!(config.window_days, 7);
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.reward_fund, "post");
        assert!(config.limits.max_operations.is_none());
        assert!(config.limits.max_duration.is_none());
    }

    #[test]
    fn test_file_values() {
        let file = FileConfig::parse(
            r#"
            [nodes]
            urls = ["https://hive-api.example", "https://backup.example"]
            request_timeout_secs = 5

            [analysis]
            window_days = 14
            page_size = 500
            max_operations = 5000
            max_scan_secs = 30
            "#,
        )
        .unwrap();

        let config = Config::from_file(&file, "alice", Overrides::default()).unwrap();
        assert_eq!(config.nodes, vec!["https://hive-api.example", "https://backup.example"]);
        assert_eq!(config.request_timeout, StdDuration::from_secs(5));
        assert_eq!(config.window_days, 14);
        assert_eq!(config.page_size, 500);
        assert_eq!(config.limits.max_operations, Some(5000));
        assert_eq!(config.limits.max_duration, Some(StdDuration::from_secs(30)));

        let settings = config.analysis_settings();
        assert_eq!(settings.scan.window, Duration::days(14));
    }

    #[test]
    fn test_overrides_win() {
        let file = FileConfig::parse("[analysis]\nwindow_days = 14\n").unwrap();
        let overrides = Overrides {
            nodes: vec!["https://cli.example".to_string()],
            window_days: Some(3),
            max_operations: Some(10),
            max_scan_secs: None,
        };

        let config = Config::from_file(&file, "alice", overrides).unwrap();
        assert_eq!(config.nodes, vec!["https://cli.example"]);
        assert_eq!(config.window_days, 3);
        assert_eq!(config.limits.max_operations, Some(10));
    }

    #[test]
    fn test_page_size_clamped_once() {
        let oversized = FileConfig::parse("[analysis]\npage_size = 5000\n").unwrap();
        let config = Config::from_file(&oversized, "alice", Overrides::default()).unwrap();
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.analysis_settings().scan.page_size, 1000);

        let zero = FileConfig::parse("[analysis]\npage_size = 0\n").unwrap();
        let config = Config::from_file(&zero, "alice", Overrides::default()).unwrap();
        assert_eq!(config.page_size, 1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(FileConfig::parse("[analysis]\nwindow = 7\n").is_err());
        assert!(FileConfig::parse("[nodes]\nurls = \"not-a-list\"\n").is_err());

        let zero_window = Overrides {
            window_days: Some(0),
            ..Default::default()
        };
        assert!(Config::from_file(&FileConfig::default(), "alice", zero_window).is_err());
        assert!(Config::from_file(&FileConfig::default(), "@", Overrides::default()).is_err());
    }
}
