//! Hive ledger reads with automatic node failover
//!
//! Every read is attempted on the currently selected node. When the attempt
//! fails the pool advances and the read is retried, at most once per node.
//! Responses that arrive but cannot be decoded are not retried.

use log::{debug, info, warn};
use serde_json::{Value, json};
use std::future::Future;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::constants;
use crate::endpoints::EndpointPool;
use crate::model::{
    AccountStakeSummary, DecodeError, GlobalChainParameters, HistoryPage, PostMetadata, PriceFeed,
    RewardFund, VoteRecord, VotesAndPost,
};
use crate::rpc::{RpcError, RpcTransport};

/// Error returned by [Ledger] reads.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no ledger endpoint available for {operation} after {attempts} attempt(s)")]
    NoReachableEndpoint {
        operation: &'static str,
        attempts: usize,
        #[source]
        last: Option<RpcError>,
    },

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("cannot decode {what}")]
    Decode {
        what: &'static str,
        #[source]
        source: DecodeError,
    },
}

impl LedgerError {
    fn decode(what: &'static str) -> impl FnOnce(DecodeError) -> Self {
        move |source| LedgerError::Decode { what, source }
    }
}

/// The ledger reads the analysis depends on.
#[trait_variant::make(Send)]
pub trait Ledger: Sync {
    /// Stake summary of an account.
    async fn fetch_account(&self, name: &str) -> Result<AccountStakeSummary, LedgerError>;

    /// Up to `page_size` operations with ids at or below `cursor` (-1 = newest).
    async fn fetch_history_page(
        &self,
        name: &str,
        cursor: i64,
        page_size: u32,
    ) -> Result<HistoryPage, LedgerError>;

    /// Active votes and metadata of a post.
    async fn fetch_votes_and_post(&self, author: &str, permlink: &str) -> Result<VotesAndPost, LedgerError>;

    async fn fetch_global_parameters(&self) -> Result<GlobalChainParameters, LedgerError>;

    async fn fetch_reward_fund(&self, kind: &str) -> Result<RewardFund, LedgerError>;

    async fn fetch_price_feed(&self) -> Result<PriceFeed, LedgerError>;
}

/// Clamp a requested history page size to what nodes accept
pub fn effective_page_size(requested: u32) -> u32 {
    requested.clamp(1, constants::MAX_HISTORY_PAGE_SIZE)
}

/// [Ledger] implementation over an [RpcTransport] and an [EndpointPool]
pub struct LedgerClient<T> {
    transport: T,
    pool: Mutex<EndpointPool>,
}

impl<T: RpcTransport> LedgerClient<T> {
    pub fn new(transport: T, pool: EndpointPool) -> Self {
        Self {
            transport,
            pool: Mutex::new(pool),
        }
    }

    /// Cheap read used to check that a node answers
    pub async fn probe(&self, url: &str) -> bool {
        match self
            .transport
            .call(url, constants::METHOD_GET_DYNAMIC_GLOBAL_PROPERTIES, json!([]))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!("Probe of {} failed: {}", url, e);
                false
            }
        }
    }

    /// Select the first reachable node, starting from the current one
    pub async fn connect(&self) -> Result<(), LedgerError> {
        let mut pool = self.pool.lock().await;
        if pool.find_reachable(|url| async move { self.probe(&url).await }).await {
            debug!("Using node {} of {}", pool.current_index() + 1, pool.size());
            Ok(())
        } else {
            Err(LedgerError::NoReachableEndpoint {
                operation: "connect",
                attempts: pool.size(),
                last: None,
            })
        }
    }

    pub async fn current_endpoint(&self) -> String {
        self.pool.lock().await.current().to_string()
    }

    /// Run `attempt` against the current node, advancing the pool after each failure
    async fn with_failover<R, F, Fut>(&self, operation: &'static str, attempt: F) -> Result<R, LedgerError>
    where
        F: Fn(String) -> Fut + Send + Sync,
        Fut: Future<Output = Result<R, RpcError>> + Send,
        R: Send,
    {
        let attempts = self.pool.lock().await.size();
        let mut last = None;

        for n in 1..=attempts {
            let url = self.current_endpoint().await;
            match attempt(url).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("{} failed ({}/{}): {}", operation, n, attempts, e);
                    let next = self.pool.lock().await.advance().to_string();
                    if n < attempts {
                        info!("Switching to node {}", next);
                    }
                    last = Some(e);
                }
            }
        }

        Err(LedgerError::NoReachableEndpoint {
            operation,
            attempts,
            last,
        })
    }

    async fn call(&self, operation: &'static str, method: &'static str, params: Value) -> Result<Value, LedgerError> {
        self.with_failover(operation, |url| {
            let params = params.clone();
            async move { self.transport.call(&url, method, params).await }
        })
        .await
    }
}

impl<T: RpcTransport> Ledger for LedgerClient<T> {
    async fn fetch_account(&self, name: &str) -> Result<AccountStakeSummary, LedgerError> {
        let accounts = self
            .call("fetch_account", constants::METHOD_GET_ACCOUNTS, json!([[name]]))
            .await?;

        let account = accounts
            .as_array()
            .and_then(|list| list.first())
            .ok_or_else(|| LedgerError::AccountNotFound(name.to_string()))?;

        AccountStakeSummary::from_json(account).map_err(LedgerError::decode("account"))
    }

    async fn fetch_history_page(
        &self,
        name: &str,
        cursor: i64,
        page_size: u32,
    ) -> Result<HistoryPage, LedgerError> {
        let limit = effective_page_size(page_size);
        let page = self
            .call(
                "fetch_history_page",
                constants::METHOD_GET_ACCOUNT_HISTORY,
                json!([name, cursor, limit]),
            )
            .await?;

        let entries = page
            .as_array()
            .ok_or(DecodeError::Field("history"))
            .map_err(LedgerError::decode("account history"))?;

        Ok(HistoryPage::from_entries(entries))
    }

    async fn fetch_votes_and_post(&self, author: &str, permlink: &str) -> Result<VotesAndPost, LedgerError> {
        let (votes, content) = self
            .with_failover("fetch_votes_and_post", |url| async move {
                tokio::try_join!(
                    self.transport
                        .call(&url, constants::METHOD_GET_ACTIVE_VOTES, json!([author, permlink])),
                    self.transport
                        .call(&url, constants::METHOD_GET_CONTENT, json!([author, permlink])),
                )
            })
            .await?;

        let votes: Vec<VoteRecord> = serde_json::from_value(votes)
            .map_err(DecodeError::from)
            .map_err(LedgerError::decode("active votes"))?;
        let post: PostMetadata = serde_json::from_value(content)
            .map_err(DecodeError::from)
            .map_err(LedgerError::decode("post"))?;

        Ok(VotesAndPost { votes, post })
    }

    async fn fetch_global_parameters(&self) -> Result<GlobalChainParameters, LedgerError> {
        let props = self
            .call(
                "fetch_global_parameters",
                constants::METHOD_GET_DYNAMIC_GLOBAL_PROPERTIES,
                json!([]),
            )
            .await?;
        GlobalChainParameters::from_json(&props).map_err(LedgerError::decode("global properties"))
    }

    async fn fetch_reward_fund(&self, kind: &str) -> Result<RewardFund, LedgerError> {
        let fund = self
            .call("fetch_reward_fund", constants::METHOD_GET_REWARD_FUND, json!([kind]))
            .await?;
        RewardFund::from_json(&fund).map_err(LedgerError::decode("reward fund"))
    }

    async fn fetch_price_feed(&self) -> Result<PriceFeed, LedgerError> {
        let price = self
            .call("fetch_price_feed", constants::METHOD_GET_MEDIAN_PRICE, json!([]))
            .await?;
        PriceFeed::from_json(&price).map_err(LedgerError::decode("price feed"))
    }
}
