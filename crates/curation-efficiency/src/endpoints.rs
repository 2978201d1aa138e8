//! Pool of redundant RPC endpoints with round-robin failover

use log::{info, warn};
use std::future::Future;

/// Ordered list of node URLs and the currently selected one
#[derive(Debug, Clone)]
pub struct EndpointPool {
    urls: Vec<String>,
    current: usize,
}

impl EndpointPool {
    /// Create a pool; returns `None` when `urls` is empty
    pub fn new(urls: Vec<String>) -> Option<Self> {
        if urls.is_empty() {
            return None;
        }
        Some(Self { urls, current: 0 })
    }

    pub fn size(&self) -> usize {
        self.urls.len()
    }

    pub fn current(&self) -> &str {
        &self.urls[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Select the next endpoint, wrapping around
    pub fn advance(&mut self) -> &str {
        self.current = (self.current + 1) % self.urls.len();
        self.current()
    }

    /// Try each endpoint once, starting at the current one, until `probe`
    /// succeeds. The reachable endpoint stays selected.
    pub async fn find_reachable<F, Fut>(&mut self, mut probe: F) -> bool
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = bool>,
    {
        for _ in 0..self.urls.len() {
            let url = self.current().to_string();
            info!("Trying node {}", url);

            if probe(url.clone()).await {
                info!("Connected to {}", url);
                return true;
            }

            warn!("Node {} is unreachable", url);
            self.advance();
        }
        false
    }
}
