//! JSON-RPC 2.0 transport to Hive API nodes

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Error of a single RPC attempt against one node.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("cannot send request to {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("node {url} returned HTTP status {status}")]
    Status { url: String, status: StatusCode },

    #[error("cannot decode response from {url}")]
    InvalidResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("node {url} returned error {code}: {message}")]
    Remote {
        url: String,
        code: i64,
        message: String,
    },

    #[error("node {url} returned no result")]
    MissingResult { url: String },
}

/// Issues one JSON-RPC call against one node.
#[trait_variant::make(Send)]
pub trait RpcTransport: Sync {
    async fn call(&self, url: &str, method: &str, params: Value) -> Result<Value, RpcError>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    message: String,
}

/// Split a response envelope into its result or error
fn into_result(url: &str, response: RpcResponse) -> Result<Value, RpcError> {
    if let Some(err) = response.error {
        return Err(RpcError::Remote {
            url: url.to_string(),
            code: err.code,
            message: err.message,
        });
    }
    response.result.ok_or_else(|| RpcError::MissingResult {
        url: url.to_string(),
    })
}

/// HTTP transport backed by reqwest
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl RpcTransport for HttpTransport {
    async fn call(&self, url: &str, method: &str, params: Value) -> Result<Value, RpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(RpcError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let body: RpcResponse = response.json().await.map_err(|source| RpcError::InvalidResponse {
            url: url.to_string(),
            source,
        })?;

        into_result(url, body)
    }
}
