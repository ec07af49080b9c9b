//! JSON-RPC transport for a Fleet Credits daemon.
//!
//! [`RpcConnector`] is the HTTP implementation of the [`DaemonRpc`] trait. The
//! trait carries the typed helpers (`get_block_count`, `generate`, ...) as
//! provided methods, so anything that can answer a raw [`RpcRequest`] gets
//! them for free; tests rely on this to substitute an in-memory daemon.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

mod error;
mod types;

pub use error::{Result, RpcError, RpcErrorKind};
pub use types::*;

/// Longest excerpt of a non-2xx body kept in the error message.
const HTTP_BODY_EXCERPT: usize = 200;

#[derive(Clone, Debug)]
pub struct RpcConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Budget for `generate`. Must cover a real proof-of-work search.
    pub mining_timeout: Duration,
    /// Budget for every other call.
    pub info_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        RpcConfig {
            url: "http://127.0.0.1:22555".to_string(),
            username: None,
            password: None,
            mining_timeout: Duration::from_secs(3600),
            info_timeout: Duration::from_secs(30),
        }
    }
}

/// Anything that can execute a JSON-RPC request against the daemon.
#[async_trait]
pub trait DaemonRpc: Send + Sync {
    /// Executes one request and returns the `result` member, which may be
    /// `null` or an empty array.
    async fn call(&self, request: RpcRequest, class: CallClass) -> Result<Value>;

    async fn get_blockchain_info(&self) -> Result<BlockchainInfo> {
        let value = self
            .call(RpcRequest::new(METHOD_GET_BLOCKCHAIN_INFO), CallClass::Informational)
            .await?;
        decode(METHOD_GET_BLOCKCHAIN_INFO, value)
    }

    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let value = self
            .call(RpcRequest::new(METHOD_GET_NETWORK_INFO), CallClass::Informational)
            .await?;
        decode(METHOD_GET_NETWORK_INFO, value)
    }

    async fn get_block_count(&self) -> Result<u64> {
        let value = self
            .call(RpcRequest::new(METHOD_GET_BLOCK_COUNT), CallClass::Informational)
            .await?;
        decode(METHOD_GET_BLOCK_COUNT, value)
    }

    async fn get_balance(&self) -> Result<f64> {
        let value = self
            .call(RpcRequest::new(METHOD_GET_BALANCE), CallClass::Informational)
            .await?;
        decode(METHOD_GET_BALANCE, value)
    }

    async fn get_mining_info(&self) -> Result<MiningInfo> {
        let value = self
            .call(RpcRequest::new(METHOD_GET_MINING_INFO), CallClass::Informational)
            .await?;
        decode(METHOD_GET_MINING_INFO, value)
    }

    /// Asks the daemon to mine `count` blocks. `max_tries` selects the
    /// two-argument dialect; `None` sends `[count]` only.
    async fn generate(&self, count: u64, max_tries: Option<u64>) -> Result<Vec<String>> {
        let mut request = RpcRequest::new(METHOD_GENERATE).param(count);
        if let Some(tries) = max_tries {
            request = request.param(tries);
        }
        let value = self.call(request, CallClass::Generation).await?;
        decode(METHOD_GENERATE, value)
    }
}

#[async_trait]
impl<T: DaemonRpc + ?Sized> DaemonRpc for Arc<T> {
    async fn call(&self, request: RpcRequest, class: CallClass) -> Result<Value> {
        (**self).call(request, class).await
    }
}

pub fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| RpcError::MalformedResponse {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// HTTP(S) JSON-RPC client. Holds the reusable connection pool and nothing else.
pub struct RpcConnector {
    client: Client,
    endpoint: Endpoint,
    mining_timeout: Duration,
    info_timeout: Duration,
}

impl RpcConnector {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let endpoint = Endpoint::new(&config.url, config.username, config.password)?;
        Self::with_endpoint(endpoint, config.mining_timeout, config.info_timeout)
    }

    pub fn with_endpoint(
        endpoint: Endpoint,
        mining_timeout: Duration,
        info_timeout: Duration,
    ) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(concat!("fleet-miner/", env!("CARGO_PKG_VERSION"))),
        );
        let client = ClientBuilder::new()
            .default_headers(headers)
            .build()
            .map_err(|e| RpcError::ConnectionFailure(format!("failed to build HTTP client: {e}")))?;

        debug!("RpcConnector ready for {}", endpoint.redacted());
        Ok(Self {
            client,
            endpoint,
            mining_timeout,
            info_timeout,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn timeout_for(&self, class: CallClass) -> Duration {
        match class {
            CallClass::Informational => self.info_timeout,
            CallClass::Generation => self.mining_timeout,
        }
    }

    fn parse_body(method: &str, body: &str) -> Result<Value> {
        let envelope: Value = serde_json::from_str(body).map_err(|e| RpcError::MalformedResponse {
            method: method.to_string(),
            reason: e.to_string(),
        })?;
        let mut fields = match envelope {
            Value::Object(map) => map,
            other => {
                return Err(RpcError::MalformedResponse {
                    method: method.to_string(),
                    reason: format!("expected a JSON object, got {other}"),
                })
            }
        };

        match fields.get("error") {
            Some(err) if !err.is_null() => Err(RpcError::from_error_value(err)),
            _ => Ok(fields.remove("result").unwrap_or(Value::Null)),
        }
    }
}

#[async_trait]
impl DaemonRpc for RpcConnector {
    async fn call(&self, request: RpcRequest, class: CallClass) -> Result<Value> {
        let timeout = self.timeout_for(class);
        trace!(
            "Sending JSON-RPC request: method={}, params={:?}, timeout={:?}",
            request.method,
            request.params,
            timeout
        );

        let mut builder = self
            .client
            .post(self.endpoint.url())
            .timeout(timeout)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request.envelope());
        if let Some((user, password)) = self.endpoint.credentials() {
            builder = builder.basic_auth(user, Some(password));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(&request.method, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.trim().chars().take(HTTP_BODY_EXCERPT).collect();
            return Err(RpcError::HttpStatus {
                status: status.as_u16(),
                body: excerpt,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| RpcError::from_reqwest(&request.method, timeout, e))?;
        trace!("Received JSON-RPC response for {}: {}", request.method, body);

        Self::parse_body(&request.method, &body)
    }
}

#[cfg(test)]
mod tests;
