use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{Result, RpcError};

pub const METHOD_GET_BLOCKCHAIN_INFO: &str = "getblockchaininfo";
pub const METHOD_GET_NETWORK_INFO: &str = "getnetworkinfo";
pub const METHOD_GET_BALANCE: &str = "getbalance";
pub const METHOD_GET_BLOCK_COUNT: &str = "getblockcount";
pub const METHOD_GET_MINING_INFO: &str = "getmininginfo";
pub const METHOD_GENERATE: &str = "generate";

/// Where the daemon lives and how to authenticate against it.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    username: Option<String>,
    password: Option<String>,
}

impl Endpoint {
    /// Parses and normalizes the base URL. Trailing slashes are dropped so that
    /// `http://host:1234/` and `http://host:1234` address the same endpoint.
    pub fn new(
        url: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|e| RpcError::InvalidEndpoint {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(RpcError::InvalidEndpoint {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none() {
            return Err(RpcError::InvalidEndpoint {
                url: url.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self {
            url: trimmed.to_string(),
            username: username.filter(|u| !u.is_empty()),
            password: password.filter(|p| !p.is_empty()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Basic auth is only sent when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }

    /// URL plus user name, never the password. Safe for logs.
    pub fn redacted(&self) -> String {
        match &self.username {
            Some(user) => format!("{} (user '{}')", self.url, user),
            None => self.url.clone(),
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Selects which timeout budget applies to a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallClass {
    /// Quick reads: counts, balances, chain info.
    Informational,
    /// Block generation; may run for as long as a proof-of-work search takes.
    Generation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub(crate) fn envelope(&self) -> JsonRpcEnvelope<'_> {
        JsonRpcEnvelope {
            jsonrpc: "2.0",
            id: 1,
            method: &self.method,
            params: &self.params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcEnvelope<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: &'a [Value],
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainInfo {
    #[serde(default = "unknown_chain")]
    pub chain: String,
    #[serde(default)]
    pub blocks: u64,
    #[serde(default)]
    pub difficulty: f64,
}

fn unknown_chain() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkInfo {
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub subversion: Option<String>,
    #[serde(default)]
    pub connections: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MiningInfo {
    #[serde(default)]
    pub blocks: u64,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default)]
    pub networkhashps: f64,
}
