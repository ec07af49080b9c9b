use std::time::Duration;
use thiserror::Error;

/// Coarse classification used by callers to decide between retrying and aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorKind {
    /// The call exceeded its time budget. Expected while mining.
    Timeout,
    /// The daemon could not be reached or answered with something that is not JSON-RPC.
    ConnectionFailure,
    /// The daemon understood the request and rejected it.
    Rpc,
}

#[derive(Error, Debug, Clone)]
pub enum RpcError {
    #[error("invalid RPC endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("RPC call '{method}' timed out after {}s", .timeout.as_secs())]
    Timeout { method: String, timeout: Duration },

    #[error("RPC connection failed: {0}")]
    ConnectionFailure(String),

    #[error("RPC HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("malformed RPC response for '{method}': {reason}")]
    MalformedResponse { method: String, reason: String },

    #[error("RPC error{}: {message}", code_suffix(.code))]
    Rpc { code: Option<i64>, message: String },
}

impl RpcError {
    pub fn kind(&self) -> RpcErrorKind {
        match self {
            RpcError::Timeout { .. } => RpcErrorKind::Timeout,
            RpcError::Rpc { .. } => RpcErrorKind::Rpc,
            RpcError::InvalidEndpoint { .. }
            | RpcError::ConnectionFailure(_)
            | RpcError::HttpStatus { .. }
            | RpcError::MalformedResponse { .. } => RpcErrorKind::ConnectionFailure,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == RpcErrorKind::Timeout
    }

    /// Builds an `Rpc` error from the raw `error` member of a response.
    ///
    /// Daemons report either `{"code": .., "message": ..}` or a bare scalar;
    /// both end up as a single descriptive message.
    pub fn from_error_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => {
                let code = map.get("code").and_then(|c| c.as_i64());
                let message = match map.get("message") {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) if !other.is_null() => other.to_string(),
                    _ => value.to_string(),
                };
                RpcError::Rpc { code, message }
            }
            serde_json::Value::String(s) => RpcError::Rpc {
                code: None,
                message: s.clone(),
            },
            other => RpcError::Rpc {
                code: None,
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn from_reqwest(method: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RpcError::Timeout {
                method: method.to_string(),
                timeout,
            }
        } else if err.is_decode() || err.is_body() {
            RpcError::MalformedResponse {
                method: method.to_string(),
                reason: err.to_string(),
            }
        } else {
            RpcError::ConnectionFailure(describe_chain(&err))
        }
    }
}

/// Flattens an error and its sources into one line; reqwest hides the
/// interesting part (e.g. "Connection refused") in the source chain.
fn describe_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(src) = source {
        let part = src.to_string();
        if !text.contains(&part) {
            text.push_str(": ");
            text.push_str(&part);
        }
        source = src.source();
    }
    text
}

fn code_suffix(code: &Option<i64>) -> String {
    match code {
        Some(c) => format!(" (code {c})"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
