//! JSON-RPC ledger clients

mod evm;
mod solana;

pub use evm::EvmRpcLedger;
pub use solana::SolanaRpcLedger;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use super::{LedgerError, LedgerResult};

/// JSON-RPC error code some providers use for throttling
pub const RATE_LIMIT_CODE: i64 = -32429;

/// Build the HTTP client for an endpoint
pub(crate) fn http_client(config: &ProviderConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Classify a JSON-RPC error object
pub(crate) fn classify_rpc_error(code: i64, message: &str) -> LedgerError {
    let lowered = message.to_ascii_lowercase();
    if code == RATE_LIMIT_CODE
        || code == 429
        || lowered.contains("rate limit")
        || lowered.contains("too many requests")
    {
        LedgerError::RateLimited(message.to_string())
    } else {
        LedgerError::Rejected { code, message: message.to_string() }
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Plain JSON-RPC 2.0 over HTTP POST
pub(crate) struct JsonRpcTransport {
    client: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    pub(crate) fn new(config: &ProviderConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        reqwest::Url::parse(&endpoint)
            .map_err(|e| Error::Config(format!("Invalid RPC URL {}: {}", config.url, e)))?;

        Ok(Self {
            client: http_client(config)?,
            endpoint,
            next_id: AtomicU64::new(1),
        })
    }

    pub(crate) async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> LedgerResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "id": id,
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });

        tracing::debug!(method, id, "Sending JSON-RPC request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LedgerError::RateLimited(format!("{} returned HTTP 429", method)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let parsed: RpcResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(LedgerError::Transport(format!("{} returned HTTP {}", method, status)));
            }
            Err(e) => return Err(LedgerError::InvalidResponse(format!("{}: {}", method, e))),
        };

        if let Some(error) = parsed.error {
            return Err(classify_rpc_error(error.code, &error.message));
        }

        let result = parsed
            .result
            .ok_or_else(|| LedgerError::InvalidResponse(format!("{}: missing result", method)))?;
        serde_json::from_value(result).map_err(|e| LedgerError::InvalidResponse(format!("{}: {}", method, e)))
    }
}
