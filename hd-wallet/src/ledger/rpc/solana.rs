//! Solana ledger over raw JSON-RPC

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::config::ProviderConfig;
use crate::crypto::keys::{solana, ChainKind};
use crate::error::Result;
use crate::ledger::{LedgerClient, LedgerError, LedgerResult};
use super::JsonRpcTransport;

const COMMITMENT: &str = "confirmed";

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    #[serde(default)]
    err: Option<serde_json::Value>,
    #[serde(default)]
    confirmation_status: Option<String>,
}

/// Solana JSON-RPC client
pub struct SolanaRpcLedger {
    transport: JsonRpcTransport,
    confirm_attempts: u32,
    confirm_interval: Duration,
}

impl SolanaRpcLedger {
    /// Create a client for the configured endpoint
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            transport: JsonRpcTransport::new(config)?,
            confirm_attempts: config.confirm_attempts,
            confirm_interval: Duration::from_millis(config.confirm_interval_ms),
        })
    }
}

fn check_address(address: &str) -> LedgerResult<()> {
    solana::parse_address(address)
        .map(|_| ())
        .map_err(|e| LedgerError::InvalidRequest(e.to_string()))
}

fn decode_blockhash(blockhash: &str) -> LedgerResult<[u8; 32]> {
    let bytes = bs58::decode(blockhash)
        .into_vec()
        .map_err(|e| LedgerError::InvalidResponse(format!("Invalid blockhash {}: {}", blockhash, e)))?;
    bytes
        .try_into()
        .map_err(|_| LedgerError::InvalidResponse(format!("Invalid blockhash length: {}", blockhash)))
}

fn is_confirmed(status: &SignatureStatus) -> bool {
    matches!(status.confirmation_status.as_deref(), Some("confirmed") | Some("finalized"))
}

#[async_trait]
impl LedgerClient for SolanaRpcLedger {
    fn chain(&self) -> ChainKind {
        ChainKind::Solana
    }

    async fn get_balance(&self, address: &str) -> LedgerResult<u128> {
        check_address(address)?;
        let balance: WithContext<u64> = self
            .transport
            .call("getBalance", json!([address, { "commitment": COMMITMENT }]))
            .await?;
        Ok(u128::from(balance.value))
    }

    async fn latest_blockhash(&self) -> LedgerResult<[u8; 32]> {
        let latest: WithContext<LatestBlockhash> = self
            .transport
            .call("getLatestBlockhash", json!([{ "commitment": COMMITMENT }]))
            .await?;
        decode_blockhash(&latest.value.blockhash)
    }

    async fn send_raw_transaction(&self, signed: &[u8]) -> LedgerResult<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(signed);
        self.transport
            .call(
                "sendTransaction",
                json!([encoded, { "encoding": "base64", "preflightCommitment": COMMITMENT }]),
            )
            .await
    }

    async fn request_airdrop(&self, address: &str, lamports: u64) -> LedgerResult<String> {
        check_address(address)?;
        self.transport
            .call("requestAirdrop", json!([address, lamports]))
            .await
    }

    async fn confirm(&self, id: &str) -> LedgerResult<()> {
        for attempt in 1..=self.confirm_attempts {
            let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
                .transport
                .call(
                    "getSignatureStatuses",
                    json!([[id], { "searchTransactionHistory": true }]),
                )
                .await?;

            match statuses.value.into_iter().next().flatten() {
                Some(SignatureStatus { err: Some(err), .. }) if !err.is_null() => {
                    return Err(LedgerError::Rejected {
                        code: 0,
                        message: format!("Transaction {} failed: {}", id, err),
                    });
                }
                Some(status) if is_confirmed(&status) => return Ok(()),
                _ => {
                    tracing::debug!(signature = %id, attempt, "Signature not yet confirmed");
                    tokio::time::sleep(self.confirm_interval).await;
                }
            }
        }

        Err(LedgerError::Transport(format!(
            "Signature {} not confirmed after {} attempts",
            id, self.confirm_attempts
        )))
    }
}
