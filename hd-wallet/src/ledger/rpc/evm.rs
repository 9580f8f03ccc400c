//! EVM ledger over the ethers HTTP provider

use std::time::Duration;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::{Address, BlockNumber, Bytes, H256, U256};

use crate::config::ProviderConfig;
use crate::crypto::keys::{ethereum, ChainKind};
use crate::error::{Error, Result};
use crate::ledger::{LedgerClient, LedgerError, LedgerResult};
use super::{classify_rpc_error, http_client};

/// EVM JSON-RPC client
pub struct EvmRpcLedger {
    provider: Provider<Http>,
    confirm_attempts: u32,
    confirm_interval: Duration,
}

impl EvmRpcLedger {
    /// Create a client for the configured endpoint
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let url = reqwest::Url::parse(&config.endpoint())
            .map_err(|e| Error::Config(format!("Invalid EVM RPC URL {}: {}", config.url, e)))?;
        let http = Http::new_with_client(url, http_client(config)?);

        Ok(Self {
            provider: Provider::new(http),
            confirm_attempts: config.confirm_attempts,
            confirm_interval: Duration::from_millis(config.confirm_interval_ms),
        })
    }
}

fn map_provider_error(err: ProviderError) -> LedgerError {
    if let Some(response) = err.as_error_response() {
        return classify_rpc_error(response.code, &response.message);
    }
    if err.as_serde_error().is_some() {
        return LedgerError::InvalidResponse(err.to_string());
    }

    let message = err.to_string();
    if message.contains("429") || message.to_ascii_lowercase().contains("too many requests") {
        LedgerError::RateLimited(message)
    } else {
        LedgerError::Transport(message)
    }
}

fn to_address(address: &str) -> LedgerResult<Address> {
    ethereum::parse_address(address)
        .map(Address::from)
        .map_err(|e| LedgerError::InvalidRequest(e.to_string()))
}

fn to_tx_hash(id: &str) -> LedgerResult<H256> {
    let bytes = hex::decode(id.trim_start_matches("0x"))
        .map_err(|e| LedgerError::InvalidRequest(format!("Invalid transaction hash {}: {}", id, e)))?;
    if bytes.len() != 32 {
        return Err(LedgerError::InvalidRequest(format!("Invalid transaction hash length: {}", id)));
    }
    Ok(H256::from_slice(&bytes))
}

fn u256_to_u128(value: U256) -> LedgerResult<u128> {
    if value.bits() > 128 {
        return Err(LedgerError::InvalidResponse(format!("Value out of range: {}", value)));
    }
    Ok(value.as_u128())
}

#[async_trait]
impl LedgerClient for EvmRpcLedger {
    fn chain(&self) -> ChainKind {
        ChainKind::Evm
    }

    async fn get_balance(&self, address: &str) -> LedgerResult<u128> {
        let balance = self
            .provider
            .get_balance(to_address(address)?, Some(BlockNumber::Latest.into()))
            .await
            .map_err(map_provider_error)?;
        u256_to_u128(balance)
    }

    async fn get_nonce(&self, address: &str) -> LedgerResult<u64> {
        let nonce = self
            .provider
            .get_transaction_count(to_address(address)?, Some(BlockNumber::Latest.into()))
            .await
            .map_err(map_provider_error)?;
        if nonce.bits() > 64 {
            return Err(LedgerError::InvalidResponse(format!("Nonce out of range: {}", nonce)));
        }
        Ok(nonce.as_u64())
    }

    async fn send_raw_transaction(&self, signed: &[u8]) -> LedgerResult<String> {
        let pending = self
            .provider
            .send_raw_transaction(Bytes::from(signed.to_vec()))
            .await
            .map_err(map_provider_error)?;
        Ok(format!("{:?}", pending.tx_hash()))
    }

    async fn confirm(&self, id: &str) -> LedgerResult<()> {
        let hash = to_tx_hash(id)?;

        for attempt in 1..=self.confirm_attempts {
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(map_provider_error)?;

            match receipt {
                Some(receipt) if receipt.status == Some(0u64.into()) => {
                    return Err(LedgerError::Rejected {
                        code: 0,
                        message: format!("Transaction {} reverted", id),
                    });
                }
                Some(_) => return Ok(()),
                None => {
                    tracing::debug!(tx_hash = %id, attempt, "Receipt not yet available");
                    tokio::time::sleep(self.confirm_interval).await;
                }
            }
        }

        Err(LedgerError::Transport(format!(
            "Transaction {} not confirmed after {} attempts",
            id, self.confirm_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_hash_parsing() {
        let id = format!("0x{}", "ab".repeat(32));
        let hash = to_tx_hash(&id).unwrap();
        assert_eq!(format!("{:?}", hash), id);

        assert!(matches!(to_tx_hash("0x1234"), Err(LedgerError::InvalidRequest(_))));
        assert!(matches!(to_tx_hash("0xzz"), Err(LedgerError::InvalidRequest(_))));
    }

    #[test]
    fn test_u256_conversion() {
        assert_eq!(u256_to_u128(U256::from(42u64)).unwrap(), 42);
        assert_eq!(u256_to_u128(U256::from(u128::MAX)).unwrap(), u128::MAX);
        assert!(u256_to_u128(U256::MAX).is_err());
    }

    #[test]
    fn test_address_validation() {
        assert!(to_address("0x9858EfFD232B4033E47d90003D41EC34EcaEda94").is_ok());
        assert!(matches!(to_address("9858EfFD"), Err(LedgerError::InvalidRequest(_))));
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let config = ProviderConfig::new("::not-a-url");
        assert!(matches!(EvmRpcLedger::new(&config), Err(Error::Config(_))));
    }
}
