//! Network endpoints and transfer policy

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crypto::keys::ChainKind;
use crate::error::{Error, Result};

/// Lamports in one SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Wei in one gwei
pub const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Sepolia testnet
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

const DEFAULT_EVM_URL: &str = "https://eth-sepolia.g.alchemy.com/v2/";
const DEFAULT_SOLANA_URL: &str = "https://api.devnet.solana.com";

/// RPC endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider URL
    pub url: String,
    /// API key appended to the URL (if required)
    pub api_key: Option<String>,
    /// Timeout in seconds
    pub timeout: Option<u64>,
    /// How many times to poll before giving up on a confirmation
    pub confirm_attempts: u32,
    /// Delay between confirmation polls, in milliseconds
    pub confirm_interval_ms: u64,
}

impl ProviderConfig {
    /// A provider at the given URL with default polling
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout: Some(30),
            confirm_attempts: 30,
            confirm_interval_ms: 1_000,
        }
    }

    /// Full endpoint, with the API key appended to the base URL
    pub fn endpoint(&self) -> String {
        match &self.api_key {
            Some(key) => format!("{}{}", self.url, key),
            None => self.url.clone(),
        }
    }
}

/// Endpoints for both chains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub evm: ProviderConfig,
    pub solana: ProviderConfig,
}

impl NetworkConfig {
    /// Endpoint of a chain
    pub fn for_chain(&self, chain: ChainKind) -> &ProviderConfig {
        match chain {
            ChainKind::Evm => &self.evm,
            ChainKind::Solana => &self.solana,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            evm: ProviderConfig::new(DEFAULT_EVM_URL),
            solana: ProviderConfig::new(DEFAULT_SOLANA_URL),
        }
    }
}

/// Whether a transfer is blocked when the balance cannot cover it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalancePolicy {
    /// Reject with `InsufficientFunds` before signing
    Enforce,
    /// Fetch the balance but sign and submit regardless
    Advisory,
}

impl FromStr for BalancePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "enforce" => Ok(Self::Enforce),
            "advisory" => Ok(Self::Advisory),
            other => Err(Error::Config(format!("Unknown balance policy: {}", other))),
        }
    }
}

/// Lamports moved by a Solana transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolanaTransferAmount {
    /// Always send this many lamports
    Fixed(u64),
    /// Send the amount in the request
    Requested,
}

/// Transfer and airdrop policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// EIP-155 chain id of the EVM network
    pub evm_chain_id: u64,
    /// Gas limit of a native EVM transfer
    pub gas_limit: u64,
    /// EIP-1559 priority fee, in wei
    pub max_priority_fee_per_gas: u128,
    /// EIP-1559 fee cap, in wei
    pub max_fee_per_gas: u128,
    pub evm_balance_policy: BalancePolicy,
    pub solana_balance_policy: BalancePolicy,
    pub solana_amount: SolanaTransferAmount,
    /// Lamports requested per airdrop
    pub airdrop_lamports: u64,
    /// Airdrop to the Solana source before each transfer
    pub prefund_solana_source: bool,
    /// Wait for the ledger to confirm each submission
    pub await_confirmation: bool,
}

impl TransferConfig {
    /// Balance policy of a chain
    pub fn balance_policy(&self, chain: ChainKind) -> BalancePolicy {
        match chain {
            ChainKind::Evm => self.evm_balance_policy,
            ChainKind::Solana => self.solana_balance_policy,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            evm_chain_id: SEPOLIA_CHAIN_ID,
            gas_limit: 21_000,
            max_priority_fee_per_gas: 5 * WEI_PER_GWEI,
            max_fee_per_gas: 20 * WEI_PER_GWEI,
            evm_balance_policy: BalancePolicy::Enforce,
            solana_balance_policy: BalancePolicy::Advisory,
            solana_amount: SolanaTransferAmount::Fixed(1_000_000),
            airdrop_lamports: LAMPORTS_PER_SOL,
            prefund_solana_source: false,
            await_confirmation: false,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub network: NetworkConfig,
    pub transfer: TransferConfig,
}

impl WalletConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("EVM_RPC_URL") {
            config.network.evm.url = url;
        }
        config.network.evm.api_key = std::env::var("EVM_API_KEY").ok();
        if let Ok(url) = std::env::var("SOLANA_RPC_URL") {
            config.network.solana.url = url;
        }
        if let Some(timeout) = env_parse::<u64>("RPC_TIMEOUT_SECS")? {
            config.network.evm.timeout = Some(timeout);
            config.network.solana.timeout = Some(timeout);
        }

        if let Some(chain_id) = env_parse("EVM_CHAIN_ID")? {
            config.transfer.evm_chain_id = chain_id;
        }
        if let Some(lamports) = env_parse::<u64>("SOLANA_TRANSFER_LAMPORTS")? {
            config.transfer.solana_amount = SolanaTransferAmount::Fixed(lamports);
        }
        if let Some(policy) = env_parse("SOLANA_BALANCE_POLICY")? {
            config.transfer.solana_balance_policy = policy;
        }
        if let Some(lamports) = env_parse("AIRDROP_LAMPORTS")? {
            config.transfer.airdrop_lamports = lamports;
        }

        Ok(config)
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?}: {}", key, value, e))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_testnets() {
        let config = WalletConfig::default();
        assert_eq!(config.transfer.evm_chain_id, SEPOLIA_CHAIN_ID);
        assert_eq!(config.transfer.gas_limit, 21_000);
        assert_eq!(config.transfer.balance_policy(ChainKind::Evm), BalancePolicy::Enforce);
        assert_eq!(config.transfer.balance_policy(ChainKind::Solana), BalancePolicy::Advisory);
        assert_eq!(config.network.for_chain(ChainKind::Solana).url, DEFAULT_SOLANA_URL);
    }

    #[test]
    fn test_endpoint_appends_api_key() {
        let mut provider = ProviderConfig::new("https://eth-sepolia.g.alchemy.com/v2/");
        assert_eq!(provider.endpoint(), "https://eth-sepolia.g.alchemy.com/v2/");
        provider.api_key = Some("demo".to_string());
        assert_eq!(provider.endpoint(), "https://eth-sepolia.g.alchemy.com/v2/demo");
    }

    #[test]
    fn test_balance_policy_from_str() {
        assert_eq!("Enforce".parse::<BalancePolicy>().unwrap(), BalancePolicy::Enforce);
        assert!(matches!("sometimes".parse::<BalancePolicy>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_serializes() {
        let config = WalletConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let decoded: WalletConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, config);
    }
}
