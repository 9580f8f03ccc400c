//! Ledger client abstraction
//!
//! The engine reaches each blockchain only through [`LedgerClient`]. Concrete
//! JSON-RPC clients live in [`rpc`]; [`mock`] provides a scripted in-memory
//! ledger for tests and offline use.

pub mod mock;
pub mod rpc;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::NetworkConfig;
use crate::crypto::keys::ChainKind;
use crate::error::{Error, Result};

/// Errors reported by ledger clients
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The request never got a usable answer
    #[error("transport error: {0}")]
    Transport(String),

    /// The ledger answered with an error
    #[error("ledger rejected request ({code}): {message}")]
    Rejected { code: i64, message: String },

    /// The ledger refused because of request volume
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The request itself was malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The operation does not exist on this chain
    #[error("{0} is not supported on this chain")]
    Unsupported(&'static str),
}

/// Result type for ledger operations
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Request/response access to one chain
///
/// Amounts are in base units (wei, lamports). Identifiers are the ledger's
/// own text form (0x-hex transaction hash, base-58 signature).
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Chain this client talks to
    fn chain(&self) -> ChainKind;

    /// Current balance of an address
    async fn get_balance(&self, address: &str) -> LedgerResult<u128>;

    /// Next transaction nonce of an address
    async fn get_nonce(&self, _address: &str) -> LedgerResult<u64> {
        Err(LedgerError::Unsupported("getNonce"))
    }

    /// Recent blockhash to anchor a transaction
    async fn latest_blockhash(&self) -> LedgerResult<[u8; 32]> {
        Err(LedgerError::Unsupported("getLatestBlockhash"))
    }

    /// Submit a signed transaction, returning its identifier
    async fn send_raw_transaction(&self, signed: &[u8]) -> LedgerResult<String>;

    /// Ask the faucet for funds, returning the airdrop signature
    async fn request_airdrop(&self, _address: &str, _lamports: u64) -> LedgerResult<String> {
        Err(LedgerError::Unsupported("requestAirdrop"))
    }

    /// Wait until the identified transaction is confirmed
    async fn confirm(&self, id: &str) -> LedgerResult<()>;
}

/// One ledger client per chain
#[derive(Clone)]
pub struct Ledgers {
    evm: Arc<dyn LedgerClient>,
    solana: Arc<dyn LedgerClient>,
}

impl Ledgers {
    /// Pair two clients, checking each serves the expected chain
    pub fn new(evm: Arc<dyn LedgerClient>, solana: Arc<dyn LedgerClient>) -> Result<Self> {
        if evm.chain() != ChainKind::Evm || solana.chain() != ChainKind::Solana {
            return Err(Error::Config(format!(
                "Ledger clients are wired to the wrong chains: evm slot serves {}, solana slot serves {}",
                evm.chain(),
                solana.chain()
            )));
        }
        Ok(Self { evm, solana })
    }

    /// JSON-RPC clients for the configured endpoints
    pub fn connect(network: &NetworkConfig) -> Result<Self> {
        let evm = rpc::EvmRpcLedger::new(&network.evm)?;
        let solana = rpc::SolanaRpcLedger::new(&network.solana)?;
        Self::new(Arc::new(evm), Arc::new(solana))
    }

    /// Client of a chain
    pub fn for_chain(&self, chain: ChainKind) -> &Arc<dyn LedgerClient> {
        match chain {
            ChainKind::Evm => &self.evm,
            ChainKind::Solana => &self.solana,
        }
    }
}
