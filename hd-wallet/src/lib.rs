//! HD Wallet Core - Deterministic multi-chain key & transaction engine
//!
//! This library derives many independent keypairs from a single recovery
//! phrase for two account models (secp256k1 EVM accounts and ed25519 Solana
//! accounts), and uses those keypairs to query balances, request test funds,
//! and build, sign and submit native transfers through a ledger client.

pub mod error;
pub mod config;
pub mod crypto;
pub mod account;
pub mod ledger;
pub mod transaction;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use account::Session;
pub use crypto::keys::{ChainKeyPair, ChainKind, DerivationPath};
pub use crypto::mnemonic::{MasterSeed, RecoveryPhrase};
pub use ledger::{LedgerClient, LedgerError, Ledgers};
pub use transaction::{AirdropService, TransactionEngine, TransferReceipt, TransferRequest, TransferState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
