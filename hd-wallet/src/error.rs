//! Error types for the hd-wallet library

use thiserror::Error;

use crate::ledger::LedgerError;

/// Custom error type for hd-wallet operations
#[derive(Error, Debug)]
pub enum Error {
    /// The random source could not produce entropy
    #[error("Entropy error: {0}")]
    Entropy(String),

    /// Malformed user input or key material
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad seed or derivation path state
    #[error("Derivation error: {0}")]
    Derivation(String),

    /// The source account cannot cover the requested amount
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Requested amount in base units
        requested: u128,
        /// Queried balance in base units
        available: u128,
    },

    /// The ledger did not accept a signed transaction
    #[error("Submission error: {0}")]
    Submission(String),

    /// The ledger refused an airdrop request; retrying later may succeed
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// A ledger query (balance, nonce, blockhash) failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the caller may reasonably retry the same operation
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Submission(_) | Error::RateLimited(_) | Error::Ledger(LedgerError::Transport(_))
        )
    }
}

/// Result type for hd-wallet operations
pub type Result<T> = std::result::Result<T, Error>;
