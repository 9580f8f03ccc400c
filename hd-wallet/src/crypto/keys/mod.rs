//! Key derivation and management
//!
//! This module provides hierarchical derivation of per-account key material
//! and the chain-specific providers that turn it into usable keypairs.

pub mod ethereum;
pub mod solana;
mod derivation;

pub use derivation::*;
pub use ethereum::EvmKeyProvider;
pub use solana::SolanaKeyProvider;
