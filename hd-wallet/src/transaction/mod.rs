//! Transfer functionality
//!
//! Builds, signs and submits native transfers on both chains, and requests
//! faucet funds on Solana test networks.

pub mod types;
pub mod ethereum;
pub mod solana;
mod airdrop;
mod engine;

pub use types::*;
pub use airdrop::AirdropService;
pub use engine::TransactionEngine;
