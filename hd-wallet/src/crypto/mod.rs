//! Cryptographic primitives and operations
//!
//! This module provides recovery phrase generation, master seed derivation,
//! and per-chain hierarchical key derivation.

pub mod mnemonic;
pub mod keys;

pub use mnemonic::*;
pub use keys::*;
