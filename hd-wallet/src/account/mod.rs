//! Session management functionality
//!
//! A session owns one recovery phrase, its master seed, and the keypairs
//! derived from it for each chain.

mod session;

pub use session::*;
