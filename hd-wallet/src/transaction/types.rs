//! Common transfer types

use std::fmt;

use ethers::types::U256;
use ethers::utils::{format_units, parse_units, ParseUnits};
use serde::{Deserialize, Serialize};

use crate::crypto::keys::{ethereum, solana, ChainKeyPair, ChainKind};
use crate::error::{Error, Result};

/// Stage of a transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Idle,
    /// Waiting for the source balance
    BalanceChecking,
    /// The balance covers the amount, or the chain does not enforce it
    Sufficient,
    /// The balance cannot cover the amount
    Insufficient,
    Signing,
    /// Accepted by the ledger
    Submitted,
    /// Signing or submission failed
    Failed,
}

impl TransferState {
    /// Whether no further transition follows
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Insufficient | Self::Submitted | Self::Failed)
    }
}

/// Native transfer request
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Chain to transfer on
    pub chain: ChainKind,
    /// Keypair that signs and pays
    pub source: ChainKeyPair,
    /// Destination address in the chain's text form
    pub destination: String,
    /// Amount in native units as decimal text (e.g. "0.5")
    pub amount: String,
}

impl TransferRequest {
    /// A request on the source keypair's chain
    pub fn new(source: ChainKeyPair, destination: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            chain: source.chain(),
            source,
            destination: destination.into(),
            amount: amount.into(),
        }
    }

    /// Check the request shape, returning the amount in base units
    pub fn validate(&self) -> Result<u128> {
        if self.amount.trim().is_empty() {
            return Err(Error::Validation("Amount is empty".to_string()));
        }
        if self.destination.trim().is_empty() {
            return Err(Error::Validation("Destination address is empty".to_string()));
        }
        if self.source.chain() != self.chain {
            return Err(Error::Validation(format!(
                "Source keypair belongs to {}, not {}",
                self.source.chain(),
                self.chain
            )));
        }

        match self.chain {
            ChainKind::Evm => {
                ethereum::parse_address(self.destination.trim())?;
            }
            ChainKind::Solana => {
                solana::parse_address(self.destination.trim())?;
            }
        }

        parse_amount(&self.amount, self.chain.decimals())
    }
}

/// Outcome of a submitted transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub chain: ChainKind,
    /// Source address
    pub from: String,
    /// Destination address
    pub to: String,
    /// Amount sent, in base units
    pub amount: u128,
    /// Ledger-assigned identifier (transaction hash or signature)
    pub id: String,
    /// Whether the ledger confirmed the submission
    pub confirmed: bool,
    /// States the attempt went through, in order
    pub states: Vec<TransferState>,
}

/// Amount in base units with the chain's decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub chain: ChainKind,
    /// Wei or lamports
    pub base_units: u128,
}

impl Balance {
    pub fn new(chain: ChainKind, base_units: u128) -> Self {
        Self { chain, base_units }
    }

    /// Render in native units, e.g. "1.500000000"
    pub fn to_native(&self) -> String {
        format_units(U256::from(self.base_units), self.chain.decimals())
            .unwrap_or_else(|_| self.base_units.to_string())
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_native(), self.chain.symbol())
    }
}

/// Decimal digits of `u128::MAX`
const MAX_AMOUNT_DIGITS: usize = 39;

/// Parse a non-negative decimal amount into base units
///
/// At most `decimals` fractional digits are accepted; the result must fit
/// in 128 bits.
pub fn parse_amount(amount: &str, decimals: u32) -> Result<u128> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(Error::Validation("Amount is empty".to_string()));
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (amount, None),
    };

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || fraction.map_or(false, |f| !all_digits(f)) {
        return Err(Error::Validation(format!("Invalid amount: {}", amount)));
    }
    if fraction.map_or(0, str::len) > decimals as usize {
        return Err(Error::Validation(format!(
            "Amount {} has more than {} decimal places",
            amount, decimals
        )));
    }

    // Any whole part with more than 39 digits once scaled is past u128::MAX
    let significant = whole.trim_start_matches('0').len();
    if significant > 0 && significant + decimals as usize > MAX_AMOUNT_DIGITS {
        return Err(Error::Validation(format!("Amount too large: {}", amount)));
    }

    let parsed = parse_units(amount, decimals)
        .map_err(|e| Error::Validation(format!("Invalid amount {}: {}", amount, e)))?;
    let value = match parsed {
        ParseUnits::U256(value) => value,
        ParseUnits::I256(_) => {
            return Err(Error::Validation(format!("Amount must not be negative: {}", amount)));
        }
    };

    if value.bits() > 128 {
        return Err(Error::Validation(format!("Amount too large: {}", amount)));
    }
    Ok(value.as_u128())
}
