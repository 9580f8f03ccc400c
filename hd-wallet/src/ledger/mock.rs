//! Scripted in-memory ledger

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::crypto::keys::ethereum::keccak256;
use crate::crypto::keys::ChainKind;
use super::{LedgerClient, LedgerError, LedgerResult};

/// A call received by [`MockLedger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    GetBalance(String),
    GetNonce(String),
    LatestBlockhash,
    SendRawTransaction(Vec<u8>),
    RequestAirdrop(String, u64),
    Confirm(String),
}

#[derive(Debug)]
struct MockState {
    balance: u128,
    nonce: u64,
    blockhash: [u8; 32],
    airdrop_error: Option<LedgerError>,
    send_error: Option<LedgerError>,
    confirm_error: Option<LedgerError>,
    calls: Vec<LedgerCall>,
}

/// Mock ledger for testing
///
/// Every address shares one scripted balance. Successful airdrops credit it;
/// each submission bumps the nonce and the blockhash.
#[derive(Debug)]
pub struct MockLedger {
    chain: ChainKind,
    state: Mutex<MockState>,
}

impl MockLedger {
    /// Create a new mock ledger with a zero balance
    pub fn new(chain: ChainKind) -> Self {
        Self {
            chain,
            state: Mutex::new(MockState {
                balance: 0,
                nonce: 0,
                blockhash: [7u8; 32],
                airdrop_error: None,
                send_error: None,
                confirm_error: None,
                calls: Vec::new(),
            }),
        }
    }

    /// Set the balance, in base units
    pub fn with_balance(self, balance: u128) -> Self {
        self.state().balance = balance;
        self
    }

    /// Set the next nonce
    pub fn with_nonce(self, nonce: u64) -> Self {
        self.state().nonce = nonce;
        self
    }

    /// Make every airdrop fail with the given error
    pub fn failing_airdrops(self, error: LedgerError) -> Self {
        self.state().airdrop_error = Some(error);
        self
    }

    /// Make every submission fail with the given error
    pub fn failing_submissions(self, error: LedgerError) -> Self {
        self.state().send_error = Some(error);
        self
    }

    /// Make every confirmation fail with the given error
    pub fn failing_confirmations(self, error: LedgerError) -> Self {
        self.state().confirm_error = Some(error);
        self
    }

    /// Calls received so far, oldest first
    pub fn calls(&self) -> Vec<LedgerCall> {
        self.state().calls.clone()
    }

    /// Signed transactions received so far
    pub fn submissions(&self) -> Vec<Vec<u8>> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                LedgerCall::SendRawTransaction(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Current scripted balance
    pub fn balance(&self) -> u128 {
        self.state().balance
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn chain(&self) -> ChainKind {
        self.chain
    }

    async fn get_balance(&self, address: &str) -> LedgerResult<u128> {
        let mut state = self.state();
        state.calls.push(LedgerCall::GetBalance(address.to_string()));
        Ok(state.balance)
    }

    async fn get_nonce(&self, address: &str) -> LedgerResult<u64> {
        if self.chain != ChainKind::Evm {
            return Err(LedgerError::Unsupported("getNonce"));
        }
        let mut state = self.state();
        state.calls.push(LedgerCall::GetNonce(address.to_string()));
        Ok(state.nonce)
    }

    async fn latest_blockhash(&self) -> LedgerResult<[u8; 32]> {
        if self.chain != ChainKind::Solana {
            return Err(LedgerError::Unsupported("getLatestBlockhash"));
        }
        let mut state = self.state();
        state.calls.push(LedgerCall::LatestBlockhash);
        Ok(state.blockhash)
    }

    async fn send_raw_transaction(&self, signed: &[u8]) -> LedgerResult<String> {
        let mut state = self.state();
        state.calls.push(LedgerCall::SendRawTransaction(signed.to_vec()));
        if let Some(error) = &state.send_error {
            return Err(error.clone());
        }

        state.nonce += 1;
        state.blockhash = keccak256(&state.blockhash);

        let id = match self.chain {
            ChainKind::Evm => format!("0x{}", hex::encode(keccak256(signed))),
            // The first signature of a Solana transaction is its identifier
            ChainKind::Solana => bs58::encode(signed.get(1..65).unwrap_or(signed)).into_string(),
        };
        Ok(id)
    }

    async fn request_airdrop(&self, address: &str, lamports: u64) -> LedgerResult<String> {
        if self.chain != ChainKind::Solana {
            return Err(LedgerError::Unsupported("requestAirdrop"));
        }
        let mut state = self.state();
        state.calls.push(LedgerCall::RequestAirdrop(address.to_string(), lamports));
        if let Some(error) = &state.airdrop_error {
            return Err(error.clone());
        }

        state.balance += u128::from(lamports);
        let digest = keccak256(format!("airdrop:{}:{}", address, state.calls.len()).as_bytes());
        Ok(bs58::encode(digest).into_string())
    }

    async fn confirm(&self, id: &str) -> LedgerResult<()> {
        let mut state = self.state();
        state.calls.push(LedgerCall::Confirm(id.to_string()));
        match &state.confirm_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
