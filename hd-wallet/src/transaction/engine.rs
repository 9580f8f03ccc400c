//! Transfer state machine

use tracing::{debug, info, warn};

use crate::config::{BalancePolicy, SolanaTransferAmount, TransferConfig};
use crate::crypto::keys::{ethereum as evm_keys, solana as solana_keys, ChainKind};
use crate::error::{Error, Result};
use crate::ledger::Ledgers;
use super::airdrop::AirdropService;
use super::ethereum::{self, EvmTxParams};
use super::solana;
use super::types::{Balance, TransferReceipt, TransferRequest, TransferState};

/// Builds, signs and submits native transfers
///
/// Every call fetches a fresh nonce or blockhash and submits independently;
/// nothing is retried or deduplicated.
#[derive(Clone)]
pub struct TransactionEngine {
    config: TransferConfig,
    ledgers: Ledgers,
    airdrops: AirdropService,
}

impl TransactionEngine {
    pub fn new(config: TransferConfig, ledgers: Ledgers) -> Self {
        let airdrops = AirdropService::new(ledgers.clone(), config.airdrop_lamports);
        Self { config, ledgers, airdrops }
    }

    /// Transfer policy in effect
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Faucet service sharing this engine's ledgers
    pub fn airdrops(&self) -> &AirdropService {
        &self.airdrops
    }

    /// Current balance of an address
    pub async fn balance(&self, chain: ChainKind, address: &str) -> Result<Balance> {
        let address = address.trim();
        match chain {
            ChainKind::Evm => {
                evm_keys::parse_address(address)?;
            }
            ChainKind::Solana => {
                solana_keys::parse_address(address)?;
            }
        }

        let base_units = self.ledgers.for_chain(chain).get_balance(address).await?;
        Ok(Balance::new(chain, base_units))
    }

    /// Run one transfer through the state machine
    ///
    /// The receipt's trail only covers attempts that reach the ledger. A
    /// refused or failed attempt ends in the returned error instead:
    /// `InsufficientFunds` for the insufficient state, any other error for
    /// the failed one.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        let mut states = vec![TransferState::Idle];
        let requested = request.validate()?;

        let chain = request.chain;
        let from = request.source.address();
        let to = request.destination.trim();
        let ledger = self.ledgers.for_chain(chain);

        if chain == ChainKind::Solana && self.config.prefund_solana_source {
            self.airdrops.request_funds(from, chain).await?;
        }

        let amount = self.amount_to_send(chain, requested);

        states.push(TransferState::BalanceChecking);
        let available = ledger.get_balance(from).await?;
        debug!(chain = %chain, from, available, amount, "Fetched source balance");

        if amount > available {
            match self.config.balance_policy(chain) {
                BalancePolicy::Enforce => {
                    warn!("Transfer of {} from {} refused: balance {}", amount, from, available);
                    return Err(Error::InsufficientFunds { requested: amount, available });
                }
                BalancePolicy::Advisory => {
                    warn!("Balance {} of {} is below {}; submitting anyway", available, from, amount);
                }
            }
        }
        states.push(TransferState::Sufficient);

        states.push(TransferState::Signing);
        let signed = match chain {
            ChainKind::Evm => {
                let nonce = ledger.get_nonce(from).await?;
                let params = EvmTxParams::from_config(&self.config, nonce);
                ethereum::sign_transfer(&request.source, to, amount, &params)
            }
            ChainKind::Solana => {
                let blockhash = ledger.latest_blockhash().await?;
                let lamports = u64::try_from(amount)
                    .map_err(|_| Error::Validation(format!("{} lamports does not fit in u64", amount)))?;
                solana::sign_transfer(&request.source, to, lamports, &blockhash).map(|(wire, _)| wire)
            }
        };
        let signed = signed.map_err(|e| {
            warn!("Signing {} transfer from {} failed: {}", chain, from, e);
            e
        })?;

        let id = match ledger.send_raw_transaction(&signed).await {
            Ok(id) => id,
            Err(e) => {
                warn!(chain = %chain, from, error = %e, "Transfer submission failed");
                return Err(Error::Submission(e.to_string()));
            }
        };
        states.push(TransferState::Submitted);
        info!(chain = %chain, from, to, amount, id = %id, "Transfer submitted");

        let mut confirmed = false;
        if self.config.await_confirmation {
            ledger
                .confirm(&id)
                .await
                .map_err(|e| Error::Submission(format!("Transfer {} submitted but not confirmed: {}", id, e)))?;
            confirmed = true;
        }

        Ok(TransferReceipt {
            chain,
            from: from.to_string(),
            to: to.to_string(),
            amount,
            id,
            confirmed,
            states,
        })
    }

    /// Base units a transfer will move
    fn amount_to_send(&self, chain: ChainKind, requested: u128) -> u128 {
        match (chain, self.config.solana_amount) {
            (ChainKind::Solana, SolanaTransferAmount::Fixed(lamports)) => u128::from(lamports),
            _ => requested,
        }
    }
}
