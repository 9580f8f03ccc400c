//! Test-network faucet requests

use tracing::{info, warn};

use crate::crypto::keys::{solana, ChainKind};
use crate::error::{Error, Result};
use crate::ledger::{LedgerError, Ledgers};

/// Requests faucet funds and waits for them to land
#[derive(Clone)]
pub struct AirdropService {
    ledgers: Ledgers,
    lamports: u64,
}

impl AirdropService {
    /// A service requesting `lamports` per airdrop
    pub fn new(ledgers: Ledgers, lamports: u64) -> Self {
        Self { ledgers, lamports }
    }

    /// Lamports requested per airdrop
    pub fn lamports(&self) -> u64 {
        self.lamports
    }

    /// Airdrop to a Solana address, returning the confirmed signature
    ///
    /// Any faucet refusal is reported as [`Error::RateLimited`]; callers may
    /// retry later.
    pub async fn request_funds(&self, address: &str, chain: ChainKind) -> Result<String> {
        if chain != ChainKind::Solana {
            return Err(Error::Validation(format!("Airdrops are not available on {}", chain)));
        }
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::Validation("Airdrop address is empty".to_string()));
        }
        solana::parse_address(address)?;

        let ledger = self.ledgers.for_chain(chain);
        let signature = ledger
            .request_airdrop(address, self.lamports)
            .await
            .map_err(|e| refused(address, e))?;

        ledger.confirm(&signature).await.map_err(|e| {
            warn!("Airdrop {} to {} did not confirm: {}", signature, address, e);
            Error::RateLimited(format!("Airdrop {} not confirmed: {}", signature, e))
        })?;

        info!(address, lamports = self.lamports, signature = %signature, "Airdrop confirmed");
        Ok(signature)
    }
}

fn refused(address: &str, err: LedgerError) -> Error {
    match err {
        LedgerError::InvalidRequest(message) => Error::Validation(message),
        other => {
            warn!("Airdrop to {} refused: {}", address, other);
            Error::RateLimited(other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::LAMPORTS_PER_SOL;
    use crate::ledger::mock::{LedgerCall, MockLedger};

    const ADDRESS: &str = "4fYNw3dojWmQ4dXtSGE9epjRGy9pFSx62YypT7avPYvA";

    fn service(solana: MockLedger) -> (AirdropService, Arc<MockLedger>) {
        let solana = Arc::new(solana);
        let ledgers = Ledgers::new(Arc::new(MockLedger::new(ChainKind::Evm)), solana.clone()).unwrap();
        (AirdropService::new(ledgers, LAMPORTS_PER_SOL), solana)
    }

    #[tokio::test]
    async fn test_airdrop_credits_and_confirms() {
        let (service, ledger) = service(MockLedger::new(ChainKind::Solana));
        let signature = service.request_funds(ADDRESS, ChainKind::Solana).await.unwrap();

        assert_eq!(ledger.balance(), u128::from(LAMPORTS_PER_SOL));
        assert_eq!(
            ledger.calls(),
            vec![
                LedgerCall::RequestAirdrop(ADDRESS.to_string(), LAMPORTS_PER_SOL),
                LedgerCall::Confirm(signature),
            ]
        );
    }

    #[tokio::test]
    async fn test_refusal_is_rate_limited() {
        let (service, ledger) = service(
            MockLedger::new(ChainKind::Solana)
                .failing_airdrops(LedgerError::Rejected { code: -32603, message: "airdrop failed".to_string() }),
        );
        let err = service.request_funds(ADDRESS, ChainKind::Solana).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));
        assert!(err.is_transient());
        assert_eq!(ledger.balance(), 0);
    }

    #[tokio::test]
    async fn test_unconfirmed_airdrop_is_rate_limited() {
        let (service, _) = service(
            MockLedger::new(ChainKind::Solana).failing_confirmations(LedgerError::Transport("timeout".to_string())),
        );
        assert!(matches!(
            service.request_funds(ADDRESS, ChainKind::Solana).await,
            Err(Error::RateLimited(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_evm_and_bad_addresses() {
        let (service, ledger) = service(MockLedger::new(ChainKind::Solana));
        assert!(matches!(
            service.request_funds("0x9858EfFD232B4033E47d90003D41EC34EcaEda94", ChainKind::Evm).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(service.request_funds("  ", ChainKind::Solana).await, Err(Error::Validation(_))));
        assert!(matches!(service.request_funds("not-base58!", ChainKind::Solana).await, Err(Error::Validation(_))));
        assert!(ledger.calls().is_empty());
    }
}
