//! Tests for transfer building and the balance gate

use std::sync::Arc;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Eip1559TransactionRequest, U256};
use ethers::utils::rlp::Rlp;
use hd_wallet::config::{BalancePolicy, TransferConfig};
use hd_wallet::crypto::keys::{ethereum, solana as solana_keys};
use hd_wallet::ledger::mock::MockLedger;
use hd_wallet::transaction::{ethereum as evm_tx, solana as solana_tx, parse_amount};
use hd_wallet::{ChainKind, Error, Ledgers, Session, TransactionEngine, TransferRequest};
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction as SolTransaction;

const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn session() -> Session {
    let words: Vec<&str> = ABANDON.split(' ').collect();
    Session::from_words(&words).unwrap()
}

#[test]
fn test_evm_raw_transaction_recovers_to_source() {
    let session = session();
    let source = session.derive_at(ChainKind::Evm, 0).unwrap();
    let destination = session.derive_at(ChainKind::Evm, 1).unwrap();

    let params = evm_tx::EvmTxParams::from_config(&TransferConfig::default(), 0);
    let raw = evm_tx::sign_transfer(&source, destination.address(), 10u128.pow(17), &params).unwrap();
    assert_eq!(raw[0], 0x02);

    let (tx, signature) = Eip1559TransactionRequest::decode_signed_rlp(&Rlp::new(&raw[1..])).unwrap();
    assert_eq!(tx.value, Some(U256::from(10u64.pow(17))));
    let signer = signature.recover(TypedTransaction::Eip1559(tx).sighash()).unwrap();
    assert_eq!(ethereum::to_checksum_address(signer.as_bytes()), source.address());
}

#[test]
fn test_solana_signature_verifies_against_address() {
    let session = session();
    let source = session.derive_at(ChainKind::Solana, 0).unwrap();
    let destination = session.derive_at(ChainKind::Solana, 1).unwrap();

    let (wire, signature) = solana_tx::sign_transfer(&source, destination.address(), 1_000_000, &[4u8; 32]).unwrap();
    let public_key = solana_keys::parse_address(source.address()).unwrap();
    let transaction: SolTransaction = bincode::deserialize(&wire).unwrap();
    let signature = Signature::from(signature);

    assert!(signature.verify(&public_key, &transaction.message_data()));
    assert!(!signature.verify(&public_key, b"something else"));
}

#[tokio::test]
async fn test_insufficient_funds_guard() {
    let session = session();
    let evm = Arc::new(MockLedger::new(ChainKind::Evm).with_balance(10u128.pow(18)));
    let ledgers = Ledgers::new(evm.clone(), Arc::new(MockLedger::new(ChainKind::Solana))).unwrap();
    let engine = TransactionEngine::new(TransferConfig::default(), ledgers);

    let request = TransferRequest::new(
        session.derive_at(ChainKind::Evm, 0).unwrap(),
        session.derive_at(ChainKind::Evm, 1).unwrap().address(),
        "2.0",
    );
    let err = engine.transfer(&request).await.unwrap_err();

    assert!(matches!(err, Error::InsufficientFunds { .. }));
    assert!(!err.is_transient());
    assert!(evm.submissions().is_empty());
}

#[tokio::test]
async fn test_zero_amount_is_still_gated() {
    let session = session();
    let config = TransferConfig {
        evm_balance_policy: BalancePolicy::Enforce,
        ..TransferConfig::default()
    };
    let evm = Arc::new(MockLedger::new(ChainKind::Evm));
    let ledgers = Ledgers::new(evm.clone(), Arc::new(MockLedger::new(ChainKind::Solana))).unwrap();
    let engine = TransactionEngine::new(config, ledgers);

    let source = session.derive_at(ChainKind::Evm, 0).unwrap();
    let destination = session.derive_at(ChainKind::Evm, 1).unwrap();

    let receipt = engine.transfer(&TransferRequest::new(source.clone(), destination.address(), "0")).await.unwrap();
    assert_eq!(receipt.amount, 0);

    let err = engine
        .transfer(&TransferRequest::new(source, destination.address(), "0.000000000000000001"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientFunds { requested: 1, available: 0 }));
}

#[test]
fn test_request_validation() {
    let session = session();
    let evm = session.derive_at(ChainKind::Evm, 0).unwrap();
    let sol = session.derive_at(ChainKind::Solana, 0).unwrap();

    assert!(TransferRequest::new(evm.clone(), sol.address(), "1").validate().is_err());
    assert!(TransferRequest::new(sol.clone(), evm.address(), "1").validate().is_err());
    assert!(TransferRequest::new(evm.clone(), evm.address(), "0.0000000000000000001").validate().is_err());
    assert_eq!(TransferRequest::new(sol.clone(), sol.address(), "0.5").validate().unwrap(), 500_000_000);

    let mut mismatched = TransferRequest::new(evm, sol.address(), "1");
    mismatched.chain = ChainKind::Solana;
    assert!(matches!(mismatched.validate(), Err(Error::Validation(_))));

    assert_eq!(parse_amount("1.25", 18).unwrap(), 1_250_000_000_000_000_000);
}
