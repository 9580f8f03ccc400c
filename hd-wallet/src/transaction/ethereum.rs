//! EIP-1559 native transfers

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Eip1559TransactionRequest, U256};

use crate::config::TransferConfig;
use crate::crypto::keys::{ethereum, ChainKeyPair, ChainKind};
use crate::error::{Error, Result};

/// Fee and replay parameters of an EVM transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmTxParams {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    /// In wei
    pub max_priority_fee_per_gas: u128,
    /// In wei
    pub max_fee_per_gas: u128,
}

impl EvmTxParams {
    /// Parameters from the transfer policy and a ledger nonce
    pub fn from_config(config: &TransferConfig, nonce: u64) -> Self {
        Self {
            chain_id: config.evm_chain_id,
            nonce,
            gas_limit: config.gas_limit,
            max_priority_fee_per_gas: config.max_priority_fee_per_gas,
            max_fee_per_gas: config.max_fee_per_gas,
        }
    }
}

/// Unsigned type-2 transfer of `value` wei
pub fn build_transfer(from: &str, to: &str, value: u128, params: &EvmTxParams) -> Result<TypedTransaction> {
    let from = Address::from(ethereum::parse_address(from)?);
    let to = Address::from(ethereum::parse_address(to)?);

    let request = Eip1559TransactionRequest::new()
        .from(from)
        .to(to)
        .value(U256::from(value))
        .nonce(params.nonce)
        .gas(params.gas_limit)
        .max_priority_fee_per_gas(U256::from(params.max_priority_fee_per_gas))
        .max_fee_per_gas(U256::from(params.max_fee_per_gas))
        .chain_id(params.chain_id);

    Ok(request.into())
}

/// Sign a transfer, returning the raw signed envelope (`0x02 ‖ rlp`)
pub fn sign_transfer(source: &ChainKeyPair, to: &str, value: u128, params: &EvmTxParams) -> Result<Vec<u8>> {
    if source.chain() != ChainKind::Evm {
        return Err(Error::Validation("Not an EVM keypair".to_string()));
    }

    let wallet = LocalWallet::from_bytes(source.private_key().as_bytes())
        .map_err(|e| Error::Validation(format!("Invalid private key: {}", e)))?
        .with_chain_id(params.chain_id);

    let tx = build_transfer(source.address(), to, value, params)?;
    let signature = wallet
        .sign_transaction_sync(&tx)
        .map_err(|e| Error::Validation(format!("Failed to sign transaction: {}", e)))?;

    Ok(tx.rlp_signed(&signature).to_vec())
}
