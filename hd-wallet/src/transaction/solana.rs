//! Legacy Solana transfer transactions

use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::Signer;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction as SolTransaction;

use crate::crypto::keys::{solana, ChainKeyPair};
use crate::error::{Error, Result};

/// Build an unsigned system transfer paid for by `from`
pub fn build_transfer(from: &Pubkey, to: &Pubkey, lamports: u64, blockhash: &[u8; 32]) -> SolTransaction {
    let instruction = system_instruction::transfer(from, to, lamports);
    let mut message = Message::new(&[instruction], Some(from));
    message.recent_blockhash = Hash::new_from_array(*blockhash);

    SolTransaction::new_unsigned(message)
}

/// Sign a transfer, returning the wire transaction and its signature
pub fn sign_transfer(source: &ChainKeyPair, to: &str, lamports: u64, blockhash: &[u8; 32]) -> Result<(Vec<u8>, [u8; 64])> {
    let keypair = solana::keypair(source)?;
    let from = keypair.pubkey();
    let to = Pubkey::new_from_array(solana::parse_address(to)?);

    let mut transaction = build_transfer(&from, &to, lamports, blockhash);
    transaction
        .try_sign(&[&keypair], Hash::new_from_array(*blockhash))
        .map_err(|e| Error::Validation(format!("Failed to sign Solana transfer: {}", e)))?;

    let signature = transaction
        .signatures
        .first()
        .ok_or_else(|| Error::Validation("Signed Solana transfer carries no signature".to_string()))?;
    let mut signature_bytes = [0u8; 64];
    signature_bytes.copy_from_slice(signature.as_ref());

    let wire = bincode::serialize(&transaction)
        .map_err(|e| Error::Validation(format!("Failed to serialize Solana transfer: {}", e)))?;

    Ok((wire, signature_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{derive_key_pair, ChainKind, DerivationPath};
    use crate::crypto::mnemonic::{accept_phrase, derive_seed};
    use solana_sdk::signature::Signature;
    use solana_sdk::system_instruction::SystemInstruction;
    use solana_sdk::system_program;

    fn key_pair(account: u32) -> ChainKeyPair {
        let phrase = accept_phrase(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
        )
        .unwrap();
        let seed = derive_seed(&phrase);
        derive_key_pair(seed.as_bytes(), &DerivationPath::new(ChainKind::Solana, account)).unwrap()
    }

    #[test]
    fn test_transfer_accounts_and_instruction() {
        let from = Pubkey::new_from_array([1u8; 32]);
        let to = Pubkey::new_from_array([2u8; 32]);
        let transaction = build_transfer(&from, &to, 1_000_000, &[3u8; 32]);
        let message = &transaction.message;

        assert_eq!(message.header.num_required_signatures, 1);
        assert_eq!(message.account_keys, vec![from, to, system_program::id()]);
        assert_eq!(message.recent_blockhash, Hash::new_from_array([3u8; 32]));
        assert_eq!(message.instructions.len(), 1);

        let instruction = &message.instructions[0];
        assert_eq!(instruction.program_id_index, 2);
        assert_eq!(instruction.accounts, vec![0, 1]);
        let decoded: SystemInstruction = bincode::deserialize(&instruction.data).unwrap();
        assert_eq!(decoded, SystemInstruction::Transfer { lamports: 1_000_000 });
    }

    #[test]
    fn test_self_transfer_dedups_accounts() {
        let key = Pubkey::new_from_array([5u8; 32]);
        let transaction = build_transfer(&key, &key, 1, &[0u8; 32]);

        assert_eq!(transaction.message.account_keys, vec![key, system_program::id()]);
        assert_eq!(transaction.message.instructions[0].accounts, vec![0, 0]);
    }

    #[test]
    fn test_signed_transfer_verifies() {
        let source = key_pair(0);
        let destination = key_pair(1);
        let (wire, signature) = sign_transfer(&source, destination.address(), 1_000_000, &[9u8; 32]).unwrap();

        // one signature, then the 64 signature bytes
        assert_eq!(wire[0], 1);
        assert_eq!(&wire[1..65], &signature);

        let transaction: SolTransaction = bincode::deserialize(&wire).unwrap();
        assert_eq!(transaction.signatures, vec![Signature::from(signature)]);
        assert_eq!(transaction.message.account_keys[0].to_string(), source.address());
        assert_eq!(transaction.message.account_keys[1].to_string(), destination.address());
        assert!(Signature::from(signature).verify(source.public_key(), &transaction.message_data()));
        assert!(transaction.verify().is_ok());
    }

    #[test]
    fn test_rejects_evm_keypair() {
        let seed = derive_seed(&accept_phrase(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
        ).unwrap());
        let evm = derive_key_pair(seed.as_bytes(), &DerivationPath::new(ChainKind::Evm, 0)).unwrap();
        let destination = key_pair(0);
        assert!(matches!(
            sign_transfer(&evm, destination.address(), 1, &[0u8; 32]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_bad_destination() {
        assert!(matches!(
            sign_transfer(&key_pair(0), "not-base58!", 1, &[0u8; 32]),
            Err(Error::Validation(_))
        ));
    }
}
