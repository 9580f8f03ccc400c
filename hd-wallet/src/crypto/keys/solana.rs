//! Solana key derivation (SLIP-0010 ed25519)

use std::str::FromStr;

use hmac::{Hmac, Mac};
use sha2::Sha512;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::keypair::{keypair_from_seed, Keypair};
use solana_sdk::signer::Signer;

use crate::error::{Error, Result};
use super::derivation::{ChainKeyPair, ChainKeyProvider, ChainKind, KeyMaterial, PrivateKey, HARDENED_OFFSET};

/// Walk SLIP-0010 ed25519 derivation along the given indices
///
/// ed25519 only defines hardened children.
pub(crate) fn derive_ed25519(seed: &[u8], indices: &[u32]) -> Result<[u8; 32]> {
    let (mut secret_key, mut chain_code) = derive_master_key(seed)?;

    for &index in indices {
        if index < HARDENED_OFFSET {
            return Err(Error::Derivation(format!(
                "ed25519 derivation requires hardened indices, got {}",
                index
            )));
        }
        (secret_key, chain_code) = derive_child_key(secret_key, chain_code, index)?;
    }

    Ok(secret_key)
}

/// Derive the master key from a seed
fn derive_master_key(seed: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let mut hmac = Hmac::<Sha512>::new_from_slice(b"ed25519 seed")
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;

    hmac.update(seed);
    let result = hmac.finalize().into_bytes();

    let mut secret_key = [0u8; 32];
    let mut chain_code = [0u8; 32];

    secret_key.copy_from_slice(&result[0..32]);
    chain_code.copy_from_slice(&result[32..64]);

    Ok((secret_key, chain_code))
}

/// Derive a hardened child key from a parent key
fn derive_child_key(parent_key: [u8; 32], parent_chain_code: [u8; 32], index: u32) -> Result<([u8; 32], [u8; 32])> {
    let mut data = Vec::with_capacity(37);
    data.push(0);
    data.extend_from_slice(&parent_key);
    data.extend_from_slice(&index.to_be_bytes());

    let mut hmac = Hmac::<Sha512>::new_from_slice(&parent_chain_code)
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;

    hmac.update(&data);
    let result = hmac.finalize().into_bytes();

    let mut child_key = [0u8; 32];
    let mut child_chain_code = [0u8; 32];

    child_key.copy_from_slice(&result[0..32]);
    child_chain_code.copy_from_slice(&result[32..64]);

    Ok((child_key, child_chain_code))
}

/// Key provider for Solana accounts
#[derive(Debug, Clone, Copy, Default)]
pub struct SolanaKeyProvider;

impl ChainKeyProvider for SolanaKeyProvider {
    fn chain(&self) -> ChainKind {
        ChainKind::Solana
    }

    fn from_key_material(&self, material: &KeyMaterial) -> Result<ChainKeyPair> {
        if material.path().chain() != ChainKind::Solana {
            return Err(Error::Validation(format!(
                "Key material for {} handed to the Solana provider",
                material.path().chain()
            )));
        }
        if material.as_bytes().len() != 32 {
            return Err(Error::Validation(format!(
                "Solana signing seed must be 32 bytes, got {}",
                material.as_bytes().len()
            )));
        }

        let keypair = keypair_from_seed(material.as_bytes())
            .map_err(|e| Error::Derivation(format!("Failed to build Solana keypair: {}", e)))?;
        let public_key = keypair.pubkey().to_bytes();

        // 64-byte secret: seed followed by the public key
        Ok(ChainKeyPair::new(
            *material.path(),
            PrivateKey::new(keypair.to_bytes().to_vec()),
            public_key.to_vec(),
            public_key_to_address(&public_key)?,
        ))
    }
}

/// Get the Solana address from a public key
pub fn public_key_to_address(public_key: &[u8]) -> Result<String> {
    // The public key should be 32 bytes
    if public_key.len() != 32 {
        return Err(Error::Validation("Invalid Solana public key length".to_string()));
    }

    Ok(bs58::encode(public_key).into_string())
}

/// Parse a base-58 address into the 32-byte public key
pub fn parse_address(address: &str) -> Result<[u8; 32]> {
    let address = address.trim();
    if address.is_empty() {
        return Err(Error::Validation("Solana address is empty".to_string()));
    }

    Pubkey::from_str(address)
        .map(|pubkey| pubkey.to_bytes())
        .map_err(|e| Error::Validation(format!("Invalid Solana address {}: {}", address, e)))
}

/// Rebuild the signing keypair of a Solana account
pub(crate) fn keypair(key_pair: &ChainKeyPair) -> Result<Keypair> {
    let secret = key_pair.private_key().as_bytes();
    if key_pair.chain() != ChainKind::Solana || secret.len() != 64 {
        return Err(Error::Validation("Not a Solana keypair".to_string()));
    }

    let keypair = keypair_from_seed(&secret[..32])
        .map_err(|e| Error::Validation(format!("Corrupt Solana secret: {}", e)))?;
    if keypair.pubkey().to_bytes()[..] != secret[32..] || key_pair.public_key() != &secret[32..] {
        return Err(Error::Validation("Solana secret does not match its public key".to_string()));
    }

    Ok(keypair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{derive_key_pair, DerivationPath};
    use crate::crypto::mnemonic::{accept_phrase, derive_seed};

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn seed() -> Vec<u8> {
        derive_seed(&accept_phrase(ABANDON).unwrap()).as_bytes().to_vec()
    }

    #[test]
    fn test_slip10_vector() {
        // SLIP-0010 test vector 1 for ed25519, chain m/0'
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();

        let master = derive_ed25519(&seed, &[]).unwrap();
        assert_eq!(
            hex::encode(master),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );

        let child = derive_ed25519(&seed, &[HARDENED_OFFSET]).unwrap();
        assert_eq!(
            hex::encode(child),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );
    }

    #[test]
    fn test_rejects_normal_index() {
        assert!(matches!(derive_ed25519(&seed(), &[0]), Err(Error::Derivation(_))));
    }

    #[test]
    fn test_keypair_layout() {
        let key_pair = derive_key_pair(&seed(), &DerivationPath::new(ChainKind::Solana, 0)).unwrap();

        assert_eq!(key_pair.chain(), ChainKind::Solana);
        assert_eq!(key_pair.private_key().as_bytes().len(), 64);
        assert_eq!(&key_pair.private_key().as_bytes()[32..], key_pair.public_key());
        assert_eq!(parse_address(key_pair.address()).unwrap().as_slice(), key_pair.public_key());
    }

    #[test]
    fn test_keypair_signs_for_address() {
        let key_pair = derive_key_pair(&seed(), &DerivationPath::new(ChainKind::Solana, 2)).unwrap();
        let keypair = keypair(&key_pair).unwrap();

        let signature = keypair.sign_message(b"transfer");
        assert!(signature.verify(&parse_address(key_pair.address()).unwrap(), b"transfer"));
    }

    #[test]
    fn test_keypair_rejects_mismatched_secret() {
        let key_pair = derive_key_pair(&seed(), &DerivationPath::new(ChainKind::Solana, 0)).unwrap();
        let other = derive_key_pair(&seed(), &DerivationPath::new(ChainKind::Solana, 1)).unwrap();

        let mut secret = key_pair.private_key().as_bytes()[..32].to_vec();
        secret.extend_from_slice(other.public_key());
        let forged = ChainKeyPair::new(
            *key_pair.path(),
            PrivateKey::new(secret),
            other.public_key().to_vec(),
            other.address().to_string(),
        );
        assert!(matches!(keypair(&forged), Err(Error::Validation(_))));
    }

    #[test]
    fn test_rejects_wrong_length_material() {
        let material = KeyMaterial::new(DerivationPath::new(ChainKind::Solana, 0), vec![3u8; 64]);
        assert!(matches!(SolanaKeyProvider.from_key_material(&material), Err(Error::Validation(_))));
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address("11111111111111111111111111111111").is_ok());
        assert!(parse_address("not-base58!").is_err());
        assert!(parse_address("3yZe7d").is_err());
        assert!(parse_address("").is_err());
    }
}
