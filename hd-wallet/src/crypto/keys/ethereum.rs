//! Ethereum (EVM) key derivation

use hmac::{Hmac, Mac};
use secp256k1::{PublicKey as Secp256k1PublicKey, Secp256k1, SecretKey};
use sha2::Sha512;
use sha3::{Digest, Keccak256};

use crate::error::{Error, Result};
use super::derivation::{ChainKeyPair, ChainKeyProvider, ChainKind, KeyMaterial, PrivateKey, HARDENED_OFFSET};

/// Walk BIP-32 child derivation along the given indices
pub(crate) fn derive_secp256k1(seed: &[u8], indices: &[u32]) -> Result<[u8; 32]> {
    // Derive the master key
    let (mut secret_key, mut chain_code) = derive_master_key(seed)?;

    // Derive the child keys
    for &index in indices {
        (secret_key, chain_code) = derive_child_key(secret_key, chain_code, index)?;
    }

    Ok(secret_key)
}

/// Derive the master key from a seed
fn derive_master_key(seed: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let mut hmac = Hmac::<Sha512>::new_from_slice(b"Bitcoin seed")
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;

    hmac.update(seed);
    let result = hmac.finalize().into_bytes();

    let mut secret_key = [0u8; 32];
    let mut chain_code = [0u8; 32];

    secret_key.copy_from_slice(&result[0..32]);
    chain_code.copy_from_slice(&result[32..64]);

    // The master scalar must itself be a valid key
    SecretKey::from_slice(&secret_key)
        .map_err(|e| Error::Derivation(format!("Invalid master key: {}", e)))?;

    Ok((secret_key, chain_code))
}

/// Derive a child key from a parent key
fn derive_child_key(parent_key: [u8; 32], parent_chain_code: [u8; 32], index: u32) -> Result<([u8; 32], [u8; 32])> {
    let secp = Secp256k1::new();
    let parent_secret_key = SecretKey::from_slice(&parent_key)
        .map_err(|e| Error::Derivation(format!("Invalid parent key: {}", e)))?;

    let mut data = Vec::with_capacity(37);

    if index >= HARDENED_OFFSET {
        // Hardened derivation
        data.push(0);
        data.extend_from_slice(&parent_key);
    } else {
        // Normal derivation
        let parent_public_key = Secp256k1PublicKey::from_secret_key(&secp, &parent_secret_key);
        data.extend_from_slice(&parent_public_key.serialize());
    }

    data.extend_from_slice(&index.to_be_bytes());

    let mut hmac = Hmac::<Sha512>::new_from_slice(&parent_chain_code)
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;

    hmac.update(&data);
    let result = hmac.finalize().into_bytes();

    let mut child_chain_code = [0u8; 32];
    child_chain_code.copy_from_slice(&result[32..64]);

    // Add the parent key to the child key (mod n)
    let tweak = SecretKey::from_slice(&result[0..32])
        .map_err(|e| Error::Derivation(format!("Invalid child key: {}", e)))?;

    let child_secret_key = tweak
        .add_tweak(&parent_secret_key.into())
        .map_err(|e| Error::Derivation(format!("Key addition error: {}", e)))?;

    Ok((child_secret_key.secret_bytes(), child_chain_code))
}

/// Key provider for EVM accounts
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmKeyProvider;

impl ChainKeyProvider for EvmKeyProvider {
    fn chain(&self) -> ChainKind {
        ChainKind::Evm
    }

    fn from_key_material(&self, material: &KeyMaterial) -> Result<ChainKeyPair> {
        if material.path().chain() != ChainKind::Evm {
            return Err(Error::Validation(format!(
                "Key material for {} handed to the EVM provider",
                material.path().chain()
            )));
        }
        if material.as_bytes().len() != 32 {
            return Err(Error::Validation(format!(
                "EVM private key must be 32 bytes, got {}",
                material.as_bytes().len()
            )));
        }

        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(material.as_bytes())
            .map_err(|e| Error::Validation(format!("Invalid EVM private key: {}", e)))?;
        let public_key = Secp256k1PublicKey::from_secret_key(&secp, &secret_key).serialize_uncompressed();

        let address = public_key_to_address(&public_key)?;

        Ok(ChainKeyPair::new(
            *material.path(),
            PrivateKey::new(secret_key.secret_bytes().to_vec()),
            public_key.to_vec(),
            address,
        ))
    }
}

/// Get the checksummed address of an uncompressed public key
pub fn public_key_to_address(public_key: &[u8]) -> Result<String> {
    // The public key should be in uncompressed format (65 bytes)
    if public_key.len() != 65 || public_key[0] != 0x04 {
        return Err(Error::Validation("Invalid EVM public key".to_string()));
    }

    // Skip the first byte (0x04) and hash the rest
    let key_hash = keccak256(&public_key[1..]);

    Ok(to_checksum_address(&key_hash[12..]))
}

/// EIP-55 mixed-case encoding of a 20-byte address
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut checksummed = String::with_capacity(2 + lower.len());
    checksummed.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 { hash[i / 2] >> 4 } else { hash[i / 2] & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            checksummed.push(c.to_ascii_uppercase());
        } else {
            checksummed.push(c);
        }
    }
    checksummed
}

/// Parse a `0x`-prefixed 20-byte address
///
/// Mixed-case input must carry a valid EIP-55 checksum.
pub fn parse_address(address: &str) -> Result<[u8; 20]> {
    let address = address.trim();
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| Error::Validation(format!("EVM address must start with 0x: {}", address)))?;

    let bytes = hex::decode(digits)
        .map_err(|e| Error::Validation(format!("Invalid EVM address {}: {}", address, e)))?;
    let bytes: [u8; 20] = bytes
        .try_into()
        .map_err(|_| Error::Validation(format!("EVM address must be 20 bytes: {}", address)))?;

    let mixed_case = digits.chars().any(|c| c.is_ascii_lowercase()) && digits.chars().any(|c| c.is_ascii_uppercase());
    if mixed_case && to_checksum_address(&bytes)[2..] != *digits {
        return Err(Error::Validation(format!("Bad EIP-55 checksum: {}", address)));
    }

    Ok(bytes)
}

/// Calculate the Keccak-256 hash of data
pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{derive, derive_key_pair, DerivationPath};
    use crate::crypto::mnemonic::{accept_phrase, derive_seed};

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn seed() -> Vec<u8> {
        derive_seed(&accept_phrase(ABANDON).unwrap()).as_bytes().to_vec()
    }

    #[test]
    fn test_bip32_standard_account() {
        // m/44'/60'/0'/0/0 of the abandon phrase is a widely published vector
        let indices = super::super::derivation::parse_indices("m/44'/60'/0'/0/0").unwrap();
        let key = derive_secp256k1(&seed(), &indices).unwrap();

        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&key).unwrap();
        let public_key = Secp256k1PublicKey::from_secret_key(&secp, &secret_key).serialize_uncompressed();

        assert_eq!(
            public_key_to_address(&public_key).unwrap(),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
    }

    #[test]
    fn test_address_format() {
        let key_pair = derive_key_pair(&seed(), &DerivationPath::new(ChainKind::Evm, 0)).unwrap();

        assert_eq!(key_pair.chain(), ChainKind::Evm);
        assert!(key_pair.address().starts_with("0x"));
        assert_eq!(key_pair.address().len(), 42);
        assert_eq!(key_pair.private_key().as_bytes().len(), 32);
        assert_eq!(key_pair.public_key().len(), 65);
        assert!(parse_address(key_pair.address()).is_ok());
    }

    #[test]
    fn test_rejects_wrong_length_material() {
        let material = KeyMaterial::new(DerivationPath::new(ChainKind::Evm, 0), vec![1u8; 31]);
        assert!(matches!(EvmKeyProvider.from_key_material(&material), Err(Error::Validation(_))));
    }

    #[test]
    fn test_rejects_out_of_range_scalar() {
        let material = KeyMaterial::new(DerivationPath::new(ChainKind::Evm, 0), vec![0xff; 32]);
        assert!(matches!(EvmKeyProvider.from_key_material(&material), Err(Error::Validation(_))));
    }

    #[test]
    fn test_rejects_foreign_material() {
        let material = derive(&seed(), &DerivationPath::new(ChainKind::Solana, 0)).unwrap();
        assert!(matches!(EvmKeyProvider.from_key_material(&material), Err(Error::Validation(_))));
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address("0x9858EfFD232B4033E47d90003D41EC34EcaEda94").is_ok());
        assert!(parse_address("0x9858effd232b4033e47d90003d41ec34ecaeda94").is_ok());
        // Broken checksum
        assert!(parse_address("0x9858eFFD232B4033E47d90003D41EC34EcaEda94").is_err());
        assert!(parse_address("9858EfFD232B4033E47d90003D41EC34EcaEda94").is_err());
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("").is_err());
    }
}
