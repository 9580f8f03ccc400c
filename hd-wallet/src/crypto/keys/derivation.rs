//! Common key derivation functionality

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use super::ethereum::EvmKeyProvider;
use super::solana::SolanaKeyProvider;

/// BIP-44 purpose level
pub const PURPOSE: u32 = 44;

/// Change level used by every path in this system
pub const CHANGE: u32 = 0;

/// Offset that marks a child index as hardened
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Supported account models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// secp256k1 keys, 20-byte hex addresses
    Evm,
    /// ed25519 keys, base-58 public key addresses
    Solana,
}

impl ChainKind {
    /// SLIP-44 coin type
    pub fn coin_type(&self) -> u32 {
        match self {
            Self::Evm => 60,
            Self::Solana => 501,
        }
    }

    /// Decimals of the native currency
    pub fn decimals(&self) -> u32 {
        match self {
            Self::Evm => 18,
            Self::Solana => 9,
        }
    }

    /// Symbol of the native currency
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Evm => "ETH",
            Self::Solana => "SOL",
        }
    }

    /// Index of this chain in per-chain tables
    pub(crate) fn slot(&self) -> usize {
        match self {
            Self::Evm => 0,
            Self::Solana => 1,
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evm => f.write_str("evm"),
            Self::Solana => f.write_str("solana"),
        }
    }
}

impl FromStr for ChainKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "evm" | "eth" | "ethereum" => Ok(Self::Evm),
            "solana" | "sol" => Ok(Self::Solana),
            other => Err(Error::Validation(format!("Unknown chain kind: {}", other))),
        }
    }
}

/// A chain-tagged `m/44'/coin_type'/account'/0'` path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    chain: ChainKind,
    account: u32,
}

impl DerivationPath {
    /// Path of the given account on the given chain
    pub fn new(chain: ChainKind, account: u32) -> Self {
        Self { chain, account }
    }

    /// Path for the next keypair, given the chain's current account counter
    ///
    /// The counter is not touched; the caller increments it once derivation
    /// has succeeded.
    pub fn next(chain: ChainKind, counter: u32) -> Self {
        Self::new(chain, counter)
    }

    /// Parse a textual path for the given chain
    pub fn parse(chain: ChainKind, path: &str) -> Result<Self> {
        let indices = parse_indices(path)?;
        if indices.len() != 4 {
            return Err(Error::Derivation(format!(
                "Expected 4 path levels, got {}: {}",
                indices.len(),
                path
            )));
        }
        if indices.iter().any(|index| *index < HARDENED_OFFSET) {
            return Err(Error::Derivation(format!("Every level must be hardened: {}", path)));
        }

        let unhardened = indices.iter().map(|index| index - HARDENED_OFFSET).collect::<Vec<_>>();
        if unhardened[0] != PURPOSE {
            return Err(Error::Derivation(format!("Unsupported purpose {}", unhardened[0])));
        }
        if unhardened[1] != chain.coin_type() {
            return Err(Error::Derivation(format!(
                "Coin type {} does not belong to chain {}",
                unhardened[1], chain
            )));
        }
        if unhardened[3] != CHANGE {
            return Err(Error::Derivation(format!("Unsupported change level {}", unhardened[3])));
        }

        Ok(Self::new(chain, unhardened[2]))
    }

    /// Chain this path belongs to
    pub fn chain(&self) -> ChainKind {
        self.chain
    }

    /// Account index
    pub fn account(&self) -> u32 {
        self.account
    }

    /// Hardened child indices, root first
    pub fn indices(&self) -> Result<[u32; 4]> {
        Ok([
            harden(PURPOSE)?,
            harden(self.chain.coin_type())?,
            harden(self.account)?,
            harden(CHANGE)?,
        ])
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m/{}'/{}'/{}'/{}'",
            PURPOSE,
            self.chain.coin_type(),
            self.account,
            CHANGE
        )
    }
}

fn harden(index: u32) -> Result<u32> {
    if index >= HARDENED_OFFSET {
        return Err(Error::Derivation(format!("Index {} is out of the hardened range", index)));
    }
    Ok(index + HARDENED_OFFSET)
}

/// Parse a BIP-32 derivation path into child indices
pub(crate) fn parse_indices(path: &str) -> Result<Vec<u32>> {
    if !path.starts_with("m/") {
        return Err(Error::Derivation(format!("Invalid derivation path: {}", path)));
    }

    let mut result = Vec::new();
    for component in path.trim_start_matches("m/").split('/') {
        let invalid = || Error::Derivation(format!("Invalid derivation path component: {:?}", component));

        let index = match component.strip_suffix('\'') {
            Some(hardened) => {
                let index = hardened.parse::<u32>().map_err(|_| invalid())?;
                harden(index)?
            }
            None => {
                let index = component.parse::<u32>().map_err(|_| invalid())?;
                if index >= HARDENED_OFFSET {
                    return Err(invalid());
                }
                index
            }
        };

        result.push(index);
    }

    Ok(result)
}

/// Derived private key material for one path
///
/// 32 bytes in both schemes: a secp256k1 scalar for EVM, an ed25519 seed for
/// Solana.
#[derive(Clone)]
pub struct KeyMaterial {
    path: DerivationPath,
    bytes: Vec<u8>,
}

impl KeyMaterial {
    /// Wrap raw material for a path
    pub fn new(path: DerivationPath, bytes: Vec<u8>) -> Self {
        Self { path, bytes }
    }

    /// Path the material was derived along
    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Raw material bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("path", &self.path.to_string())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A private key for a specific chain
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    bytes: Vec<u8>,
}

impl PrivateKey {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the raw private key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// A usable keypair for one account on one chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainKeyPair {
    path: DerivationPath,
    private_key: PrivateKey,
    public_key: Vec<u8>,
    address: String,
}

impl ChainKeyPair {
    pub(crate) fn new(
        path: DerivationPath,
        private_key: PrivateKey,
        public_key: Vec<u8>,
        address: String,
    ) -> Self {
        Self {
            path,
            private_key,
            public_key,
            address,
        }
    }

    /// Chain the keypair belongs to
    pub fn chain(&self) -> ChainKind {
        self.path.chain()
    }

    /// Account index the keypair was derived at
    pub fn account_index(&self) -> u32 {
        self.path.account()
    }

    /// Derivation path
    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Private key material
    ///
    /// 32-byte scalar for EVM, 64-byte seed ‖ public key for Solana.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Raw public key bytes
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Public address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Private key in the chain's customary text form
    pub fn export_private_key(&self) -> String {
        match self.chain() {
            ChainKind::Evm => format!("0x{}", hex::encode(self.private_key.as_bytes())),
            ChainKind::Solana => bs58::encode(self.private_key.as_bytes()).into_string(),
        }
    }
}

/// Turns derived key material into a keypair for one chain
pub trait ChainKeyProvider: Send + Sync {
    /// Chain served by this provider
    fn chain(&self) -> ChainKind;

    /// Build the keypair for the given material
    fn from_key_material(&self, material: &KeyMaterial) -> Result<ChainKeyPair>;
}

/// Get the key provider for a chain
pub fn provider_for(chain: ChainKind) -> &'static dyn ChainKeyProvider {
    match chain {
        ChainKind::Evm => &EvmKeyProvider,
        ChainKind::Solana => &SolanaKeyProvider,
    }
}

/// Derive the key material at a path from a master seed
pub fn derive(seed: &[u8], path: &DerivationPath) -> Result<KeyMaterial> {
    validate_seed(seed)?;
    let indices = path.indices()?;

    let bytes = match path.chain() {
        ChainKind::Evm => super::ethereum::derive_secp256k1(seed, &indices)?,
        ChainKind::Solana => super::solana::derive_ed25519(seed, &indices)?,
    };

    Ok(KeyMaterial::new(*path, bytes.to_vec()))
}

/// Derive the keypair at a path from a master seed
pub fn derive_key_pair(seed: &[u8], path: &DerivationPath) -> Result<ChainKeyPair> {
    let material = derive(seed, path)?;
    provider_for(path.chain()).from_key_material(&material)
}

/// BIP-32 accepts seeds of 128 to 512 bits
fn validate_seed(seed: &[u8]) -> Result<()> {
    if seed.is_empty() {
        return Err(Error::Derivation("Master seed is absent".to_string()));
    }
    if !(16..=64).contains(&seed.len()) {
        return Err(Error::Derivation(format!(
            "Invalid seed length: expected 16 to 64 bytes, got {}",
            seed.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_text() {
        assert_eq!(DerivationPath::new(ChainKind::Evm, 0).to_string(), "m/44'/60'/0'/0'");
        assert_eq!(DerivationPath::new(ChainKind::Solana, 7).to_string(), "m/44'/501'/7'/0'");
    }

    #[test]
    fn test_next_path_uses_counter() {
        let path = DerivationPath::next(ChainKind::Solana, 3);
        assert_eq!(path.account(), 3);
        assert_eq!(path.chain(), ChainKind::Solana);
    }

    #[test]
    fn test_path_roundtrip_through_text() {
        let path = DerivationPath::new(ChainKind::Evm, 12);
        assert_eq!(DerivationPath::parse(ChainKind::Evm, &path.to_string()).unwrap(), path);
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for bad in [
            "44'/60'/0'/0'",
            "m/44'/60'/0'",
            "m/44'/60'/0'/0",
            "m/44'/60'/x'/0'",
            "m/49'/60'/0'/0'",
            "m/44'/60'/0'/1'",
            "m/44'/60'/2147483648'/0'",
        ] {
            assert!(
                matches!(DerivationPath::parse(ChainKind::Evm, bad), Err(Error::Derivation(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parse_rejects_foreign_coin_type() {
        let result = DerivationPath::parse(ChainKind::Solana, "m/44'/60'/0'/0'");
        assert!(matches!(result, Err(Error::Derivation(_))));
    }

    #[test]
    fn test_indices_are_hardened() {
        let indices = DerivationPath::new(ChainKind::Solana, 1).indices().unwrap();
        assert_eq!(indices, [44 | HARDENED_OFFSET, 501 | HARDENED_OFFSET, 1 | HARDENED_OFFSET, HARDENED_OFFSET]);
    }

    #[test]
    fn test_account_out_of_range() {
        let path = DerivationPath::new(ChainKind::Evm, HARDENED_OFFSET);
        assert!(matches!(path.indices(), Err(Error::Derivation(_))));
        assert!(matches!(derive(&[1u8; 64], &path), Err(Error::Derivation(_))));
    }

    #[test]
    fn test_derive_requires_seed() {
        let path = DerivationPath::new(ChainKind::Evm, 0);
        assert!(matches!(derive(&[], &path), Err(Error::Derivation(_))));
        assert!(matches!(derive(&[7u8; 8], &path), Err(Error::Derivation(_))));
    }

    #[test]
    fn test_chain_kind_from_str() {
        assert_eq!("ETH".parse::<ChainKind>().unwrap(), ChainKind::Evm);
        assert_eq!("solana".parse::<ChainKind>().unwrap(), ChainKind::Solana);
        assert!("bitcoin".parse::<ChainKind>().is_err());
    }

    #[test]
    fn test_provider_dispatch() {
        assert_eq!(provider_for(ChainKind::Evm).chain(), ChainKind::Evm);
        assert_eq!(provider_for(ChainKind::Solana).chain(), ChainKind::Solana);
    }
}
