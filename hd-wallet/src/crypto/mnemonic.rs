//! Recovery phrase generation and master seed derivation

use std::fmt;

use bip39::Mnemonic;
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, CryptoRng, RngCore};
use sha2::Sha512;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};

/// Number of words in every phrase handled by this system
pub const PHRASE_WORD_COUNT: usize = 12;

/// Size of a master seed in bytes
pub const SEED_LEN: usize = 64;

const PBKDF2_ROUNDS: u32 = 2048;

/// Supported mnemonic strengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MnemonicStrength {
    /// 12 words (128 bits)
    Words12,
}

impl MnemonicStrength {
    /// Map a strength in bits to a supported strength
    pub fn from_bits(bits: usize) -> Result<Self> {
        match bits {
            128 => Ok(Self::Words12),
            other => Err(Error::Validation(format!(
                "Unsupported mnemonic strength: {} bits (only 128 is supported)",
                other
            ))),
        }
    }

    /// Get entropy length in bytes
    fn entropy_bytes(&self) -> usize {
        match self {
            Self::Words12 => 16,
        }
    }
}

/// An accepted recovery phrase
///
/// Immutable once created. The words never appear in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveryPhrase {
    words: Vec<String>,
}

impl RecoveryPhrase {
    /// The words of the phrase, in order
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Number of words
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// The phrase as a single space-separated string
    pub fn phrase(&self) -> String {
        self.words.join(" ")
    }
}

impl fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryPhrase")
            .field("word_count", &self.words.len())
            .field("words", &"[REDACTED]")
            .finish()
    }
}

/// The 64-byte root secret derived from a recovery phrase
#[derive(Clone, PartialEq, Eq)]
pub struct MasterSeed([u8; SEED_LEN]);

impl MasterSeed {
    /// Get the raw seed bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MasterSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSeed([REDACTED])")
    }
}

/// Generate a new random recovery phrase from the OS random source
pub fn generate(strength_bits: usize) -> Result<RecoveryPhrase> {
    generate_with_rng(strength_bits, &mut OsRng)
}

/// Generate a recovery phrase from the given random source
pub fn generate_with_rng<R>(strength_bits: usize, rng: &mut R) -> Result<RecoveryPhrase>
where
    R: RngCore + CryptoRng,
{
    let strength = MnemonicStrength::from_bits(strength_bits)?;

    let mut entropy = vec![0u8; strength.entropy_bytes()];
    rng.try_fill_bytes(&mut entropy)
        .map_err(|e| Error::Entropy(e.to_string()))?;

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| Error::Entropy(e.to_string()))?;
    entropy.iter_mut().for_each(|b| *b = 0);

    let words = mnemonic
        .to_string()
        .split_whitespace()
        .map(str::to_string)
        .collect::<Vec<_>>();

    debug!(word_count = words.len(), "Generated recovery phrase");
    Ok(RecoveryPhrase { words })
}

/// Accept a user-entered phrase of exactly twelve non-empty words
///
/// Words are not checked against a wordlist and no checksum is verified.
pub fn accept<S: AsRef<str>>(words: &[S]) -> Result<RecoveryPhrase> {
    if words.len() != PHRASE_WORD_COUNT {
        return Err(Error::Validation(format!(
            "Expected {} words, got {}",
            PHRASE_WORD_COUNT,
            words.len()
        )));
    }

    let mut accepted = Vec::with_capacity(PHRASE_WORD_COUNT);
    for (position, word) in words.iter().enumerate() {
        let word = word.as_ref().trim();
        if word.is_empty() {
            return Err(Error::Validation(format!(
                "Mnemonic word {} shouldn't be empty",
                position + 1
            )));
        }
        accepted.push(word.to_string());
    }

    debug!(word_count = accepted.len(), "Accepted recovery phrase");
    Ok(RecoveryPhrase { words: accepted })
}

/// Accept a phrase given as a single space-separated string
pub fn accept_phrase(phrase: &str) -> Result<RecoveryPhrase> {
    let words = phrase.split_whitespace().collect::<Vec<_>>();
    accept(&words)
}

/// Derive the master seed of a phrase with an empty passphrase
pub fn derive_seed(phrase: &RecoveryPhrase) -> MasterSeed {
    derive_seed_with_passphrase(phrase, "")
}

/// Derive the master seed of a phrase and passphrase (BIP-39 PBKDF2)
pub fn derive_seed_with_passphrase(phrase: &RecoveryPhrase, passphrase: &str) -> MasterSeed {
    let password = phrase.phrase().nfkd().collect::<String>();
    let salt = format!("mnemonic{}", passphrase).nfkd().collect::<String>();

    let mut seed = [0u8; SEED_LEN];
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut seed);

    MasterSeed(seed)
}
