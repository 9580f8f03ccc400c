//! Wallet session: phrase, seed, per-chain counters and keypairs

use std::collections::VecDeque;

use tracing::info;

use crate::crypto::keys::{derive_key_pair, ChainKeyPair, ChainKind, DerivationPath};
use crate::crypto::mnemonic::{self, MasterSeed, RecoveryPhrase};
use crate::error::{Error, Result};

/// Strength of generated phrases, in bits
pub const DEFAULT_STRENGTH_BITS: usize = 128;

/// In-memory state of one wallet session
///
/// Each chain has a monotonically increasing account counter and a
/// newest-first sequence of the keypairs derived so far. Both are updated
/// together by [`Session::derive_next`] and only after derivation succeeded.
#[derive(Debug, Default)]
pub struct Session {
    phrase: Option<RecoveryPhrase>,
    seed: Option<MasterSeed>,
    counters: [u32; 2],
    keypairs: [VecDeque<ChainKeyPair>; 2],
}

impl Session {
    /// An empty session with no phrase
    pub fn new() -> Self {
        Self::default()
    }

    /// A session seeded from a freshly generated phrase
    pub fn generate() -> Result<Self> {
        let mut session = Self::new();
        session.generate_phrase()?;
        Ok(session)
    }

    /// A session seeded from user-entered words
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Result<Self> {
        let mut session = Self::new();
        session.accept_words(words)?;
        Ok(session)
    }

    /// Replace the session phrase with a newly generated one
    pub fn generate_phrase(&mut self) -> Result<&RecoveryPhrase> {
        let phrase = mnemonic::generate(DEFAULT_STRENGTH_BITS)?;
        Ok(self.install(phrase))
    }

    /// Replace the session phrase with user-entered words
    pub fn accept_words<S: AsRef<str>>(&mut self, words: &[S]) -> Result<&RecoveryPhrase> {
        let phrase = mnemonic::accept(words)?;
        Ok(self.install(phrase))
    }

    /// A new phrase invalidates the seed and everything derived from it
    fn install(&mut self, phrase: RecoveryPhrase) -> &RecoveryPhrase {
        self.seed = Some(mnemonic::derive_seed(&phrase));
        self.counters = [0; 2];
        self.keypairs = Default::default();

        info!(word_count = phrase.word_count(), "Installed new recovery phrase");
        self.phrase.insert(phrase)
    }

    /// The current phrase, if any
    pub fn phrase(&self) -> Option<&RecoveryPhrase> {
        self.phrase.as_ref()
    }

    /// The current master seed, if any
    pub fn seed(&self) -> Option<&MasterSeed> {
        self.seed.as_ref()
    }

    /// Account index the next derivation on a chain will use
    pub fn next_account(&self, chain: ChainKind) -> u32 {
        self.counters[chain.slot()]
    }

    /// Derive the next keypair for a chain and record it
    pub fn derive_next(&mut self, chain: ChainKind) -> Result<&ChainKeyPair> {
        let path = DerivationPath::next(chain, self.next_account(chain));
        let key_pair = self.derive_at_path(&path)?;

        info!(
            chain = %chain,
            account = path.account(),
            address = %key_pair.address(),
            "Derived keypair"
        );

        let slot = chain.slot();
        self.keypairs[slot].push_front(key_pair);
        self.counters[slot] += 1;

        Ok(&self.keypairs[slot][0])
    }

    /// Re-derive the keypair of an account without recording it
    pub fn derive_at(&self, chain: ChainKind, account: u32) -> Result<ChainKeyPair> {
        self.derive_at_path(&DerivationPath::new(chain, account))
    }

    fn derive_at_path(&self, path: &DerivationPath) -> Result<ChainKeyPair> {
        let seed = self
            .seed
            .as_ref()
            .ok_or_else(|| Error::Derivation("No master seed: generate or enter a phrase first".to_string()))?;

        derive_key_pair(seed.as_bytes(), path)
    }

    /// Keypairs derived for a chain, newest first
    pub fn keypairs(&self, chain: ChainKind) -> impl Iterator<Item = &ChainKeyPair> + '_ {
        self.keypairs[chain.slot()].iter()
    }

    /// Most recently derived keypair for a chain
    pub fn latest(&self, chain: ChainKind) -> Option<&ChainKeyPair> {
        self.keypairs[chain.slot()].front()
    }

    /// Look up a derived keypair by address
    pub fn find(&self, chain: ChainKind, address: &str) -> Option<&ChainKeyPair> {
        self.keypairs(chain).find(|key_pair| match chain {
            ChainKind::Evm => key_pair.address().eq_ignore_ascii_case(address),
            ChainKind::Solana => key_pair.address() == address,
        })
    }
}
