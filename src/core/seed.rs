//! BIP39 mnemonic wallets
//!
//! Generates fresh mnemonics from OS randomness and rebuilds the 64-byte
//! seed from an existing phrase. Storage of the phrase is left to the
//! caller.

use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::errors::WalletError;

/// Supported mnemonic lengths and their entropy size in bytes.
const WORD_COUNTS: [(usize, usize); 2] = [(12, 16), (24, 32)];

/// Default phrase length.
pub const DEFAULT_WORD_COUNT: usize = 12;

/// A validated mnemonic together with the seed it produces.
pub struct SeedWallet {
    phrase: SecretString,
    seed: Zeroizing<[u8; 64]>,
    word_count: usize,
}

impl SeedWallet {
    /// Generate a new random wallet with `word_count` words (12 or 24).
    pub fn generate(word_count: usize, passphrase: &str) -> Result<Self, WalletError> {
        let entropy_len = entropy_len_for(word_count)?;

        let mut entropy = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut entropy[..entropy_len]);

        let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy[..entropy_len])
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;

        debug!(word_count, "Generated new mnemonic");
        Ok(Self::from_mnemonic(&mnemonic, passphrase))
    }

    /// Rebuild a wallet from a phrase. Rejects unknown words, bad checksums
    /// and unsupported lengths.
    pub fn validate(phrase: &str, passphrase: &str) -> Result<Self, WalletError> {
        let normalized = normalize_phrase(phrase);
        if normalized.is_empty() {
            return Err(WalletError::InvalidMnemonic("empty phrase".to_string()));
        }

        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        entropy_len_for(mnemonic.word_count())?;

        Ok(Self::from_mnemonic(&mnemonic, passphrase))
    }

    fn from_mnemonic(mnemonic: &Mnemonic, passphrase: &str) -> Self {
        let seed = Zeroizing::new(mnemonic.to_seed(passphrase));
        Self {
            phrase: SecretString::new(mnemonic.to_string()),
            seed,
            word_count: mnemonic.word_count(),
        }
    }

    /// The space-separated phrase. Handle with care.
    pub fn mnemonic(&self) -> &str {
        self.phrase.expose_secret()
    }

    pub fn seed(&self) -> &[u8; 64] {
        &self.seed
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }
}

impl fmt::Debug for SeedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedWallet")
            .field("word_count", &self.word_count)
            .field("phrase", &"[REDACTED]")
            .field("seed", &"[REDACTED]")
            .finish()
    }
}

fn entropy_len_for(word_count: usize) -> Result<usize, WalletError> {
    WORD_COUNTS
        .iter()
        .find(|(words, _)| *words == word_count)
        .map(|(_, len)| *len)
        .ok_or_else(|| {
            WalletError::InvalidMnemonic(format!(
                "unsupported word count {} (expected 12 or 24)",
                word_count
            ))
        })
}

fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
