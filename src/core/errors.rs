use thiserror::Error;

/// Failures of the read-only ledger round trips.
///
/// Both variants are recoverable: the caller may retry or report them, the
/// library itself never retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Transport failure, timeout, or the node refused the request.
    #[error("Ledger unreachable: {0}")]
    Unreachable(String),
    /// The node answered with something that could not be decoded.
    #[error("Malformed ledger response: {0}")]
    Malformed(String),
}

/// Error type for wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Mnemonic has a bad checksum, an unknown word or a bad word count.
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// A hardened step was requested on a key without its private half.
    #[error("Hardened derivation requires a private key")]
    HardenedFromPublicOnly,

    /// Child index out of range, or the step produced an invalid key.
    #[error("Invalid child index: {0}")]
    InvalidChildIndex(String),

    /// Derivation path text could not be parsed.
    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    /// Key bytes are not a valid secp256k1 key.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Address text is not 20 hex-encoded bytes.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Mixed-case address text whose casing does not match its checksum.
    #[error("Bad address checksum: {0}")]
    BadChecksum(String),

    /// Signature could not be parsed or no public key could be recovered.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Key-value store or wallet directory failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl WalletError {
    /// Errors that indicate corrupted key material or forged input.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            WalletError::InvalidMnemonic(_)
                | WalletError::HardenedFromPublicOnly
                | WalletError::InvalidChildIndex(_)
                | WalletError::InvalidKey(_)
                | WalletError::BadChecksum(_)
                | WalletError::InvalidSignature(_)
        )
    }

    /// Only network failures may be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Ledger(_))
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Storage(err.to_string())
    }
}
