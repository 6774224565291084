//! Account credentials: private scalar, public key and address for one
//! derivation path.
//!
//! ## Security
//! - The scalar lives in `Zeroizing` memory and is wiped on drop or on
//!   explicit `erase()`.
//! - `Debug` never prints key material.
//! - Ledger clients only ever receive the `Address`.

use secp256k1::PublicKey;
use std::fmt;
use tracing::info;
use zeroize::{Zeroize, Zeroizing};

use crate::core::address::Address;
use crate::core::bip44::{secret_key, DerivationPath, ExtendedKey, SECP};
use crate::core::errors::WalletError;
use crate::core::seed::SeedWallet;

/// A secp256k1 private scalar.
pub struct SigningKey {
    bytes: Zeroizing<[u8; 32]>,
    public: PublicKey,
}

impl SigningKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, WalletError> {
        Self::from_zeroizing(Zeroizing::new(bytes))
    }

    /// Take ownership of a scalar that already lives in zeroizing memory.
    pub fn from_zeroizing(bytes: Zeroizing<[u8; 32]>) -> Result<Self, WalletError> {
        let secret = secret_key(&bytes)?;
        let public = PublicKey::from_secret_key(&*SECP, &secret);
        Ok(Self { bytes, public })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != 32 {
            return Err(WalletError::InvalidKey(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut scalar = Zeroizing::new([0u8; 32]);
        scalar.copy_from_slice(bytes);
        Self::from_zeroizing(scalar)
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public)
    }

    /// Raw scalar bytes. Do not log or persist.
    pub fn expose_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Overwrite the scalar with zeros.
    pub fn erase(&mut self) {
        self.bytes.zeroize();
    }

    pub fn is_erased(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey").field("address", &self.address()).finish_non_exhaustive()
    }
}

/// Key triple for one concrete account.
#[derive(Debug)]
pub struct Credentials {
    key: SigningKey,
    address: Address,
    path: DerivationPath,
}

impl Credentials {
    /// Derive credentials for `path` from a seed wallet.
    pub fn derive(wallet: &SeedWallet, path: &DerivationPath) -> Result<Self, WalletError> {
        let master = ExtendedKey::master(wallet.seed())?;
        Self::from_extended_key(&master.derive(path)?, path.clone())
    }

    /// Wrap an already derived extended key. Fails on public-only keys.
    pub fn from_extended_key(key: &ExtendedKey, path: DerivationPath) -> Result<Self, WalletError> {
        let bytes = key.private_key_bytes().ok_or_else(|| {
            WalletError::InvalidKey("credentials need a private extended key".to_string())
        })?;
        let mut scalar = Zeroizing::new([0u8; 32]);
        scalar.copy_from_slice(bytes);
        let key = SigningKey::from_zeroizing(scalar)?;
        let address = key.address();
        info!(path = %path, address = %address, "Derived account credentials");
        Ok(Self { key, address, path })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Wipe the private scalar. The address stays readable.
    pub fn erase(&mut self) {
        self.key.erase();
    }
}
