pub mod address;
pub mod bip44;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod seed;
pub mod signing;

pub use address::Address;
pub use bip44::{ChildNumber, DerivationPath, ExtendedKey};
pub use credentials::{Credentials, SigningKey};
pub use errors::{LedgerError, WalletError};
pub use seed::SeedWallet;
pub use signing::SignatureData;
