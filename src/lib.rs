// src/lib.rs
//! HD wallet toolkit: BIP-39 mnemonics, BIP-32/44 key derivation, EIP-55
//! addresses, EIP-191 message signing, and read-only ledger queries
//! (balances and ENS names) over JSON-RPC.

pub mod blockchain;
pub mod cli;
pub mod core;
pub mod service;
pub mod storage;

pub use crate::blockchain::{EthereumLedger, LedgerClient, Resolution};
pub use crate::core::{
    Address, ChildNumber, Credentials, DerivationPath, ExtendedKey, LedgerError, SeedWallet,
    SignatureData, SigningKey, WalletError,
};
pub use crate::service::WalletService;
