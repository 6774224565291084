use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Web3 demo wallet CLI (library-facing definitions)
#[derive(Debug, Parser)]
#[command(name = "web3-demo", about = "HD wallet demo: derive, sign, query balance, resolve ENS")]
#[command(version = env!("CARGO_PKG_VERSION"), disable_help_subcommand = true)]
pub struct Cli {
    /// Configuration file (falls back to CONFIG_PATH, then config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load or create the wallet, sign the demo message, query balance and name
    Demo,
    /// Print a freshly generated mnemonic and its default address
    Generate {
        /// 12 or 24
        #[arg(long)]
        words: Option<usize>,
    },
    /// Derive the address of a mnemonic
    Address {
        #[arg(long)]
        mnemonic: String,
        /// Derivation path, e.g. m/44'/60'/0'/0/1
        #[arg(long)]
        path: Option<String>,
    },
    /// Sign a personal message with the default account of a mnemonic
    Sign {
        #[arg(long)]
        mnemonic: String,
        #[arg(long)]
        message: String,
    },
    /// Recover the signer of a personal message
    Verify {
        #[arg(long)]
        message: String,
        #[arg(long)]
        signature: String,
    },
    /// Balance of an address in ETH
    Balance { address: String },
    /// Resolve an ENS name
    Resolve { name: String },
    /// Print the EIP-55 form of an address
    Checksum { address: String },
}

impl Cli {
    /// The subcommand to run; `demo` when none is given.
    pub fn into_command(self) -> Commands {
        self.command.unwrap_or(Commands::Demo)
    }
}
