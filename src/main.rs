// src/main.rs
//! Web3 demo wallet entry point.
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use web3_demo_wallet::blockchain::{EthereumLedger, LedgerClient, Resolution};
use web3_demo_wallet::cli::{Cli, Commands};
use web3_demo_wallet::core::config::AppConfig;
use web3_demo_wallet::core::signing::{self, SignatureData};
use web3_demo_wallet::core::{Address, Credentials, DerivationPath, SeedWallet};
use web3_demo_wallet::service::WalletService;
use web3_demo_wallet::storage;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;
    info!("Starting web3-demo v{}", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.clone().unwrap_or_else(|| {
        PathBuf::from(std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string()))
    });
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    match cli.into_command() {
        Commands::Demo => run_demo(config).await?,
        Commands::Generate { words } => {
            let word_count = words.unwrap_or(config.wallet.word_count);
            let wallet = SeedWallet::generate(word_count, &config.wallet.passphrase)?;
            let creds = Credentials::derive(&wallet, &config.wallet.derivation_path()?)?;
            println!("{}", wallet.mnemonic());
            println!("{}", creds.address());
        }
        Commands::Address { mnemonic, path } => {
            let wallet = SeedWallet::validate(&mnemonic, &config.wallet.passphrase)
                .context("invalid mnemonic")?;
            let path: DerivationPath = match path {
                Some(text) => text.parse()?,
                None => config.wallet.derivation_path()?,
            };
            let creds = Credentials::derive(&wallet, &path)?;
            println!("{} {}", path, creds.address());
        }
        Commands::Sign { mnemonic, message } => {
            let wallet = SeedWallet::validate(&mnemonic, &config.wallet.passphrase)
                .context("invalid mnemonic")?;
            let creds = Credentials::derive(&wallet, &config.wallet.derivation_path()?)?;
            let signature = signing::sign_message(message.as_bytes(), creds.signing_key())?;
            println!("{}", creds.address());
            println!("{}", signature);
        }
        Commands::Verify { message, signature } => {
            let signature: SignatureData = signature.parse().context("invalid signature")?;
            let signer = signing::recover_address(message.as_bytes(), &signature)?;
            println!("{}", signer);
        }
        Commands::Balance { address } => {
            let address: Address = address.parse()?;
            let ledger = EthereumLedger::connect(&config.ledger)?;
            let wei = ledger.get_balance(&address).await?;
            println!("{} ETH", ethers::utils::format_ether(wei));
        }
        Commands::Resolve { name } => {
            let ledger = EthereumLedger::connect(&config.ledger)?;
            match ledger.resolve_name(&name).await? {
                Resolution::Found(address) => println!("{} => {}", name, address),
                Resolution::NotFound => println!("{} => N/A", name),
            }
        }
        Commands::Checksum { address } => {
            let address: Address = address.parse()?;
            println!("{}", address);
        }
    }

    Ok(())
}

async fn run_demo(config: AppConfig) -> Result<()> {
    let ledger = Arc::new(EthereumLedger::connect(&config.ledger)?);
    let store = Arc::new(storage::open_store(&config.wallet.store_path));
    let service = WalletService::new(config, store, ledger);

    let report = service.run_demo().await.context("demo flow failed")?;
    println!("{}", report);
    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=info,reqwest=info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
