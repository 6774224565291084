//! Wallet orchestration: load or create the wallet, derive the account,
//! sign the demo message and query the ledger.

use ethers::types::U256;
use ethers::utils::format_ether;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::blockchain::traits::{LedgerClient, Resolution};
use crate::core::address::Address;
use crate::core::config::AppConfig;
use crate::core::credentials::Credentials;
use crate::core::errors::{LedgerError, WalletError};
use crate::core::seed::SeedWallet;
use crate::core::signing::{self, SignatureData};
use crate::storage::{KeyValueStore, WalletDescriptor, KEY_FILENAME, KEY_MNEMONIC};

/// Result of a ledger round trip as shown to the user. A failed balance
/// query stays a failure; it is never reported as zero.
pub type Outcome<T> = Result<T, LedgerError>;

/// A wallet as returned by [`WalletService::load_or_create_wallet`].
#[derive(Debug)]
pub struct LoadedWallet {
    pub wallet: SeedWallet,
    /// True when the wallet was generated during this call.
    pub created: bool,
    /// Descriptor file name recorded in the store, if any.
    pub file_name: Option<String>,
}

pub struct WalletService {
    config: AppConfig,
    store: Arc<dyn KeyValueStore>,
    ledger: Arc<dyn LedgerClient>,
}

impl WalletService {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        ledger: Arc<dyn LedgerClient>,
    ) -> Self {
        Self { config, store, ledger }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Reload the stored wallet, or generate one and remember it.
    ///
    /// A blank stored phrase counts as no wallet. A stored phrase that no
    /// longer validates is an error; it is never silently replaced by a
    /// fresh wallet. A valid phrase whose descriptor name is missing gets a
    /// new descriptor.
    pub async fn load_or_create_wallet(&self) -> Result<LoadedWallet, WalletError> {
        let settings = &self.config.wallet;

        let stored = self.store.get(KEY_MNEMONIC).await?.filter(|p| !p.trim().is_empty());
        if let Some(phrase) = stored {
            let wallet = SeedWallet::validate(&phrase, &settings.passphrase)?;
            let file_name =
                match self.store.get(KEY_FILENAME).await?.filter(|f| !f.trim().is_empty()) {
                    Some(file_name) => file_name,
                    None => {
                        warn!("Stored wallet has no descriptor, writing one");
                        let file_name = self.write_descriptor(&wallet).await?;
                        self.store.put(KEY_FILENAME, &file_name).await?;
                        file_name
                    }
                };
            info!(file = %file_name, "Loaded existing wallet");
            return Ok(LoadedWallet { wallet, created: false, file_name: Some(file_name) });
        }

        let wallet = SeedWallet::generate(settings.word_count, &settings.passphrase)?;
        let file_name = self.write_descriptor(&wallet).await?;

        self.store.put(KEY_FILENAME, &file_name).await?;
        self.store.put(KEY_MNEMONIC, wallet.mnemonic()).await?;
        info!(file = %file_name, "Created new wallet");

        Ok(LoadedWallet { wallet, created: true, file_name: Some(file_name) })
    }

    async fn write_descriptor(&self, wallet: &SeedWallet) -> Result<String, WalletError> {
        let settings = &self.config.wallet;
        let path = settings.derivation_path()?;
        let address = Credentials::derive(wallet, &path)?.address();
        let descriptor = WalletDescriptor::new(address, path.to_string(), wallet.word_count());
        let file_name = descriptor.write_to(&settings.wallet_dir).await?;
        info!(file = %file_name, address = %address, "Wrote wallet descriptor");
        Ok(file_name)
    }

    /// Credentials at the configured derivation path.
    pub fn credentials(&self, wallet: &SeedWallet) -> Result<Credentials, WalletError> {
        Credentials::derive(wallet, &self.config.wallet.derivation_path()?)
    }

    /// Sign the configured demo message and check that it recovers to the
    /// signer.
    pub fn sign_demo_message(
        &self,
        credentials: &Credentials,
    ) -> Result<(SignatureData, bool), WalletError> {
        let message = self.config.demo.message.as_bytes();
        let signature = signing::sign_message(message, credentials.signing_key())?;
        let valid = signing::verify_message(message, &signature, &credentials.address())?;
        if !valid {
            warn!(address = %credentials.address(), "Signature did not recover to the signer");
        }
        Ok((signature, valid))
    }

    pub async fn balance_of(&self, address: &Address) -> Outcome<U256> {
        self.ledger.get_balance(address).await
    }

    pub async fn resolve_demo_name(&self) -> Outcome<Resolution> {
        self.ledger.resolve_name(&self.config.demo.ens_name).await
    }

    /// Full demo flow. Local failures abort; ledger failures are reported.
    pub async fn run_demo(&self) -> Result<DemoReport, WalletError> {
        let loaded = self.load_or_create_wallet().await?;
        let mut credentials = self.credentials(&loaded.wallet)?;
        let (signature, signature_valid) = self.sign_demo_message(&credentials)?;
        let address = credentials.address();
        credentials.erase();

        info!(endpoint = self.ledger.endpoint(), "Querying ledger");
        let (balance, resolution) =
            tokio::join!(self.balance_of(&address), self.resolve_demo_name());

        if let Err(e) = &balance {
            warn!("Balance query failed: {}", e);
        }
        if let Err(e) = &resolution {
            warn!("Name resolution failed: {}", e);
        }

        Ok(DemoReport {
            address,
            derivation_path: credentials.path().to_string(),
            created: loaded.created,
            wallet_file: loaded.file_name,
            message: self.config.demo.message.clone(),
            signature,
            signature_valid,
            balance,
            ens_name: self.config.demo.ens_name.clone(),
            resolution,
        })
    }
}

#[derive(Debug)]
pub struct DemoReport {
    pub address: Address,
    pub derivation_path: String,
    pub created: bool,
    pub wallet_file: Option<String>,
    pub message: String,
    pub signature: SignatureData,
    pub signature_valid: bool,
    pub balance: Outcome<U256>,
    pub ens_name: String,
    pub resolution: Outcome<Resolution>,
}

impl fmt::Display for DemoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = if self.created { "created" } else { "loaded" };
        writeln!(f, "Wallet ({}): {}", origin, self.wallet_file.as_deref().unwrap_or("-"))?;
        writeln!(f, "Address: {} ({})", self.address, self.derivation_path)?;
        writeln!(f, "Message: {:?}", self.message)?;
        writeln!(f, "Signature: {}", self.signature)?;
        writeln!(f, "Signature valid: {}", self.signature_valid)?;
        match &self.balance {
            Ok(wei) => writeln!(f, "Balance: {} ETH", format_ether(*wei))?,
            Err(e) => writeln!(f, "Balance: unavailable ({})", e)?,
        }
        match &self.resolution {
            Ok(Resolution::Found(address)) => write!(f, "{} => {}", self.ens_name, address),
            Ok(Resolution::NotFound) => write!(f, "{} => N/A", self.ens_name),
            Err(e) => write!(f, "{} => N/A ({})", self.ens_name, e),
        }
    }
}
