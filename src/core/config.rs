use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::core::bip44::{DerivationPath, ETHEREUM_DEFAULT};
use crate::core::errors::WalletError;
use crate::core::seed::DEFAULT_WORD_COUNT;

/// Mainnet ENS registry.
pub const ENS_REGISTRY_MAINNET: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

/// Environment variable overriding `ledger.rpc_url`.
pub const RPC_URL_ENV: &str = "WEB3_RPC_URL";

/// JSON-RPC ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "LedgerConfig::default_rpc_url")]
    pub rpc_url: String,

    /// ENS registry contract used for name resolution
    #[serde(default = "LedgerConfig::default_ens_registry")]
    pub ens_registry: String,

    /// Upper bound for a single round trip (seconds)
    #[serde(default = "LedgerConfig::default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl LedgerConfig {
    fn default_rpc_url() -> String { "http://localhost:8545".to_string() }
    fn default_ens_registry() -> String { ENS_REGISTRY_MAINNET.to_string() }
    fn default_request_timeout() -> u64 { 10 }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: Self::default_rpc_url(),
            ens_registry: Self::default_ens_registry(),
            request_timeout_secs: Self::default_request_timeout(),
        }
    }
}

/// Wallet generation and persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSettings {
    #[serde(default = "WalletSettings::default_derivation_path")]
    pub derivation_path: String,

    #[serde(default = "WalletSettings::default_word_count")]
    pub word_count: usize,

    /// BIP39 passphrase mixed into the seed
    #[serde(default)]
    pub passphrase: String,

    /// Directory receiving wallet descriptor files
    #[serde(default = "WalletSettings::default_wallet_dir")]
    pub wallet_dir: PathBuf,

    /// Key-value file remembering the wallet between runs
    #[serde(default = "WalletSettings::default_store_path")]
    pub store_path: PathBuf,
}

impl WalletSettings {
    fn default_derivation_path() -> String { ETHEREUM_DEFAULT.to_string() }
    fn default_word_count() -> usize { DEFAULT_WORD_COUNT }
    fn default_wallet_dir() -> PathBuf { PathBuf::from("./wallets") }
    fn default_store_path() -> PathBuf { PathBuf::from("./wallets/prefs.json") }

    pub fn derivation_path(&self) -> Result<DerivationPath, WalletError> {
        self.derivation_path.parse()
    }
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            derivation_path: Self::default_derivation_path(),
            word_count: Self::default_word_count(),
            passphrase: String::new(),
            wallet_dir: Self::default_wallet_dir(),
            store_path: Self::default_store_path(),
        }
    }
}

/// Inputs of the demo flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "DemoConfig::default_message")]
    pub message: String,

    #[serde(default = "DemoConfig::default_ens_name")]
    pub ens_name: String,
}

impl DemoConfig {
    fn default_message() -> String { "test".to_string() }
    fn default_ens_name() -> String { "michalzalecki.test".to_string() }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { message: Self::default_message(), ens_name: Self::default_ens_name() }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub wallet: WalletSettings,

    #[serde(default)]
    pub demo: DemoConfig,
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, WalletError> {
        toml::from_str(content).map_err(|e| WalletError::Config(e.to_string()))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => {
                info!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                return Err(WalletError::Config(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        if let Ok(url) = std::env::var(RPC_URL_ENV) {
            if !url.trim().is_empty() {
                config.ledger.rpc_url = url.trim().to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        self.wallet
            .derivation_path()
            .map_err(|e| WalletError::Config(format!("wallet.derivation_path: {}", e)))?;

        if !matches!(self.wallet.word_count, 12 | 24) {
            return Err(WalletError::Config(format!(
                "wallet.word_count must be 12 or 24, got {}",
                self.wallet.word_count
            )));
        }

        if self.ledger.request_timeout_secs == 0 {
            return Err(WalletError::Config(
                "ledger.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.ledger
            .ens_registry
            .parse::<crate::core::address::Address>()
            .map_err(|e| WalletError::Config(format!("ledger.ens_registry: {}", e)))?;

        Ok(())
    }
}
