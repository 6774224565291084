use async_trait::async_trait;
use ethers::types::U256;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use web3_demo_wallet::core::config::AppConfig;
use web3_demo_wallet::storage::{JsonFileStore, KeyValueStore, WalletDescriptor, KEY_FILENAME, KEY_MNEMONIC};
use web3_demo_wallet::{Address, LedgerClient, LedgerError, Resolution, WalletError, WalletService};

/// Ledger that is down for balances and counts calls.
#[derive(Default)]
struct DownLedger {
    calls: AtomicUsize,
}

#[async_trait]
impl LedgerClient for DownLedger {
    async fn get_balance(&self, _address: &Address) -> Result<U256, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LedgerError::Unreachable("connection refused".to_string()))
    }

    async fn resolve_name(&self, _name: &str) -> Result<Resolution, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Resolution::NotFound)
    }

    fn endpoint(&self) -> &str {
        "down"
    }
}

fn config_in(dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.wallet.wallet_dir = dir.join("wallets");
    config.wallet.store_path = dir.join("wallets").join("prefs.json");
    config
}

#[tokio::test]
async fn generate_then_reload_yields_same_address() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let first = {
        let store = Arc::new(JsonFileStore::new(&config.wallet.store_path));
        let service = WalletService::new(config.clone(), store, Arc::new(DownLedger::default()));
        service.run_demo().await.unwrap()
    };
    assert!(first.created);
    let file_name = first.wallet_file.clone().unwrap();

    let descriptor =
        WalletDescriptor::read_from(&config.wallet.wallet_dir.join(&file_name)).await.unwrap();
    assert_eq!(descriptor.address, first.address);
    assert_eq!(descriptor.derivation_path, "m/44'/60'/0'/0/0");
    assert_eq!(descriptor.word_count, 12);

    let store = Arc::new(JsonFileStore::new(&config.wallet.store_path));
    let service = WalletService::new(config.clone(), store.clone(), Arc::new(DownLedger::default()));
    let second = service.run_demo().await.unwrap();
    assert!(!second.created);
    assert_eq!(second.address, first.address);
    assert_eq!(second.wallet_file.as_deref(), Some(file_name.as_str()));
    assert_eq!(second.signature, first.signature);

    assert_eq!(store.get(KEY_FILENAME).await.unwrap(), Some(file_name));
    let phrase = store.get(KEY_MNEMONIC).await.unwrap().unwrap();
    let raw = std::fs::read_to_string(config.wallet.wallet_dir.join(first.wallet_file.unwrap())).unwrap();
    assert!(!raw.contains(&phrase));
}

#[tokio::test]
async fn balance_failure_surfaces_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let ledger = Arc::new(DownLedger::default());
    let store = Arc::new(JsonFileStore::new(&config.wallet.store_path));
    let service = WalletService::new(config, store, ledger.clone());

    let report = service.run_demo().await.unwrap();
    assert!(matches!(report.balance, Err(LedgerError::Unreachable(_))));
    assert_eq!(report.resolution, Ok(Resolution::NotFound));
    assert_eq!(ledger.calls.load(Ordering::SeqCst), 2);
    assert!(report.to_string().ends_with("michalzalecki.test => N/A"));
}

#[tokio::test]
async fn invalid_stored_mnemonic_is_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let store = Arc::new(JsonFileStore::new(&config.wallet.store_path));
    store
        .put(KEY_MNEMONIC, "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon")
        .await
        .unwrap();

    let ledger = Arc::new(DownLedger::default());
    let service = WalletService::new(config, store, ledger.clone());
    assert!(matches!(service.run_demo().await, Err(WalletError::InvalidMnemonic(_))));
    assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unwritable_wallet_dir_fails_generation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    // a regular file where the directory should be
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    config.wallet.wallet_dir = blocker.join("wallets");

    let store = Arc::new(JsonFileStore::new(&config.wallet.store_path));
    let service = WalletService::new(config, store.clone(), Arc::new(DownLedger::default()));
    assert!(matches!(service.load_or_create_wallet().await, Err(WalletError::Storage(_))));
    assert_eq!(store.get(KEY_MNEMONIC).await.unwrap(), None);
}
