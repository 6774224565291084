use async_trait::async_trait;
use ethers::{
    prelude::JsonRpcClient,
    providers::{Http, Middleware, Provider, ProviderError, RpcError},
    types::{transaction::eip2718::TypedTransaction, Bytes, TransactionRequest, H160, U256},
};
use std::{future::Future, time::Duration};
use tracing::{debug, info, warn};

use super::ens;
use super::traits::{LedgerClient, Resolution};
use crate::core::address::Address;
use crate::core::config::LedgerConfig;
use crate::core::errors::{LedgerError, WalletError};

/// JSON-RPC backed ledger: account balances and ENS lookups.
#[derive(Clone)]
pub struct EthereumLedger<P: JsonRpcClient + Clone = Http> {
    provider: Provider<P>,
    endpoint: String,
    ens_registry: Address,
    timeout: Duration,
}

impl EthereumLedger<Http> {
    /// Build an HTTP ledger client. No request is sent until the first call.
    pub fn connect(config: &LedgerConfig) -> Result<Self, WalletError> {
        let rpc_url = config.rpc_url.trim();
        let parsed_url = reqwest::Url::parse(rpc_url).map_err(|e| {
            WalletError::Config(format!("Invalid RPC URL '{}': {}", rpc_url, e))
        })?;
        let ens_registry: Address = config
            .ens_registry
            .parse()
            .map_err(|e| WalletError::Config(format!("ledger.ens_registry: {}", e)))?;
        let timeout = config.request_timeout();

        info!("Using JSON-RPC endpoint: {}", parsed_url);
        // Honour proxy environment variables, bounded by the same timeout as each call.
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Ok(proxy) = std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("HTTP_PROXY")) {
            match reqwest::Proxy::all(&proxy) {
                Ok(p) => builder = builder.proxy(p),
                Err(e) => warn!("Ignoring invalid proxy setting: {}", e),
            }
        }
        let client = builder
            .build()
            .map_err(|e| WalletError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let provider = Provider::new(Http::new_with_client(parsed_url.clone(), client));
        Ok(Self { provider, endpoint: parsed_url.to_string(), ens_registry, timeout })
    }
}

impl<P> EthereumLedger<P>
where
    P: JsonRpcClient + Clone + Send + Sync,
{
    /// Wrap an existing provider. Used with `MockProvider` in tests.
    pub fn with_provider(provider: Provider<P>, ens_registry: Address, timeout: Duration) -> Self {
        Self { provider, endpoint: "provider".to_string(), ens_registry, timeout }
    }

    pub fn ens_registry(&self) -> Address {
        self.ens_registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(what, e)),
            Err(_) => {
                warn!("{} timed out after {:?}", what, self.timeout);
                Err(LedgerError::Unreachable(format!("{} timed out after {:?}", what, self.timeout)))
            }
        }
    }

    /// `eth_call` returning one address word. Reverts count as "no record".
    async fn call_address(
        &self,
        to: Address,
        selector: [u8; 4],
        node: &[u8; 32],
    ) -> Result<Option<Address>, LedgerError> {
        let tx: TypedTransaction = TransactionRequest::new()
            .to(H160::from(to))
            .data(Bytes::from(ens::encode_call(selector, node)))
            .into();

        let call = async {
            match self.provider.call(&tx, None).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if is_revert(&e) => {
                    debug!("eth_call to {} reverted: {}", to, e);
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        };

        match self.bounded("eth_call", call).await? {
            Some(bytes) => ens::decode_address_word(&bytes),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<P> LedgerClient for EthereumLedger<P>
where
    P: JsonRpcClient + Clone + 'static + Send + Sync,
{
    async fn get_balance(&self, address: &Address) -> Result<U256, LedgerError> {
        debug!("Getting balance for address: {}", address);
        let balance = self
            .bounded("eth_getBalance", self.provider.get_balance(H160::from(*address), None))
            .await?;
        debug!("Balance of {}: {} wei", address, balance);
        Ok(balance)
    }

    async fn resolve_name(&self, name: &str) -> Result<Resolution, LedgerError> {
        let trimmed = name.trim();
        // anything with a dot is an ENS name, even `0xsplits.eth`
        if !trimmed.contains('.') && looks_like_address(trimmed) {
            return Ok(match trimmed.parse::<Address>() {
                Ok(address) => Resolution::Found(address),
                Err(e) => {
                    warn!("'{}' looks like an address but is not one: {}", trimmed, e);
                    Resolution::NotFound
                }
            });
        }

        let Some(normalized) = ens::normalize(trimmed) else {
            debug!("Empty name or label in '{}'", name);
            return Ok(Resolution::NotFound);
        };
        let node = ens::namehash(&normalized);

        let Some(resolver) =
            self.call_address(self.ens_registry, ens::RESOLVER_SELECTOR, &node).await?
        else {
            info!("No resolver registered for {}", normalized);
            return Ok(Resolution::NotFound);
        };
        debug!("Resolver for {}: {}", normalized, resolver);

        let resolution: Resolution =
            self.call_address(resolver, ens::ADDR_SELECTOR, &node).await?.into();
        match resolution {
            Resolution::Found(address) => info!("Resolved {} to {}", normalized, address),
            Resolution::NotFound => info!("Resolver has no address record for {}", normalized),
        }
        Ok(resolution)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn classify(what: &str, error: ProviderError) -> LedgerError {
    let malformed = match &error {
        ProviderError::SerdeJson(_) | ProviderError::HexError(_) => true,
        ProviderError::JsonRpcClientError(inner) => inner.as_serde_error().is_some(),
        _ => false,
    };
    if malformed {
        LedgerError::Malformed(format!("{}: {}", what, error))
    } else {
        warn!("{} failed: {}", what, error);
        LedgerError::Unreachable(format!("{}: {}", what, error))
    }
}

fn looks_like_address(text: &str) -> bool {
    let hex_digits = text.len() == 40 && text.chars().all(|c| c.is_ascii_hexdigit());
    hex_digits || text.starts_with("0x") || text.starts_with("0X")
}

fn is_revert(error: &ProviderError) -> bool {
    error
        .as_error_response()
        .map(|e| e.message.to_lowercase().contains("revert"))
        .unwrap_or(false)
}
