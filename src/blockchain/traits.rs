use async_trait::async_trait;
use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::core::address::Address;
use crate::core::errors::LedgerError;

/// Outcome of a name lookup. Absence is a value, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Found(Address),
    NotFound,
}

impl Resolution {
    pub fn address(&self) -> Option<Address> {
        match self {
            Resolution::Found(address) => Some(*address),
            Resolution::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

impl From<Option<Address>> for Resolution {
    fn from(value: Option<Address>) -> Self {
        value.map_or(Resolution::NotFound, Resolution::Found)
    }
}

/// Read-only view of a remote ledger.
///
/// Each call is a single bounded round trip. Implementations never retry;
/// callers that want resilience wrap these calls themselves.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Balance of `address` in wei at the latest block.
    async fn get_balance(&self, address: &Address) -> Result<U256, LedgerError>;

    /// Resolve a human-readable name to an address.
    async fn resolve_name(&self, name: &str) -> Result<Resolution, LedgerError>;

    /// Where requests go, for logs and reports.
    fn endpoint(&self) -> &str;
}
