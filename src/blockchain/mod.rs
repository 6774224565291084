pub mod ens;
pub mod ethereum;
pub mod traits;

pub use ethereum::EthereumLedger;
pub use traits::{LedgerClient, Resolution};
