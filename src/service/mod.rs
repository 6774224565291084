pub mod wallet;

pub use wallet::{DemoReport, LoadedWallet, Outcome, WalletService};
