pub mod config;
pub mod crypto;
pub mod db;
pub mod events;
pub mod ledger;
pub mod sortition;
pub mod types;
pub mod uniform;

pub use config::LedgerConfig;
pub use crypto::{draw_seed, keccak256};
pub use db::{Storage, StorageError};
pub use events::LedgerEvent;
pub use ledger::{Account, DrawLedger, Withdrawal};
pub use sortition::SortitionTree;
pub use types::*;
pub use uniform::{uniform, uniform_amount, Reduction};

pub use primitive_types::U256;
