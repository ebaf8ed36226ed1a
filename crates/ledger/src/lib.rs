//! Single-account ledger.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. The
//! balance is always the fold of the recorded transactions over the initial
//! balance.

pub mod config;
pub mod ledger;
pub mod shared;
pub mod transaction;

pub use config::{LedgerConfig, OverdraftPolicy};
pub use ledger::{
    Ledger, LedgerCommand, LedgerEvent, LedgerId, LedgerTotals, RecordTransaction,
    TransactionRecorded,
};
pub use shared::SharedLedger;
pub use transaction::{Transaction, TransactionKind};

pub use tally_core::{DomainError, DomainResult, ExpectedVersion, TransactionId};
