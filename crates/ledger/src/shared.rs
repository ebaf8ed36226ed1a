//! Thread-safe handle around a [`Ledger`].

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tally_core::{AggregateRoot, DomainError, DomainResult, ExpectedVersion};

use crate::ledger::Ledger;
use crate::transaction::Transaction;

/// Cloneable, lock-protected ledger.
///
/// Every mutation holds the write lock across validate + append + balance
/// update, so the history and the balance can never be observed out of step.
#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<RwLock<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, Ledger>> {
        self.inner
            .read()
            .map_err(|_| DomainError::invariant("ledger lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, Ledger>> {
        self.inner
            .write()
            .map_err(|_| DomainError::invariant("ledger lock poisoned"))
    }

    pub fn add_transaction(&self, transaction: Transaction) -> DomainResult<()> {
        self.write()?.add_transaction(transaction)
    }

    /// Like [`add_transaction`](Self::add_transaction), but only if no other
    /// writer got in since the caller observed `expected`.
    pub fn add_transaction_expecting(
        &self,
        expected: ExpectedVersion,
        transaction: Transaction,
    ) -> DomainResult<()> {
        let mut ledger = self.write()?;
        expected.check(ledger.version())?;
        ledger.add_transaction(transaction)
    }

    pub fn balance(&self) -> DomainResult<i64> {
        Ok(self.read()?.balance())
    }

    pub fn transaction_history(&self) -> DomainResult<Vec<Transaction>> {
        Ok(self.read()?.transaction_history())
    }

    pub fn version(&self) -> DomainResult<u64> {
        Ok(self.read()?.version())
    }

    /// Point-in-time copy of the whole ledger.
    pub fn snapshot(&self) -> DomainResult<Ledger> {
        Ok(self.read()?.clone())
    }
}

impl From<Ledger> for SharedLedger {
    fn from(ledger: Ledger) -> Self {
        Self::new(ledger)
    }
}
