use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{DomainError, Entity, TransactionId, ValueObject};

/// Direction of a transaction: money in or money out.
///
/// Closed set; text that is neither `deposit` nor `withdrawal` is rejected
/// with [`DomainError::InvalidTransactionKind`] when parsed or deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }
}

impl ValueObject for TransactionKind {}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            other => Err(DomainError::invalid_kind(other)),
        }
    }
}

impl TryFrom<String> for TransactionKind {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One balance-affecting event (immutable once recorded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Magnitude in smallest unit (e.g., cents). Must not be negative.
    pub amount: i64,
    pub kind: TransactionKind,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        id: impl Into<TransactionId>,
        amount: i64,
        kind: TransactionKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            amount,
            kind,
            timestamp,
        }
    }

    pub fn deposit(id: impl Into<TransactionId>, amount: i64, timestamp: DateTime<Utc>) -> Self {
        Self::new(id, amount, TransactionKind::Deposit, timestamp)
    }

    pub fn withdrawal(id: impl Into<TransactionId>, amount: i64, timestamp: DateTime<Utc>) -> Self {
        Self::new(id, amount, TransactionKind::Withdrawal, timestamp)
    }

    /// Effect on the balance: `+amount` for deposits, `-amount` for withdrawals.
    ///
    /// Widened to `i128` so the negation can never overflow.
    pub fn signed_amount(&self) -> i128 {
        let amount = i128::from(self.amount);
        match self.kind {
            TransactionKind::Deposit => amount,
            TransactionKind::Withdrawal => -amount,
        }
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
