use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tally_core::{Aggregate, AggregateRoot, DomainError, DomainResult};
use tally_events::Event;

use crate::config::{LedgerConfig, OverdraftPolicy};
use crate::transaction::{Transaction, TransactionKind};

/// Ledger identifier (aggregate id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerId(Uuid);

impl LedgerId {
    /// Uses UUIDv7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LedgerId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for LedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Per-kind sums over the recorded history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    pub deposits: i128,
    pub withdrawals: i128,
}

/// Aggregate root: Ledger (single account).
///
/// Holds the initial balance and the append-only transaction history. The
/// running balance is kept in step with the history so that reads are O(1);
/// it always equals `initial_balance` plus the signed sum of `transactions`.
#[derive(Debug, Clone)]
pub struct Ledger {
    id: LedgerId,
    initial_balance: i64,
    balance: i64,
    transactions: Vec<Transaction>,
    config: LedgerConfig,
    version: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Ledger {
    /// The initial balance is taken as-is; it may be negative.
    pub fn new(initial_balance: i64) -> Self {
        Self::with_config(initial_balance, LedgerConfig::default())
    }

    pub fn with_config(initial_balance: i64, config: LedgerConfig) -> Self {
        Self {
            id: LedgerId::new(),
            initial_balance,
            balance: initial_balance,
            transactions: Vec::new(),
            config,
            version: 0,
        }
    }

    /// Rebuild a ledger by replaying a previously persisted history.
    ///
    /// Stops at the first transaction the ledger would reject.
    pub fn from_history(
        initial_balance: i64,
        history: impl IntoIterator<Item = Transaction>,
    ) -> DomainResult<Self> {
        Self::from_history_with_config(initial_balance, LedgerConfig::default(), history)
    }

    pub fn from_history_with_config(
        initial_balance: i64,
        config: LedgerConfig,
        history: impl IntoIterator<Item = Transaction>,
    ) -> DomainResult<Self> {
        let mut ledger = Self::with_config(initial_balance, config);
        for transaction in history {
            ledger.add_transaction(transaction)?;
        }
        Ok(ledger)
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    pub fn config(&self) -> LedgerConfig {
        self.config
    }

    pub fn initial_balance(&self) -> i64 {
        self.initial_balance
    }

    /// Current balance.
    pub fn balance(&self) -> i64 {
        self.balance
    }

    /// Record a transaction and update the balance.
    ///
    /// On error nothing is recorded and the balance is unchanged.
    pub fn add_transaction(&mut self, transaction: Transaction) -> DomainResult<()> {
        let command = LedgerCommand::RecordTransaction(RecordTransaction { transaction });

        match self.execute(&command) {
            Ok(_) => {
                let LedgerCommand::RecordTransaction(cmd) = &command;
                tracing::debug!(
                    ledger_id = %self.id,
                    transaction_id = %cmd.transaction.id,
                    kind = %cmd.transaction.kind,
                    amount = cmd.transaction.amount,
                    balance = self.balance,
                    "transaction recorded"
                );
                Ok(())
            }
            Err(err) => {
                let LedgerCommand::RecordTransaction(cmd) = &command;
                tracing::warn!(
                    ledger_id = %self.id,
                    transaction_id = %cmd.transaction.id,
                    kind = %cmd.transaction.kind,
                    amount = cmd.transaction.amount,
                    %err,
                    "transaction rejected"
                );
                Err(err)
            }
        }
    }

    /// Owned copy of the history in insertion order.
    ///
    /// Changes made to the returned vector never reach the ledger.
    pub fn transaction_history(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    /// Borrowed view of the history in insertion order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn totals(&self) -> LedgerTotals {
        self.transactions
            .iter()
            .fold(LedgerTotals::default(), |mut totals, tx| {
                match tx.kind {
                    TransactionKind::Deposit => totals.deposits += i128::from(tx.amount),
                    TransactionKind::Withdrawal => totals.withdrawals += i128::from(tx.amount),
                }
                totals
            })
    }
}

impl AggregateRoot for Ledger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransaction {
    pub transaction: Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    RecordTransaction(RecordTransaction),
}

/// Event: TransactionRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecorded {
    pub ledger_id: LedgerId,
    pub transaction: Transaction,
    /// Running balance once this transaction is applied, as seen by `handle`.
    /// `apply` recomputes the balance and does not read this field.
    pub balance_after: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    TransactionRecorded(TransactionRecorded),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::TransactionRecorded(_) => "ledger.transaction.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::TransactionRecorded(e) => e.transaction.timestamp,
        }
    }
}

impl Aggregate for Ledger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::TransactionRecorded(e) => {
                if e.ledger_id != self.id {
                    tracing::warn!(
                        ledger_id = %self.id,
                        event_ledger_id = %e.ledger_id,
                        "event for another ledger skipped"
                    );
                    return;
                }

                // The balance is re-folded from the transaction; `balance_after`
                // is informational only.
                let next = i128::from(self.balance) + e.transaction.signed_amount();
                let Ok(balance) = i64::try_from(next) else {
                    tracing::warn!(
                        ledger_id = %self.id,
                        transaction_id = %e.transaction.id,
                        "event skipped: balance overflow"
                    );
                    return;
                };

                self.balance = balance;
                self.transactions.push(e.transaction.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::RecordTransaction(cmd) => self.handle_record(cmd),
        }
    }
}

impl Ledger {
    fn handle_record(&self, cmd: &RecordTransaction) -> Result<Vec<LedgerEvent>, DomainError> {
        let tx = &cmd.transaction;

        if tx.amount < 0 {
            return Err(DomainError::validation("amount must not be negative"));
        }

        let next = i128::from(self.balance) + tx.signed_amount();
        let balance_after =
            i64::try_from(next).map_err(|_| DomainError::invariant("balance overflow"))?;

        if self.config.overdraft == OverdraftPolicy::Deny
            && tx.kind == TransactionKind::Withdrawal
            && balance_after < 0
        {
            return Err(DomainError::invariant("insufficient funds"));
        }

        Ok(vec![LedgerEvent::TransactionRecorded(TransactionRecorded {
            ledger_id: self.id,
            transaction: tx.clone(),
            balance_after,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc.timestamp_opt(0, 0).unwrap()
    }

    fn deposit(id: &str, amount: i64) -> Transaction {
        Transaction::deposit(id, amount, test_time())
    }

    fn withdrawal(id: &str, amount: i64) -> Transaction {
        Transaction::withdrawal(id, amount, test_time())
    }

    #[test]
    fn returns_initial_balance_without_transactions() {
        let ledger = Ledger::new(1000);
        assert_eq!(ledger.balance(), 1000);
        assert_eq!(ledger.initial_balance(), 1000);
        assert!(ledger.is_empty());
    }

    #[test]
    fn default_ledger_starts_at_zero() {
        assert_eq!(Ledger::default().balance(), 0);
    }

    #[test]
    fn deposit_adds_to_balance() {
        let mut ledger = Ledger::new(1000);
        ledger.add_transaction(deposit("1", 500)).unwrap();
        assert_eq!(ledger.balance(), 1500);
    }

    #[test]
    fn withdrawal_subtracts_from_balance() {
        let mut ledger = Ledger::new(1000);
        ledger.add_transaction(withdrawal("1", 500)).unwrap();
        assert_eq!(ledger.balance(), 500);
    }

    #[test]
    fn history_keeps_insertion_order() {
        let mut ledger = Ledger::new(1000);
        let first = deposit("1", 500);
        let second = withdrawal("2", 200);

        ledger.add_transaction(first.clone()).unwrap();
        ledger.add_transaction(second.clone()).unwrap();

        assert_eq!(ledger.balance(), 1300);
        assert_eq!(ledger.transaction_history(), vec![first, second]);
        assert_eq!(ledger.version(), 2);
    }

    #[test]
    fn mutating_returned_history_does_not_touch_ledger() {
        let mut ledger = Ledger::new(1000);
        ledger.add_transaction(deposit("1", 500)).unwrap();

        let mut history = ledger.transaction_history();
        history.push(withdrawal("2", 10_000));
        history[0].amount = 1;

        assert_eq!(ledger.balance(), 1500);
        assert_eq!(ledger.transaction_history(), vec![deposit("1", 500)]);
    }

    #[test]
    fn reads_are_idempotent() {
        let mut ledger = Ledger::new(10);
        ledger.add_transaction(deposit("1", 5)).unwrap();

        assert_eq!(ledger.balance(), ledger.balance());
        assert_eq!(ledger.transaction_history(), ledger.transaction_history());
    }

    #[test]
    fn negative_amount_is_rejected_without_side_effects() {
        let mut ledger = Ledger::new(1000);
        let err = ledger.add_transaction(deposit("1", -5)).unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(ledger.balance(), 1000);
        assert!(ledger.transaction_history().is_empty());
        assert_eq!(ledger.version(), 0);
    }

    #[test]
    fn zero_amount_is_recorded() {
        let mut ledger = Ledger::new(7);
        ledger.add_transaction(withdrawal("1", 0)).unwrap();
        assert_eq!(ledger.balance(), 7);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn overdraft_is_allowed_by_default() {
        let mut ledger = Ledger::new(100);
        ledger.add_transaction(withdrawal("1", 250)).unwrap();
        assert_eq!(ledger.balance(), -150);
    }

    #[test]
    fn deny_policy_rejects_overdraft() {
        let config = LedgerConfig::with_overdraft(OverdraftPolicy::Deny);
        let mut ledger = Ledger::with_config(100, config);

        ledger.add_transaction(withdrawal("1", 100)).unwrap();
        assert_eq!(ledger.balance(), 0);

        let err = ledger.add_transaction(withdrawal("2", 1)).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("insufficient funds") => {}
            other => panic!("Expected insufficient funds, got {other:?}"),
        }
        assert_eq!(ledger.balance(), 0);
        assert_eq!(ledger.len(), 1);

        // Deposits are never blocked, even from a negative starting point.
        let mut in_debt = Ledger::with_config(-50, config);
        in_debt.add_transaction(deposit("3", 10)).unwrap();
        assert_eq!(in_debt.balance(), -40);
    }

    #[test]
    fn overflow_is_rejected() {
        let mut ledger = Ledger::new(i64::MAX);
        let err = ledger.add_transaction(deposit("1", 1)).unwrap_err();
        assert_eq!(err, DomainError::invariant("balance overflow"));
        assert_eq!(ledger.balance(), i64::MAX);

        let mut ledger = Ledger::new(i64::MIN + 1);
        ledger.add_transaction(withdrawal("2", 1)).unwrap();
        assert!(ledger.add_transaction(withdrawal("3", 1)).is_err());
        assert_eq!(ledger.balance(), i64::MIN);
    }

    #[test]
    fn from_history_replays_in_order() {
        let history = vec![deposit("1", 500), withdrawal("2", 200)];
        let ledger = Ledger::from_history(1000, history.clone()).unwrap();
        assert_eq!(ledger.balance(), 1300);
        assert_eq!(ledger.transactions(), history.as_slice());
    }

    #[test]
    fn from_history_stops_at_rejected_transaction() {
        let config = LedgerConfig::with_overdraft(OverdraftPolicy::Deny);
        let result = Ledger::from_history_with_config(
            0,
            config,
            vec![deposit("1", 10), withdrawal("2", 11)],
        );
        assert_eq!(result.unwrap_err(), DomainError::invariant("insufficient funds"));
    }

    #[test]
    fn totals_split_by_kind() {
        let ledger = Ledger::from_history(
            0,
            vec![deposit("1", 500), withdrawal("2", 200), deposit("3", 50)],
        )
        .unwrap();
        assert_eq!(
            ledger.totals(),
            LedgerTotals {
                deposits: 550,
                withdrawals: 200,
            }
        );
    }

    #[test]
    fn handle_emits_event_without_mutating() {
        let ledger = Ledger::new(1000);
        let cmd = LedgerCommand::RecordTransaction(RecordTransaction {
            transaction: deposit("1", 500),
        });

        let events = ledger.handle(&cmd).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            LedgerEvent::TransactionRecorded(e) => {
                assert_eq!(e.ledger_id, ledger.id_typed());
                assert_eq!(e.balance_after, 1500);
            }
        }
        assert_eq!(events[0].event_type(), "ledger.transaction.recorded");
        assert_eq!(events[0].occurred_at(), test_time());

        assert_eq!(ledger.balance(), 1000);
        assert_eq!(ledger.version(), 0);
    }

    #[test]
    fn apply_folds_transaction_and_ignores_carried_balance() {
        let mut ledger = Ledger::new(1000);
        let event = LedgerEvent::TransactionRecorded(TransactionRecorded {
            ledger_id: ledger.id_typed(),
            transaction: deposit("1", 500),
            balance_after: 42,
        });

        ledger.apply(&event);

        assert_eq!(ledger.balance(), 1500);
        assert_eq!(ledger.transaction_history(), vec![deposit("1", 500)]);
        assert_eq!(ledger.version(), 1);
    }

    #[test]
    fn apply_skips_events_from_other_ledgers() {
        let mut ledger = Ledger::new(1000);
        let event = LedgerEvent::TransactionRecorded(TransactionRecorded {
            ledger_id: LedgerId::new(),
            transaction: withdrawal("1", 300),
            balance_after: 700,
        });

        ledger.apply(&event);

        assert_eq!(ledger.balance(), 1000);
        assert!(ledger.is_empty());
        assert_eq!(ledger.version(), 0);
    }

    #[test]
    fn apply_skips_overflowing_events() {
        let mut ledger = Ledger::new(i64::MAX);
        let event = LedgerEvent::TransactionRecorded(TransactionRecorded {
            ledger_id: ledger.id_typed(),
            transaction: deposit("1", 1),
            balance_after: i64::MIN,
        });

        ledger.apply(&event);

        assert_eq!(ledger.balance(), i64::MAX);
        assert!(ledger.is_empty());
    }

    fn arb_transaction() -> impl Strategy<Value = Transaction> {
        (0i64..1_000_000i64, any::<bool>()).prop_map(|(amount, is_deposit)| {
            let kind = if is_deposit {
                TransactionKind::Deposit
            } else {
                TransactionKind::Withdrawal
            };
            Transaction::new(uuid::Uuid::now_v7().to_string(), amount, kind, test_time())
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the balance is the signed fold of the history over the
        /// initial balance.
        #[test]
        fn balance_is_fold_of_history(
            initial in -1_000_000_000i64..1_000_000_000i64,
            txs in prop::collection::vec(arb_transaction(), 0..32)
        ) {
            let mut ledger = Ledger::new(initial);
            for tx in &txs {
                ledger.add_transaction(tx.clone()).unwrap();
            }

            let expected = i128::from(initial)
                + txs.iter().map(Transaction::signed_amount).sum::<i128>();
            prop_assert_eq!(i128::from(ledger.balance()), expected);

            let totals = ledger.totals();
            prop_assert_eq!(i128::from(initial) + totals.deposits - totals.withdrawals, expected);
        }

        /// Property: history length equals the number of successful adds and
        /// keeps call order, even when some adds are rejected.
        #[test]
        fn history_matches_successful_adds(
            txs in prop::collection::vec(arb_transaction(), 0..32)
        ) {
            let mut ledger = Ledger::with_config(
                0,
                LedgerConfig::with_overdraft(OverdraftPolicy::Deny),
            );
            let mut accepted = Vec::new();
            for tx in txs {
                if ledger.add_transaction(tx.clone()).is_ok() {
                    accepted.push(tx);
                }
            }

            prop_assert_eq!(ledger.transaction_history(), accepted.clone());
            prop_assert_eq!(ledger.version(), accepted.len() as u64);
            prop_assert!(ledger.balance() >= 0);
        }
    }
}
