//! Reentrancy Attack Tests
//!
//! Adversarial gateways and sinks that call back into the ledger while a
//! guarded operation is still in flight:
//! - Repeated withdrawal from inside `send`
//! - Cross-account withdrawal from inside `send`
//! - Deposit from inside `send` and from inside the notification sink
//! - Reentry followed by transfer failure (rollback)
//! - Fuzz testing (proptest) of conservation across mixed sequences

use std::cell::{Cell, OnceCell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use custody::{
    EventLog, GuardState, Ledger, LedgerError, LedgerEvent, NotificationSink, RecordingGateway,
    TransferError, TransferGateway,
};
use types::ids::AccountId;
use types::numeric::Amount;

// ═══════════════════════════════════════════════════════════════════
// Hostile collaborators
// ═══════════════════════════════════════════════════════════════════

/// What the receiver does with control during `send`.
#[derive(Debug, Clone, Copy)]
enum Attack {
    /// Withdraw the same amount from the same account again.
    Rewithdraw,
    /// Withdraw from another account.
    WithdrawFrom(AccountId, Amount),
    /// Deposit into the account being paid out.
    Deposit(Amount),
    /// Do nothing.
    None,
}

/// Gateway whose receiver code calls back into the ledger.
struct HostileGateway {
    ledger: OnceCell<Weak<Ledger>>,
    attack: Cell<Attack>,
    /// Rounds of reentry per `send` call.
    rounds: Cell<usize>,
    /// Report failure after attacking.
    fail: Cell<bool>,
    inner_results: RefCell<Vec<Result<LedgerEvent, LedgerError>>>,
    balances_seen: RefCell<Vec<Amount>>,
    guard_seen: RefCell<Vec<GuardState>>,
    delivered: RefCell<Vec<(AccountId, Amount)>>,
}

impl HostileGateway {
    fn new(attack: Attack) -> Self {
        Self {
            ledger: OnceCell::new(),
            attack: Cell::new(attack),
            rounds: Cell::new(1),
            fail: Cell::new(false),
            inner_results: RefCell::new(Vec::new()),
            balances_seen: RefCell::new(Vec::new()),
            guard_seen: RefCell::new(Vec::new()),
            delivered: RefCell::new(Vec::new()),
        }
    }

    fn ledger(&self) -> Rc<Ledger> {
        self.ledger
            .get()
            .and_then(Weak::upgrade)
            .expect("ledger attached before use")
    }
}

impl TransferGateway for HostileGateway {
    fn send(&self, account_id: AccountId, amount: Amount) -> Result<(), TransferError> {
        let ledger = self.ledger();
        self.balances_seen.borrow_mut().push(ledger.balance(&account_id));
        self.guard_seen.borrow_mut().push(ledger.guard_state());

        for _ in 0..self.rounds.get() {
            let result = match self.attack.get() {
                Attack::Rewithdraw => ledger.withdraw(account_id, amount),
                Attack::WithdrawFrom(other, other_amount) => ledger.withdraw(other, other_amount),
                Attack::Deposit(extra) => ledger.deposit(account_id, extra),
                Attack::None => continue,
            };
            self.inner_results.borrow_mut().push(result);
        }

        if self.fail.get() {
            return Err(TransferError::Rejected {
                reason: "receiver reverted".to_string(),
            });
        }
        self.delivered.borrow_mut().push((account_id, amount));
        Ok(())
    }
}

/// Sink that tries to withdraw whenever it hears about a deposit.
struct HostileSink {
    ledger: OnceCell<Weak<Ledger>>,
    inner_results: RefCell<Vec<Result<LedgerEvent, LedgerError>>>,
}

impl NotificationSink for HostileSink {
    fn notify(&self, event: &LedgerEvent) {
        if let (LedgerEvent::Deposited(d), Some(ledger)) =
            (event, self.ledger.get().and_then(Weak::upgrade))
        {
            let result = ledger.withdraw(d.account_id, d.amount.max(1));
            self.inner_results.borrow_mut().push(result);
        }
    }
}

fn hostile_ledger(attack: Attack) -> (Rc<Ledger>, Rc<HostileGateway>, Rc<EventLog>) {
    let gateway = Rc::new(HostileGateway::new(attack));
    let log = Rc::new(EventLog::new());
    let ledger = Rc::new(Ledger::new(gateway.clone(), log.clone()));
    gateway
        .ledger
        .set(Rc::downgrade(&ledger))
        .expect("ledger attached once");
    (ledger, gateway, log)
}

// ═══════════════════════════════════════════════════════════════════
// Reentrancy Tests
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_reentrant_withdraw_same_account_rejected() {
    let (ledger, gateway, _) = hostile_ledger(Attack::Rewithdraw);
    let a = AccountId::new();
    ledger.deposit(a, 100).unwrap();

    let outer = ledger.withdraw(a, 100);

    assert!(outer.is_ok(), "outer withdrawal succeeds exactly once");
    assert_eq!(ledger.balance(&a), 0);
    assert_eq!(gateway.delivered.borrow().as_slice(), &[(a, 100)]);

    let inner = gateway.inner_results.borrow();
    assert_eq!(inner.len(), 1);
    assert!(matches!(
        inner[0],
        Err(LedgerError::ReentrancyRejected { .. }) | Err(LedgerError::InsufficientFunds { .. })
    ));
    assert_eq!(
        inner[0],
        Err(LedgerError::ReentrancyRejected {
            operation: "withdraw"
        })
    );
    assert_eq!(ledger.guard_state(), GuardState::Idle);
}

#[test]
fn test_debit_visible_to_receiver_before_delivery() {
    let (ledger, gateway, _) = hostile_ledger(Attack::None);
    let a = AccountId::new();
    ledger.deposit(a, 100).unwrap();

    ledger.withdraw(a, 30).unwrap();

    assert_eq!(gateway.balances_seen.borrow().as_slice(), &[70]);
    assert_eq!(gateway.guard_seen.borrow().as_slice(), &[GuardState::Entered]);
}

#[test]
fn test_repeated_reentry_drains_nothing() {
    let (ledger, gateway, _) = hostile_ledger(Attack::Rewithdraw);
    gateway.rounds.set(25);
    let a = AccountId::new();
    ledger.deposit(a, 100).unwrap();

    ledger.withdraw(a, 10).unwrap();

    assert_eq!(ledger.balance(&a), 90);
    assert_eq!(ledger.total_withdrawn(), 10);
    let inner = gateway.inner_results.borrow();
    assert_eq!(inner.len(), 25);
    assert!(inner
        .iter()
        .all(|r| matches!(r, Err(LedgerError::ReentrancyRejected { .. }))));
    assert!(ledger.solvency().is_conserved());
}

#[test]
fn test_reentrant_deposit_rejected() {
    let (ledger, gateway, log) = hostile_ledger(Attack::Deposit(1_000));
    let a = AccountId::new();
    ledger.deposit(a, 100).unwrap();

    ledger.withdraw(a, 40).unwrap();

    assert_eq!(ledger.balance(&a), 60);
    assert_eq!(
        gateway.inner_results.borrow().as_slice(),
        &[Err(LedgerError::ReentrancyRejected {
            operation: "deposit"
        })]
    );
    assert_eq!(ledger.total_deposited(), 100);
    assert_eq!(log.len(), 2, "only the outer deposit and withdrawal are reported");
}

#[test]
fn test_cross_account_isolation() {
    let c = AccountId::new();
    let d = AccountId::new();
    let (ledger, gateway, _) = hostile_ledger(Attack::WithdrawFrom(d, 75));
    ledger.deposit(c, 100).unwrap();
    ledger.deposit(d, 75).unwrap();

    ledger.withdraw(c, 100).unwrap();

    assert_eq!(ledger.balance(&c), 0);
    assert_eq!(ledger.balance(&d), 75, "D untouched by C's reentrant receiver");
    assert!(matches!(
        gateway.inner_results.borrow()[0],
        Err(LedgerError::ReentrancyRejected { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════
// Rollback Tests
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_reentry_then_failure_rolls_back() {
    let (ledger, gateway, log) = hostile_ledger(Attack::Rewithdraw);
    gateway.fail.set(true);
    let b = AccountId::new();
    ledger.deposit(b, 50).unwrap();

    let result = ledger.withdraw(b, 50);

    assert!(matches!(
        result,
        Err(LedgerError::TransferFailed { amount: 50, .. })
    ));
    assert_eq!(ledger.balance(&b), 50);
    assert_eq!(ledger.total_withdrawn(), 0);
    assert_eq!(log.len(), 1);
    assert_eq!(ledger.guard_state(), GuardState::Idle);
}

#[test]
fn test_legitimate_call_succeeds_after_every_failure_path() {
    let (ledger, gateway, _) = hostile_ledger(Attack::Rewithdraw);
    let a = AccountId::new();
    ledger.deposit(a, 20).unwrap();

    // insufficient funds
    ledger.withdraw(a, 21).unwrap_err();
    // transfer failure with a rejected reentry inside it
    gateway.fail.set(true);
    ledger.withdraw(a, 20).unwrap_err();
    gateway.fail.set(false);
    gateway.attack.set(Attack::None);

    ledger.withdraw(a, 20).unwrap();
    assert_eq!(ledger.balance(&a), 0);
    assert_eq!(ledger.guard_state(), GuardState::Idle);
}

#[test]
fn test_sink_reentry_rejected() {
    let sink = Rc::new(HostileSink {
        ledger: OnceCell::new(),
        inner_results: RefCell::new(Vec::new()),
    });
    let gateway = Rc::new(RecordingGateway::new());
    let ledger = Rc::new(Ledger::new(gateway.clone(), sink.clone()));
    sink.ledger.set(Rc::downgrade(&ledger)).unwrap();
    let a = AccountId::new();

    ledger.deposit(a, 10).unwrap();

    assert_eq!(ledger.balance(&a), 10);
    assert_eq!(
        sink.inner_results.borrow().as_slice(),
        &[Err(LedgerError::ReentrancyRejected {
            operation: "withdraw"
        })]
    );
    assert!(gateway.deliveries().is_empty());
}

// ═══════════════════════════════════════════════════════════════════
// Fuzz Tests
// ═══════════════════════════════════════════════════════════════════

mod fuzz {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Deposit(usize, Amount),
        Withdraw(usize, Amount, bool, bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 0u64..1_000).prop_map(|(a, amt)| Op::Deposit(a, amt)),
            (0usize..3, 0u64..1_200, any::<bool>(), any::<bool>())
                .prop_map(|(a, amt, reenter, fail)| Op::Withdraw(a, amt, reenter, fail)),
        ]
    }

    proptest! {
        /// Invariant: held == deposited - withdrawn after every operation,
        /// and each balance matches a plain model that ignores reentry.
        #[test]
        fn fuzz_conservation_under_reentry(ops in prop::collection::vec(op(), 1..60)) {
            let (ledger, gateway, _) = hostile_ledger(Attack::None);
            let accounts = [AccountId::new(), AccountId::new(), AccountId::new()];
            let mut model: HashMap<AccountId, Amount> = HashMap::new();

            for op in ops {
                match op {
                    Op::Deposit(i, amount) => {
                        ledger.deposit(accounts[i], amount).unwrap();
                        *model.entry(accounts[i]).or_default() += amount;
                    }
                    Op::Withdraw(i, amount, reenter, fail) => {
                        gateway.attack.set(if reenter { Attack::Rewithdraw } else { Attack::None });
                        gateway.fail.set(fail);
                        let before = model.get(&accounts[i]).copied().unwrap_or(0);
                        let result = ledger.withdraw(accounts[i], amount);

                        if amount == 0 || amount > before {
                            let is_insufficient = matches!(result, Err(LedgerError::InsufficientFunds { .. }));
                            prop_assert!(is_insufficient);
                        } else if fail {
                            let is_failed = matches!(result, Err(LedgerError::TransferFailed { .. }));
                            prop_assert!(is_failed);
                        } else {
                            prop_assert!(result.is_ok());
                            model.insert(accounts[i], before - amount);
                        }
                    }
                }

                prop_assert_eq!(ledger.guard_state(), GuardState::Idle);
                prop_assert!(ledger.solvency().is_conserved());
                for acc in &accounts {
                    prop_assert_eq!(ledger.balance(acc), model.get(acc).copied().unwrap_or(0));
                }
            }

            let inner_ok = gateway.inner_results.borrow().iter().any(|r| r.is_ok());
            prop_assert!(!inner_ok, "no reentrant call ever succeeds");
        }
    }
}
