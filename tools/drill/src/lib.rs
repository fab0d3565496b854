//! Reentrancy drill
//!
//! Self-contained scenarios that stand up a fresh ledger, point it at an
//! honest, failing, or hostile transfer gateway, and report whether the
//! ledger held its invariants.
//!
//! # Scenarios
//! - `honest_withdrawal`: plain deposit and partial withdrawal
//! - `reentrant_drain`: receiver re-withdraws the same funds from inside `send`
//! - `failed_transfer_rollback`: gateway refuses, debit must be restored
//! - `cross_account_isolation`: receiver raids a second account from inside `send`
//! - `reentrant_deposit`: receiver tries to mint a deposit from inside `send`

use std::cell::{Cell, OnceCell, RefCell};
use std::rc::{Rc, Weak};

use custody::{
    GuardState, Ledger, LedgerConfig, LedgerError, LedgerEvent, NotificationSink,
    RecordingGateway, RejectingGateway, SolvencyReport, TracingSink, TransferError,
    TransferGateway,
};
use serde::Serialize;
use tracing::{info, warn};
use types::ids::AccountId;
use types::numeric::{Amount, Total};

/// Result of running one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    /// Human-readable outcome of every ledger call the scenario made.
    pub outcomes: Vec<String>,
    pub solvency: SolvencyReport,
    pub guard_state: GuardState,
    pub passed: bool,
}

/// What a hostile receiver does while it holds control.
#[derive(Debug, Clone, Copy)]
pub enum Attack {
    Rewithdraw,
    WithdrawFrom(AccountId, Amount),
    Deposit(Amount),
}

/// Transfer gateway whose receiver calls back into the ledger.
pub struct ReentrantReceiver {
    ledger: OnceCell<Weak<Ledger>>,
    attack: Attack,
    attempts: RefCell<Vec<Result<LedgerEvent, LedgerError>>>,
    delivered: Cell<Total>,
}

impl ReentrantReceiver {
    pub fn new(attack: Attack) -> Self {
        Self {
            ledger: OnceCell::new(),
            attack,
            attempts: RefCell::new(Vec::new()),
            delivered: Cell::new(0),
        }
    }

    /// Wire the receiver to the ledger it attacks. Later calls are ignored.
    pub fn attach(&self, ledger: &Rc<Ledger>) {
        let _ = self.ledger.set(Rc::downgrade(ledger));
    }

    pub fn attempts(&self) -> Vec<Result<LedgerEvent, LedgerError>> {
        self.attempts.borrow().clone()
    }

    /// Total handed to the receiver across all `send` calls.
    pub fn delivered(&self) -> Total {
        self.delivered.get()
    }
}

impl TransferGateway for ReentrantReceiver {
    fn send(&self, account_id: AccountId, amount: Amount) -> Result<(), TransferError> {
        let ledger = self
            .ledger
            .get()
            .and_then(Weak::upgrade)
            .ok_or(TransferError::Unavailable)?;

        let attempt = match self.attack {
            Attack::Rewithdraw => ledger.withdraw(account_id, amount),
            Attack::WithdrawFrom(other, other_amount) => ledger.withdraw(other, other_amount),
            Attack::Deposit(extra) => ledger.deposit(account_id, extra),
        };
        if attempt.is_ok() {
            warn!(account_id = %account_id, "reentrant call was accepted");
        }
        self.attempts.borrow_mut().push(attempt);

        self.delivered.set(self.delivered.get() + Total::from(amount));
        Ok(())
    }
}

fn describe(result: &Result<LedgerEvent, LedgerError>) -> String {
    match result {
        Ok(event) => format!("ok: {:?}", event),
        Err(err) => format!("err: {}", err),
    }
}

fn sink() -> Rc<dyn NotificationSink> {
    Rc::new(TracingSink)
}

fn hostile(config: &LedgerConfig, attack: Attack) -> (Rc<Ledger>, Rc<ReentrantReceiver>) {
    let receiver = Rc::new(ReentrantReceiver::new(attack));
    let ledger = Rc::new(Ledger::with_config(config.clone(), receiver.clone(), sink()));
    receiver.attach(&ledger);
    (ledger, receiver)
}

fn report(
    name: &'static str,
    ledger: &Ledger,
    outcomes: Vec<String>,
    checks: bool,
) -> ScenarioReport {
    let solvency = ledger.solvency();
    let guard_state = ledger.guard_state();
    let passed = checks && solvency.is_conserved() && guard_state == GuardState::Idle;
    info!(scenario = name, passed, "scenario finished");
    ScenarioReport {
        name,
        outcomes,
        solvency,
        guard_state,
        passed,
    }
}

pub fn honest_withdrawal(config: &LedgerConfig) -> ScenarioReport {
    let gateway = Rc::new(RecordingGateway::new());
    let ledger = Ledger::with_config(config.clone(), gateway.clone(), sink());
    let a = AccountId::new();

    let deposit = ledger.deposit(a, 100);
    let withdraw = ledger.withdraw(a, 60);

    let checks = deposit.is_ok()
        && withdraw.is_ok()
        && ledger.balance(&a) == 40
        && gateway.total_delivered(Some(&a)) == 60;
    report(
        "honest_withdrawal",
        &ledger,
        vec![describe(&deposit), describe(&withdraw)],
        checks,
    )
}

pub fn reentrant_drain(config: &LedgerConfig) -> ScenarioReport {
    let (ledger, receiver) = hostile(config, Attack::Rewithdraw);
    let a = AccountId::new();

    let deposit = ledger.deposit(a, 100);
    let withdraw = ledger.withdraw(a, 100);
    let attempts = receiver.attempts();

    let checks = deposit.is_ok()
        && withdraw.is_ok()
        && ledger.balance(&a) == 0
        && receiver.delivered() == 100
        && attempts.iter().all(|r| {
            matches!(
                r,
                Err(LedgerError::ReentrancyRejected { .. })
                    | Err(LedgerError::InsufficientFunds { .. })
            )
        });

    let mut outcomes = vec![describe(&deposit), describe(&withdraw)];
    outcomes.extend(attempts.iter().map(|r| format!("reentrant {}", describe(r))));
    report("reentrant_drain", &ledger, outcomes, checks)
}

pub fn failed_transfer_rollback(config: &LedgerConfig) -> ScenarioReport {
    let ledger = Ledger::with_config(
        config.clone(),
        Rc::new(RejectingGateway::with_reason("receiver reverted")),
        sink(),
    );
    let b = AccountId::new();

    let deposit = ledger.deposit(b, 50);
    let withdraw = ledger.withdraw(b, 50);

    let checks = deposit.is_ok()
        && matches!(withdraw, Err(LedgerError::TransferFailed { .. }))
        && ledger.balance(&b) == 50;
    report(
        "failed_transfer_rollback",
        &ledger,
        vec![describe(&deposit), describe(&withdraw)],
        checks,
    )
}

pub fn cross_account_isolation(config: &LedgerConfig) -> ScenarioReport {
    let c = AccountId::new();
    let d = AccountId::new();
    let (ledger, receiver) = hostile(config, Attack::WithdrawFrom(d, 80));

    let deposit_c = ledger.deposit(c, 100);
    let deposit_d = ledger.deposit(d, 80);
    let withdraw = ledger.withdraw(c, 100);

    let checks = deposit_c.is_ok()
        && deposit_d.is_ok()
        && withdraw.is_ok()
        && ledger.balance(&c) == 0
        && ledger.balance(&d) == 80
        && receiver.attempts().iter().all(|r| r.is_err());

    let mut outcomes = vec![
        describe(&deposit_c),
        describe(&deposit_d),
        describe(&withdraw),
    ];
    outcomes.extend(
        receiver
            .attempts()
            .iter()
            .map(|r| format!("reentrant {}", describe(r))),
    );
    report("cross_account_isolation", &ledger, outcomes, checks)
}

pub fn reentrant_deposit(config: &LedgerConfig) -> ScenarioReport {
    let (ledger, receiver) = hostile(config, Attack::Deposit(1_000));
    let a = AccountId::new();

    let deposit = ledger.deposit(a, 100);
    let withdraw = ledger.withdraw(a, 100);
    let attempts = receiver.attempts();

    let checks = deposit.is_ok()
        && withdraw.is_ok()
        && ledger.balance(&a) == 0
        && ledger.total_deposited() == 100
        && attempts
            .iter()
            .all(|r| matches!(r, Err(LedgerError::ReentrancyRejected { .. })));

    let mut outcomes = vec![describe(&deposit), describe(&withdraw)];
    outcomes.extend(attempts.iter().map(|r| format!("reentrant {}", describe(r))));
    report("reentrant_deposit", &ledger, outcomes, checks)
}

/// Run every scenario against fresh ledgers built from `config`.
pub fn run_all(config: &LedgerConfig) -> Vec<ScenarioReport> {
    vec![
        honest_withdrawal(config),
        reentrant_drain(config),
        failed_transfer_rollback(config),
        cross_account_isolation(config),
        reentrant_deposit(config),
    ]
}
