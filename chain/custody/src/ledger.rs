//! Ledger: per-account balances, deposits, and guarded withdrawals
//!
//! Withdrawals follow checks-effects-interactions:
//! 1. Checks: amount is positive and covered by the balance
//! 2. Effects: the debit is written before anything external runs
//! 3. Interactions: the gateway delivers; if it errors or panics the debit is rolled back
//!
//! Both mutating entry points hold the reentrancy guard for their whole
//! duration, so a gateway that calls back into the ledger is refused. The
//! early debit means the balance check would refuse a repeated withdrawal
//! on its own as well.
//!
//! Entry points take `&self`. Balances live behind a `RefCell` and no borrow
//! is ever held across a call into the gateway or the notification sink.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use types::ids::AccountId;
use types::numeric::{Amount, Total};

use crate::config::LedgerConfig;
use crate::errors::LedgerError;
use crate::events::{Deposited, LedgerEvent, Withdrawn};
use crate::gateway::TransferGateway;
use crate::notify::NotificationSink;
use crate::security::{EntryToken, GuardState, ReentrancyGuard};

/// Aggregate view used to check conservation of funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvencyReport {
    /// Sum of all balances currently held.
    pub held: Total,
    /// Sum of all credited deposits.
    pub deposited: Total,
    /// Sum of all withdrawals the gateway confirmed.
    pub withdrawn: Total,
}

impl SolvencyReport {
    /// `held == deposited - withdrawn`
    pub fn is_conserved(&self) -> bool {
        self.deposited
            .checked_sub(self.withdrawn)
            .map_or(false, |expected| expected == self.held)
    }
}

/// Debit written ahead of the gateway call.
///
/// Restores the pre-debit balance on drop unless committed, so an `Err`
/// from the gateway and a panic unwinding out of it both roll back. The
/// reentrancy guard is held for the whole lifetime of the debit, so nothing
/// else can have written the entry in between.
struct PendingDebit<'a> {
    balances: &'a RefCell<HashMap<AccountId, Amount>>,
    account_id: AccountId,
    restore_to: Amount,
    committed: bool,
}

impl<'a> PendingDebit<'a> {
    fn apply(
        balances: &'a RefCell<HashMap<AccountId, Amount>>,
        account_id: AccountId,
        available: Amount,
        amount: Amount,
    ) -> Self {
        balances.borrow_mut().insert(account_id, available - amount);
        Self {
            balances,
            account_id,
            restore_to: available,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingDebit<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Ok(mut balances) = self.balances.try_borrow_mut() {
            balances.insert(self.account_id, self.restore_to);
        }
    }
}

/// Custodial balance ledger.
#[derive(Debug)]
pub struct Ledger {
    config: LedgerConfig,
    balances: RefCell<HashMap<AccountId, Amount>>,
    total_deposited: Cell<Total>,
    total_withdrawn: Cell<Total>,
    guard: ReentrancyGuard,
    gateway: Rc<dyn TransferGateway>,
    sink: Rc<dyn NotificationSink>,
}

impl Ledger {
    /// Create an empty ledger with default configuration.
    pub fn new(gateway: Rc<dyn TransferGateway>, sink: Rc<dyn NotificationSink>) -> Self {
        Self::with_config(LedgerConfig::default(), gateway, sink)
    }

    pub fn with_config(
        config: LedgerConfig,
        gateway: Rc<dyn TransferGateway>,
        sink: Rc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            balances: RefCell::new(HashMap::new()),
            total_deposited: Cell::new(0),
            total_withdrawn: Cell::new(0),
            guard: ReentrancyGuard::new(),
            gateway,
            sink,
        }
    }

    // ───────────────────────── Deposit ─────────────────────────

    /// Credit `amount` to `account_id`.
    ///
    /// A zero amount leaves the balance unchanged but is still reported to
    /// the sink. Fails with `BalanceOverflow` if the result would exceed the
    /// configured cap, and with `ReentrancyRejected` if called from inside
    /// another guarded operation.
    pub fn deposit(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<LedgerEvent, LedgerError> {
        let _entry = self.enter("deposit")?;

        let balance = self.balance(&account_id);
        let cap = self.config.balance_cap;
        let new_balance = balance
            .checked_add(amount)
            .filter(|b| *b <= cap)
            .ok_or(LedgerError::BalanceOverflow {
                account_id,
                balance,
                amount,
                cap,
            })?;

        self.balances.borrow_mut().insert(account_id, new_balance);
        self.total_deposited
            .set(self.total_deposited.get() + Total::from(amount));

        debug!(
            ledger = %self.config.label,
            account_id = %account_id,
            amount,
            balance = new_balance,
            "deposit credited"
        );

        let event = LedgerEvent::Deposited(Deposited { account_id, amount });
        self.sink.notify(&event);
        Ok(event)
    }

    // ───────────────────────── Withdraw ─────────────────────────

    /// Debit `amount` from `account_id` and deliver it through the gateway.
    ///
    /// Returns `InsufficientFunds` for a zero amount or one larger than the
    /// balance, `TransferFailed` if the gateway refuses (balance restored),
    /// and `ReentrancyRejected` if called from inside another guarded
    /// operation.
    pub fn withdraw(
        &self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<LedgerEvent, LedgerError> {
        let _entry = self.enter("withdraw")?;

        // Checks
        let available = self.balance(&account_id);
        if amount == 0 || amount > available {
            debug!(
                ledger = %self.config.label,
                account_id = %account_id,
                amount,
                available,
                "withdrawal refused: insufficient funds"
            );
            return Err(LedgerError::InsufficientFunds {
                account_id,
                requested: amount,
                available,
            });
        }

        // Effects
        let debit = PendingDebit::apply(&self.balances, account_id, available, amount);

        // Interactions
        if let Err(source) = self.gateway.send(account_id, amount) {
            drop(debit);
            warn!(
                ledger = %self.config.label,
                account_id = %account_id,
                amount,
                error = %source,
                "transfer failed, debit rolled back"
            );
            return Err(LedgerError::TransferFailed {
                account_id,
                amount,
                source,
            });
        }

        debit.commit();
        self.total_withdrawn
            .set(self.total_withdrawn.get() + Total::from(amount));

        info!(
            ledger = %self.config.label,
            account_id = %account_id,
            amount,
            balance = available - amount,
            "withdrawal delivered"
        );

        let event = LedgerEvent::Withdrawn(Withdrawn { account_id, amount });
        self.sink.notify(&event);
        Ok(event)
    }

    // ───────────────────────── Queries ─────────────────────────

    /// Current balance. Unknown accounts hold zero. Unguarded.
    pub fn balance(&self, account_id: &AccountId) -> Amount {
        self.balances
            .borrow()
            .get(account_id)
            .copied()
            .unwrap_or(0)
    }

    /// All known accounts with their balances, ordered by account id.
    pub fn accounts(&self) -> Vec<(AccountId, Amount)> {
        let mut accounts: Vec<_> = self
            .balances
            .borrow()
            .iter()
            .map(|(id, balance)| (*id, *balance))
            .collect();
        accounts.sort_unstable_by_key(|(id, _)| *id);
        accounts
    }

    pub fn account_count(&self) -> usize {
        self.balances.borrow().len()
    }

    pub fn total_held(&self) -> Total {
        self.balances
            .borrow()
            .values()
            .map(|b| Total::from(*b))
            .sum()
    }

    pub fn total_deposited(&self) -> Total {
        self.total_deposited.get()
    }

    pub fn total_withdrawn(&self) -> Total {
        self.total_withdrawn.get()
    }

    pub fn solvency(&self) -> SolvencyReport {
        SolvencyReport {
            held: self.total_held(),
            deposited: self.total_deposited(),
            withdrawn: self.total_withdrawn(),
        }
    }

    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ───────────────────────── Internal Guards ─────────────────────────

    fn enter(&self, operation: &'static str) -> Result<EntryToken<'_>, LedgerError> {
        self.guard.enter().ok_or_else(|| {
            warn!(ledger = %self.config.label, operation, "reentrant call rejected");
            LedgerError::ReentrancyRejected { operation }
        })
    }
}
