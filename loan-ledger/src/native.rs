//! Native-currency escrow collaborator
//!
//! Collateral moves from the borrower into the ledger's own account when a
//! loan is requested and out of it exactly once, to the borrower or the
//! lender. A payout that the host reports as failed voids the transition.

use crate::{
    journal::{Journal, Savepoint, Transactional},
    types::{AccountId, Amount},
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Host capability for moving native currency
pub trait NativeCurrency: Transactional + Send + Sync {
    /// Move `amount` from `from` to `to`
    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Amount) -> bool;
}

/// Callback run when an account is about to receive native currency
///
/// Receives `(from, to, amount)`; returning `false` refuses the payment. The
/// callback may call back into the loan ledger.
pub type ReceiveHook = Arc<dyn Fn(&AccountId, &AccountId, Amount) -> bool + Send + Sync>;

/// Undo record for one balance change
#[derive(Debug)]
enum BankOp {
    Moved {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
    Deposited {
        to: AccountId,
        amount: Amount,
    },
}

#[derive(Debug, Default)]
struct BankState {
    balances: HashMap<AccountId, Amount>,
    refusing: HashSet<AccountId>,
    journal: Journal<BankOp>,
}

impl BankState {
    fn balance(&self, who: &AccountId) -> Amount {
        self.balances.get(who).copied().unwrap_or(0)
    }

    fn credit(&mut self, who: AccountId, amount: Amount) {
        let balance = self.balance(&who).saturating_add(amount);
        self.balances.insert(who, balance);
    }

    fn debit(&mut self, who: AccountId, amount: Amount) {
        let balance = self.balance(&who).saturating_sub(amount);
        self.balances.insert(who, balance);
    }

    fn undo(&mut self, op: BankOp) {
        match op {
            BankOp::Moved { from, to, amount } => {
                self.debit(to, amount);
                self.credit(from, amount);
            }
            BankOp::Deposited { to, amount } => self.debit(to, amount),
        }
    }
}

/// In-memory native-currency accounts with rollback
pub struct InMemoryNativeBank {
    state: Mutex<BankState>,
    hook: RwLock<Option<ReceiveHook>>,
}

impl InMemoryNativeBank {
    /// Bank with no accounts
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BankState::default()),
            hook: RwLock::new(None),
        }
    }

    /// Credit `amount` to `to`
    ///
    /// Journaled like a transfer, so a deposit made from a hook during a
    /// transition is undone if that transition is voided.
    pub fn deposit(&self, to: &AccountId, amount: Amount) {
        let mut state = self.state.lock();
        let before = state.balance(to);
        let after = before.saturating_add(amount);
        state.balances.insert(to.clone(), after);
        state.journal.record(BankOp::Deposited {
            to: to.clone(),
            amount: after - before,
        });
    }

    /// Balance of `who`
    pub fn balance_of(&self, who: &AccountId) -> Amount {
        self.state.lock().balance(who)
    }

    /// Make every payment to `who` fail
    pub fn refuse_payments_to(&self, who: &AccountId) {
        self.state.lock().refusing.insert(who.clone());
    }

    /// Undo [`refuse_payments_to`](Self::refuse_payments_to)
    pub fn accept_payments_to(&self, who: &AccountId) {
        self.state.lock().refusing.remove(who);
    }

    /// Install a callback run before every payment
    pub fn set_receive_hook(&self, hook: ReceiveHook) {
        *self.hook.write() = Some(hook);
    }

    /// Remove the receive callback
    pub fn clear_receive_hook(&self) {
        *self.hook.write() = None;
    }
}

impl Default for InMemoryNativeBank {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryNativeBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryNativeBank")
            .field("accounts", &self.state.lock().balances.len())
            .field("hooked", &self.hook.read().is_some())
            .finish()
    }
}

impl Transactional for InMemoryNativeBank {
    fn savepoint(&self) -> Savepoint {
        self.state.lock().journal.savepoint()
    }

    fn rollback_to(&self, savepoint: Savepoint) {
        let mut state = self.state.lock();
        for op in state.journal.unwind(savepoint) {
            state.undo(op);
        }
    }

    fn release(&self, savepoint: Savepoint) {
        self.state.lock().journal.release(savepoint);
    }
}

impl NativeCurrency for InMemoryNativeBank {
    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Amount) -> bool {
        let hook = self.hook.read().clone();
        if let Some(hook) = hook {
            if !hook(from, to, amount) {
                return false;
            }
        }

        let mut state = self.state.lock();
        if state.refusing.contains(to) {
            tracing::debug!("{} refused a payment of {}", to, amount);
            return false;
        }

        let from_balance = state.balance(from);
        if from_balance < amount {
            return false;
        }
        if from != to {
            let Some(to_balance) = state.balance(to).checked_add(amount) else {
                return false;
            };
            state.balances.insert(from.clone(), from_balance - amount);
            state.balances.insert(to.clone(), to_balance);
        }
        state.journal.record(BankOp::Moved {
            from: from.clone(),
            to: to.clone(),
            amount,
        });
        true
    }
}
