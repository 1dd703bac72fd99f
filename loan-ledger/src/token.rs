//! Fungible token ledger collaborator
//!
//! The loan ledger only ever calls [`TokenLedger::transfer_from`], once per
//! token-moving transition, acting as spender on an allowance the payer has
//! pre-authorized.

use crate::{
    journal::{Journal, Savepoint, Transactional},
    types::{AccountId, Amount},
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// External token ledger with `transferFrom` semantics
pub trait TokenLedger: Transactional + Send + Sync {
    /// Address the ledger is bound to at construction
    fn address(&self) -> &AccountId;

    /// Move `amount` from `payer` to `payee` on `spender`'s allowance
    fn transfer_from(
        &self,
        spender: &AccountId,
        payer: &AccountId,
        payee: &AccountId,
        amount: Amount,
    ) -> bool;
}

/// Callback run before a token transfer is applied
///
/// Receives `(payer, payee, amount)`; returning `false` rejects the transfer.
/// The callback may call back into the loan ledger.
pub type TransferHook = Arc<dyn Fn(&AccountId, &AccountId, Amount) -> bool + Send + Sync>;

#[derive(Debug)]
enum TokenOp {
    Moved {
        spender: AccountId,
        payer: AccountId,
        payee: AccountId,
        amount: Amount,
    },
    Minted {
        to: AccountId,
        amount: Amount,
    },
    Approved {
        owner: AccountId,
        spender: AccountId,
        previous: Amount,
    },
}

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<AccountId, Amount>,
    allowances: HashMap<(AccountId, AccountId), Amount>,
    journal: Journal<TokenOp>,
}

impl TokenState {
    fn balance(&self, who: &AccountId) -> Amount {
        self.balances.get(who).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn set_balance(&mut self, who: &AccountId, amount: Amount) {
        self.balances.insert(who.clone(), amount);
    }

    fn set_allowance(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.allowances
            .insert((owner.clone(), spender.clone()), amount);
    }

    fn undo(&mut self, op: TokenOp) {
        match op {
            TokenOp::Moved {
                spender,
                payer,
                payee,
                amount,
            } => {
                let payee_balance = self.balance(&payee).saturating_sub(amount);
                self.set_balance(&payee, payee_balance);
                let payer_balance = self.balance(&payer).saturating_add(amount);
                self.set_balance(&payer, payer_balance);
                let allowance = self.allowance(&payer, &spender).saturating_add(amount);
                self.set_allowance(&payer, &spender, allowance);
            }
            TokenOp::Minted { to, amount } => {
                let balance = self.balance(&to).saturating_sub(amount);
                self.set_balance(&to, balance);
            }
            TokenOp::Approved {
                owner,
                spender,
                previous,
            } => self.set_allowance(&owner, &spender, previous),
        }
    }
}

/// In-memory token ledger with balances, allowances and rollback
pub struct InMemoryTokenLedger {
    address: AccountId,
    state: Mutex<TokenState>,
    hook: RwLock<Option<TransferHook>>,
}

impl InMemoryTokenLedger {
    /// Empty ledger at `address`
    pub fn new(address: AccountId) -> Self {
        Self {
            address,
            state: Mutex::new(TokenState::default()),
            hook: RwLock::new(None),
        }
    }

    /// Credit `amount` to `to`
    pub fn mint(&self, to: &AccountId, amount: Amount) {
        let mut state = self.state.lock();
        let before = state.balance(to);
        let after = before.saturating_add(amount);
        state.set_balance(to, after);
        state.journal.record(TokenOp::Minted {
            to: to.clone(),
            amount: after - before,
        });
    }

    /// Let `spender` move up to `amount` of `owner`'s tokens
    pub fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        let mut state = self.state.lock();
        let previous = state.allowance(owner, spender);
        state.set_allowance(owner, spender, amount);
        state.journal.record(TokenOp::Approved {
            owner: owner.clone(),
            spender: spender.clone(),
            previous,
        });
    }

    /// Token balance of `who`
    pub fn balance_of(&self, who: &AccountId) -> Amount {
        self.state.lock().balance(who)
    }

    /// Remaining allowance of `spender` over `owner`'s tokens
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.state.lock().allowance(owner, spender)
    }

    /// Install a callback run before every transfer
    pub fn set_transfer_hook(&self, hook: TransferHook) {
        *self.hook.write() = Some(hook);
    }

    /// Remove the transfer callback
    pub fn clear_transfer_hook(&self) {
        *self.hook.write() = None;
    }
}

impl std::fmt::Debug for InMemoryTokenLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTokenLedger")
            .field("address", &self.address)
            .field("hooked", &self.hook.read().is_some())
            .finish()
    }
}

impl Transactional for InMemoryTokenLedger {
    fn savepoint(&self) -> Savepoint {
        self.state.lock().journal.savepoint()
    }

    fn rollback_to(&self, savepoint: Savepoint) {
        let mut state = self.state.lock();
        let undo = state.journal.unwind(savepoint);
        if !undo.is_empty() {
            tracing::debug!("Token ledger rolling back {} operations", undo.len());
        }
        for op in undo {
            state.undo(op);
        }
    }

    fn release(&self, savepoint: Savepoint) {
        self.state.lock().journal.release(savepoint);
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn address(&self) -> &AccountId {
        &self.address
    }

    fn transfer_from(
        &self,
        spender: &AccountId,
        payer: &AccountId,
        payee: &AccountId,
        amount: Amount,
    ) -> bool {
        // Run the hook without holding any lock so it may re-enter
        let hook = self.hook.read().clone();
        if let Some(hook) = hook {
            if !hook(payer, payee, amount) {
                return false;
            }
        }

        let mut state = self.state.lock();
        let allowance = state.allowance(payer, spender);
        let payer_balance = state.balance(payer);
        if allowance < amount || payer_balance < amount {
            return false;
        }

        // Self-transfers leave balances untouched but still spend allowance
        if payer != payee {
            let Some(payee_balance) = state.balance(payee).checked_add(amount) else {
                return false;
            };
            state.set_balance(payer, payer_balance - amount);
            state.set_balance(payee, payee_balance);
        }
        state.set_allowance(payer, spender, allowance - amount);
        state.journal.record(TokenOp::Moved {
            spender: spender.clone(),
            payer: payer.clone(),
            payee: payee.clone(),
            amount,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> (AccountId, AccountId, AccountId) {
        (
            AccountId::new("alice"),
            AccountId::new("bob"),
            AccountId::new("loan-ledger"),
        )
    }

    #[test]
    fn test_transfer_requires_allowance_and_balance() {
        let (alice, bob, spender) = accounts();
        let token = InMemoryTokenLedger::new(AccountId::new("token"));
        token.mint(&alice, 100);

        assert!(!token.transfer_from(&spender, &alice, &bob, 50));

        token.approve(&alice, &spender, 150);
        assert!(!token.transfer_from(&spender, &alice, &bob, 120));
        assert!(token.transfer_from(&spender, &alice, &bob, 50));

        assert_eq!(token.balance_of(&alice), 50);
        assert_eq!(token.balance_of(&bob), 50);
        assert_eq!(token.allowance(&alice, &spender), 100);
    }

    #[test]
    fn test_rollback_restores_balances_and_allowance() {
        let (alice, bob, spender) = accounts();
        let token = InMemoryTokenLedger::new(AccountId::new("token"));
        token.mint(&alice, 100);
        token.approve(&alice, &spender, 100);

        let sp = token.savepoint();
        assert!(token.transfer_from(&spender, &alice, &bob, 60));
        token.rollback_to(sp);

        assert_eq!(token.balance_of(&alice), 100);
        assert_eq!(token.balance_of(&bob), 0);
        assert_eq!(token.allowance(&alice, &spender), 100);
    }

    #[test]
    fn test_release_keeps_transfer() {
        let (alice, bob, spender) = accounts();
        let token = InMemoryTokenLedger::new(AccountId::new("token"));
        token.mint(&alice, 10);
        token.approve(&alice, &spender, 10);

        let sp = token.savepoint();
        assert!(token.transfer_from(&spender, &alice, &bob, 10));
        token.release(sp);

        assert_eq!(token.balance_of(&bob), 10);
    }

    #[test]
    fn test_hook_can_reject() {
        let (alice, bob, spender) = accounts();
        let token = InMemoryTokenLedger::new(AccountId::new("token"));
        token.mint(&alice, 10);
        token.approve(&alice, &spender, 10);
        token.set_transfer_hook(Arc::new(|_, _, _| false));

        assert!(!token.transfer_from(&spender, &alice, &bob, 10));
        assert_eq!(token.balance_of(&alice), 10);

        token.clear_transfer_hook();
        assert!(token.transfer_from(&spender, &alice, &bob, 10));
    }
}
