//! Loan lifecycle state machine
//!
//! # Transitions
//!
//! ```text
//! Requested ──fund──▶ Funded ──repay / early_repay──▶ Closed (collateral → borrower)
//!     │                  └──────claim (after due)───▶ Closed (collateral → lender)
//!     └──cancel──▶ Cancelled (collateral → borrower)
//! ```
//!
//! # Transaction discipline
//!
//! Every transition runs the same sequence:
//!
//! 1. Enter the global reentrancy guard (other threads wait, nested calls on
//!    the same thread are rejected)
//! 2. Read the clock once
//! 3. Open savepoints on the token ledger and the native-currency host
//! 4. Check preconditions (existence, caller identity, then loan state), then
//!    commit the local mutation and its log record
//! 5. Issue the external transfers in order
//! 6. On any failure, restore the local checkpoint and roll the collaborators
//!    back, so the transition leaves no trace
//!
//! Step 4 happens before step 5: a collaborator that reads the ledger from
//! inside a transfer already sees the loan funded, closed or cancelled.
//!
//! # Example
//!
//! ```
//! use loan_ledger::{
//!     AccountId, Config, InMemoryNativeBank, InMemoryTokenLedger, LoanLedger, ManualClock,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> loan_ledger::Result<()> {
//! let config = Config::default();
//! let token = Arc::new(InMemoryTokenLedger::new(config.token_address.clone()));
//! let native = Arc::new(InMemoryNativeBank::new());
//! let clock = Arc::new(ManualClock::new(0));
//! let ledger = LoanLedger::new(&config, token.clone(), native.clone(), clock.clone())?;
//!
//! let alice = AccountId::new("alice");
//! native.deposit(&alice, 1);
//! let loan_id = ledger.request(&alice, 1, 100, 10, 3600)?;
//! assert_eq!(loan_id, 0);
//! assert_eq!(ledger.loan(loan_id)?.repayment_amount, 110);
//! # Ok(())
//! # }
//! ```

use crate::{
    clock::Clock,
    config::Config,
    error::{StateViolation, TransferKind},
    events::{EventLog, LoanEvent, LoanEventKind},
    guard::ReentrancyGuard,
    metrics::Metrics,
    native::NativeCurrency,
    rebate::{self, EarlyRepaymentQuote},
    token::TokenLedger,
    types::{AccountId, Amount, Loan, LoanId, LoanStatus, Operation, Role, Timestamp},
    Error, Result,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Serializable copy of the whole ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Ledger identity
    pub contract_address: AccountId,
    /// Bound token ledger
    pub token_address: AccountId,
    /// Loan records, indexed by loan ID
    pub loans: Vec<Loan>,
    /// Collateral held in escrow
    pub escrow: Amount,
    /// Event log
    pub events: Vec<LoanEvent>,
}

#[derive(Debug, Default)]
struct LedgerState {
    loans: Vec<Loan>,
    escrow: Amount,
    events: EventLog,
}

/// State to restore if a transition is voided
struct Checkpoint {
    loan_count: usize,
    escrow: Amount,
    event_count: usize,
    loan: Option<(usize, Loan)>,
}

impl LedgerState {
    fn next_loan_id(&self) -> LoanId {
        self.loans.len() as LoanId
    }

    fn loan(&self, loan_id: LoanId) -> Result<&Loan> {
        usize::try_from(loan_id)
            .ok()
            .and_then(|index| self.loans.get(index))
            .ok_or(Error::LoanNotFound(loan_id))
    }

    fn loan_mut(&mut self, loan_id: LoanId) -> Result<&mut Loan> {
        usize::try_from(loan_id)
            .ok()
            .and_then(|index| self.loans.get_mut(index))
            .ok_or(Error::LoanNotFound(loan_id))
    }

    fn checkpoint(&self, loan_id: Option<LoanId>) -> Checkpoint {
        let loan = loan_id
            .and_then(|id| usize::try_from(id).ok())
            .and_then(|index| self.loans.get(index).map(|loan| (index, loan.clone())));

        Checkpoint {
            loan_count: self.loans.len(),
            escrow: self.escrow,
            event_count: self.events.len(),
            loan,
        }
    }

    fn restore(&mut self, checkpoint: &Checkpoint) {
        self.loans.truncate(checkpoint.loan_count);
        if let Some((index, loan)) = &checkpoint.loan {
            if let Some(slot) = self.loans.get_mut(*index) {
                *slot = loan.clone();
            }
        }
        self.escrow = checkpoint.escrow;
        self.events.truncate(checkpoint.event_count);
    }

    fn release_escrow(&mut self, amount: Amount) -> Result<()> {
        self.escrow = self
            .escrow
            .checked_sub(amount)
            .ok_or(Error::ArithmeticOverflow("escrow balance"))?;
        Ok(())
    }

    fn select(&self, predicate: impl Fn(&Loan) -> bool) -> Vec<(LoanId, Loan)> {
        self.loans
            .iter()
            .enumerate()
            .filter(|(_, loan)| predicate(loan))
            .map(|(index, loan)| (index as LoanId, loan.clone()))
            .collect()
    }
}

/// External value movement issued after the local commit
#[derive(Debug)]
enum Effect {
    Token {
        payer: AccountId,
        payee: AccountId,
        amount: Amount,
    },
    Native {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
}

struct Transition<T> {
    effects: Vec<Effect>,
    outcome: T,
}

fn require_active(loan_id: LoanId, loan: &Loan) -> Result<()> {
    if !loan.is_active() {
        return Err(Error::state(loan_id, StateViolation::NotActive));
    }
    Ok(())
}

/// Single access-control predicate shared by every transition
fn authorize(loan_id: LoanId, loan: &Loan, caller: &AccountId, required: Role) -> Result<()> {
    if !loan.has_role(caller, required) {
        return Err(Error::Unauthorized {
            loan_id,
            caller: caller.clone(),
            required,
        });
    }
    Ok(())
}

fn lender_of(loan_id: LoanId, loan: &Loan) -> Result<AccountId> {
    loan.lender
        .clone()
        .ok_or_else(|| Error::InvariantViolation(format!("funded loan {} has no lender", loan_id)))
}

fn require_positive(value: u128, what: &str) -> Result<()> {
    if value == 0 {
        return Err(Error::InvalidArgument(format!("{} must be positive", what)));
    }
    Ok(())
}

/// Loan ledger
pub struct LoanLedger {
    /// Ledger identity (token spender, escrow holder)
    contract: AccountId,

    /// Loan table, escrow balance and event log
    state: Mutex<LedgerState>,

    /// Rejects nested transitions
    guard: ReentrancyGuard,

    /// Bound token ledger
    token: Arc<dyn TokenLedger>,

    /// Native-currency host
    native: Arc<dyn NativeCurrency>,

    /// Time source
    clock: Arc<dyn Clock>,

    /// Optional metrics
    metrics: Option<Metrics>,
}

impl LoanLedger {
    /// Bind a new, empty ledger to its collaborators
    pub fn new(
        config: &Config,
        token: Arc<dyn TokenLedger>,
        native: Arc<dyn NativeCurrency>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        if token.address() != &config.token_address {
            return Err(Error::Config(format!(
                "token ledger at {} does not match configured {}",
                token.address(),
                config.token_address
            )));
        }

        tracing::info!(
            contract = %config.contract_address,
            token = %config.token_address,
            "Loan ledger bound to token ledger"
        );

        Ok(Self {
            contract: config.contract_address.clone(),
            state: Mutex::new(LedgerState::default()),
            guard: ReentrancyGuard::new(),
            token,
            native,
            clock,
            metrics: None,
        })
    }

    /// Rebuild a ledger from a snapshot
    ///
    /// The snapshot must belong to the configured addresses and pass
    /// [`check_invariants`](Self::check_invariants).
    pub fn from_snapshot(
        config: &Config,
        snapshot: LedgerSnapshot,
        token: Arc<dyn TokenLedger>,
        native: Arc<dyn NativeCurrency>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if snapshot.contract_address != config.contract_address
            || snapshot.token_address != config.token_address
        {
            return Err(Error::Config(format!(
                "snapshot belongs to {} / {}",
                snapshot.contract_address, snapshot.token_address
            )));
        }

        let ledger = Self::new(config, token, native, clock)?;
        {
            let mut state = ledger.state.lock();
            state.loans = snapshot.loans;
            state.escrow = snapshot.escrow;
            state.events = EventLog::from_events(snapshot.events)?;
        }
        ledger.check_invariants()?;

        tracing::info!(
            loans = ledger.next_loan_id(),
            events = ledger.state.lock().events.len(),
            "Restored loan ledger from snapshot"
        );
        Ok(ledger)
    }

    /// Attach metrics
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        metrics.set_escrow(self.state.lock().escrow);
        self.metrics = Some(metrics);
        self
    }

    /// Ledger identity
    pub fn contract_address(&self) -> &AccountId {
        &self.contract
    }

    /// Bound token ledger address
    pub fn token_address(&self) -> &AccountId {
        self.token.address()
    }

    // Transitions

    /// Escrow `collateral_amount` from `borrower` and record a loan request
    ///
    /// Interest may be zero. Returns the new loan ID.
    pub fn request(
        &self,
        borrower: &AccountId,
        collateral_amount: Amount,
        principal: Amount,
        interest: Amount,
        duration: u64,
    ) -> Result<LoanId> {
        let loan_id = self.transact(Operation::Request, None, |state, now| {
            require_positive(collateral_amount, "collateral amount")?;
            require_positive(principal, "principal")?;
            require_positive(u128::from(duration), "duration")?;

            let repayment_amount = rebate::repayment_amount(principal, interest)?;
            let escrow = state
                .escrow
                .checked_add(collateral_amount)
                .ok_or(Error::ArithmeticOverflow("escrow balance"))?;

            let loan_id = state.next_loan_id();
            state.loans.push(Loan {
                borrower: borrower.clone(),
                lender: None,
                collateral_amount,
                principal,
                interest,
                repayment_amount,
                duration,
                due_date: 0,
                is_funded: false,
                is_closed: false,
                is_cancelled: false,
            });
            state.escrow = escrow;
            state.events.append(
                loan_id,
                now,
                LoanEventKind::Requested {
                    borrower: borrower.clone(),
                    principal,
                    interest,
                    duration,
                },
            );

            Ok(Transition {
                effects: vec![Effect::Native {
                    from: borrower.clone(),
                    to: self.contract.clone(),
                    amount: collateral_amount,
                }],
                outcome: loan_id,
            })
        })?;

        tracing::info!(
            loan_id,
            borrower = %borrower,
            collateral = %collateral_amount,
            principal = %principal,
            interest = %interest,
            duration,
            "Loan requested"
        );
        Ok(loan_id)
    }

    /// Supply the principal from `lender` to the borrower
    ///
    /// Starts the repayment window. Returns the due date.
    pub fn fund(&self, loan_id: LoanId, lender: &AccountId) -> Result<Timestamp> {
        let due_date = self.transact(Operation::Fund, Some(loan_id), |state, now| {
            let loan = state.loan_mut(loan_id)?;
            if loan.is_funded {
                return Err(Error::state(loan_id, StateViolation::AlreadyFunded));
            }
            if loan.is_cancelled {
                return Err(Error::state(loan_id, StateViolation::Cancelled));
            }
            let due_date = rebate::due_date(now, loan.duration)?;

            loan.lender = Some(lender.clone());
            loan.is_funded = true;
            loan.due_date = due_date;
            let payout = Effect::Token {
                payer: lender.clone(),
                payee: loan.borrower.clone(),
                amount: loan.principal,
            };

            state.events.append(
                loan_id,
                now,
                LoanEventKind::Funded {
                    lender: lender.clone(),
                },
            );

            Ok(Transition {
                effects: vec![payout],
                outcome: due_date,
            })
        })?;

        tracing::info!(loan_id, lender = %lender, due_date, "Loan funded");
        Ok(due_date)
    }

    /// Repay principal plus full interest and reclaim the collateral
    ///
    /// Valid before or after the due date, as long as the lender has not
    /// claimed. Returns the amount paid to the lender.
    pub fn repay(&self, loan_id: LoanId, caller: &AccountId) -> Result<Amount> {
        let paid = self.transact(Operation::Repay, Some(loan_id), |state, now| {
            let loan = state.loan_mut(loan_id)?;
            authorize(loan_id, loan, caller, Role::Borrower)?;
            require_active(loan_id, loan)?;
            let lender = lender_of(loan_id, loan)?;

            loan.is_closed = true;
            let borrower = loan.borrower.clone();
            let repayment = loan.repayment_amount;
            let collateral = loan.collateral_amount;

            state.release_escrow(collateral)?;
            state.events.append(
                loan_id,
                now,
                LoanEventKind::Repaid {
                    borrower: borrower.clone(),
                },
            );

            Ok(Transition {
                effects: vec![
                    Effect::Token {
                        payer: borrower.clone(),
                        payee: lender,
                        amount: repayment,
                    },
                    Effect::Native {
                        from: self.contract.clone(),
                        to: borrower,
                        amount: collateral,
                    },
                ],
                outcome: repayment,
            })
        })?;

        tracing::info!(loan_id, borrower = %caller, paid = %paid, "Loan repaid");
        Ok(paid)
    }

    /// Repay before the due date with a proportional interest rebate
    ///
    /// Fails with [`StateViolation::PastDue`] at or after the due date; full
    /// interest is owed from then on and [`repay`](Self::repay) must be used.
    pub fn early_repay(&self, loan_id: LoanId, caller: &AccountId) -> Result<EarlyRepaymentQuote> {
        let quote = self.transact(Operation::EarlyRepay, Some(loan_id), |state, now| {
            let loan = state.loan_mut(loan_id)?;
            authorize(loan_id, loan, caller, Role::Borrower)?;
            require_active(loan_id, loan)?;
            if now >= loan.due_date {
                return Err(Error::state(loan_id, StateViolation::PastDue));
            }
            let quote = EarlyRepaymentQuote::compute(loan, now)?;
            let lender = lender_of(loan_id, loan)?;

            loan.is_closed = true;
            let borrower = loan.borrower.clone();
            let collateral = loan.collateral_amount;

            state.release_escrow(collateral)?;
            state.events.append(
                loan_id,
                now,
                LoanEventKind::EarlyRepaid {
                    borrower: borrower.clone(),
                    rebate: quote.rebate,
                },
            );

            Ok(Transition {
                effects: vec![
                    Effect::Token {
                        payer: borrower.clone(),
                        payee: lender,
                        amount: quote.amount_due,
                    },
                    Effect::Native {
                        from: self.contract.clone(),
                        to: borrower,
                        amount: collateral,
                    },
                ],
                outcome: quote,
            })
        })?;

        tracing::info!(
            loan_id,
            borrower = %caller,
            rebate = %quote.rebate,
            paid = %quote.amount_due,
            "Loan repaid early"
        );
        Ok(quote)
    }

    /// Withdraw an unfunded request and reclaim the collateral
    pub fn cancel(&self, loan_id: LoanId, caller: &AccountId) -> Result<()> {
        self.transact(Operation::Cancel, Some(loan_id), |state, now| {
            let loan = state.loan_mut(loan_id)?;
            authorize(loan_id, loan, caller, Role::Borrower)?;
            if loan.is_funded {
                return Err(Error::state(loan_id, StateViolation::AlreadyFunded));
            }
            if loan.is_cancelled {
                return Err(Error::state(loan_id, StateViolation::AlreadyCancelled));
            }

            loan.is_cancelled = true;
            let borrower = loan.borrower.clone();
            let collateral = loan.collateral_amount;

            state.release_escrow(collateral)?;
            state.events.append(
                loan_id,
                now,
                LoanEventKind::Cancelled {
                    borrower: borrower.clone(),
                },
            );

            Ok(Transition {
                effects: vec![Effect::Native {
                    from: self.contract.clone(),
                    to: borrower,
                    amount: collateral,
                }],
                outcome: (),
            })
        })?;

        tracing::info!(loan_id, borrower = %caller, "Loan cancelled");
        Ok(())
    }

    /// Take the collateral of a defaulted loan
    ///
    /// Only strictly after the due date, only by the lender. No tokens move:
    /// the collateral is the lender's only recourse. Returns the collateral
    /// paid out.
    pub fn claim(&self, loan_id: LoanId, caller: &AccountId) -> Result<Amount> {
        let collateral = self.transact(Operation::Claim, Some(loan_id), |state, now| {
            let loan = state.loan_mut(loan_id)?;
            authorize(loan_id, loan, caller, Role::Lender)?;
            require_active(loan_id, loan)?;
            if now <= loan.due_date {
                return Err(Error::state(loan_id, StateViolation::NotYetDue));
            }

            loan.is_closed = true;
            let collateral = loan.collateral_amount;

            state.release_escrow(collateral)?;
            state.events.append(
                loan_id,
                now,
                LoanEventKind::CollateralClaimed {
                    lender: caller.clone(),
                },
            );

            Ok(Transition {
                effects: vec![Effect::Native {
                    from: self.contract.clone(),
                    to: caller.clone(),
                    amount: collateral,
                }],
                outcome: collateral,
            })
        })?;

        tracing::info!(loan_id, lender = %caller, collateral = %collateral, "Collateral claimed");
        Ok(collateral)
    }

    // Queries

    /// Loan record by ID
    pub fn loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.state.lock().loan(loan_id).cloned()
    }

    /// Lifecycle status of a loan
    pub fn status(&self, loan_id: LoanId) -> Result<LoanStatus> {
        self.state.lock().loan(loan_id).map(Loan::status)
    }

    /// ID the next request will receive
    pub fn next_loan_id(&self) -> LoanId {
        self.state.lock().next_loan_id()
    }

    /// Loans posted by `borrower`
    pub fn loans_by_borrower(&self, borrower: &AccountId) -> Vec<(LoanId, Loan)> {
        self.state.lock().select(|loan| &loan.borrower == borrower)
    }

    /// Loans funded by `lender`
    pub fn loans_by_lender(&self, lender: &AccountId) -> Vec<(LoanId, Loan)> {
        self.state
            .lock()
            .select(|loan| loan.lender.as_ref() == Some(lender))
    }

    /// Requests still waiting for a lender
    pub fn open_requests(&self) -> Vec<(LoanId, Loan)> {
        self.state
            .lock()
            .select(|loan| loan.status() == LoanStatus::Requested)
    }

    /// Collateral currently held in escrow
    pub fn escrow_balance(&self) -> Amount {
        self.state.lock().escrow
    }

    /// Every log record, in order
    pub fn events(&self) -> Vec<LoanEvent> {
        self.state.lock().events.all().to_vec()
    }

    /// Log records of one loan
    pub fn events_for_loan(&self, loan_id: LoanId) -> Vec<LoanEvent> {
        self.state.lock().events.for_loan(loan_id).cloned().collect()
    }

    /// Log records indexed by `party`
    pub fn events_for_party(&self, party: &AccountId) -> Vec<LoanEvent> {
        self.state.lock().events.for_party(party).cloned().collect()
    }

    /// What an early repayment would cost right now
    pub fn quote_early_repayment(&self, loan_id: LoanId) -> Result<EarlyRepaymentQuote> {
        let now = self.clock.now();
        let state = self.state.lock();
        let loan = state.loan(loan_id)?;
        require_active(loan_id, loan)?;
        if now >= loan.due_date {
            return Err(Error::state(loan_id, StateViolation::PastDue));
        }
        EarlyRepaymentQuote::compute(loan, now)
    }

    /// Copy of the full ledger state
    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.lock();
        LedgerSnapshot {
            contract_address: self.contract.clone(),
            token_address: self.token.address().clone(),
            loans: state.loans.clone(),
            escrow: state.escrow,
            events: state.events.all().to_vec(),
        }
    }

    /// Verify the hash chain of the event log
    pub fn verify_event_chain(&self) -> Result<()> {
        self.state.lock().events.verify_chain()
    }

    /// Verify the record invariants, escrow conservation and the event chain
    pub fn check_invariants(&self) -> Result<()> {
        let state = self.state.lock();
        let mut locked: Amount = 0;

        for (index, loan) in state.loans.iter().enumerate() {
            let violation = |what: &str| {
                Err(Error::InvariantViolation(format!("loan {}: {}", index, what)))
            };

            if loan.is_funded && loan.is_cancelled {
                return violation("both funded and cancelled");
            }
            if loan.is_closed && !loan.is_funded {
                return violation("closed without being funded");
            }
            if (loan.due_date != 0) != loan.is_funded {
                return violation("due date set iff funded does not hold");
            }
            if loan.lender.is_some() != loan.is_funded {
                return violation("lender set iff funded does not hold");
            }
            if rebate::repayment_amount(loan.principal, loan.interest)? != loan.repayment_amount {
                return violation("repayment amount diverges from principal + interest");
            }
            if !loan.collateral_released() {
                locked = locked
                    .checked_add(loan.collateral_amount)
                    .ok_or(Error::ArithmeticOverflow("locked collateral"))?;
            }
        }

        if locked != state.escrow {
            return Err(Error::InvariantViolation(format!(
                "escrow {} does not match locked collateral {}",
                state.escrow, locked
            )));
        }

        state.events.verify_chain()
    }

    // Transaction machinery

    fn transact<T>(
        &self,
        operation: Operation,
        loan_id: Option<LoanId>,
        plan: impl FnOnce(&mut LedgerState, Timestamp) -> Result<Transition<T>>,
    ) -> Result<T> {
        let result = self.execute(loan_id, plan);

        if let Err(err) = &result {
            tracing::warn!(
                operation = %operation,
                loan_id = ?loan_id,
                kind = %err.kind(),
                "Transition voided: {}",
                err
            );
        }

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(_) => metrics.record_commit(operation),
                Err(err) => metrics.record_rejection(operation, err.kind()),
            }
            metrics.set_escrow(self.state.lock().escrow);
        }

        result
    }

    fn execute<T>(
        &self,
        loan_id: Option<LoanId>,
        plan: impl FnOnce(&mut LedgerState, Timestamp) -> Result<Transition<T>>,
    ) -> Result<T> {
        let _entered = self.guard.enter()?;
        let now = self.clock.now();

        let token_savepoint = self.token.savepoint();
        let native_savepoint = self.native.savepoint();

        // Check and commit locally; the lock is released before any transfer
        let (checkpoint, planned) = {
            let mut state = self.state.lock();
            let checkpoint = state.checkpoint(loan_id);
            let planned = plan(&mut state, now);
            if planned.is_err() {
                state.restore(&checkpoint);
            }
            (checkpoint, planned)
        };

        let transition = match planned {
            Ok(transition) => transition,
            Err(err) => {
                self.token.rollback_to(token_savepoint);
                self.native.rollback_to(native_savepoint);
                return Err(err);
            }
        };

        for effect in &transition.effects {
            if let Err(err) = self.apply(effect) {
                self.state.lock().restore(&checkpoint);
                self.token.rollback_to(token_savepoint);
                self.native.rollback_to(native_savepoint);
                return Err(err);
            }
        }

        self.token.release(token_savepoint);
        self.native.release(native_savepoint);
        Ok(transition.outcome)
    }

    fn apply(&self, effect: &Effect) -> Result<()> {
        tracing::debug!(?effect, "Issuing transfer");
        match effect {
            Effect::Token {
                payer,
                payee,
                amount,
            } => {
                if self.token.transfer_from(&self.contract, payer, payee, *amount) {
                    return Ok(());
                }
                Err(Error::TransferFailed {
                    kind: TransferKind::Token,
                    from: payer.clone(),
                    to: payee.clone(),
                    amount: *amount,
                })
            }
            Effect::Native { from, to, amount } => {
                if self.native.transfer(from, to, *amount) {
                    return Ok(());
                }
                Err(Error::TransferFailed {
                    kind: TransferKind::Native,
                    from: from.clone(),
                    to: to.clone(),
                    amount: *amount,
                })
            }
        }
    }
}

impl std::fmt::Debug for LoanLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LoanLedger")
            .field("contract", &self.contract)
            .field("token", self.token.address())
            .field("loans", &state.loans.len())
            .field("escrow", &state.escrow)
            .field("events", &state.events.len())
            .finish()
    }
}
