//! Loan Ledger
//!
//! Two-party collateralized lending: a borrower escrows native currency as
//! collateral and requests a token loan, a lender funds it, and the loan ends
//! in repayment, early repayment with an interest rebate, cancellation, or a
//! collateral claim after default.
//!
//! # Architecture
//!
//! - **State Machine**: [`LoanLedger`] owns the loan table and escrow balance
//! - **Single Entry**: A ledger-wide reentrancy guard rejects nested transitions
//! - **All-or-Nothing**: Local commit first, external transfers second, full
//!   rollback if any transfer fails
//! - **Event Log**: Hash-chained records queryable by loan and by party
//! - **Single Writer**: Optional Tokio actor serializing transitions and
//!   persisting snapshots

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]
//!
//! # Invariants
//!
//! - Escrow conservation: escrow == Σ(collateral of loans not yet released)
//! - Funded and cancelled are mutually exclusive
//! - `due_date` is set exactly once, at funding
//! - A voided transition leaves no state change and no log record

pub mod actor;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod guard;
pub mod journal;
pub mod ledger;
pub mod metrics;
pub mod native;
pub mod rebate;
pub mod storage;
pub mod token;
pub mod types;

// Re-exports
pub use actor::{spawn_loan_actor, LoanHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, ErrorKind, Result, StateViolation, TransferKind};
pub use events::{LoanEvent, LoanEventKind};
pub use ledger::{LedgerSnapshot, LoanLedger};
pub use metrics::Metrics;
pub use native::{InMemoryNativeBank, NativeCurrency};
pub use rebate::EarlyRepaymentQuote;
pub use storage::SnapshotStore;
pub use token::{InMemoryTokenLedger, TokenLedger};
pub use types::{AccountId, Amount, Loan, LoanId, LoanStatus, Role, Timestamp};
