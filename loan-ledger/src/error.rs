//! Error types for the loan ledger
//!
//! Every transition failure maps onto one of five [`ErrorKind`] classes so
//! callers can branch on the reason (for example retrying a rejected early
//! repayment through the full repayment path).

use crate::types::{AccountId, Amount, LoanId, Role};
use std::fmt;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// No record exists for the identifier
    #[error("Loan not found: {0}")]
    LoanNotFound(LoanId),

    /// Zero amount, zero duration, or similar bad input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Checked arithmetic overflowed or underflowed
    #[error("Arithmetic overflow computing {0}")]
    ArithmeticOverflow(&'static str),

    /// The loan is in the wrong lifecycle state for the transition
    #[error("Loan {loan_id}: {reason}")]
    InvalidState {
        /// Loan the transition targeted
        loan_id: LoanId,
        /// Which precondition failed
        reason: StateViolation,
    },

    /// Caller is not the party the transition requires
    #[error("Unauthorized: {caller} is not the {required} of loan {loan_id}")]
    Unauthorized {
        /// Loan the transition targeted
        loan_id: LoanId,
        /// Identity that attempted the call
        caller: AccountId,
        /// Party the transition is restricted to
        required: Role,
    },

    /// A transition was invoked while another one was in flight
    #[error("Reentrant call rejected: another transition is in progress")]
    ReentrantCall,

    /// Token ledger or native-currency transfer reported failure
    #[error("{kind} transfer of {amount} from {from} to {to} failed")]
    TransferFailed {
        /// Which collaborator failed
        kind: TransferKind,
        /// Paying account
        from: AccountId,
        /// Receiving account
        to: AccountId,
        /// Amount that could not be moved
        amount: Amount,
    },

    /// Internal consistency check failed
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Snapshot storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classify the error for callers that branch on the failure reason
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::LoanNotFound(_) => ErrorKind::NotFound,
            Error::InvalidArgument(_) | Error::ArithmeticOverflow(_) => ErrorKind::InvalidArgument,
            Error::InvalidState { .. } | Error::ReentrantCall => ErrorKind::PreconditionViolation,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::TransferFailed { .. } => ErrorKind::ExternalTransferFailure,
            Error::InvariantViolation(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Concurrency(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// Lifecycle reason, if this is a precondition failure on a loan
    pub fn state_violation(&self) -> Option<StateViolation> {
        match self {
            Error::InvalidState { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub(crate) fn state(loan_id: LoanId, reason: StateViolation) -> Self {
        Error::InvalidState { loan_id, reason }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

/// Coarse failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Identifier has no record
    NotFound,
    /// Bad amount or duration
    InvalidArgument,
    /// Wrong lifecycle state, or a transition already in flight
    PreconditionViolation,
    /// Caller is not the required party
    Unauthorized,
    /// Token ledger or native payout failed
    ExternalTransferFailure,
    /// Storage, configuration and other ambient failures
    Internal,
}

impl ErrorKind {
    /// Stable label (used for metrics)
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::PreconditionViolation => "precondition_violation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::ExternalTransferFailure => "external_transfer_failure",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle precondition that a transition found unmet
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateViolation {
    /// Loan already has a lender
    #[error("loan is already funded")]
    AlreadyFunded,

    /// Loan was cancelled and can no longer be funded
    #[error("loan has been cancelled")]
    Cancelled,

    /// Loan was already cancelled
    #[error("loan is already cancelled")]
    AlreadyCancelled,

    /// Loan is not funded, or is already closed
    #[error("loan is not active")]
    NotActive,

    /// Due date has not fully elapsed
    #[error("loan is not yet past its due date")]
    NotYetDue,

    /// Early repayment attempted on or after the due date; use full repayment
    #[error("loan is at or past its due date, repay in full instead")]
    PastDue,
}

/// Which collaborator a failed transfer went through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Fungible token ledger `transfer_from`
    Token,
    /// Native-currency escrow or payout
    Native,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Token => f.write_str("Token"),
            TransferKind::Native => f.write_str("Native"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::LoanNotFound(3).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::ArithmeticOverflow("due date").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(Error::ReentrantCall.kind(), ErrorKind::PreconditionViolation);
        assert_eq!(
            Error::state(0, StateViolation::PastDue).kind(),
            ErrorKind::PreconditionViolation
        );
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_state_violation_message() {
        let err = Error::state(7, StateViolation::PastDue);
        assert_eq!(err.state_violation(), Some(StateViolation::PastDue));
        assert!(err.to_string().contains("repay in full"));
        assert!(err.to_string().starts_with("Loan 7"));
    }

    #[test]
    fn test_unauthorized_message() {
        let err = Error::Unauthorized {
            loan_id: 1,
            caller: AccountId::new("mallory"),
            required: Role::Lender,
        };
        assert_eq!(
            err.to_string(),
            "Unauthorized: mallory is not the lender of loan 1"
        );
    }
}
