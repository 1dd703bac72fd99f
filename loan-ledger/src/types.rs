//! Core types for the loan ledger
//!
//! All monetary quantities are unsigned integers. There is no floating point
//! anywhere in the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequential loan identifier, assigned from 0 in issuance order
pub type LoanId = u64;

/// Token or native-currency amount in base units
pub type Amount = u128;

/// Seconds since the Unix epoch
pub type Timestamp = u64;

/// Identity of a caller, a collaborator, or the ledger itself
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Loan record
///
/// Never deleted: closed and cancelled records stay queryable as an audit
/// trail. Only the lender, the due date and the three lifecycle flags change
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Party that posted the collateral
    pub borrower: AccountId,

    /// Funding party, set once at funding
    pub lender: Option<AccountId>,

    /// Native currency escrowed at creation
    pub collateral_amount: Amount,

    /// Requested token amount
    pub principal: Amount,

    /// Agreed-upfront token interest
    pub interest: Amount,

    /// Cached `principal + interest`
    pub repayment_amount: Amount,

    /// Repayment window in seconds, starting at funding
    pub duration: u64,

    /// Zero until funded, then `funding_time + duration`
    pub due_date: Timestamp,

    /// Lender supplied the principal
    pub is_funded: bool,

    /// Repaid, early-repaid or claimed
    pub is_closed: bool,

    /// Withdrawn by the borrower before funding
    pub is_cancelled: bool,
}

impl Loan {
    /// Lifecycle status derived from the flags
    pub fn status(&self) -> LoanStatus {
        if self.is_cancelled {
            LoanStatus::Cancelled
        } else if self.is_closed {
            LoanStatus::Closed
        } else if self.is_funded {
            LoanStatus::Funded
        } else {
            LoanStatus::Requested
        }
    }

    /// Funded and not yet closed
    pub fn is_active(&self) -> bool {
        self.is_funded && !self.is_closed
    }

    /// Collateral has left escrow (to the borrower or the lender)
    pub fn collateral_released(&self) -> bool {
        self.is_closed || self.is_cancelled
    }

    /// Whether `who` holds `role` on this loan
    pub fn has_role(&self, who: &AccountId, role: Role) -> bool {
        match role {
            Role::Borrower => &self.borrower == who,
            Role::Lender => self.lender.as_ref() == Some(who),
        }
    }
}

/// Loan status (derived from flags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// Awaiting a lender
    Requested,
    /// Principal delivered, repayment window running
    Funded,
    /// Withdrawn before funding (terminal)
    Cancelled,
    /// Repaid, early-repaid or claimed (terminal)
    Closed,
}

impl LoanStatus {
    /// No further transition can move value
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Cancelled | LoanStatus::Closed)
    }
}

/// Party a transition is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Party that posted collateral
    Borrower,
    /// Party that funded the loan
    Lender,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Borrower => f.write_str("borrower"),
            Role::Lender => f.write_str("lender"),
        }
    }
}

/// Caller-facing transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Post collateral and request a loan
    Request,
    /// Supply the principal
    Fund,
    /// Repay principal plus full interest
    Repay,
    /// Repay before the due date with a rebate
    EarlyRepay,
    /// Withdraw an unfunded request
    Cancel,
    /// Take the collateral after default
    Claim,
}

impl Operation {
    /// Stable label (used for logs and metrics)
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Request => "request",
            Operation::Fund => "fund",
            Operation::Repay => "repay",
            Operation::EarlyRepay => "early_repay",
            Operation::Cancel => "cancel",
            Operation::Claim => "claim",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
