//! Loan arithmetic
//!
//! Every combination is checked. The rebate is proportional to the unused
//! part of the repayment window and truncates toward zero, so it never
//! exceeds the exact proportional value.

use crate::{
    types::{Amount, Loan, Timestamp},
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// `principal + interest`
pub fn repayment_amount(principal: Amount, interest: Amount) -> Result<Amount> {
    principal
        .checked_add(interest)
        .ok_or(Error::ArithmeticOverflow("repayment amount"))
}

/// `funded_at + duration`
pub fn due_date(funded_at: Timestamp, duration: u64) -> Result<Timestamp> {
    funded_at
        .checked_add(duration)
        .ok_or(Error::ArithmeticOverflow("due date"))
}

/// `floor(interest * (due_date - now) / duration)`
///
/// `now` must lie inside the repayment window: not after `due_date` and not
/// before `due_date - duration`.
pub fn early_repayment_rebate(
    interest: Amount,
    duration: u64,
    due_date: Timestamp,
    now: Timestamp,
) -> Result<Amount> {
    if duration == 0 {
        return Err(Error::InvalidArgument("duration must be positive".to_string()));
    }

    let time_remaining = due_date
        .checked_sub(now)
        .ok_or(Error::ArithmeticOverflow("time remaining"))?;
    if time_remaining > duration {
        return Err(Error::InvalidArgument(format!(
            "time {} precedes the repayment window ending at {}",
            now, due_date
        )));
    }

    // interest = q * duration + m, so the floor splits into two terms that
    // are bounded by `interest` and `duration^2` respectively
    let (duration, time_remaining) = (Amount::from(duration), Amount::from(time_remaining));
    let (q, m) = (interest / duration, interest % duration);
    let rebate = q * time_remaining + m * time_remaining / duration;

    debug_assert!(rebate <= interest);
    Ok(rebate)
}

/// Rebate and amount due for repaying a funded loan at `now`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyRepaymentQuote {
    /// Interest forgiven
    pub rebate: Amount,
    /// Tokens owed to the lender: `repayment_amount - rebate`
    pub amount_due: Amount,
    /// Seconds left until the due date
    pub time_remaining: u64,
}

impl EarlyRepaymentQuote {
    /// Quote for `loan` at `now`
    ///
    /// Lifecycle checks (active, not past due) are the caller's job.
    pub fn compute(loan: &Loan, now: Timestamp) -> Result<Self> {
        let rebate = early_repayment_rebate(loan.interest, loan.duration, loan.due_date, now)?;
        let amount_due = loan
            .repayment_amount
            .checked_sub(rebate)
            .ok_or(Error::ArithmeticOverflow("reduced repayment"))?;

        Ok(Self {
            rebate,
            amount_due,
            time_remaining: loan.due_date.saturating_sub(now),
        })
    }
}
