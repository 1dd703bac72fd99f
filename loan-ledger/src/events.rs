//! Append-only loan event log
//!
//! One record per committed transition. Each record carries the hash of its
//! predecessor, so the log forms a SHA-256 chain that
//! [`EventLog::verify_chain`] can check end to end.

use crate::{
    types::{AccountId, Amount, LoanId, Timestamp},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// What happened to a loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanEventKind {
    /// Collateral escrowed and loan requested
    Requested {
        /// Borrower
        borrower: AccountId,
        /// Requested principal
        principal: Amount,
        /// Agreed interest
        interest: Amount,
        /// Repayment window in seconds
        duration: u64,
    },
    /// Principal delivered
    Funded {
        /// Lender
        lender: AccountId,
    },
    /// Repaid in full
    Repaid {
        /// Borrower
        borrower: AccountId,
    },
    /// Repaid before the due date
    EarlyRepaid {
        /// Borrower
        borrower: AccountId,
        /// Interest forgiven
        rebate: Amount,
    },
    /// Withdrawn before funding
    Cancelled {
        /// Borrower
        borrower: AccountId,
    },
    /// Collateral taken after default
    CollateralClaimed {
        /// Lender
        lender: AccountId,
    },
}

impl LoanEventKind {
    /// Stable event name
    pub fn name(&self) -> &'static str {
        match self {
            LoanEventKind::Requested { .. } => "requested",
            LoanEventKind::Funded { .. } => "funded",
            LoanEventKind::Repaid { .. } => "repaid",
            LoanEventKind::EarlyRepaid { .. } => "early_repaid",
            LoanEventKind::Cancelled { .. } => "cancelled",
            LoanEventKind::CollateralClaimed { .. } => "collateral_claimed",
        }
    }

    /// Party the event is indexed by
    pub fn party(&self) -> &AccountId {
        match self {
            LoanEventKind::Requested { borrower, .. }
            | LoanEventKind::Repaid { borrower }
            | LoanEventKind::EarlyRepaid { borrower, .. }
            | LoanEventKind::Cancelled { borrower } => borrower,
            LoanEventKind::Funded { lender } | LoanEventKind::CollateralClaimed { lender } => {
                lender
            }
        }
    }

    fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self.name().as_bytes());
        let party = self.party().as_str().as_bytes();
        hasher.update((party.len() as u64).to_be_bytes());
        hasher.update(party);
        match self {
            LoanEventKind::Requested {
                principal,
                interest,
                duration,
                ..
            } => {
                hasher.update(principal.to_be_bytes());
                hasher.update(interest.to_be_bytes());
                hasher.update(duration.to_be_bytes());
            }
            LoanEventKind::EarlyRepaid { rebate, .. } => hasher.update(rebate.to_be_bytes()),
            _ => {}
        }
    }
}

/// Log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanEvent {
    /// Position in the log, from 0
    pub sequence: u64,

    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Loan the event belongs to
    pub loan_id: LoanId,

    /// Transition time
    pub timestamp: Timestamp,

    /// Payload
    pub kind: LoanEventKind,

    /// Hash of the previous record (zeros for the first)
    pub previous_hash: [u8; 32],

    /// Hash of this record
    pub hash: [u8; 32],
}

impl LoanEvent {
    /// Recompute this record's hash from its contents
    pub fn compute_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.sequence.to_be_bytes());
        hasher.update(self.event_id.as_bytes());
        hasher.update(self.loan_id.to_be_bytes());
        hasher.update(self.timestamp.to_be_bytes());
        self.kind.digest_into(&mut hasher);
        hasher.update(self.previous_hash);
        hasher.finalize().into()
    }
}

/// Ordered, hash-chained event records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<LoanEvent>,
}

impl EventLog {
    /// Rebuild from records (e.g. a snapshot); the chain is verified
    pub fn from_events(events: Vec<LoanEvent>) -> Result<Self> {
        let log = Self { events };
        log.verify_chain()?;
        Ok(log)
    }

    /// Append a record for `loan_id`
    pub fn append(&mut self, loan_id: LoanId, timestamp: Timestamp, kind: LoanEventKind) -> &LoanEvent {
        let mut event = LoanEvent {
            sequence: self.events.len() as u64,
            event_id: Uuid::now_v7(),
            loan_id,
            timestamp,
            kind,
            previous_hash: self.head_hash(),
            hash: [0u8; 32],
        };
        event.hash = event.compute_hash();
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    /// Hash of the newest record (zeros when empty)
    pub fn head_hash(&self) -> [u8; 32] {
        self.events.last().map(|e| e.hash).unwrap_or([0u8; 32])
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// No records yet
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop records appended after `len` (rollback of a voided transition)
    pub(crate) fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }

    /// All records in order
    pub fn all(&self) -> &[LoanEvent] {
        &self.events
    }

    /// Records of one loan, in order
    pub fn for_loan(&self, loan_id: LoanId) -> impl Iterator<Item = &LoanEvent> {
        self.events.iter().filter(move |e| e.loan_id == loan_id)
    }

    /// Records indexed by `party`, in order
    pub fn for_party<'a>(&'a self, party: &'a AccountId) -> impl Iterator<Item = &'a LoanEvent> {
        self.events.iter().filter(move |e| e.kind.party() == party)
    }

    /// Check sequence numbers and the hash chain
    pub fn verify_chain(&self) -> Result<()> {
        let mut previous = [0u8; 32];
        for (index, event) in self.events.iter().enumerate() {
            if event.sequence != index as u64 {
                return Err(Error::InvariantViolation(format!(
                    "event {} has sequence {}",
                    index, event.sequence
                )));
            }
            if event.previous_hash != previous || event.compute_hash() != event.hash {
                return Err(Error::InvariantViolation(format!(
                    "event chain broken at sequence {}",
                    index
                )));
            }
            previous = event.hash;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> EventLog {
        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");
        let mut log = EventLog::default();
        log.append(
            0,
            0,
            LoanEventKind::Requested {
                borrower: alice.clone(),
                principal: 100,
                interest: 10,
                duration: 3600,
            },
        );
        log.append(0, 5, LoanEventKind::Funded { lender: bob });
        log.append(
            0,
            1800,
            LoanEventKind::EarlyRepaid {
                borrower: alice,
                rebate: 5,
            },
        );
        log
    }

    #[test]
    fn test_chain_links() {
        let log = sample_log();
        assert_eq!(log.len(), 3);
        assert_eq!(log.all()[0].previous_hash, [0u8; 32]);
        assert_eq!(log.all()[1].previous_hash, log.all()[0].hash);
        assert_eq!(log.head_hash(), log.all()[2].hash);
        log.verify_chain().unwrap();
    }

    #[test]
    fn test_tampering_detected() {
        let log = sample_log();
        let mut events = log.all().to_vec();
        events[2].kind = LoanEventKind::EarlyRepaid {
            borrower: AccountId::new("alice"),
            rebate: 10,
        };
        assert!(matches!(
            EventLog::from_events(events),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_party_index() {
        let log = sample_log();
        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");

        let names: Vec<_> = log.for_party(&alice).map(|e| e.kind.name()).collect();
        assert_eq!(names, vec!["requested", "early_repaid"]);
        assert_eq!(log.for_party(&bob).count(), 1);
        assert_eq!(log.for_loan(0).count(), 3);
        assert_eq!(log.for_loan(1).count(), 0);
    }

    #[test]
    fn test_truncate_keeps_chain_valid() {
        let mut log = sample_log();
        log.truncate(1);
        log.verify_chain().unwrap();
        log.append(0, 9, LoanEventKind::Cancelled { borrower: AccountId::new("alice") });
        log.verify_chain().unwrap();
    }
}
