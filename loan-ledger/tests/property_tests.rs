//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Escrow conservation: escrow == Σ(unreleased collateral)
//! - Value conservation: no token or native unit is created or destroyed
//! - All-or-nothing: a rejected transition leaves the ledger unchanged
//! - Rebate bounds: 0 <= rebate <= interest, shrinking as time passes

use loan_ledger::{
    rebate::early_repayment_rebate, AccountId, Amount, Config, InMemoryNativeBank,
    InMemoryTokenLedger, LoanLedger, LoanStatus, ManualClock, StateViolation,
};
use proptest::prelude::*;
use std::sync::Arc;

const PARTIES: [&str; 3] = ["alice", "bob", "carol"];
const NATIVE_PER_PARTY: Amount = 50;
const TOKENS_PER_PARTY: Amount = 1_000;

/// One step of a random lifecycle
#[derive(Debug, Clone)]
enum Step {
    Request {
        party: usize,
        collateral: Amount,
        principal: Amount,
        interest: Amount,
        duration: u64,
    },
    Fund { loan: u64, party: usize },
    Repay { loan: u64, party: usize },
    EarlyRepay { loan: u64, party: usize },
    Cancel { loan: u64, party: usize },
    Claim { loan: u64, party: usize },
    Advance { seconds: u64 },
}

/// Strategy for generating party indices
fn party_strategy() -> impl Strategy<Value = usize> {
    0..PARTIES.len()
}

/// Strategy for generating loan IDs (some never issued)
fn loan_strategy() -> impl Strategy<Value = u64> {
    0u64..6
}

/// Strategy for generating lifecycle steps
fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (party_strategy(), 1u128..10, 1u128..200, 0u128..50, 1u64..500).prop_map(
            |(party, collateral, principal, interest, duration)| Step::Request {
                party,
                collateral,
                principal,
                interest,
                duration,
            }
        ),
        (loan_strategy(), party_strategy()).prop_map(|(loan, party)| Step::Fund { loan, party }),
        (loan_strategy(), party_strategy()).prop_map(|(loan, party)| Step::Repay { loan, party }),
        (loan_strategy(), party_strategy())
            .prop_map(|(loan, party)| Step::EarlyRepay { loan, party }),
        (loan_strategy(), party_strategy()).prop_map(|(loan, party)| Step::Cancel { loan, party }),
        (loan_strategy(), party_strategy()).prop_map(|(loan, party)| Step::Claim { loan, party }),
        (0u64..300).prop_map(|seconds| Step::Advance { seconds }),
    ]
}

struct Harness {
    ledger: LoanLedger,
    token: Arc<InMemoryTokenLedger>,
    native: Arc<InMemoryNativeBank>,
    clock: Arc<ManualClock>,
    parties: Vec<AccountId>,
}

fn create_harness() -> Harness {
    let config = Config::default();
    let token = Arc::new(InMemoryTokenLedger::new(config.token_address.clone()));
    let native = Arc::new(InMemoryNativeBank::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let ledger = LoanLedger::new(&config, token.clone(), native.clone(), clock.clone()).unwrap();

    let parties: Vec<_> = PARTIES.iter().map(|p| AccountId::new(*p)).collect();
    for party in &parties {
        native.deposit(party, NATIVE_PER_PARTY);
        token.mint(party, TOKENS_PER_PARTY);
        token.approve(party, &config.contract_address, Amount::MAX);
    }

    Harness {
        ledger,
        token,
        native,
        clock,
        parties,
    }
}

impl Harness {
    fn native_total(&self) -> Amount {
        self.parties
            .iter()
            .chain(std::iter::once(self.ledger.contract_address()))
            .map(|a| self.native.balance_of(a))
            .sum()
    }

    fn token_total(&self) -> Amount {
        self.parties.iter().map(|a| self.token.balance_of(a)).sum()
    }

    /// Apply a step; `Ok(true)` if a transition committed
    fn apply(&self, step: &Step) -> Result<bool, loan_ledger::Error> {
        let who = |party: usize| &self.parties[party];
        match step {
            Step::Request {
                party,
                collateral,
                principal,
                interest,
                duration,
            } => self
                .ledger
                .request(who(*party), *collateral, *principal, *interest, *duration)
                .map(|_| true),
            Step::Fund { loan, party } => self.ledger.fund(*loan, who(*party)).map(|_| true),
            Step::Repay { loan, party } => self.ledger.repay(*loan, who(*party)).map(|_| true),
            Step::EarlyRepay { loan, party } => {
                self.ledger.early_repay(*loan, who(*party)).map(|_| true)
            }
            Step::Cancel { loan, party } => self.ledger.cancel(*loan, who(*party)).map(|_| true),
            Step::Claim { loan, party } => self.ledger.claim(*loan, who(*party)).map(|_| true),
            Step::Advance { seconds } => {
                self.clock.advance(*seconds);
                Ok(false)
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: random lifecycles never break the ledger invariants
    #[test]
    fn prop_invariants_hold_across_lifecycles(
        steps in prop::collection::vec(step_strategy(), 1..40)
    ) {
        let harness = create_harness();
        let native_total = harness.native_total();
        let token_total = harness.token_total();

        for step in &steps {
            let before = harness.ledger.snapshot();
            let result = harness.apply(step);

            if result.is_err() {
                // Rejected transitions leave no trace
                prop_assert_eq!(harness.ledger.snapshot(), before);
            }

            prop_assert!(harness.ledger.check_invariants().is_ok());
            prop_assert_eq!(harness.native_total(), native_total);
            prop_assert_eq!(harness.token_total(), token_total);
            prop_assert_eq!(
                harness.native.balance_of(harness.ledger.contract_address()),
                harness.ledger.escrow_balance()
            );
        }
    }

    /// Property: once cancelled, a loan can never be funded and vice versa
    #[test]
    fn prop_cancel_and_fund_exclusive(cancel_first in any::<bool>(), gap in 0u64..1_000) {
        let harness = create_harness();
        let borrower = &harness.parties[0];
        let lender = &harness.parties[1];
        let loan_id = harness.ledger.request(borrower, 1, 100, 10, 3600).unwrap();

        if cancel_first {
            harness.ledger.cancel(loan_id, borrower).unwrap();
            harness.clock.advance(gap);
            let err = harness.ledger.fund(loan_id, lender).unwrap_err();
            prop_assert_eq!(err.state_violation(), Some(StateViolation::Cancelled));
            prop_assert_eq!(harness.ledger.status(loan_id).unwrap(), LoanStatus::Cancelled);
        } else {
            harness.ledger.fund(loan_id, lender).unwrap();
            harness.clock.advance(gap);
            let err = harness.ledger.cancel(loan_id, borrower).unwrap_err();
            prop_assert_eq!(err.state_violation(), Some(StateViolation::AlreadyFunded));
            prop_assert_eq!(harness.ledger.status(loan_id).unwrap(), LoanStatus::Funded);
        }
    }

    /// Property: the rebate is bounded by the interest and never grows with time
    #[test]
    fn prop_rebate_bounded_and_monotonic(
        interest in 0u128..1_000_000,
        duration in 1u64..100_000,
        a in 0u64..100_000,
        b in 0u64..100_000,
    ) {
        let funded_at = 10_000u64;
        let due_date = funded_at + duration;
        let (earlier, later) = (a.min(b) % duration, a.max(b) % duration);
        let (earlier, later) = (earlier.min(later), earlier.max(later));

        let r1 = early_repayment_rebate(interest, duration, due_date, funded_at + earlier).unwrap();
        let r2 = early_repayment_rebate(interest, duration, due_date, funded_at + later).unwrap();

        prop_assert!(r1 <= interest);
        prop_assert!(r2 <= r1);
        prop_assert_eq!(
            early_repayment_rebate(interest, duration, due_date, funded_at).unwrap(),
            interest
        );
        prop_assert_eq!(early_repayment_rebate(interest, duration, due_date, due_date).unwrap(), 0);
    }

    /// Property: early repayment pays exactly principal + interest - rebate
    #[test]
    fn prop_early_repayment_amount(
        principal in 1u128..500,
        interest in 0u128..100,
        duration in 1u64..10_000,
        elapsed in 0u64..10_000,
    ) {
        let elapsed = elapsed % duration;
        let harness = create_harness();
        let borrower = &harness.parties[0];
        let lender = &harness.parties[1];

        let loan_id = harness.ledger.request(borrower, 1, principal, interest, duration).unwrap();
        harness.ledger.fund(loan_id, lender).unwrap();
        let lender_before = harness.token.balance_of(lender);

        harness.clock.advance(elapsed);
        let quote = harness.ledger.early_repay(loan_id, borrower).unwrap();

        let expected_rebate = interest * u128::from(duration - elapsed) / u128::from(duration);
        prop_assert_eq!(quote.rebate, expected_rebate);
        prop_assert_eq!(quote.amount_due, principal + interest - expected_rebate);
        prop_assert_eq!(harness.token.balance_of(lender), lender_before + quote.amount_due);
        prop_assert_eq!(harness.native.balance_of(borrower), NATIVE_PER_PARTY);
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use loan_ledger::{spawn_loan_actor, ErrorKind, SnapshotStore};

    #[tokio::test]
    async fn test_full_loan_lifecycle_through_actor() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = temp_dir.path().to_path_buf();
        config.storage.persist_on_commit = true;

        let token = Arc::new(InMemoryTokenLedger::new(config.token_address.clone()));
        let native = Arc::new(InMemoryNativeBank::new());
        let clock = Arc::new(ManualClock::new(0));
        let ledger = Arc::new(
            LoanLedger::new(&config, token.clone(), native.clone(), clock.clone()).unwrap(),
        );
        let store = SnapshotStore::open(&config).unwrap();
        let handle = spawn_loan_actor(ledger.clone(), Some(store.clone()), &config);

        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");
        native.deposit(&alice, 3);
        token.mint(&bob, 500);
        token.approve(&bob, &config.contract_address, 500);
        token.approve(&alice, &config.contract_address, 500);

        // 1. Default path
        let defaulted = handle.request(alice.clone(), 1, 100, 10, 3600).await.unwrap();
        handle.fund(defaulted, bob.clone()).await.unwrap();

        // 2. Cancelled request
        let withdrawn = handle.request(alice.clone(), 2, 50, 5, 60).await.unwrap();
        handle.cancel(withdrawn, alice.clone()).await.unwrap();
        let err = handle.fund(withdrawn, bob.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionViolation);

        clock.set(3600);
        assert!(handle.claim(defaulted, bob.clone()).await.is_err());
        clock.set(3601);
        assert_eq!(handle.claim(defaulted, bob.clone()).await.unwrap(), 1);

        assert_eq!(native.balance_of(&alice), 2);
        assert_eq!(native.balance_of(&bob), 1);
        assert_eq!(token.balance_of(&alice), 100);

        let alice_events: Vec<_> = handle
            .get_party_events(alice.clone())
            .await
            .unwrap()
            .iter()
            .map(|e| e.kind.name())
            .collect();
        assert_eq!(alice_events, vec!["requested", "requested", "cancelled"]);

        handle.shutdown().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Restart from the persisted snapshot
        let snapshot = store.load().unwrap().unwrap();
        let restored =
            LoanLedger::from_snapshot(&config, snapshot, token, native, clock).unwrap();
        assert_eq!(restored.next_loan_id(), 2);
        assert_eq!(restored.escrow_balance(), 0);
        assert_eq!(restored.status(defaulted).unwrap(), LoanStatus::Closed);
        restored.verify_event_chain().unwrap();
    }
}
