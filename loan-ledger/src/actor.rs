//! Single-writer actor in front of the ledger
//!
//! Transitions submitted through a [`LoanHandle`] are executed one at a time
//! by a Tokio task, in mailbox order. When `persist_on_commit` is set, the
//! actor writes a snapshot after every committed transition.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                LoanHandle (Clone)                     │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LoanActor (Single Task)                 │
//! │      LoanLedger::{request, fund, repay, ...}          │
//! │                       │                               │
//! │                       ▼                               │
//! │              SnapshotStore::save()                    │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{
    events::LoanEvent,
    ledger::LoanLedger,
    rebate::EarlyRepaymentQuote,
    storage::SnapshotStore,
    types::{AccountId, Amount, Loan, LoanId, Timestamp},
    Config, Error, Result,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the loan actor
#[derive(Debug)]
pub enum LoanMessage {
    /// Request a loan
    Request {
        /// Account escrowing the collateral
        borrower: AccountId,
        /// Native currency to escrow
        collateral_amount: Amount,
        /// Tokens the lender pays out
        principal: Amount,
        /// Flat interest owed on top of the principal
        interest: Amount,
        /// Seconds from funding to the due date
        duration: u64,
        /// Reply channel
        response: oneshot::Sender<Result<LoanId>>,
    },

    /// Fund a request
    Fund {
        /// Target loan
        loan_id: LoanId,
        /// Account paying the principal
        lender: AccountId,
        /// Reply channel
        response: oneshot::Sender<Result<Timestamp>>,
    },

    /// Repay in full
    Repay {
        /// Target loan
        loan_id: LoanId,
        /// Account invoking the transition
        caller: AccountId,
        /// Reply channel
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Repay before the due date
    EarlyRepay {
        /// Target loan
        loan_id: LoanId,
        /// Account invoking the transition
        caller: AccountId,
        /// Reply channel
        response: oneshot::Sender<Result<EarlyRepaymentQuote>>,
    },

    /// Cancel an unfunded request
    Cancel {
        /// Target loan
        loan_id: LoanId,
        /// Account invoking the transition
        caller: AccountId,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Claim defaulted collateral
    Claim {
        /// Target loan
        loan_id: LoanId,
        /// Account invoking the transition
        caller: AccountId,
        /// Reply channel
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Get a loan record
    GetLoan {
        /// Target loan
        loan_id: LoanId,
        /// Reply channel
        response: oneshot::Sender<Result<Loan>>,
    },

    /// Get the events of one loan
    GetLoanEvents {
        /// Target loan
        loan_id: LoanId,
        /// Reply channel
        response: oneshot::Sender<Result<Vec<LoanEvent>>>,
    },

    /// Get the events indexed by one party
    GetPartyEvents {
        /// Borrower or lender to look up
        party: AccountId,
        /// Reply channel
        response: oneshot::Sender<Result<Vec<LoanEvent>>>,
    },

    /// Write a snapshot now
    Persist {
        /// Reply channel for the write result
        response: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the write path of one ledger
#[derive(Debug)]
pub struct LoanActor {
    ledger: Arc<LoanLedger>,

    /// Snapshot target, if persistence is configured
    store: Option<SnapshotStore>,

    /// Snapshot after each committed transition
    persist_on_commit: bool,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LoanMessage>,
}

impl LoanActor {
    /// Create new actor
    pub fn new(
        ledger: Arc<LoanLedger>,
        store: Option<SnapshotStore>,
        persist_on_commit: bool,
        mailbox: mpsc::Receiver<LoanMessage>,
    ) -> Self {
        Self {
            ledger,
            store,
            persist_on_commit,
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if let LoanMessage::Shutdown = msg {
                if let Err(e) = self.persist() {
                    tracing::error!("Error writing final snapshot: {}", e);
                }
                break;
            }
            self.handle_message(msg);
        }
        tracing::info!("Loan actor stopped");
    }

    fn handle_message(&self, msg: LoanMessage) {
        match msg {
            LoanMessage::Request {
                borrower,
                collateral_amount,
                principal,
                interest,
                duration,
                response,
            } => {
                let result =
                    self.ledger
                        .request(&borrower, collateral_amount, principal, interest, duration);
                self.reply(response, result);
            }

            LoanMessage::Fund {
                loan_id,
                lender,
                response,
            } => {
                let result = self.ledger.fund(loan_id, &lender);
                self.reply(response, result);
            }

            LoanMessage::Repay {
                loan_id,
                caller,
                response,
            } => {
                let result = self.ledger.repay(loan_id, &caller);
                self.reply(response, result);
            }

            LoanMessage::EarlyRepay {
                loan_id,
                caller,
                response,
            } => {
                let result = self.ledger.early_repay(loan_id, &caller);
                self.reply(response, result);
            }

            LoanMessage::Cancel {
                loan_id,
                caller,
                response,
            } => {
                let result = self.ledger.cancel(loan_id, &caller);
                self.reply(response, result);
            }

            LoanMessage::Claim {
                loan_id,
                caller,
                response,
            } => {
                let result = self.ledger.claim(loan_id, &caller);
                self.reply(response, result);
            }

            LoanMessage::GetLoan { loan_id, response } => {
                let _ = response.send(self.ledger.loan(loan_id));
            }

            LoanMessage::GetLoanEvents { loan_id, response } => {
                let result = self.ledger.loan(loan_id).map(|_| self.ledger.events_for_loan(loan_id));
                let _ = response.send(result);
            }

            LoanMessage::GetPartyEvents { party, response } => {
                let _ = response.send(Ok(self.ledger.events_for_party(&party)));
            }

            LoanMessage::Persist { response } => {
                let _ = response.send(self.persist());
            }

            LoanMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    /// Send a transition result, snapshotting first if it committed
    fn reply<T>(&self, response: oneshot::Sender<Result<T>>, result: Result<T>) {
        if result.is_ok() && self.persist_on_commit {
            // Already committed, so a failed write is logged and not returned
            if let Err(e) = self.persist() {
                tracing::error!("Error writing snapshot after commit: {}", e);
            }
        }
        let _ = response.send(result);
    }

    fn persist(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.save(&self.ledger.snapshot()),
            None => Ok(()),
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LoanHandle {
    sender: mpsc::Sender<LoanMessage>,
}

impl LoanHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LoanMessage>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LoanMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Request a loan
    pub async fn request(
        &self,
        borrower: AccountId,
        collateral_amount: Amount,
        principal: Amount,
        interest: Amount,
        duration: u64,
    ) -> Result<LoanId> {
        self.call(|response| LoanMessage::Request {
            borrower,
            collateral_amount,
            principal,
            interest,
            duration,
            response,
        })
        .await
    }

    /// Fund a request
    pub async fn fund(&self, loan_id: LoanId, lender: AccountId) -> Result<Timestamp> {
        self.call(|response| LoanMessage::Fund {
            loan_id,
            lender,
            response,
        })
        .await
    }

    /// Repay in full
    pub async fn repay(&self, loan_id: LoanId, caller: AccountId) -> Result<Amount> {
        self.call(|response| LoanMessage::Repay {
            loan_id,
            caller,
            response,
        })
        .await
    }

    /// Repay before the due date
    pub async fn early_repay(
        &self,
        loan_id: LoanId,
        caller: AccountId,
    ) -> Result<EarlyRepaymentQuote> {
        self.call(|response| LoanMessage::EarlyRepay {
            loan_id,
            caller,
            response,
        })
        .await
    }

    /// Cancel an unfunded request
    pub async fn cancel(&self, loan_id: LoanId, caller: AccountId) -> Result<()> {
        self.call(|response| LoanMessage::Cancel {
            loan_id,
            caller,
            response,
        })
        .await
    }

    /// Claim defaulted collateral
    pub async fn claim(&self, loan_id: LoanId, caller: AccountId) -> Result<Amount> {
        self.call(|response| LoanMessage::Claim {
            loan_id,
            caller,
            response,
        })
        .await
    }

    /// Get a loan record
    pub async fn get_loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.call(|response| LoanMessage::GetLoan { loan_id, response })
            .await
    }

    /// Get the events of one loan
    pub async fn get_loan_events(&self, loan_id: LoanId) -> Result<Vec<LoanEvent>> {
        self.call(|response| LoanMessage::GetLoanEvents { loan_id, response })
            .await
    }

    /// Get the events indexed by one party
    pub async fn get_party_events(&self, party: AccountId) -> Result<Vec<LoanEvent>> {
        self.call(|response| LoanMessage::GetPartyEvents { party, response })
            .await
    }

    /// Write a snapshot now
    pub async fn persist(&self) -> Result<()> {
        self.call(|response| LoanMessage::Persist { response }).await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LoanMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the loan actor
pub fn spawn_loan_actor(
    ledger: Arc<LoanLedger>,
    store: Option<SnapshotStore>,
    config: &Config,
) -> LoanHandle {
    let (tx, rx) = mpsc::channel(config.actor.mailbox_capacity); // Bounded channel for backpressure
    let actor = LoanActor::new(ledger, store, config.storage.persist_on_commit, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LoanHandle::new(tx)
}
