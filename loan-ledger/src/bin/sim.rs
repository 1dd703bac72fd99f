//! Loan ledger simulation binary
//!
//! Runs three reference lifecycles (early repayment, late repayment, default
//! and claim) against in-memory collaborators and a manual clock.
//!
//! Usage: `loan-ledger-sim [config.toml]` (falls back to `LOAN_LEDGER_*`
//! environment variables).

use anyhow::{ensure, Context, Result};
use loan_ledger::{
    spawn_loan_actor, AccountId, Config, InMemoryNativeBank, InMemoryTokenLedger, LoanHandle,
    LoanLedger, ManualClock, Metrics, SnapshotStore,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct World {
    handle: LoanHandle,
    ledger: Arc<LoanLedger>,
    token: Arc<InMemoryTokenLedger>,
    native: Arc<InMemoryNativeBank>,
    clock: Arc<ManualClock>,
    borrower: AccountId,
    lender: AccountId,
}

impl World {
    fn new(config: &Config, metrics: &Metrics) -> Result<Self> {
        let token = Arc::new(InMemoryTokenLedger::new(config.token_address.clone()));
        let native = Arc::new(InMemoryNativeBank::new());
        let clock = Arc::new(ManualClock::new(0));

        let ledger = Arc::new(
            LoanLedger::new(config, token.clone(), native.clone(), clock.clone())?
                .with_metrics(metrics.clone()),
        );
        let store = if config.storage.persist_on_commit {
            Some(SnapshotStore::open(config).context("opening snapshot store")?)
        } else {
            None
        };
        let handle = spawn_loan_actor(ledger.clone(), store, config);

        let borrower = AccountId::new("borrower");
        let lender = AccountId::new("lender");
        native.deposit(&borrower, 1);
        token.mint(&borrower, 10);
        token.approve(&borrower, &config.contract_address, 110);
        token.mint(&lender, 100);
        token.approve(&lender, &config.contract_address, 100);

        Ok(Self {
            handle,
            ledger,
            token,
            native,
            clock,
            borrower,
            lender,
        })
    }

    /// collateral 1, principal 100, interest 10, duration 3600, funded at t=0
    async fn open_loan(&self) -> Result<u64> {
        let loan_id = self
            .handle
            .request(self.borrower.clone(), 1, 100, 10, 3600)
            .await?;
        let due_date = self.handle.fund(loan_id, self.lender.clone()).await?;
        ensure!(due_date == 3600, "unexpected due date {}", due_date);
        ensure!(
            self.token.balance_of(&self.borrower) == 110,
            "principal not delivered"
        );
        Ok(loan_id)
    }

    async fn finish(self) -> Result<()> {
        self.ledger.check_invariants()?;
        self.handle.shutdown().await?;
        Ok(())
    }
}

async fn early_repayment(config: &Config, metrics: &Metrics) -> Result<()> {
    let world = World::new(config, metrics)?;
    let loan_id = world.open_loan().await?;

    world.clock.set(1800);
    let quote = world
        .handle
        .early_repay(loan_id, world.borrower.clone())
        .await?;
    ensure!(quote.rebate == 5, "rebate {} != 5", quote.rebate);
    ensure!(world.token.balance_of(&world.lender) == 105, "lender not paid 105");
    ensure!(world.native.balance_of(&world.borrower) == 1, "collateral not returned");

    tracing::info!(loan_id, rebate = %quote.rebate, paid = %quote.amount_due, "Early repayment scenario passed");
    world.finish().await
}

async fn late_repayment(config: &Config, metrics: &Metrics) -> Result<()> {
    let world = World::new(config, metrics)?;
    let loan_id = world.open_loan().await?;

    world.clock.set(4000);
    let paid = world.handle.repay(loan_id, world.borrower.clone()).await?;
    ensure!(paid == 110, "paid {} != 110", paid);
    ensure!(world.token.balance_of(&world.lender) == 110, "lender not paid 110");
    ensure!(world.native.balance_of(&world.borrower) == 1, "collateral not returned");

    tracing::info!(loan_id, paid = %paid, "Late repayment scenario passed");
    world.finish().await
}

async fn default_and_claim(config: &Config, metrics: &Metrics) -> Result<()> {
    let world = World::new(config, metrics)?;
    let loan_id = world.open_loan().await?;

    world.clock.set(3600);
    match world.handle.claim(loan_id, world.lender.clone()).await {
        Err(e) => tracing::info!(loan_id, "Claim at the due date rejected: {}", e),
        Ok(_) => anyhow::bail!("claim at the due date must be rejected"),
    }

    world.clock.set(3601);
    let collateral = world.handle.claim(loan_id, world.lender.clone()).await?;
    ensure!(collateral == 1, "claimed {} != 1", collateral);
    ensure!(world.native.balance_of(&world.lender) == 1, "lender did not get collateral");
    ensure!(world.native.balance_of(&world.borrower) == 0, "borrower kept collateral");

    let history = world.handle.get_loan_events(loan_id).await?;
    let names: Vec<_> = history.iter().map(|e| e.kind.name()).collect();
    tracing::info!(loan_id, events = ?names, "Default scenario passed");
    world.finish().await
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => Config::from_env().context("loading config from environment")?,
    };
    init_tracing(config.logging.json);

    tracing::info!(service = %config.service_name, "Starting loan ledger simulation");

    let metrics = Metrics::new().context("registering metrics")?;
    early_repayment(&config, &metrics).await?;
    late_repayment(&config, &metrics).await?;
    default_and_claim(&config, &metrics).await?;

    println!("{}", metrics.encode_text()?);

    tracing::info!("Simulation complete");
    Ok(())
}
