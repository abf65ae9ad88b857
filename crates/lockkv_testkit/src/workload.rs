//! Bank-transfer workload.
//!
//! Accounts `"0".."N-1"` start at a zero balance. Half of the operations
//! move one unit between two distinct accounts inside a transaction, the
//! other half read a single account outside any transaction. With a locker
//! that provides exclusion the total balance stays zero and the final
//! balances depend only on the seed.

use lockkv_core::{CoreError, Database, Key};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};

/// Key of the run counter record.
pub const COUNTER_KEY: &str = ".node1";

/// Result type for workload runs.
pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// Errors that can stop a workload run.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// A database operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Transfers need two distinct accounts.
    #[error("workload needs at least 2 accounts, got {0}")]
    TooFewAccounts(usize),

    /// A workload task was cancelled.
    #[error("workload task failed: {0}")]
    Task(#[from] JoinError),
}

/// An account record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Current balance. May go negative.
    #[serde(default)]
    pub balance: i64,
}

/// The run counter record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Number of workload runs against this database.
    #[serde(default)]
    pub counter: u64,
}

/// Workload parameters.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Number of accounts.
    pub accounts: usize,
    /// Number of operations, split evenly between transfers and reads.
    pub operations: usize,
    /// Seed for choosing accounts.
    pub seed: u64,
    /// Units moved by each transfer.
    pub amount: i64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            accounts: 100,
            operations: 1_000,
            seed: 1,
            amount: 1,
        }
    }
}

impl WorkloadConfig {
    /// Creates a configuration with `accounts` accounts and `operations`
    /// operations.
    #[must_use]
    pub fn new(accounts: usize, operations: usize) -> Self {
        Self {
            accounts,
            operations,
            ..Self::default()
        }
    }

    /// Sets the seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Returns the transfers and reads the run performs, in spawn order.
    pub fn plan(&self) -> Vec<Step> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut plan = Vec::with_capacity(self.operations / 2);
        if self.accounts < 2 {
            return plan;
        }

        for _ in 0..self.operations / 2 {
            let from = rng.gen_range(0..self.accounts);
            let mut to = rng.gen_range(0..self.accounts);
            let read = rng.gen_range(0..self.accounts);
            while to == from {
                to = rng.gen_range(0..self.accounts);
            }
            plan.push(Step { from, to, read });
        }
        plan
    }
}

/// One transfer and one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Account debited.
    pub from: usize,
    /// Account credited.
    pub to: usize,
    /// Account read concurrently.
    pub read: usize,
}

/// Outcome of a workload run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    /// Number of accounts.
    pub accounts: usize,
    /// Operations performed.
    pub operations: usize,
    /// Time spent on transfers and reads.
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Total balance before any transfer.
    pub initial_balance: i64,
    /// Final balance of each account.
    pub balances: Vec<i64>,
    /// Sum of `balances`.
    pub total_balance: i64,
}

impl WorkloadReport {
    /// Returns the throughput.
    #[must_use]
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.operations as f64 / secs
        } else {
            0.0
        }
    }

    /// Checks if no money was created or lost.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.initial_balance == 0 && self.total_balance == 0
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

/// Returns the key of account `index`.
#[must_use]
pub fn account_key(index: usize) -> Key {
    Key::new(index.to_string())
}

/// Runs the workload against `db`.
///
/// # Errors
///
/// Returns an error if fewer than two accounts are requested, if a
/// database operation fails, or if a task is cancelled. Panics inside a
/// task are resumed on the caller.
pub async fn run_workload(
    db: Arc<Database>,
    config: &WorkloadConfig,
) -> WorkloadResult<WorkloadReport> {
    if config.accounts < 2 {
        return Err(WorkloadError::TooFewAccounts(config.accounts));
    }

    let runs = bump_counter(&db).await?;
    tracing::debug!(runs, accounts = config.accounts, "starting workload");

    for index in 0..config.accounts {
        let key = account_key(index);
        let mut txn = db.new_transaction([key.clone()]).await;
        txn.set_as(&key, &Account::default()).await?;
        txn.commit()?;
    }

    let initial_balance = total_balance(&db, config.accounts).await?;
    if initial_balance != 0 {
        tracing::warn!(initial_balance, "accounts did not start empty");
    }

    let plan = config.plan();
    let start = Instant::now();
    let mut tasks = JoinSet::new();
    for step in plan {
        let db_for_transfer = Arc::clone(&db);
        let amount = config.amount;
        tasks.spawn(async move {
            transfer(
                &db_for_transfer,
                account_key(step.from),
                account_key(step.to),
                amount,
            )
            .await
        });

        let db_for_read = Arc::clone(&db);
        tasks.spawn(async move {
            db_for_read.get(account_key(step.read)).await.map(drop)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => result?,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => return Err(err.into()),
        }
    }
    let duration = start.elapsed();

    let balances = balances(&db, config.accounts).await?;
    let total_balance = balances.iter().sum();

    Ok(WorkloadReport {
        accounts: config.accounts,
        operations: config.operations / 2 * 2,
        duration,
        initial_balance,
        balances,
        total_balance,
    })
}

/// Moves `amount` from one account to another in a single transaction.
///
/// Missing accounts count as empty. The transaction is aborted if any
/// operation fails.
pub async fn transfer(db: &Database, from: Key, to: Key, amount: i64) -> Result<(), CoreError> {
    let mut txn = db.new_transaction([from.clone(), to.clone()]).await;

    let moved = async {
        let mut debit: Account = txn.get_as(&from).await?.unwrap_or_default();
        let mut credit: Account = txn.get_as(&to).await?.unwrap_or_default();
        debit.balance -= amount;
        credit.balance += amount;
        txn.set_as(&from, &debit).await?;
        txn.set_as(&to, &credit).await
    }
    .await;

    match moved {
        Ok(()) => txn.commit(),
        Err(err) => {
            txn.abort()?;
            Err(err)
        }
    }
}

/// Increments the run counter and returns its new value.
async fn bump_counter(db: &Database) -> Result<u64, CoreError> {
    let mut txn = db.new_transaction([COUNTER_KEY]).await;
    let mut counter: Counter = txn.get_as(COUNTER_KEY).await?.unwrap_or_default();
    counter.counter += 1;
    txn.set_as(COUNTER_KEY, &counter).await?;
    txn.commit()?;
    Ok(counter.counter)
}

/// Reads the balance of every account outside any transaction.
pub async fn balances(db: &Database, accounts: usize) -> Result<Vec<i64>, CoreError> {
    let mut balances = Vec::with_capacity(accounts);
    for index in 0..accounts {
        let account: Account = db.get_as(account_key(index)).await?.unwrap_or_default();
        balances.push(account.balance);
    }
    Ok(balances)
}

async fn total_balance(db: &Database, accounts: usize) -> Result<i64, CoreError> {
    Ok(balances(db, accounts).await?.iter().sum())
}
