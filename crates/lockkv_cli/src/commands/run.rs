//! Run command implementation.

use super::{Format, RunResult, Target};
use lockkv_testkit::{run_workload, Setup, WorkloadConfig};

/// Runs the workload once and prints the result.
pub async fn run(
    target: &Target,
    setup: Setup,
    accounts: usize,
    operations: usize,
    seed: u64,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let (db, _guard) = target.open(setup)?;
    tracing::info!(%setup, accounts, operations, seed, "running workload");

    let config = WorkloadConfig::new(accounts, operations).seed(seed);
    let report = run_workload(db, &config).await?;
    let result = RunResult::new(setup, seed, report);

    match format {
        Format::Text => println!("{}", result.line()),
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }
    Ok(())
}
