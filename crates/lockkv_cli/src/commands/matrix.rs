//! Matrix command implementation.

use super::{Format, RunResult, Target};
use lockkv_testkit::{run_workload, WorkloadConfig, DEFAULT_MATRIX};

/// Workload sizes to run for every setup.
#[derive(Debug, Clone)]
pub struct Grid {
    /// Account counts.
    pub accounts: Vec<usize>,
    /// Operation counts, run in this order for each account count.
    pub operations: Vec<usize>,
}

/// Expands `min..=max` in steps of `step`.
pub fn steps(min: usize, max: usize, step: usize) -> Result<Vec<usize>, String> {
    if step == 0 {
        return Err("step must be positive".to_string());
    }
    if min > max {
        return Err(format!("minimum {min} exceeds maximum {max}"));
    }
    Ok((min..=max).step_by(step).collect())
}

/// Runs every setup over every size, printing one line per run.
pub async fn run(
    target: &Target,
    grid: &Grid,
    seed: u64,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(seed, "begin benchmarks");
    let mut results: Vec<RunResult> = Vec::new();

    for setup in DEFAULT_MATRIX {
        for &accounts in &grid.accounts {
            let mut previous = None;
            for &operations in &grid.operations {
                let (db, _guard) = target.open(setup)?;
                let config = WorkloadConfig::new(accounts, operations).seed(seed);
                let report = run_workload(db, &config).await?;

                let mut result = RunResult::new(setup, seed, report);
                let seconds = result.report.duration.as_secs_f64();
                result.delta_seconds = previous.map(|prev| seconds - prev);
                result.discrepancy = has_discrepancy(&results, &result);
                previous = Some(seconds);

                if format == Format::Text {
                    println!("{}", result.line());
                }
                results.push(result);
            }
            if format == Format::Text {
                println!();
            }
        }
    }

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(())
}

/// Checks if `result` ended with different balances than an earlier run of
/// the same size.
fn has_discrepancy(earlier: &[RunResult], result: &RunResult) -> bool {
    earlier
        .iter()
        .filter(|other| {
            other.report.accounts == result.report.accounts
                && other.report.operations == result.report.operations
        })
        .any(|other| other.report.balances != result.report.balances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockkv_core::LockerKind;
    use lockkv_testkit::{Setup, StorageKind, WorkloadReport};
    use std::time::Duration;

    fn result(accounts: usize, balances: Vec<i64>) -> RunResult {
        let report = WorkloadReport {
            accounts,
            operations: 10,
            duration: Duration::from_millis(1),
            initial_balance: 0,
            total_balance: balances.iter().sum(),
            balances,
        };
        RunResult::new(Setup::new(StorageKind::Ram, LockerKind::Global), 1, report)
    }

    #[test]
    fn default_grid_sizes() {
        assert_eq!(steps(100, 1000, 100).unwrap().len(), 10);
        assert_eq!(steps(1000, 5000, 1000).unwrap(), [1000, 2000, 3000, 4000, 5000]);
        assert!(steps(1, 2, 0).is_err());
        assert!(steps(3, 2, 1).is_err());
    }

    #[test]
    fn discrepancy_only_between_same_size() {
        let earlier = vec![result(2, vec![1, -1]), result(3, vec![0, 0, 0])];

        assert!(!has_discrepancy(&earlier, &result(2, vec![1, -1])));
        assert!(has_discrepancy(&earlier, &result(2, vec![-1, 1])));
        assert!(!has_discrepancy(&earlier, &result(4, vec![1, 1, -1, -1])));
    }
}
