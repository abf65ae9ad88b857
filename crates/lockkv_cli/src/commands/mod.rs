//! CLI command implementations.

pub mod matrix;
pub mod run;

use lockkv_core::{Database, KeyOrdering};
use lockkv_testkit::{Setup, StorageKind, WorkloadReport};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Where and how databases are opened.
pub struct Target {
    /// Directory for file-backed databases.
    pub path: Option<PathBuf>,
    /// Key ordering for the fine-grained locker.
    pub ordering: KeyOrdering,
}

impl Target {
    /// Opens a fresh database for `setup`.
    ///
    /// File-backed databases without an explicit path live in a temporary
    /// directory that is removed when the returned guard is dropped.
    pub fn open(&self, setup: Setup) -> Result<(Arc<Database>, Option<TempDir>), Box<dyn std::error::Error>> {
        let (dir, guard) = match (setup.storage, &self.path) {
            (StorageKind::Fs, Some(path)) => (path.clone(), None),
            (StorageKind::Fs, None) => {
                let temp = TempDir::new()?;
                (temp.path().join("db"), Some(temp))
            }
            (StorageKind::Ram, _) => (PathBuf::new(), None),
        };

        let config = setup.config(&dir).key_ordering(self.ordering);
        let db = Database::open(&config)?;
        Ok((Arc::new(db), guard))
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One aligned line per run.
    Text,
    /// JSON.
    Json,
}

impl Format {
    /// Parses a format name.
    pub fn parse(name: &str) -> Result<Self, String> {
        match name {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format `{other}` (expected text or json)")),
        }
    }
}

/// One workload run as reported to the user.
#[derive(Debug, Serialize)]
pub struct RunResult {
    /// Storage/locker label, e.g. `RAM/FineGrained`.
    pub setup: String,
    /// Seed used to pick accounts.
    pub seed: u64,
    /// Workload outcome.
    #[serde(flatten)]
    pub report: WorkloadReport,
    /// Throughput.
    pub ops_per_second: f64,
    /// Seconds more than the previous run with the same accounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_seconds: Option<f64>,
    /// Whether the final balances differ from another run of the same size.
    pub discrepancy: bool,
}

impl RunResult {
    /// Wraps a report.
    pub fn new(setup: Setup, seed: u64, report: WorkloadReport) -> Self {
        Self {
            setup: setup.to_string(),
            seed,
            ops_per_second: report.ops_per_second(),
            report,
            delta_seconds: None,
            discrepancy: false,
        }
    }

    /// Formats the result as one aligned text line.
    pub fn line(&self) -> String {
        let mut line = format!(
            "{:>20} [{:>5} acc, {:>5} ops]: {:>7.3} s, {:>10.3} ops/s",
            self.setup,
            self.report.accounts,
            self.report.operations,
            self.report.duration.as_secs_f64(),
            self.ops_per_second,
        );
        if let Some(delta) = self.delta_seconds {
            line.push_str(&format!(" (+{delta:>7.3} s from prev)"));
        }
        if self.report.total_balance != 0 {
            line.push_str(&format!(
                " [!] error: total balance = {}",
                self.report.total_balance
            ));
        }
        if self.discrepancy {
            line.push_str(" [!] error: result discrepancy");
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockkv_core::LockerKind;
    use std::time::Duration;

    fn report(total_balance: i64) -> WorkloadReport {
        WorkloadReport {
            accounts: 100,
            operations: 1000,
            duration: Duration::from_millis(500),
            initial_balance: 0,
            balances: vec![total_balance],
            total_balance,
        }
    }

    #[test]
    fn line_for_clean_run() {
        let setup = Setup::new(StorageKind::Ram, LockerKind::Global);
        let result = RunResult::new(setup, 1, report(0));
        assert_eq!(
            result.line(),
            "          RAM/Global [  100 acc,  1000 ops]:   0.500 s,   2000.000 ops/s"
        );
    }

    #[test]
    fn line_flags_errors() {
        let setup = Setup::new(StorageKind::Ram, LockerKind::None);
        let mut result = RunResult::new(setup, 1, report(-3));
        result.delta_seconds = Some(0.25);
        result.discrepancy = true;

        let line = result.line();
        assert!(line.contains("(+  0.250 s from prev)"));
        assert!(line.contains("[!] error: total balance = -3"));
        assert!(line.ends_with("[!] error: result discrepancy"));
    }

    #[test]
    fn format_names() {
        assert_eq!(Format::parse("json").unwrap(), Format::Json);
        assert!(Format::parse("yaml").is_err());
    }
}
