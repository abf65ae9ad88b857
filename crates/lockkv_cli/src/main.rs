//! LockKV CLI
//!
//! Runs the bank-transfer workload against LockKV databases and reports
//! throughput and consistency.
//!
//! # Commands
//!
//! - `run` - Run the workload once for one storage/locker combination
//! - `matrix` - Run the workload over every combination and size

mod commands;

use clap::{Parser, Subcommand};
use lockkv_core::{KeyOrdering, LockerKind};
use lockkv_testkit::StorageKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LockKV locking benchmark.
#[derive(Parser)]
#[command(name = "lockkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory for file-backed databases (a temporary directory per run
    /// if omitted)
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Key ordering used by the fine-grained locker (as-given, canonical)
    #[arg(global = true, long, default_value = "as-given")]
    ordering: KeyOrdering,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workload once
    Run {
        /// Locking strategy (none, global, fine-grained)
        #[arg(short, long, default_value = "fine-grained")]
        locker: LockerKind,

        /// Storage backend (ram, fs)
        #[arg(short, long, default_value = "ram")]
        storage: StorageKind,

        /// Number of accounts
        #[arg(short, long, default_value = "100")]
        accounts: usize,

        /// Number of operations
        #[arg(short, long, default_value = "1000")]
        operations: usize,

        /// RNG seed (random if omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run the workload over every storage/locker combination and size
    Matrix {
        /// Smallest number of accounts
        #[arg(long, default_value = "100")]
        min_accounts: usize,

        /// Largest number of accounts
        #[arg(long, default_value = "1000")]
        max_accounts: usize,

        /// Step between account counts
        #[arg(long, default_value = "100")]
        accounts_step: usize,

        /// Smallest number of operations
        #[arg(long, default_value = "1000")]
        min_ops: usize,

        /// Largest number of operations
        #[arg(long, default_value = "5000")]
        max_ops: usize,

        /// Step between operation counts
        #[arg(long, default_value = "1000")]
        ops_step: usize,

        /// RNG seed shared by every run (random if omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Single-threaded, like the cooperative scheduler the lockers are
    // designed for.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let target = commands::Target {
        path: cli.path,
        ordering: cli.ordering,
    };

    match cli.command {
        Commands::Run {
            locker,
            storage,
            accounts,
            operations,
            seed,
            format,
        } => {
            let format = commands::Format::parse(&format)?;
            let setup = lockkv_testkit::Setup::new(storage, locker);
            let seed = seed.unwrap_or_else(rand::random);
            runtime.block_on(commands::run::run(
                &target, setup, accounts, operations, seed, format,
            ))?;
        }
        Commands::Matrix {
            min_accounts,
            max_accounts,
            accounts_step,
            min_ops,
            max_ops,
            ops_step,
            seed,
            format,
        } => {
            let format = commands::Format::parse(&format)?;
            let grid = commands::matrix::Grid {
                accounts: commands::matrix::steps(min_accounts, max_accounts, accounts_step)?,
                operations: commands::matrix::steps(min_ops, max_ops, ops_step)?,
            };
            let seed = seed.unwrap_or_else(rand::random);
            runtime.block_on(commands::matrix::run(&target, &grid, seed, format))?;
        }
        Commands::Version => {
            println!("LockKV CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("LockKV Core v{}", lockkv_core::VERSION);
        }
    }

    Ok(())
}
