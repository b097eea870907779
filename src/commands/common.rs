//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use fgmig_lib::validation::validate_file_exists;

/// Common input/output options: one input file and an output prefix.
#[derive(Debug, Clone, Args)]
pub struct IoOptions {
    /// Input TSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output prefix; every output file is named `<prefix>.<suffix>`
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

impl IoOptions {
    /// Validates that the input file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the input file does not exist.
    pub fn validate(&self, description: &str) -> Result<()> {
        validate_file_exists(&self.input, description)?;
        Ok(())
    }

    /// Path of the output file with the given suffix, e.g. `haplotypes.fa`.
    #[must_use]
    pub fn output_path(&self, suffix: &str) -> PathBuf {
        output_path(&self.output, suffix)
    }
}

/// `<prefix>.<suffix>`, keeping any directory and dots already in the prefix.
#[must_use]
pub fn output_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Threading mode for parallel processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadingMode {
    /// Single-threaded mode (no parallelism).
    SingleThreaded,
    /// Thread cap mode: never exceed N worker threads.
    Threads(usize),
}

impl ThreadingMode {
    /// Returns true if this mode enables parallel processing.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        !matches!(self, Self::SingleThreaded)
    }

    /// Returns the target thread count for this mode.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        match self {
            Self::SingleThreaded => 1,
            Self::Threads(n) => *n,
        }
    }
}

/// Common threading options.
#[derive(Debug, Clone, Default, Args)]
pub struct ThreadingOptions {
    /// Number of worker threads. Runs single-threaded when not specified.
    #[arg(long = "threads")]
    pub threads: Option<usize>,
}

impl ThreadingOptions {
    /// Creates threading options with N threads.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        Self { threads: Some(threads) }
    }

    /// Returns the threading mode based on CLI options.
    #[must_use]
    pub fn mode(&self) -> ThreadingMode {
        match self.threads {
            None | Some(0 | 1) => ThreadingMode::SingleThreaded,
            Some(n) => ThreadingMode::Threads(n),
        }
    }

    /// Returns the number of threads.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.mode().num_threads()
    }

    /// Returns a log message describing the threading configuration.
    #[must_use]
    pub fn log_message(&self) -> String {
        match self.mode() {
            ThreadingMode::SingleThreaded => "Single-threaded mode".to_string(),
            ThreadingMode::Threads(n) => format!("Using {n} threads"),
        }
    }

    /// Builds the rayon pool that runs the command's parallel stages.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created.
    pub fn build_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .build()
            .context("Failed to build rayon thread pool")
    }
}
