//! Correct aligned consensuses and call significant haplotypes.
//!
//! Input is a reference FASTA plus a TSV of consensuses already aligned against it. Every
//! column below must be present in the header; `majors` and `minors` may be left empty:
//!
//! | Column      | Contents                                                         |
//! |-------------|------------------------------------------------------------------|
//! | `reference` | reference name                                                   |
//! | `umi`       | UMI of the consensus                                             |
//! | `mig_size`  | reads in the group                                               |
//! | `start`     | 0-based reference position of the first aligned base             |
//! | `qualities` | Phred+33 consensus quality of every covered reference position   |
//! | `majors`    | comma-separated major mutation codes, e.g. `S3:G,D7`             |
//! | `minors`    | comma-separated minor mutations with read counts, e.g. `S5:T:2`  |

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use fgmig_lib::aligned::{AlignedBlock, AlignedConsensus, MinorMutation};
use fgmig_lib::corrector::Corrector;
use fgmig_lib::error_model::{ErrorModelOptions, MutationStatistics};
use fgmig_lib::haplotype::{HaplotypeTree, HaplotypeTreeOptions};
use fgmig_lib::logging::{OperationTimer, log_corrector_summary, log_haplotype_summary};
use fgmig_lib::metrics::write_metrics_auto;
use fgmig_lib::mutation::Mutation;
use fgmig_lib::progress::ProgressTracker;
use fgmig_lib::reference::ReferenceLibrary;
use fgmig_lib::validation::validate_file_exists;
use fgmig_lib::variant::{VariantCaller, VariantFilterOptions, VariantFilterSet};
use fgoxide::io::DelimFile;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::commands::command::Command;
use crate::commands::common::{IoOptions, ThreadingOptions};

/// One aligned consensus of the input TSV.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedConsensusRecord {
    pub reference: String,
    pub umi: String,
    pub mig_size: usize,
    pub start: usize,
    pub qualities: String,
    pub majors: String,
    pub minors: String,
}

fn parse_majors(codes: &str) -> Result<Vec<Mutation>> {
    codes
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| code.parse::<Mutation>().map_err(anyhow::Error::from))
        .collect()
}

fn parse_minors(codes: &str) -> Result<Vec<MinorMutation>> {
    codes
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| -> Result<MinorMutation> {
            let (mutation, count) = code
                .rsplit_once(':')
                .ok_or_else(|| anyhow!("Minor mutation '{code}' is missing its read count"))?;
            let count = count
                .parse::<u64>()
                .with_context(|| format!("Invalid read count in minor mutation '{code}'"))?;
            Ok(MinorMutation { mutation: mutation.parse()?, count })
        })
        .collect()
}

impl AlignedConsensusRecord {
    /// Resolves the record against the reference library.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown references, malformed mutation codes, or alignments that do
    /// not fit the reference.
    pub fn to_aligned(&self, references: &ReferenceLibrary) -> Result<AlignedConsensus> {
        let reference = references.get(&self.reference)?;
        let qualities = self.qualities.bytes().map(|q| q.saturating_sub(33)).collect();
        let aligned = AlignedConsensus::new(
            Arc::clone(reference),
            self.umi.as_str(),
            self.mig_size,
            vec![AlignedBlock::new(self.start, qualities)],
            parse_majors(&self.majors)?,
            parse_minors(&self.minors)?,
        )?;
        Ok(aligned)
    }
}

/// Corrects aligned consensuses against a positional error model and calls haplotypes.
#[derive(Debug, Parser)]
#[command(
    name = "haplotypes",
    about = "\x1b[38;5;173m[HAPLOTYPES]\x1b[0m     \x1b[36mCorrect aligned consensuses and call significant haplotypes\x1b[0m",
    long_about = r#"
Corrects aligned consensuses and calls the haplotypes they support.

1. Every consensus updates a per-reference, per-position error model: coverage, qualities, and
   how often each base appears as the consensus (major) or below it (minor).
2. Each consensus is corrected: substitutions indistinguishable from background errors and
   indels seen in too few consensuses are removed, and poorly covered positions are masked.
   Consensuses of references with too little data are skipped.
3. Corrected consensuses are collapsed into haplotypes. Each haplotype is tested against every
   more abundant haplotype of its reference; the p-value is the probability that it arose from
   that parent through background errors. Haplotypes at or below the p-value threshold are
   reported.

Outputs:

  <output>.corrector.txt          per-position error model and filter decisions
  <output>.corrector_summary.txt  consensuses corrected and skipped
  <output>.variants.txt           every mutation called as major, with filters
  <output>.haplotypes.txt         reported haplotypes
  <output>.haplotypes.fa          reported haplotype sequences
"#
)]
pub struct Haplotypes {
    #[command(flatten)]
    pub io: IoOptions,

    /// Reference FASTA the consensuses were aligned against
    #[arg(short = 'r', long = "reference")]
    pub reference: PathBuf,

    /// Positions covered by fewer consensuses are masked
    #[arg(long = "min-mig-coverage", default_value_t = 10)]
    pub min_mig_coverage: u64,

    /// Positions with a lower mean consensus quality are masked
    #[arg(long = "min-mean-quality", default_value_t = 25.0)]
    pub min_mean_quality: f64,

    /// References with fewer consensuses are not corrected
    #[arg(long = "min-reference-migs", default_value_t = 10)]
    pub min_reference_migs: u64,

    /// Substitutions with a higher background-error p-value are removed
    #[arg(long = "substitution-p-value", default_value_t = 0.05)]
    pub substitution_p_value: f64,

    /// Minimum consensuses carrying an indel for it to be kept
    #[arg(long = "min-indel-count", default_value_t = 2)]
    pub min_indel_count: u64,

    /// Minimum fraction of covering consensuses carrying an indel for it to be kept
    #[arg(long = "min-indel-ratio", default_value_t = 0.1)]
    pub min_indel_ratio: f64,

    /// Haplotypes with a higher p-value are not reported
    #[arg(short = 'p', long = "p-value-threshold", default_value_t = 0.05)]
    pub p_value_threshold: f64,

    /// A parent cannot explain a child more abundant than this fraction of a mutation's count
    #[arg(long = "child-major-ratio", default_value_t = 0.5)]
    pub child_major_ratio: f64,

    /// Maximum number of mutations separating a child from its parent
    #[arg(long = "depth", default_value_t = 2)]
    pub depth: usize,

    /// Keep haplotypes seen in a single consensus
    #[arg(long = "keep-singletons", default_value_t = false)]
    pub keep_singletons: bool,

    /// Variants at positions covered by fewer consensuses fail the coverage filter
    #[arg(long = "coverage-threshold", default_value_t = 100)]
    pub coverage_threshold: u64,

    /// Variants seen once fail the singleton filter below a frequency of 1/N
    #[arg(long = "singleton-frequency-threshold", default_value_t = 10_000)]
    pub singleton_frequency_threshold: u64,

    #[command(flatten)]
    pub threading: ThreadingOptions,
}

impl Haplotypes {
    fn error_model_options(&self) -> ErrorModelOptions {
        ErrorModelOptions {
            min_mig_coverage: self.min_mig_coverage,
            min_mean_quality: self.min_mean_quality,
            min_reference_migs: self.min_reference_migs,
            substitution_p_value: self.substitution_p_value,
            min_indel_count: self.min_indel_count,
            min_indel_ratio: self.min_indel_ratio,
            ..ErrorModelOptions::default()
        }
    }

    fn tree_options(&self) -> HaplotypeTreeOptions {
        HaplotypeTreeOptions {
            p_value_threshold: self.p_value_threshold,
            child_major_ratio: self.child_major_ratio,
            depth: self.depth,
            filter_singletons: !self.keep_singletons,
        }
    }

    fn filter_options(&self) -> VariantFilterOptions {
        VariantFilterOptions {
            coverage_threshold: self.coverage_threshold,
            singleton_frequency_threshold: self.singleton_frequency_threshold,
        }
    }

    fn read_consensuses(path: &Path, references: &ReferenceLibrary) -> Result<Vec<AlignedConsensus>> {
        let records: Vec<AlignedConsensusRecord> = DelimFile::default()
            .read_tsv(&path)
            .with_context(|| format!("Failed to read aligned consensus TSV: {}", path.display()))?;
        records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                record.to_aligned(references).with_context(|| {
                    format!("Invalid aligned consensus on line {} of {}", i + 2, path.display())
                })
            })
            .collect()
    }
}

impl Command for Haplotypes {
    fn execute(&self, command_line: &str) -> Result<()> {
        let timer = OperationTimer::new("Calling haplotypes");
        self.io.validate("Input aligned consensus TSV")?;
        validate_file_exists(&self.reference, "Reference FASTA")?;
        let model_options = self.error_model_options();
        model_options.validate()?;
        let tree_options = self.tree_options();
        tree_options.validate()?;
        let filter_options = self.filter_options();
        filter_options.validate()?;

        info!("Command line: {command_line}");
        info!("Input: {}", self.io.input.display());
        info!("Reference: {}", self.reference.display());
        info!("Output prefix: {}", self.io.output.display());
        info!("{}", self.threading.log_message());

        let references = ReferenceLibrary::from_fasta(&self.reference)?;
        let consensuses = Self::read_consensuses(&self.io.input, &references)?;
        info!("Read {} aligned consensuses", consensuses.len());
        let pool = self.threading.build_pool()?;

        let stats = MutationStatistics::new(&references);
        pool.install(|| consensuses.par_iter().try_for_each(|c| stats.observe(c)))?;
        let models = Arc::new(stats.finalize(&model_options));

        let corrector = Corrector::new(Arc::clone(&models));
        let mut tree = HaplotypeTree::new(Arc::clone(&models), tree_options);
        let progress = ProgressTracker::new("Corrected consensuses").with_interval(100_000);
        pool.install(|| {
            consensuses.into_par_iter().for_each(|consensus| {
                if let Some(corrected) = corrector.correct(consensus) {
                    tree.add(&corrected);
                }
                progress.log_if_needed(1);
            });
        });
        progress.log_final();

        write_metrics_auto(self.io.output_path("corrector.txt"), &corrector.report())?;
        let corrector_metrics = corrector.metrics();
        write_metrics_auto(self.io.output_path("corrector_summary.txt"), &[corrector_metrics.clone()])?;
        log_corrector_summary(&corrector_metrics);

        let caller = VariantCaller::new(VariantFilterSet::from(&filter_options));
        write_metrics_auto(self.io.output_path("variants.txt"), &caller.report(&models))?;

        pool.install(|| tree.calculate_p_values())?;
        let haplotypes = tree.report();
        write_metrics_auto(self.io.output_path("haplotypes.txt"), &haplotypes)?;
        tree.write_fasta(self.io.output_path("haplotypes.fa"))?;
        log_haplotype_summary(tree.len(), &haplotypes);

        timer.log_completion(corrector_metrics.consensuses_total);
        Ok(())
    }
}
