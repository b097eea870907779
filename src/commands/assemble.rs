//! Assemble consensus sequences from reads grouped by UMI.
//!
//! Input is a TSV of raw reads with the columns `umi`, `r1_sequence`, `r1_quality`,
//! `r2_sequence` and `r2_quality`. All five columns must be present in the header; single-end
//! data leaves the two `r2` fields empty. Qualities are Phred+33 strings. Reads of one group
//! must be consecutive.

use anyhow::{Context, Result, bail};
use clap::Parser;
use fgmig_lib::consensus::{Assembler, AssemblerOptions, Consensus, ConsensusRead, Mig, Read};
use fgmig_lib::logging::{OperationTimer, log_assembler_summary};
use fgmig_lib::metrics::write_metrics_auto;
use fgmig_lib::progress::ProgressTracker;
use fgoxide::io::DelimFile;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::commands::command::Command;
use crate::commands::common::{IoOptions, ThreadingOptions};

/// One raw read (or read pair) of the input TSV.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReadRecord {
    pub umi: String,
    pub r1_sequence: String,
    pub r1_quality: String,
    /// Empty for single-end reads
    pub r2_sequence: String,
    pub r2_quality: String,
}

impl RawReadRecord {
    fn r2(&self) -> Option<(&str, &str)> {
        if self.r2_sequence.is_empty() {
            None
        } else {
            Some((self.r2_sequence.as_str(), self.r2_quality.as_str()))
        }
    }
}

/// One row of the consensus output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    pub umi: String,
    pub assembled_size: usize,
    pub true_size: usize,
    pub r1_sequence: String,
    pub r1_quality: String,
    /// Minor bases as `<position>:<base>:<count>`, comma-separated
    pub r1_minors: String,
    pub r2_sequence: String,
    pub r2_quality: String,
    pub r2_minors: String,
}

fn format_minors(read: &ConsensusRead) -> String {
    read.minors
        .iter()
        .map(|m| format!("{}:{}:{}", m.position, char::from(m.base), m.count))
        .collect::<Vec<_>>()
        .join(",")
}

impl From<&Consensus> for ConsensusRecord {
    fn from(consensus: &Consensus) -> Self {
        let (r2_sequence, r2_quality, r2_minors) = consensus.r2.as_ref().map_or_else(
            || (String::new(), String::new(), String::new()),
            |r2| (String::from_utf8_lossy(&r2.sequence).into_owned(), r2.qualities_phred33(), format_minors(r2)),
        );
        Self {
            umi: consensus.umi.clone(),
            assembled_size: consensus.assembled_size,
            true_size: consensus.true_size,
            r1_sequence: String::from_utf8_lossy(&consensus.r1.sequence).into_owned(),
            r1_quality: consensus.r1.qualities_phred33(),
            r1_minors: format_minors(&consensus.r1),
            r2_sequence,
            r2_quality,
            r2_minors,
        }
    }
}

/// Groups consecutive records sharing a UMI into MIGs.
///
/// # Errors
///
/// Returns an error if a group mixes single-end and paired-end records, a UMI reappears after
/// its group ended, or a sequence and its qualities differ in length.
pub fn group_records(records: &[RawReadRecord]) -> Result<Vec<Mig>> {
    let mut migs = Vec::new();
    let mut seen = ahash::AHashSet::new();

    for group in records.chunk_by(|a, b| a.umi == b.umi) {
        let umi = group[0].umi.as_str();
        if !seen.insert(umi) {
            bail!("Reads of UMI {umi} are not consecutive in the input");
        }

        let paired = group[0].r2().is_some();
        let mut r1 = Vec::with_capacity(group.len());
        let mut r2 = Vec::with_capacity(if paired { group.len() } else { 0 });
        for record in group {
            r1.push(parse_read(umi, &record.r1_sequence, &record.r1_quality)?);
            match (record.r2(), paired) {
                (Some((sequence, quality)), true) => r2.push(parse_read(umi, sequence, quality)?),
                (None, false) => {}
                _ => bail!("UMI {umi} mixes single-end and paired-end reads"),
            }
        }
        migs.push(if paired { Mig::paired(umi, r1, r2) } else { Mig::single(umi, r1) });
    }
    Ok(migs)
}

fn parse_read(umi: &str, sequence: &str, quality: &str) -> Result<Read> {
    if sequence.len() != quality.len() {
        bail!(
            "Read of UMI {umi} has {} bases but {} qualities",
            sequence.len(),
            quality.len()
        );
    }
    Ok(Read::from_phred33(sequence.as_bytes(), quality.as_bytes()))
}

/// Assembles consensus sequences from reads grouped by UMI.
#[derive(Debug, Parser)]
#[command(
    name = "assemble",
    about = "\x1b[38;5;180m[CONSENSUS]\x1b[0m      \x1b[36mAssemble consensus sequences from reads grouped by UMI\x1b[0m",
    long_about = r#"
Assembles one consensus sequence per group of reads sharing a UMI.

Reads of a group are aligned on their leading anchor: reads whose anchor matches the group's
anchor only after a small shift are realigned by that shift ("rescued"). Reads that are too
short, that still disagree with the anchor, or that carry too many mismatches against the
consensus are dropped. Each remaining column is called with a likelihood model that combines
the base qualities with the pre- and post-UMI error rates. Non-consensus bases observed with
high quality are reported as minor bases.

Paired-end groups are assembled mate by mate and only yield a consensus when both mates do.

Outputs:

  <output>.consensus.txt         one row per assembled group
  <output>.assemble.txt          reads assembled per group
  <output>.assemble_summary.txt  totals and per-mate drop/rescue counts
"#
)]
pub struct Assemble {
    #[command(flatten)]
    pub io: IoOptions,

    /// Length of the read prefix used to align reads of a group
    #[arg(long = "anchor-length", default_value_t = 8)]
    pub anchor_length: usize,

    /// Maximum shift tried when realigning a read on the group anchor
    #[arg(long = "max-offset", default_value_t = 4)]
    pub max_offset: usize,

    /// Maximum mismatches between a read anchor and the group anchor
    #[arg(long = "max-anchor-mismatches", default_value_t = 2)]
    pub max_anchor_mismatches: usize,

    /// Maximum mismatches between a read and the consensus
    #[arg(long = "max-mismatches", default_value_t = 5)]
    pub max_mismatches: usize,

    /// Reads shorter than this fraction of the group's longest read are dropped
    #[arg(long = "min-read-length-ratio", default_value_t = 0.75)]
    pub min_read_length_ratio: f64,

    /// Bases below this quality do not contribute to the consensus
    #[arg(short = 'q', long = "min-base-quality", default_value_t = 10)]
    pub min_base_quality: u8,

    /// Minimum reads remaining after filtering to call a consensus
    #[arg(short = 'M', long = "min-reads", default_value_t = 1)]
    pub min_reads: usize,

    /// Do not call minor bases
    #[arg(long = "no-minors", default_value_t = false)]
    pub no_minors: bool,

    /// Minimum quality for a non-consensus base to count as a minor observation
    #[arg(long = "minor-quality-threshold", default_value_t = 20)]
    pub minor_quality_threshold: u8,

    /// Phred-scaled error rate prior to UMI integration
    #[arg(short = '1', long = "error-rate-pre-umi", default_value_t = 45)]
    pub error_rate_pre_umi: u8,

    /// Phred-scaled error rate post UMI integration
    #[arg(short = '2', long = "error-rate-post-umi", default_value_t = 40)]
    pub error_rate_post_umi: u8,

    #[command(flatten)]
    pub threading: ThreadingOptions,
}

impl Assemble {
    fn assembler_options(&self) -> AssemblerOptions {
        AssemblerOptions {
            anchor_length: self.anchor_length,
            max_offset: self.max_offset,
            max_anchor_mismatches: self.max_anchor_mismatches,
            max_mismatches: self.max_mismatches,
            min_read_length_ratio: self.min_read_length_ratio,
            min_base_quality: self.min_base_quality,
            min_reads: self.min_reads,
            call_minors: !self.no_minors,
            minor_quality_threshold: self.minor_quality_threshold,
            error_rate_pre_umi: self.error_rate_pre_umi,
            error_rate_post_umi: self.error_rate_post_umi,
            store_consensuses: true,
        }
    }

    fn read_migs(path: &Path) -> Result<Vec<Mig>> {
        let records: Vec<RawReadRecord> = DelimFile::default()
            .read_tsv(&path)
            .with_context(|| format!("Failed to read reads TSV: {}", path.display()))?;
        let migs = group_records(&records)
            .with_context(|| format!("Invalid reads TSV: {}", path.display()))?;
        info!("Read {} reads in {} groups", records.len(), migs.len());
        Ok(migs)
    }
}

impl Command for Assemble {
    fn execute(&self, command_line: &str) -> Result<()> {
        let timer = OperationTimer::new("Assembling consensuses");
        self.io.validate("Input reads TSV")?;
        let options = self.assembler_options();
        options.validate()?;

        info!("Command line: {command_line}");
        info!("Input: {}", self.io.input.display());
        info!("Output prefix: {}", self.io.output.display());
        info!("Min reads: {}", self.min_reads);
        info!("Error rate pre-UMI: Q{}", self.error_rate_pre_umi);
        info!("Error rate post-UMI: Q{}", self.error_rate_post_umi);
        info!("{}", self.threading.log_message());

        let migs = Self::read_migs(&self.io.input)?;
        let assembler = Assembler::new(options);
        let progress = ProgressTracker::new("Assembled groups").with_interval(100_000);

        let pool = self.threading.build_pool()?;
        let consensuses: Vec<ConsensusRecord> = pool.install(|| {
            migs.par_iter()
                .filter_map(|mig| {
                    let consensus = assembler.assemble(mig);
                    progress.log_if_needed(1);
                    consensus.as_ref().map(ConsensusRecord::from)
                })
                .collect()
        });
        progress.log_final();

        let consensus_path = self.io.output_path("consensus.txt");
        DelimFile::default()
            .write_tsv(&consensus_path, consensuses)
            .with_context(|| format!("Failed to write consensuses: {}", consensus_path.display()))?;
        info!("Wrote consensuses to {}", consensus_path.display());

        let mut report = assembler.report();
        report.sort_by(|a, b| a.umi.cmp(&b.umi));
        write_metrics_auto(self.io.output_path("assemble.txt"), &report)?;

        let metrics = assembler.metrics();
        write_metrics_auto(self.io.output_path("assemble_summary.txt"), &[metrics.clone()])?;
        log_assembler_summary(&metrics);

        assembler.clear();
        timer.log_completion(metrics.migs_total);
        Ok(())
    }
}
