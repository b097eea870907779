//! # Molecular identifier group assembly
//!
//! The [`Assembler`] collapses all reads of one [`Mig`] into a single [`Consensus`]. Each mate is
//! assembled independently:
//!
//! 1. Reads much shorter than the longest read of the group are dropped.
//! 2. The first bases of the first longest read form the group *anchor*. Every remaining read is
//!    placed at the shift (within `max_offset`) where its start best matches the anchor. Reads that
//!    only match after a non-zero shift are *rescued*; reads that match nowhere are dropped.
//! 3. Each consensus column is called from the placed reads with [`ConsensusBaseBuilder`].
//! 4. Reads that disagree with the first-pass consensus at more than `max_mismatches` confident
//!    positions are dropped and the consensus is called again from the survivors.
//! 5. Optionally, non-consensus bases seen with high quality are kept as minor observations.
//!
//! A paired-end group yields a consensus only when both mates do.
//!
//! `assemble` takes `&self` and is safe to call from many threads at once: scalar counters are
//! atomics, and the retained consensus list is only locked for the final append.

use crate::base_builder::{ConsensusBaseBuilder, DNA_BASES};
use crate::consensus::{Consensus, ConsensusRead, MinorBase};
use crate::mig::{Mate, Mig, Read};
use crate::phred::{NO_CALL_BASE, PhredScore};
use anyhow::{Result, ensure};
use fgmig_metrics::{AssembledMigMetric, AssemblerMetrics, DropReason};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Options controlling consensus assembly.
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    /// Number of leading bases of the seed read used to place other reads
    pub anchor_length: usize,
    /// Largest shift (in either direction) tried when placing a read
    pub max_offset: usize,
    /// Mismatches tolerated between a placed read and the anchor
    pub max_anchor_mismatches: usize,
    /// Mismatches tolerated between a read and the first-pass consensus
    pub max_mismatches: usize,
    /// Reads shorter than this fraction of the longest read are dropped
    pub min_read_length_ratio: f64,
    /// Bases below this quality are ignored
    pub min_base_quality: PhredScore,
    /// Minimum reads that must survive to emit a consensus
    pub min_reads: usize,
    /// Whether to record minor (sub-consensus) bases
    pub call_minors: bool,
    /// Minimum quality for an observation to count towards a minor base
    pub minor_quality_threshold: PhredScore,
    /// Phred-scaled error rate for errors before UMI tagging
    pub error_rate_pre_umi: PhredScore,
    /// Phred-scaled error rate for errors after UMI tagging
    pub error_rate_post_umi: PhredScore,
    /// Keep every consensus in memory for reporting
    pub store_consensuses: bool,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            anchor_length: 8,
            max_offset: 4,
            max_anchor_mismatches: 2,
            max_mismatches: 5,
            min_read_length_ratio: 0.75,
            min_base_quality: 10,
            min_reads: 1,
            call_minors: true,
            minor_quality_threshold: 20,
            error_rate_pre_umi: 45,
            error_rate_post_umi: 40,
            store_consensuses: true,
        }
    }
}

impl AssemblerOptions {
    /// Checks that every option is in range.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first out-of-range option.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.anchor_length > 0, "anchor length must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.min_read_length_ratio),
            "min read length ratio must be within [0, 1], got {}",
            self.min_read_length_ratio
        );
        ensure!(self.min_reads > 0, "min reads must be at least 1");
        ensure!(
            self.max_anchor_mismatches < self.anchor_length,
            "max anchor mismatches ({}) must be below the anchor length ({})",
            self.max_anchor_mismatches,
            self.anchor_length
        );
        Ok(())
    }
}

/// Per-mate read counters.
#[derive(Debug, Default)]
struct MateCounters {
    rescued: AtomicU64,
    dropped_short: AtomicU64,
    dropped_error: AtomicU64,
}

impl MateCounters {
    fn record(&self, reason: DropReason) {
        match reason {
            DropReason::ShortRead => self.dropped_short.fetch_add(1, Ordering::Relaxed),
            _ => self.dropped_error.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// A read placed against the group anchor.
struct PlacedRead<'a> {
    read: &'a Read,
    /// consensus position = read position + shift
    shift: isize,
}

impl PlacedRead<'_> {
    fn at(&self, column: usize) -> Option<(u8, PhredScore)> {
        let idx = usize::try_from(column as isize - self.shift).ok()?;
        let base = *self.read.sequence.get(idx)?;
        Some((base, self.read.qualities[idx]))
    }
}

/// Assembles consensus sequences from molecular identifier groups.
pub struct Assembler {
    options: AssemblerOptions,
    migs_total: AtomicU64,
    migs_assembled: AtomicU64,
    reads_total: AtomicU64,
    reads_assembled: AtomicU64,
    migs_dropped_insufficient: AtomicU64,
    migs_dropped_orphan: AtomicU64,
    r1: MateCounters,
    r2: MateCounters,
    consensuses: Mutex<Vec<Consensus>>,
    cleared: AtomicBool,
}

impl Assembler {
    #[must_use]
    pub fn new(options: AssemblerOptions) -> Self {
        Self {
            options,
            migs_total: AtomicU64::new(0),
            migs_assembled: AtomicU64::new(0),
            reads_total: AtomicU64::new(0),
            reads_assembled: AtomicU64::new(0),
            migs_dropped_insufficient: AtomicU64::new(0),
            migs_dropped_orphan: AtomicU64::new(0),
            r1: MateCounters::default(),
            r2: MateCounters::default(),
            consensuses: Mutex::new(Vec::new()),
            cleared: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    /// Assembles one group. Returns `None` when no usable consensus can be built.
    pub fn assemble(&self, mig: &Mig) -> Option<Consensus> {
        self.migs_total.fetch_add(1, Ordering::Relaxed);
        self.reads_total.fetch_add(mig.size() as u64, Ordering::Relaxed);

        let r1 = self.assemble_mate(mig.r1(), Mate::R1);
        let r2 = mig.r2().map(|reads| self.assemble_mate(reads, Mate::R2));

        let (r1, r2, assembled_size) = match (r1, r2) {
            (Some((r1, n1)), None) => (r1, None, n1),
            (Some((r1, n1)), Some(Some((r2, n2)))) => (r1, Some(r2), n1.min(n2)),
            (Some(_), Some(None)) | (None, Some(Some(_))) => {
                debug!("Only one mate assembled for group {}", mig.umi());
                self.migs_dropped_orphan.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            (None, None | Some(None)) => {
                self.migs_dropped_insufficient.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        let consensus =
            Consensus { umi: mig.umi().to_string(), r1, r2, assembled_size, true_size: mig.size() };

        self.migs_assembled.fetch_add(1, Ordering::Relaxed);
        self.reads_assembled.fetch_add(consensus.assembled_size as u64, Ordering::Relaxed);
        if self.options.store_consensuses {
            self.consensuses.lock().push(consensus.clone());
        }
        Some(consensus)
    }

    /// Assembles the reads of one mate, returning the consensus and the reads that built it.
    fn assemble_mate(&self, reads: &[Read], mate: Mate) -> Option<(ConsensusRead, usize)> {
        let counters = self.counters(mate);
        let max_len = reads.iter().map(Read::len).max().filter(|&len| len > 0)?;

        let min_len = self.options.min_read_length_ratio * max_len as f64;
        let mut long_reads = Vec::with_capacity(reads.len());
        for read in reads {
            if (read.len() as f64) < min_len {
                counters.record(DropReason::ShortRead);
            } else {
                long_reads.push(read);
            }
        }

        let seed = long_reads.iter().find(|r| r.len() == max_len)?;
        let anchor = &seed.sequence[..self.options.anchor_length.min(max_len)];

        let mut placed = Vec::with_capacity(long_reads.len());
        for read in long_reads.iter().copied() {
            match self.place(read, anchor) {
                Some(shift) => {
                    if shift != 0 {
                        counters.rescued.fetch_add(1, Ordering::Relaxed);
                    }
                    placed.push(PlacedRead { read, shift });
                }
                None => counters.record(DropReason::AnchorMismatch),
            }
        }

        let mut builder = ConsensusBaseBuilder::new(
            self.options.error_rate_pre_umi,
            self.options.error_rate_post_umi,
        )
        .with_min_count_quality(self.options.minor_quality_threshold);

        let first_pass = self.call_columns(&mut builder, &placed, max_len, false);
        let before = placed.len();
        placed.retain(|p| self.mismatches(p, &first_pass.sequence) <= self.options.max_mismatches);
        for _ in placed.len()..before {
            counters.record(DropReason::ExcessiveMismatches);
        }

        if placed.is_empty() || placed.len() < self.options.min_reads {
            return None;
        }

        let consensus = if placed.len() == before && !self.options.call_minors {
            first_pass
        } else {
            self.call_columns(&mut builder, &placed, max_len, self.options.call_minors)
        };
        Some((consensus, placed.len()))
    }

    /// Shift placing `read` against `anchor` with the fewest mismatches, preferring small shifts.
    fn place(&self, read: &Read, anchor: &[u8]) -> Option<isize> {
        let max_offset = self.options.max_offset as isize;
        let min_overlap = anchor.len().div_ceil(2);

        let mut shifts: Vec<isize> = (-max_offset..=max_offset).collect();
        shifts.sort_by_key(|s| s.abs());

        let mut best: Option<(usize, isize)> = None;
        for shift in shifts {
            let mut overlap = 0;
            let mut mismatches = 0;
            for (i, &expected) in anchor.iter().enumerate() {
                let Ok(idx) = usize::try_from(i as isize - shift) else {
                    continue;
                };
                let Some(&base) = read.sequence.get(idx) else {
                    continue;
                };
                overlap += 1;
                if base != expected {
                    mismatches += 1;
                }
            }
            if overlap < min_overlap {
                continue;
            }
            if best.is_none_or(|(m, _)| mismatches < m) {
                best = Some((mismatches, shift));
            }
        }

        best.filter(|&(m, _)| m <= self.options.max_anchor_mismatches).map(|(_, shift)| shift)
    }

    fn call_columns(
        &self,
        builder: &mut ConsensusBaseBuilder,
        placed: &[PlacedRead<'_>],
        length: usize,
        call_minors: bool,
    ) -> ConsensusRead {
        let mut sequence = Vec::with_capacity(length);
        let mut qualities = Vec::with_capacity(length);
        let mut minors = Vec::new();

        for column in 0..length {
            builder.reset();
            for p in placed {
                if let Some((base, qual)) =
                    p.at(column).filter(|&(_, qual)| qual >= self.options.min_base_quality)
                {
                    builder.add(base, qual);
                }
            }
            let call = builder.call();
            sequence.push(call.base);
            qualities.push(call.quality);

            if call_minors && call.base != NO_CALL_BASE {
                for (base, count) in DNA_BASES.iter().zip(builder.confident_observations()) {
                    if *base != call.base && count > 0 {
                        minors.push(MinorBase { position: column, base: *base, count });
                    }
                }
            }
        }

        ConsensusRead { sequence, qualities, minors }
    }

    /// Confident disagreements between a placed read and a called consensus.
    fn mismatches(&self, placed: &PlacedRead<'_>, consensus: &[u8]) -> usize {
        consensus
            .iter()
            .enumerate()
            .filter(|&(column, &called)| {
                called != NO_CALL_BASE
                    && placed.at(column).is_some_and(|(base, qual)| {
                        qual >= self.options.min_base_quality && base != called
                    })
            })
            .count()
    }

    fn counters(&self, mate: Mate) -> &MateCounters {
        match mate {
            Mate::R1 => &self.r1,
            Mate::R2 => &self.r2,
        }
    }

    /// Drops every retained consensus. Later reports are empty.
    pub fn clear(&self) {
        self.consensuses.lock().clear();
        self.cleared.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.cleared.load(Ordering::Relaxed)
    }

    /// Retained consensuses, in completion order.
    #[must_use]
    pub fn consensuses(&self) -> Vec<Consensus> {
        self.consensuses.lock().clone()
    }

    /// One report row per retained consensus. Empty, with a warning, once cleared.
    #[must_use]
    pub fn report(&self) -> Vec<AssembledMigMetric> {
        if self.is_cleared() {
            warn!("Requested the assembly report after the assembler was cleared");
            return Vec::new();
        }
        self.consensuses
            .lock()
            .iter()
            .map(|c| AssembledMigMetric {
                umi: c.umi.clone(),
                reads_assembled: c.assembled_size as u64,
                reads_total: c.true_size as u64,
            })
            .collect()
    }

    #[must_use]
    pub fn reads_rescued(&self, mate: Mate) -> u64 {
        self.counters(mate).rescued.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn reads_dropped_short(&self, mate: Mate) -> u64 {
        self.counters(mate).dropped_short.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn reads_dropped_error(&self, mate: Mate) -> u64 {
        self.counters(mate).dropped_error.load(Ordering::Relaxed)
    }

    /// Snapshot of every counter.
    #[must_use]
    pub fn metrics(&self) -> AssemblerMetrics {
        AssemblerMetrics {
            migs_total: self.migs_total.load(Ordering::Relaxed),
            migs_assembled: self.migs_assembled.load(Ordering::Relaxed),
            reads_total: self.reads_total.load(Ordering::Relaxed),
            reads_assembled: self.reads_assembled.load(Ordering::Relaxed),
            reads_rescued_r1: self.reads_rescued(Mate::R1),
            reads_rescued_r2: self.reads_rescued(Mate::R2),
            reads_dropped_short_r1: self.reads_dropped_short(Mate::R1),
            reads_dropped_short_r2: self.reads_dropped_short(Mate::R2),
            reads_dropped_error_r1: self.reads_dropped_error(Mate::R1),
            reads_dropped_error_r2: self.reads_dropped_error(Mate::R2),
            migs_dropped_insufficient_reads: self.migs_dropped_insufficient.load(Ordering::Relaxed),
            migs_dropped_orphan: self.migs_dropped_orphan.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use rstest::rstest;

    fn read(seq: &str, qual: u8) -> Read {
        Read::new(seq.as_bytes().to_vec(), vec![qual; seq.len()])
    }

    fn assembler() -> Assembler {
        Assembler::new(AssemblerOptions::default())
    }

    #[test]
    fn test_unanimous_group() {
        let assembler = assembler();
        let mig = Mig::single("AAAA", vec![read("ACGTACGTACGT", 30); 5]);
        let consensus = assembler.assemble(&mig).expect("consensus");
        assert_eq!(consensus.r1.sequence, b"ACGTACGTACGT");
        assert_eq!(consensus.assembled_size, 5);
        assert_eq!(consensus.true_size, 5);
        assert!(consensus.r1.minors.is_empty());
    }

    #[test]
    fn test_majority_vote_with_minor() {
        let assembler = assembler();
        let mut reads = vec![read("ACGTACGTACGT", 30); 4];
        reads.push(read("ACGTACGTACCT", 30));
        let consensus = assembler.assemble(&Mig::single("U", reads)).expect("consensus");
        assert_eq!(consensus.r1.sequence, b"ACGTACGTACGT");
        assert_eq!(consensus.r1.minors, vec![MinorBase { position: 10, base: b'C', count: 1 }]);
    }

    #[test]
    fn test_group_deeper_than_u16() {
        let assembler = assembler();
        let mut reads = vec![read("ACGTACGTACGT", 30); 70_000];
        reads.push(read("ACGTACGTACCT", 30));
        let consensus = assembler.assemble(&Mig::single("U", reads)).expect("consensus");
        assert_eq!(consensus.r1.sequence, b"ACGTACGTACGT");
        assert_eq!(consensus.assembled_size, 70_001);
        assert_eq!(consensus.r1.minors, vec![MinorBase { position: 10, base: b'C', count: 1 }]);
    }

    #[test]
    fn test_minors_disabled() {
        let assembler =
            Assembler::new(AssemblerOptions { call_minors: false, ..AssemblerOptions::default() });
        let mut reads = vec![read("ACGTACGTACGT", 30); 4];
        reads.push(read("ACGTACGTACCT", 30));
        let consensus = assembler.assemble(&Mig::single("U", reads)).expect("consensus");
        assert!(consensus.r1.minors.is_empty());
    }

    #[test]
    fn test_short_reads_dropped() {
        let assembler = assembler();
        let reads = vec![read("ACGTACGTACGT", 30), read("ACGTACGTACGT", 30), read("ACGT", 30)];
        let consensus = assembler.assemble(&Mig::single("U", reads)).expect("consensus");
        assert_eq!(consensus.assembled_size, 2);
        assert_eq!(consensus.true_size, 3);
        assert_eq!(assembler.reads_dropped_short(Mate::R1), 1);
    }

    #[test]
    fn test_shifted_read_is_rescued() {
        let assembler = assembler();
        let reads = vec![
            read("TTACGGATCCAGT", 30),
            read("TTACGGATCCAGT", 30),
            // missing the first base
            read("TACGGATCCAGT", 30),
        ];
        let consensus = assembler.assemble(&Mig::single("U", reads)).expect("consensus");
        assert_eq!(consensus.r1.sequence, b"TTACGGATCCAGT");
        assert_eq!(consensus.assembled_size, 3);
        assert_eq!(assembler.reads_rescued(Mate::R1), 1);
    }

    #[test]
    fn test_unplaceable_read_dropped() {
        let assembler = assembler();
        let reads = vec![
            read("ACGTACGTACGT", 30),
            read("ACGTACGTACGT", 30),
            read("GGGGGGGGGGGG", 30),
        ];
        let consensus = assembler.assemble(&Mig::single("U", reads)).expect("consensus");
        assert_eq!(consensus.assembled_size, 2);
        assert_eq!(assembler.reads_dropped_error(Mate::R1), 1);
    }

    #[test]
    fn test_mismatching_read_dropped_after_first_pass() {
        let options = AssemblerOptions { max_mismatches: 1, ..AssemblerOptions::default() };
        let assembler = Assembler::new(options);
        let reads = vec![
            read("ACGTACGTACGTACGT", 30),
            read("ACGTACGTACGTACGT", 30),
            read("ACGTACGTACGTACGT", 30),
            read("ACGTACGTTGCATGCA", 30),
        ];
        let consensus = assembler.assemble(&Mig::single("U", reads)).expect("consensus");
        assert_eq!(consensus.r1.sequence, b"ACGTACGTACGTACGT");
        assert_eq!(consensus.assembled_size, 3);
        assert_eq!(assembler.reads_dropped_error(Mate::R1), 1);
        assert!(consensus.r1.minors.is_empty());
    }

    #[rstest]
    #[case(vec![], 1)]
    #[case(vec![read("ACGTACGT", 30)], 2)]
    fn test_no_result(#[case] reads: Vec<Read>, #[case] min_reads: usize) {
        let assembler = Assembler::new(AssemblerOptions { min_reads, ..AssemblerOptions::default() });
        assert!(assembler.assemble(&Mig::single("U", reads)).is_none());
        let metrics = assembler.metrics();
        assert_eq!(metrics.migs_total, 1);
        assert_eq!(metrics.migs_assembled, 0);
        assert_eq!(metrics.migs_dropped_insufficient_reads, 1);
    }

    #[test]
    fn test_low_quality_column_is_no_call() {
        let assembler = assembler();
        let mut r = read("ACGT", 30);
        r.qualities[2] = 5;
        let consensus = assembler.assemble(&Mig::single("U", vec![r.clone(), r])).expect("consensus");
        assert_eq!(consensus.r1.sequence, b"ACNT");
        assert_eq!(consensus.r1.len(), 4);
    }

    #[test]
    fn test_paired_requires_both_mates() {
        let assembler = assembler();
        let mig = Mig::paired("U", vec![read("ACGTACGT", 30); 2], vec![read("", 30), read("", 30)]);
        assert!(assembler.assemble(&mig).is_none());
        assert_eq!(assembler.metrics().migs_dropped_orphan, 1);

        let mig = Mig::paired("U", vec![read("ACGTACGT", 30); 3], vec![read("TTTTGGGG", 30); 3]);
        let consensus = assembler.assemble(&mig).expect("consensus");
        assert!(consensus.is_paired());
        assert_eq!(consensus.r2.map(|r| r.sequence), Some(b"TTTTGGGG".to_vec()));
        assert_eq!(consensus.assembled_size, 3);
    }

    #[test]
    fn test_counters_and_report() {
        let assembler = assembler();
        assembler.assemble(&Mig::single("A", vec![read("ACGTACGT", 30); 3]));
        assembler.assemble(&Mig::single("B", vec![read("ACGTACGT", 30); 2]));

        let metrics = assembler.metrics();
        assert_eq!(metrics.migs_total, 2);
        assert_eq!(metrics.migs_assembled, 2);
        assert_eq!(metrics.reads_total, 5);
        assert_eq!(metrics.reads_assembled, 5);

        let mut report = assembler.report();
        report.sort_by(|a, b| a.umi.cmp(&b.umi));
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].umi, "A");
        assert_eq!(report[0].reads_assembled, 3);
    }

    #[test]
    fn test_clear_empties_report() {
        let assembler = assembler();
        assembler.assemble(&Mig::single("A", vec![read("ACGTACGT", 30); 3]));
        assembler.clear();
        assert!(assembler.is_cleared());
        assert!(assembler.report().is_empty());
        assert!(assembler.consensuses().is_empty());
        assert_eq!(assembler.metrics().migs_assembled, 1);
    }

    #[test]
    fn test_concurrent_assembly() {
        let assembler = assembler();
        let migs: Vec<Mig> = (0..200)
            .map(|i| Mig::single(format!("UMI{i}"), vec![read("ACGTACGTAC", 30); 1 + i % 4]))
            .collect();
        let assembled = migs.par_iter().filter_map(|m| assembler.assemble(m)).count();

        let expected_reads: u64 = migs.iter().map(|m| m.size() as u64).sum();
        let metrics = assembler.metrics();
        assert_eq!(assembled, 200);
        assert_eq!(metrics.migs_total, 200);
        assert_eq!(metrics.reads_total, expected_reads);
        assert_eq!(metrics.reads_assembled, expected_reads);
        assert_eq!(assembler.report().len(), 200);
    }

    #[rstest]
    #[case(AssemblerOptions { anchor_length: 0, ..AssemblerOptions::default() })]
    #[case(AssemblerOptions { min_read_length_ratio: 1.5, ..AssemblerOptions::default() })]
    #[case(AssemblerOptions { min_reads: 0, ..AssemblerOptions::default() })]
    #[case(AssemblerOptions { max_anchor_mismatches: 8, ..AssemblerOptions::default() })]
    fn test_invalid_options(#[case] options: AssemblerOptions) {
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_default_options_valid() {
        assert!(AssemblerOptions::default().validate().is_ok());
    }
}
