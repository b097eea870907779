//! # Positional mutation correction
//!
//! The [`Corrector`] filters the provisional (major) mutations of each aligned consensus against
//! the [`MutationFilter`](crate::mutation_filter::MutationFilter) of its reference:
//!
//! - substitutions survive only if they are distinguishable from background noise; the largest
//!   noise p-value among survivors is recorded
//! - indels survive only if enough consensuses carry them
//! - every reference position failing the coverage or quality test is masked, except that a
//!   surviving deletion un-masks its own position
//!
//! Consensuses of references with too little data are dropped entirely.

use crate::aligned::AlignedConsensus;
use crate::error_model::ErrorModelLibrary;
use crate::haplotype::Haplotype;
use crate::mutation::Mutation;
use crate::reference::Reference;
use fgmig_consensus::DNA_BASES;
use fgmig_metrics::{CorrectorMetrics, CorrectorPositionMetric};
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A consensus whose mutations have been filtered against the error model.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedConsensus {
    reference: Arc<Reference>,
    umi: String,
    mutations: Vec<Mutation>,
    coverage_mask: BTreeSet<usize>,
    max_p_value: f64,
    mig_size: usize,
    ranges: Vec<Range<usize>>,
}

impl CorrectedConsensus {
    #[must_use]
    pub fn reference(&self) -> &Arc<Reference> {
        &self.reference
    }

    #[must_use]
    pub fn umi(&self) -> &str {
        &self.umi
    }

    /// Surviving mutations, sorted by position.
    #[must_use]
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Reference positions that cannot be trusted in this consensus.
    #[must_use]
    pub fn coverage_mask(&self) -> &BTreeSet<usize> {
        &self.coverage_mask
    }

    /// Largest noise p-value among surviving substitutions (0 when there are none).
    #[must_use]
    pub fn max_p_value(&self) -> f64 {
        self.max_p_value
    }

    #[must_use]
    pub fn mig_size(&self) -> usize {
        self.mig_size
    }

    #[must_use]
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// The haplotype this consensus belongs to.
    #[must_use]
    pub fn haplotype(&self) -> Haplotype {
        Haplotype::new(Arc::clone(&self.reference), self.mutations.clone())
    }
}

/// Filters aligned consensuses against per-reference mutation filters.
pub struct Corrector {
    library: Arc<ErrorModelLibrary>,
    total: AtomicU64,
    good: AtomicU64,
}

impl Corrector {
    #[must_use]
    pub fn new(library: Arc<ErrorModelLibrary>) -> Self {
        Self { library, total: AtomicU64::new(0), good: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn library(&self) -> &Arc<ErrorModelLibrary> {
        &self.library
    }

    /// Corrects one consensus. Returns `None` when its reference has too little data.
    pub fn correct(&self, mut consensus: AlignedConsensus) -> Option<CorrectedConsensus> {
        self.total.fetch_add(1, Ordering::Relaxed);

        let reference = Arc::clone(consensus.reference());
        let filter = self.library.filter(&reference).filter(|f| f.good())?;
        let model = self.library.model(&reference)?;

        let mut coverage_mask: BTreeSet<usize> =
            (0..reference.len()).filter(|&pos| !filter.passed(pos)).collect();
        let mut max_p_value: f64 = 0.0;

        for candidate in consensus.major_mutations_mut() {
            let mutation = *candidate.mutation();
            if let Some(base) = mutation.substituted_base() {
                if filter.has_substitution(mutation.position, base) {
                    candidate.keep();
                    max_p_value = max_p_value.max(model.substitution_p_value(mutation.position, base));
                } else {
                    candidate.filter();
                }
            } else if filter.has_indel(&mutation) {
                candidate.keep();
                if mutation.is_deletion() {
                    coverage_mask.remove(&mutation.position);
                }
            } else {
                candidate.filter();
            }
        }

        self.good.fetch_add(1, Ordering::Relaxed);

        let mutations = consensus
            .major_mutations()
            .iter()
            .filter(|c| !c.is_filtered())
            .map(|c| *c.mutation())
            .collect();

        Some(CorrectedConsensus {
            reference,
            umi: consensus.umi().to_string(),
            mutations,
            coverage_mask,
            max_p_value,
            mig_size: consensus.mig_size(),
            ranges: consensus.ranges(),
        })
    }

    /// One row per populated position of every reference with data.
    #[must_use]
    pub fn report(&self) -> Vec<CorrectorPositionMetric> {
        let mut rows = Vec::new();
        for (model, filter) in self.library.iter().filter(|(_, f)| f.updated()) {
            let reference = model.reference();
            for pos in (0..reference.len()).filter(|&pos| filter.populated(pos)) {
                let row = CorrectorPositionMetric {
                    reference: reference.name().to_string(),
                    pos,
                    has_reference: filter.has_reference(pos),
                    good_coverage: filter.good_coverage(pos),
                    good_quality: filter.good_quality(pos),
                    ..Default::default()
                };
                rows.push(row.with_bases(
                    DNA_BASES.map(|base| model.major_count(pos, base)),
                    DNA_BASES.map(|base| 1.0 - model.substitution_p_value(pos, base)),
                    DNA_BASES.map(|base| filter.has_substitution(pos, base)),
                ));
            }
        }
        rows
    }

    #[must_use]
    pub fn metrics(&self) -> CorrectorMetrics {
        CorrectorMetrics {
            consensuses_total: self.total.load(Ordering::Relaxed),
            consensuses_good: self.good.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligned::AlignedBlock;
    use crate::error_model::{ErrorModelOptions, MutationStatistics};
    use crate::reference::ReferenceLibrary;

    fn aligned(
        library: &ReferenceLibrary,
        blocks: Vec<AlignedBlock>,
        majors: &[&str],
    ) -> AlignedConsensus {
        AlignedConsensus::new(
            Arc::clone(library.get("r").unwrap()),
            "UMI",
            10,
            blocks,
            majors.iter().map(|m| m.parse().unwrap()).collect(),
            vec![],
        )
        .unwrap()
    }

    /// 100 consensuses over a length-10 reference; position 7 is only covered by the 20 that
    /// carry `S3:G`, and a single consensus carries `D7`.
    fn corrector(library: &ReferenceLibrary) -> Corrector {
        let stats = MutationStatistics::new(library);
        let full = || AlignedBlock::new(0, vec![30; 10]);
        let split = || vec![AlignedBlock::new(0, vec![30; 7]), AlignedBlock::new(8, vec![30; 2])];
        for _ in 0..79 {
            stats.observe(&aligned(library, split(), &[])).unwrap();
        }
        stats.observe(&aligned(library, split(), &["D7"])).unwrap();
        for _ in 0..20 {
            stats.observe(&aligned(library, vec![full()], &["S3:G"])).unwrap();
        }
        let options = ErrorModelOptions { min_mig_coverage: 50, ..ErrorModelOptions::default() };
        Corrector::new(Arc::new(stats.finalize(&options)))
    }

    #[test]
    fn test_no_mutations_good_filter() {
        let library = ReferenceLibrary::new([("r", "ACGTACGTAC")]).unwrap();
        let stats = MutationStatistics::new(&library);
        for _ in 0..20 {
            stats.observe(&aligned(&library, vec![AlignedBlock::new(0, vec![30; 10])], &[])).unwrap();
        }
        let corrector = Corrector::new(Arc::new(stats.finalize(&ErrorModelOptions::default())));

        let corrected = corrector
            .correct(aligned(&library, vec![AlignedBlock::new(0, vec![30; 10])], &[]))
            .unwrap();
        assert!(corrected.mutations().is_empty());
        assert!(corrected.coverage_mask().is_empty());
        assert!(corrected.max_p_value().abs() < f64::EPSILON);
        assert_eq!(corrected.mig_size(), 10);
        assert_eq!(corrected.ranges(), &[0..10]);
    }

    #[test]
    fn test_supported_substitution_unsupported_deletion() {
        let library = ReferenceLibrary::new([("r", "ACGTACGTAC")]).unwrap();
        let corrector = corrector(&library);

        let consensus =
            aligned(&library, vec![AlignedBlock::new(0, vec![30; 10])], &["S3:G", "D7"]);
        let corrected = corrector.correct(consensus).unwrap();

        assert_eq!(corrected.mutations(), &[Mutation::substitution(3, b'G')]);
        assert!(corrected.max_p_value() <= 0.05);
        // position 7 fails the coverage test and the filtered deletion leaves it masked
        assert_eq!(corrected.coverage_mask().iter().copied().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_supported_deletion_unmasks_position() {
        let library = ReferenceLibrary::new([("r", "ACGTACGTAC")]).unwrap();
        let stats = MutationStatistics::new(&library);
        let block = || vec![AlignedBlock::new(0, vec![30; 10])];
        for _ in 0..5 {
            stats.observe(&aligned(&library, block(), &[])).unwrap();
        }
        for _ in 0..5 {
            stats.observe(&aligned(&library, block(), &["D7"])).unwrap();
        }
        let options = ErrorModelOptions { min_mig_coverage: 50, ..ErrorModelOptions::default() };
        let corrector = Corrector::new(Arc::new(stats.finalize(&options)));

        let corrected = corrector.correct(aligned(&library, block(), &["D7"])).unwrap();
        assert_eq!(corrected.mutations(), &[Mutation::deletion(7)]);
        assert!(!corrected.coverage_mask().contains(&7));
        assert_eq!(corrected.coverage_mask().len(), 9);
    }

    #[test]
    fn test_bad_reference_yields_none() {
        let library = ReferenceLibrary::new([("r", "ACGTACGTAC")]).unwrap();
        let stats = MutationStatistics::new(&library);
        stats.observe(&aligned(&library, vec![AlignedBlock::new(0, vec![30; 10])], &[])).unwrap();
        let corrector = Corrector::new(Arc::new(stats.finalize(&ErrorModelOptions::default())));

        assert!(corrector.correct(aligned(&library, vec![], &[])).is_none());
        let metrics = corrector.metrics();
        assert_eq!(metrics.consensuses_total, 1);
        assert_eq!(metrics.consensuses_good, 0);
    }

    #[test]
    fn test_report_rows() {
        let library = ReferenceLibrary::new([("r", "ACGTACGTAC")]).unwrap();
        let corrector = corrector(&library);
        let rows = corrector.report();
        assert_eq!(rows.len(), 10);

        let row = &rows[3];
        assert_eq!(row.reference, "r");
        assert_eq!(row.pos, 3);
        assert!(row.has_reference);
        assert!(row.good_coverage);
        assert_eq!((row.count_g, row.count_t), (20, 80));
        assert!(row.pass_g);
        assert!(!row.pass_t);
        assert!((row.prob_t - 1.0).abs() < f64::EPSILON);
        assert!(row.prob_g > 0.95);
        assert!(!rows[7].good_coverage);
    }
}
