//! # Positional error model
//!
//! Background mutation rates are learned from the aligned consensuses themselves, in two phases:
//!
//! 1. [`MutationStatistics`] is a thread-safe accumulation handle. Every aligned consensus is
//!    passed to [`MutationStatistics::observe`], which bumps per-reference, per-position
//!    counters (MIG coverage, read coverage, quality sum, major and minor counts per base) and
//!    per-indel counters.
//! 2. [`MutationStatistics::finalize`] consumes the handle and produces an immutable
//!    [`ErrorModelLibrary`]: one [`ErrorModel`] and one [`MutationFilter`] per reference.
//!
//! The background rate of a mutation is the fraction of reads that carry it as a *minor*
//! (sub-consensus) variant:
//!
//! ```text
//! rate = clamp((minor reads + pseudocount) / (read coverage + pseudocount), min_error_rate, 1)
//! ```
//!
//! A substitution seen as the major base of `k` out of `n` MIGs is then scored by the upper
//! binomial tail `P(X >= k)` with `X ~ Binomial(n, rate)`: the probability that background errors
//! alone would make it the consensus that often.

use crate::aligned::AlignedConsensus;
use crate::errors::{FgmigError, Result};
use crate::mutation::{Mutation, MutationKind};
use crate::mutation_filter::MutationFilter;
use crate::reference::{Reference, ReferenceLibrary};
use crate::validation::{validate_positive, validate_probability, validate_quality_score};
use ahash::AHashMap;
use fgmig_consensus::base_index;
use log::debug;
use parking_lot::Mutex;
use statrs::distribution::{Binomial, DiscreteCDF};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Options for building error models and the mutation filters derived from them.
#[derive(Debug, Clone)]
pub struct ErrorModelOptions {
    /// Pseudocount added to minor and read counts when estimating background rates
    pub pseudocount: f64,
    /// Lower bound on any background rate
    pub min_error_rate: f64,
    /// Positions covered by fewer MIGs are not trusted
    pub min_mig_coverage: u64,
    /// Positions with a lower mean consensus quality are not trusted
    pub min_mean_quality: f64,
    /// References with fewer consensuses are not corrected at all
    pub min_reference_migs: u64,
    /// Minimum MIGs carrying a substitution as major for it to be called
    pub min_major_count: u64,
    /// Substitutions with a higher noise p-value are filtered
    pub substitution_p_value: f64,
    /// Minimum MIGs carrying an indel as major for it to be called
    pub min_indel_count: u64,
    /// Minimum fraction of covering MIGs carrying an indel for it to be called
    pub min_indel_ratio: f64,
}

impl Default for ErrorModelOptions {
    fn default() -> Self {
        Self {
            pseudocount: 1.0,
            min_error_rate: 1e-4,
            min_mig_coverage: 10,
            min_mean_quality: 25.0,
            min_reference_migs: 10,
            min_major_count: 1,
            substitution_p_value: 0.05,
            min_indel_count: 2,
            min_indel_ratio: 0.1,
        }
    }
}

impl ErrorModelOptions {
    /// # Errors
    ///
    /// Returns an error naming the first out-of-range option.
    pub fn validate(&self) -> Result<()> {
        validate_positive(self.pseudocount, "pseudocount")?;
        validate_probability(self.min_error_rate)?;
        validate_probability(self.substitution_p_value)?;
        validate_probability(self.min_indel_ratio)?;
        validate_positive(self.min_reference_migs, "min-reference-migs")?;
        validate_quality_score(self.min_mean_quality, "min-mean-quality")?;
        Ok(())
    }
}

/// Major and minor counts of one indel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndelCounts {
    /// MIGs carrying the indel in their consensus
    pub major: u64,
    /// Reads carrying the indel in MIGs whose consensus does not
    pub minor: u64,
}

#[derive(Debug, Default)]
struct PositionCounters {
    migs: AtomicU64,
    reads: AtomicU64,
    quality_sum: AtomicU64,
    major: [AtomicU64; 4],
    minor: [AtomicU64; 4],
}

impl PositionCounters {
    fn snapshot(self) -> PositionStatistics {
        PositionStatistics {
            mig_coverage: self.migs.into_inner(),
            read_coverage: self.reads.into_inner(),
            quality_sum: self.quality_sum.into_inner(),
            major: self.major.map(AtomicU64::into_inner),
            minor: self.minor.map(AtomicU64::into_inner),
        }
    }
}

struct ReferenceStatistics {
    reference: Arc<Reference>,
    migs: AtomicU64,
    positions: Vec<PositionCounters>,
    indels: Mutex<AHashMap<Mutation, IndelCounts>>,
}

/// Thread-safe accumulation of mutation statistics across all references of a library.
pub struct MutationStatistics {
    references: Vec<ReferenceStatistics>,
}

impl MutationStatistics {
    #[must_use]
    pub fn new(library: &ReferenceLibrary) -> Self {
        let references = library
            .iter()
            .map(|reference| ReferenceStatistics {
                reference: Arc::clone(reference),
                migs: AtomicU64::new(0),
                positions: (0..reference.len()).map(|_| PositionCounters::default()).collect(),
                indels: Mutex::new(AHashMap::new()),
            })
            .collect();
        Self { references }
    }

    /// Adds one aligned consensus to the statistics of its reference.
    ///
    /// # Errors
    ///
    /// Returns [`FgmigError::ReferenceNotFound`] if the consensus's reference is not part of the
    /// library these statistics were created for.
    pub fn observe(&self, consensus: &AlignedConsensus) -> Result<()> {
        let reference = consensus.reference();
        let stats = self
            .references
            .get(reference.index())
            .filter(|s| s.reference.name() == reference.name())
            .ok_or_else(|| FgmigError::ReferenceNotFound { ref_name: reference.name().to_string() })?;

        stats.migs.fetch_add(1, Ordering::Relaxed);
        let mig_size = consensus.mig_size() as u64;

        for block in consensus.blocks() {
            for (position, &quality) in block.range().zip(&block.qualities) {
                let counters = &stats.positions[position];
                counters.migs.fetch_add(1, Ordering::Relaxed);
                counters.reads.fetch_add(mig_size, Ordering::Relaxed);
                counters.quality_sum.fetch_add(u64::from(quality), Ordering::Relaxed);
                if let Some(idx) = consensus.base_at(position).and_then(base_index) {
                    counters.major[idx].fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        for minor in consensus.minor_mutations() {
            if let MutationKind::Substitution(base) = minor.mutation.kind {
                if let Some(idx) = base_index(base) {
                    stats.positions[minor.mutation.position].minor[idx]
                        .fetch_add(minor.count, Ordering::Relaxed);
                }
            }
        }

        let major_indels = consensus.major_mutations().iter().map(|c| *c.mutation()).filter(Mutation::is_indel);
        let minor_indels = consensus.minor_mutations().iter().filter(|m| m.mutation.is_indel());
        let mut indels = stats.indels.lock();
        for mutation in major_indels {
            indels.entry(mutation).or_default().major += 1;
        }
        for minor in minor_indels {
            indels.entry(minor.mutation).or_default().minor += minor.count;
        }
        Ok(())
    }

    /// Freezes the statistics into per-reference error models and mutation filters.
    #[must_use]
    pub fn finalize(self, options: &ErrorModelOptions) -> ErrorModelLibrary {
        let models: Vec<ErrorModel> = self
            .references
            .into_iter()
            .map(|stats| ErrorModel {
                reference: stats.reference,
                migs: stats.migs.into_inner(),
                positions: stats.positions.into_iter().map(PositionCounters::snapshot).collect(),
                indels: stats.indels.into_inner(),
                pseudocount: options.pseudocount,
                min_error_rate: options.min_error_rate,
            })
            .collect();

        let filters = models.iter().map(|model| MutationFilter::new(model, options)).collect();
        debug!(
            "Finalized error models for {} references ({} with data)",
            models.len(),
            models.iter().filter(|m| m.migs() > 0).count()
        );
        ErrorModelLibrary { models, filters }
    }
}

/// Frozen counters of one reference position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionStatistics {
    /// MIGs covering the position
    pub mig_coverage: u64,
    /// Reads in the MIGs covering the position
    pub read_coverage: u64,
    /// Sum of consensus qualities over covering MIGs
    pub quality_sum: u64,
    /// MIGs whose consensus carries each base (`A, C, G, T`)
    pub major: [u64; 4],
    /// Reads carrying each base as a minor variant (`A, C, G, T`)
    pub minor: [u64; 4],
}

/// Immutable background-error model of one reference.
#[derive(Debug, Clone)]
pub struct ErrorModel {
    reference: Arc<Reference>,
    migs: u64,
    positions: Vec<PositionStatistics>,
    indels: AHashMap<Mutation, IndelCounts>,
    pseudocount: f64,
    min_error_rate: f64,
}

impl ErrorModel {
    #[must_use]
    pub fn reference(&self) -> &Arc<Reference> {
        &self.reference
    }

    /// Consensuses observed for this reference.
    #[must_use]
    pub fn migs(&self) -> u64 {
        self.migs
    }

    /// Counters at a position; all zero outside the reference.
    #[must_use]
    pub fn position(&self, position: usize) -> PositionStatistics {
        self.positions.get(position).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn mean_quality(&self, position: usize) -> Option<f64> {
        let stats = self.position(position);
        (stats.mig_coverage > 0).then(|| stats.quality_sum as f64 / stats.mig_coverage as f64)
    }

    /// MIGs whose consensus carries `base` at `position`.
    #[must_use]
    pub fn major_count(&self, position: usize, base: u8) -> u64 {
        base_index(base).map_or(0, |idx| self.position(position).major[idx])
    }

    #[must_use]
    pub fn indel_counts(&self, mutation: &Mutation) -> IndelCounts {
        self.indels.get(mutation).copied().unwrap_or_default()
    }

    /// Every indel seen for this reference, in position order.
    #[must_use]
    pub fn indels(&self) -> Vec<(Mutation, IndelCounts)> {
        let mut indels: Vec<_> = self.indels.iter().map(|(m, c)| (*m, *c)).collect();
        indels.sort_by_key(|(m, _)| *m);
        indels
    }

    /// Probability that a read carries `mutation` as a background error.
    #[must_use]
    pub fn background_rate(&self, mutation: &Mutation) -> f64 {
        let stats = self.position(mutation.position);
        let minor = match mutation.kind {
            MutationKind::Substitution(base) => base_index(base).map_or(0, |idx| stats.minor[idx]),
            MutationKind::Insertion(_) | MutationKind::Deletion => self.indel_counts(mutation).minor,
        };
        let rate = (minor as f64 + self.pseudocount) / (stats.read_coverage as f64 + self.pseudocount);
        rate.clamp(self.min_error_rate, 1.0)
    }

    /// Probability that the substitution to `base` at `position` is background noise.
    ///
    /// The reference base scores 0; a base never seen as major scores 1.
    #[must_use]
    pub fn substitution_p_value(&self, position: usize, base: u8) -> f64 {
        if self.reference.base(position) == Some(base) {
            return 0.0;
        }
        let stats = self.position(position);
        let major = self.major_count(position, base);
        if major == 0 {
            return 1.0;
        }
        let rate = self.background_rate(&Mutation::substitution(position, base));
        binomial_upper_tail(stats.mig_coverage, rate, major)
    }

    /// Probability that `mutation` is background noise, for substitutions and indels alike.
    #[must_use]
    pub fn mutation_p_value(&self, mutation: &Mutation) -> f64 {
        match mutation.kind {
            MutationKind::Substitution(base) => self.substitution_p_value(mutation.position, base),
            MutationKind::Insertion(_) | MutationKind::Deletion => {
                let major = self.indel_counts(mutation).major;
                if major == 0 {
                    return 1.0;
                }
                let coverage = self.position(mutation.position).mig_coverage;
                binomial_upper_tail(coverage, self.background_rate(mutation), major)
            }
        }
    }

    /// MIGs carrying `mutation` as major. For a reversion (a substitution to the reference
    /// base) this is the number of MIGs carrying the reference base.
    #[must_use]
    pub fn total_count(&self, mutation: &Mutation) -> u64 {
        match mutation.kind {
            MutationKind::Substitution(base) => self.major_count(mutation.position, base),
            MutationKind::Insertion(_) | MutationKind::Deletion => self.indel_counts(mutation).major,
        }
    }

    /// Probability that a child haplotype with `child_reads` reads arose from a parent with
    /// `parent_reads` reads through background errors producing `mutation`.
    #[must_use]
    pub fn explanatory_p_value(&self, mutation: &Mutation, parent_reads: u64, child_reads: u64) -> f64 {
        let rate = self.background_rate(mutation);
        binomial_upper_tail(parent_reads + child_reads, rate, child_reads)
    }
}

/// `P(X >= k)` for `X ~ Binomial(n, p)`.
fn binomial_upper_tail(n: u64, p: f64, k: u64) -> f64 {
    if k == 0 {
        return 1.0;
    }
    if k > n {
        return 0.0;
    }
    Binomial::new(p, n).map_or(1.0, |binomial| binomial.sf(k - 1).clamp(0.0, 1.0))
}

/// Error models and mutation filters for every reference of a library.
#[derive(Debug, Clone)]
pub struct ErrorModelLibrary {
    models: Vec<ErrorModel>,
    filters: Vec<MutationFilter>,
}

impl ErrorModelLibrary {
    #[must_use]
    pub fn model(&self, reference: &Reference) -> Option<&ErrorModel> {
        self.models.get(reference.index()).filter(|m| m.reference.name() == reference.name())
    }

    #[must_use]
    pub fn filter(&self, reference: &Reference) -> Option<&MutationFilter> {
        self.model(reference).map(|_| &self.filters[reference.index()])
    }

    /// Models paired with their filters, in reference order.
    pub fn iter(&self) -> impl Iterator<Item = (&ErrorModel, &MutationFilter)> {
        self.models.iter().zip(&self.filters)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
