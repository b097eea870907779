//! Per-reference decisions on which positions and mutations can be trusted.

use crate::error_model::{ErrorModel, ErrorModelOptions};
use crate::mutation::{Mutation, MutationKind};
use ahash::AHashSet;
use fgmig_consensus::{DNA_BASES, base_index};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PositionFlags {
    populated: bool,
    has_reference: bool,
    good_coverage: bool,
    good_quality: bool,
    /// Substitution support per base (`A, C, G, T`)
    substitutions: [bool; 4],
}

/// Answers, for one reference, whether a position is adequately covered and whether a given
/// mutation is distinguishable from background noise.
///
/// Positions no consensus ever covered answer `false` to every question.
#[derive(Debug, Clone)]
pub struct MutationFilter {
    updated: bool,
    good: bool,
    positions: Vec<PositionFlags>,
    indels: AHashSet<Mutation>,
}

impl MutationFilter {
    /// Evaluates every position and indel of `model` against `options`.
    #[must_use]
    pub fn new(model: &ErrorModel, options: &ErrorModelOptions) -> Self {
        let reference = model.reference();
        let positions = (0..reference.len())
            .map(|position| {
                let stats = model.position(position);
                if stats.mig_coverage == 0 {
                    return PositionFlags::default();
                }
                let good_coverage = stats.mig_coverage >= options.min_mig_coverage;
                let reference_base = reference.base(position);
                let substitutions = DNA_BASES.map(|base| {
                    good_coverage
                        && Some(base) != reference_base
                        && model.major_count(position, base) >= options.min_major_count.max(1)
                        && model.substitution_p_value(position, base) <= options.substitution_p_value
                });
                PositionFlags {
                    populated: true,
                    has_reference: reference_base
                        .is_some_and(|base| model.major_count(position, base) > 0),
                    good_coverage,
                    good_quality: model
                        .mean_quality(position)
                        .is_some_and(|q| q >= options.min_mean_quality),
                    substitutions,
                }
            })
            .collect();

        let indels = model
            .indels()
            .into_iter()
            .filter(|(mutation, counts)| {
                let coverage = model.position(mutation.position).mig_coverage;
                coverage > 0
                    && counts.major >= options.min_indel_count
                    && counts.major as f64 / coverage as f64 >= options.min_indel_ratio
            })
            .map(|(mutation, _)| mutation)
            .collect();

        Self {
            updated: model.migs() > 0,
            good: model.migs() >= options.min_reference_migs,
            positions,
            indels,
        }
    }

    fn flags(&self, position: usize) -> PositionFlags {
        self.positions.get(position).copied().unwrap_or_default()
    }

    /// At least one consensus was observed for the reference.
    #[must_use]
    pub fn updated(&self) -> bool {
        self.updated
    }

    /// Enough consensuses were observed for the reference to correct against it.
    #[must_use]
    pub fn good(&self) -> bool {
        self.good
    }

    /// At least one consensus covered the position.
    #[must_use]
    pub fn populated(&self, position: usize) -> bool {
        self.flags(position).populated
    }

    /// At least one consensus carried the reference base at the position.
    #[must_use]
    pub fn has_reference(&self, position: usize) -> bool {
        self.flags(position).has_reference
    }

    #[must_use]
    pub fn good_coverage(&self, position: usize) -> bool {
        self.flags(position).good_coverage
    }

    #[must_use]
    pub fn good_quality(&self, position: usize) -> bool {
        self.flags(position).good_quality
    }

    /// The position passes both the coverage and the quality test.
    #[must_use]
    pub fn passed(&self, position: usize) -> bool {
        let flags = self.flags(position);
        flags.good_coverage && flags.good_quality
    }

    /// The substitution to `base` at `position` is distinguishable from background noise.
    #[must_use]
    pub fn has_substitution(&self, position: usize, base: u8) -> bool {
        base_index(base).is_some_and(|idx| self.flags(position).substitutions[idx])
    }

    /// The indel is supported by enough consensuses.
    #[must_use]
    pub fn has_indel(&self, mutation: &Mutation) -> bool {
        !matches!(mutation.kind, MutationKind::Substitution(_)) && self.indels.contains(mutation)
    }
}
