//! # Variant calling
//!
//! Every mutation observed as the major call of at least one consensus is reported as a
//! [`Variant`], scored against the background-error model of its reference and annotated with
//! the filters it fails.

mod filter;

pub use filter::{PASS, VariantFilter, VariantFilterOptions, VariantFilterSet};

use crate::error_model::{ErrorModel, ErrorModelLibrary};
use crate::mutation::Mutation;
use crate::reference::Reference;
use fgmig_consensus::DNA_BASES;
use fgmig_metrics::VariantMetric;
use std::sync::Arc;

/// A reference mutation with its support across consensuses.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub reference: Arc<Reference>,
    pub mutation: Mutation,
    /// Consensuses carrying the mutation
    pub count: u64,
    /// Consensuses covering the position
    pub depth: u64,
    /// Probability that the mutation is background noise
    pub p_value: f64,
}

impl Variant {
    /// `count / depth`, or 0 at uncovered positions.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        if self.depth == 0 { 0.0 } else { self.count as f64 / self.depth as f64 }
    }
}

/// Calls variants from finalized error models.
pub struct VariantCaller {
    filters: VariantFilterSet,
}

impl VariantCaller {
    #[must_use]
    pub fn new(filters: VariantFilterSet) -> Self {
        Self { filters }
    }

    #[must_use]
    pub fn filters(&self) -> &VariantFilterSet {
        &self.filters
    }

    /// Variants of one reference, in position order.
    #[must_use]
    pub fn variants(model: &ErrorModel) -> Vec<Variant> {
        let reference = model.reference();
        let mut variants = Vec::new();

        for position in 0..reference.len() {
            let depth = model.position(position).mig_coverage;
            for base in DNA_BASES {
                if reference.base(position) == Some(base) || model.major_count(position, base) == 0 {
                    continue;
                }
                let mutation = Mutation::substitution(position, base);
                variants.push(Variant {
                    reference: Arc::clone(reference),
                    mutation,
                    count: model.major_count(position, base),
                    depth,
                    p_value: model.mutation_p_value(&mutation),
                });
            }
        }

        for (mutation, counts) in model.indels() {
            if counts.major == 0 {
                continue;
            }
            variants.push(Variant {
                reference: Arc::clone(reference),
                mutation,
                count: counts.major,
                depth: model.position(mutation.position).mig_coverage,
                p_value: model.mutation_p_value(&mutation),
            });
        }

        variants.sort_by_key(|v| v.mutation);
        variants
    }

    /// One row per variant of every reference, in library order.
    #[must_use]
    pub fn report(&self, library: &ErrorModelLibrary) -> Vec<VariantMetric> {
        library
            .iter()
            .flat_map(|(model, _)| Self::variants(model))
            .map(|variant| VariantMetric {
                reference: variant.reference.name().to_string(),
                pos: variant.mutation.position,
                mutation: variant.mutation.to_string(),
                count: variant.count,
                depth: variant.depth,
                frequency: variant.frequency(),
                p_value: variant.p_value,
                filter: self.filters.annotate(&variant),
            })
            .collect()
    }
}
