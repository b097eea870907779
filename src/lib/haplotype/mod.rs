//! # Haplotypes
//!
//! A haplotype is a reference plus the ordered signature of mutations that survived correction.
//! Two haplotypes are equal when they share a reference and a signature; the consensus
//! sequences that produced them do not take part in equality.
//!
//! [`HaplotypeTree`] groups corrected consensuses into haplotypes and scores each one against
//! its more abundant relatives.

mod tree;

pub use tree::{HaplotypeEntry, HaplotypeTree, HaplotypeTreeOptions};

use crate::errors::FgmigError;
use crate::mutation::{Mutation, MutationKind, format_signature};
use crate::reference::Reference;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Placeholder rendered at positions that were never trusted.
pub const MASKED_BASE: u8 = b'N';

/// A reference plus a sorted, de-duplicated mutation signature.
#[derive(Debug, Clone)]
pub struct Haplotype {
    reference: Arc<Reference>,
    mutations: Vec<Mutation>,
}

impl Haplotype {
    #[must_use]
    pub fn new(reference: Arc<Reference>, mut mutations: Vec<Mutation>) -> Self {
        mutations.sort_unstable();
        mutations.dedup();
        Self { reference, mutations }
    }

    #[must_use]
    pub fn reference(&self) -> &Arc<Reference> {
        &self.reference
    }

    #[must_use]
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Comma-separated mutation codes; empty for the reference haplotype.
    #[must_use]
    pub fn signature(&self) -> String {
        format_signature(&self.mutations)
    }

    /// Applies the signature to the reference, rendering masked positions as `N`.
    ///
    /// Insertions are placed before the base at their position; deleted positions are dropped.
    #[must_use]
    pub fn masked_sequence(&self, mask: &BTreeSet<usize>) -> String {
        let mut sequence = Vec::with_capacity(self.reference.len() + self.mutations.len());
        let mut mutations = self.mutations.iter().peekable();

        for (position, &reference_base) in self.reference.sequence().iter().enumerate() {
            let mut base = Some(reference_base);
            let mut inserted = Vec::new();
            while let Some(mutation) = mutations.next_if(|m| m.position == position) {
                match mutation.kind {
                    MutationKind::Substitution(b) => base = base.map(|_| b),
                    MutationKind::Insertion(b) => inserted.push(b),
                    MutationKind::Deletion => base = None,
                }
            }
            sequence.extend(inserted);
            if let Some(base) = base {
                sequence.push(if mask.contains(&position) { MASKED_BASE } else { base });
            }
        }

        String::from_utf8_lossy(&sequence).into_owned()
    }
}

impl PartialEq for Haplotype {
    fn eq(&self, other: &Self) -> bool {
        self.reference.index() == other.reference.index() && self.mutations == other.mutations
    }
}

impl Eq for Haplotype {}

impl Hash for Haplotype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.index().hash(state);
        self.mutations.hash(state);
    }
}

impl fmt::Display for Haplotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.reference.name(), self.signature())
    }
}

/// Aggregate state of one haplotype in the tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HaplotypeCounters {
    /// Corrected consensuses with this haplotype
    pub count: u64,
    /// Reads in those consensuses
    pub read_count: u64,
    /// Probability that the haplotype is an error-derived descendant of a more abundant one;
    /// `None` until p-values have been calculated
    pub p_value: Option<f64>,
    /// Union of the coverage masks of every contributing consensus
    pub mask: BTreeSet<usize>,
}

/// Mutations that turn `parent` into `child`, in position order.
///
/// At every position where the two signatures disagree this yields the child's own mutations
/// there when it has any the parent lacks, and otherwise the reversion of the parent's mutation
/// to the reference base.
///
/// # Errors
///
/// Returns an error if a parent mutation lies outside the reference.
pub fn mutation_differences(parent: &Haplotype, child: &Haplotype) -> Result<Vec<Mutation>, FgmigError> {
    let positions: BTreeSet<usize> =
        parent.mutations.iter().chain(&child.mutations).map(|m| m.position).collect();

    let mut differences = Vec::new();
    for position in positions {
        let at = |haplotype: &'_ Haplotype| -> Vec<Mutation> {
            haplotype.mutations.iter().filter(|m| m.position == position).copied().collect()
        };
        let (in_parent, in_child) = (at(parent), at(child));
        if in_parent == in_child {
            continue;
        }

        let novel: Vec<Mutation> =
            in_child.iter().filter(|m| !in_parent.contains(m)).copied().collect();
        if novel.is_empty() {
            if let Some(lost) = in_parent.iter().find(|m| !in_child.contains(m)) {
                differences.push(lost.revert(&parent.reference)?);
            }
        } else {
            differences.extend(novel);
        }
    }
    Ok(differences)
}
