//! Consensuses aligned against a reference, as produced by an upstream aligner.

use crate::errors::FgmigError;
use crate::mutation::{CandidateMutation, Mutation};
use crate::reference::Reference;
use fgmig_consensus::PhredScore;
use std::ops::Range;
use std::sync::Arc;

/// A gap-free stretch of reference covered by the consensus, with the consensus quality at each
/// reference position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedBlock {
    pub reference_start: usize,
    pub qualities: Vec<PhredScore>,
}

impl AlignedBlock {
    #[must_use]
    pub fn new(reference_start: usize, qualities: Vec<PhredScore>) -> Self {
        Self { reference_start, qualities }
    }

    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.reference_start..self.reference_start + self.qualities.len()
    }
}

/// A mutation seen in a minority of the reads of a consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MinorMutation {
    pub mutation: Mutation,
    /// Reads carrying the mutation
    pub count: u64,
}

/// A consensus placed on a reference together with its provisional mutations.
#[derive(Debug, Clone)]
pub struct AlignedConsensus {
    reference: Arc<Reference>,
    umi: String,
    mig_size: usize,
    blocks: Vec<AlignedBlock>,
    major_mutations: Vec<CandidateMutation>,
    minor_mutations: Vec<MinorMutation>,
}

impl AlignedConsensus {
    /// Creates an aligned consensus, checking that blocks and mutations fit the reference.
    ///
    /// # Errors
    ///
    /// Returns an error if a block extends past the reference, a mutation is invalid for the
    /// reference, or `mig_size` is zero.
    pub fn new(
        reference: Arc<Reference>,
        umi: impl Into<String>,
        mig_size: usize,
        blocks: Vec<AlignedBlock>,
        major_mutations: Vec<Mutation>,
        minor_mutations: Vec<MinorMutation>,
    ) -> Result<Self, FgmigError> {
        let umi = umi.into();
        if mig_size == 0 {
            return Err(FgmigError::InvalidParameter {
                parameter: "mig_size".to_string(),
                reason: format!("consensus {umi} has no reads"),
            });
        }
        if let Some(block) = blocks.iter().find(|b| b.range().end > reference.len()) {
            return Err(FgmigError::InvalidParameter {
                parameter: "blocks".to_string(),
                reason: format!(
                    "block {:?} of consensus {umi} extends past reference '{}' of length {}",
                    block.range(),
                    reference.name(),
                    reference.len()
                ),
            });
        }
        for mutation in major_mutations.iter().chain(minor_mutations.iter().map(|m| &m.mutation)) {
            mutation.validate(&reference)?;
        }

        let mut major_mutations: Vec<CandidateMutation> =
            major_mutations.into_iter().map(CandidateMutation::new).collect();
        major_mutations.sort_by_key(|m| *m.mutation());
        major_mutations.dedup();

        Ok(Self { reference, umi, mig_size, blocks, major_mutations, minor_mutations })
    }

    #[must_use]
    pub fn reference(&self) -> &Arc<Reference> {
        &self.reference
    }

    #[must_use]
    pub fn umi(&self) -> &str {
        &self.umi
    }

    #[must_use]
    pub fn mig_size(&self) -> usize {
        self.mig_size
    }

    #[must_use]
    pub fn blocks(&self) -> &[AlignedBlock] {
        &self.blocks
    }

    /// Reference ranges covered by the consensus.
    #[must_use]
    pub fn ranges(&self) -> Vec<Range<usize>> {
        self.blocks.iter().map(AlignedBlock::range).collect()
    }

    /// Consensus quality at a reference position, if the position is covered.
    #[must_use]
    pub fn reference_quality(&self, position: usize) -> Option<PhredScore> {
        self.blocks
            .iter()
            .find(|b| b.range().contains(&position))
            .map(|b| b.qualities[position - b.reference_start])
    }

    /// Major mutations, sorted by position.
    #[must_use]
    pub fn major_mutations(&self) -> &[CandidateMutation] {
        &self.major_mutations
    }

    pub(crate) fn major_mutations_mut(&mut self) -> &mut [CandidateMutation] {
        &mut self.major_mutations
    }

    #[must_use]
    pub fn minor_mutations(&self) -> &[MinorMutation] {
        &self.minor_mutations
    }

    /// Base the consensus carries at a covered reference position: the substituted base, the
    /// reference base, or `None` for deleted and uncovered positions.
    #[must_use]
    pub fn base_at(&self, position: usize) -> Option<u8> {
        self.reference_quality(position)?;
        let mut base = self.reference.base(position);
        for candidate in &self.major_mutations {
            let mutation = candidate.mutation();
            if mutation.position == position {
                if mutation.is_deletion() {
                    return None;
                }
                if let Some(substituted) = mutation.substituted_base() {
                    base = Some(substituted);
                }
            }
        }
        base
    }
}
