//! Consensus sequences produced from a [`Mig`](crate::mig::Mig).

use crate::phred::PhredScore;

/// A non-consensus base seen at one consensus column in enough reads of sufficient quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MinorBase {
    /// 0-based position in the consensus sequence
    pub position: usize,
    pub base: u8,
    /// Number of reads carrying the base
    pub count: u32,
}

/// Consensus of one mate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusRead {
    pub sequence: Vec<u8>,
    pub qualities: Vec<PhredScore>,
    pub minors: Vec<MinorBase>,
}

impl ConsensusRead {
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Qualities rendered as Phred+33 text.
    #[must_use]
    pub fn qualities_phred33(&self) -> String {
        self.qualities.iter().map(|&q| char::from(q.saturating_add(33))).collect()
    }
}

/// The consensus of one UMI group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consensus {
    pub umi: String,
    pub r1: ConsensusRead,
    pub r2: Option<ConsensusRead>,
    /// Reads that contributed to the consensus
    pub assembled_size: usize,
    /// Reads in the group
    pub true_size: usize,
}

impl Consensus {
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.r2.is_some()
    }
}
