//! Molecular identifier groups (MIGs): the raw reads that share one UMI.

use crate::phred::PhredScore;

/// Which mate of a read pair a read (or counter) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mate {
    R1,
    R2,
}

impl Mate {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mate::R1 => "R1",
            Mate::R2 => "R2",
        }
    }
}

/// A single sequencing read with Phred qualities (not ASCII-offset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub sequence: Vec<u8>,
    pub qualities: Vec<PhredScore>,
}

impl Read {
    /// Creates a read. Sequence and qualities must have the same length.
    #[must_use]
    pub fn new(sequence: Vec<u8>, qualities: Vec<PhredScore>) -> Self {
        debug_assert_eq!(sequence.len(), qualities.len());
        Self { sequence, qualities }
    }

    /// Parses a read from text, with qualities encoded as Phred+33.
    #[must_use]
    pub fn from_phred33(sequence: &[u8], qualities: &[u8]) -> Self {
        Self {
            sequence: sequence.to_ascii_uppercase(),
            qualities: qualities.iter().map(|q| q.saturating_sub(33)).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// All reads sharing one UMI. Paired-end groups carry both mates in matching order.
#[derive(Debug, Clone)]
pub struct Mig {
    umi: String,
    r1: Vec<Read>,
    r2: Option<Vec<Read>>,
}

impl Mig {
    #[must_use]
    pub fn single(umi: impl Into<String>, reads: Vec<Read>) -> Self {
        Self { umi: umi.into(), r1: reads, r2: None }
    }

    #[must_use]
    pub fn paired(umi: impl Into<String>, r1: Vec<Read>, r2: Vec<Read>) -> Self {
        debug_assert_eq!(r1.len(), r2.len());
        Self { umi: umi.into(), r1, r2: Some(r2) }
    }

    #[must_use]
    pub fn umi(&self) -> &str {
        &self.umi
    }

    #[must_use]
    pub fn r1(&self) -> &[Read] {
        &self.r1
    }

    #[must_use]
    pub fn r2(&self) -> Option<&[Read]> {
        self.r2.as_deref()
    }

    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.r2.is_some()
    }

    /// Number of reads (or read pairs) in the group.
    #[must_use]
    pub fn size(&self) -> usize {
        self.r1.len()
    }
}
