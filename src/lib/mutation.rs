//! Mutations against a reference and their one-way filtering state.
//!
//! Mutations are written as compact codes:
//!
//! | Code   | Meaning                                   |
//! |--------|-------------------------------------------|
//! | `S3:G` | base at position 3 substituted by `G`     |
//! | `D7`   | base at position 7 deleted                |
//! | `I5:A` | `A` inserted before position 5            |
//!
//! Positions are 0-based reference coordinates.

use crate::errors::FgmigError;
use crate::reference::Reference;
use fgmig_consensus::base_index;
use std::fmt;
use std::str::FromStr;

/// The kind of edit a [`Mutation`] makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MutationKind {
    Substitution(u8),
    Insertion(u8),
    Deletion,
}

/// A positioned edit against a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mutation {
    pub position: usize,
    pub kind: MutationKind,
}

impl Mutation {
    #[must_use]
    pub fn substitution(position: usize, base: u8) -> Self {
        Self { position, kind: MutationKind::Substitution(base.to_ascii_uppercase()) }
    }

    #[must_use]
    pub fn insertion(position: usize, base: u8) -> Self {
        Self { position, kind: MutationKind::Insertion(base.to_ascii_uppercase()) }
    }

    #[must_use]
    pub fn deletion(position: usize) -> Self {
        Self { position, kind: MutationKind::Deletion }
    }

    #[must_use]
    pub fn is_substitution(&self) -> bool {
        matches!(self.kind, MutationKind::Substitution(_))
    }

    #[must_use]
    pub fn is_deletion(&self) -> bool {
        matches!(self.kind, MutationKind::Deletion)
    }

    #[must_use]
    pub fn is_indel(&self) -> bool {
        !self.is_substitution()
    }

    /// Target base of a substitution.
    #[must_use]
    pub fn substituted_base(&self) -> Option<u8> {
        match self.kind {
            MutationKind::Substitution(base) => Some(base),
            _ => None,
        }
    }

    /// Checks that the mutation lies on `reference` and is not a no-op substitution.
    ///
    /// # Errors
    ///
    /// Returns [`FgmigError::InvalidMutation`] when the position is past the end of the
    /// reference, the base is not A/C/G/T, or a substitution targets the reference base.
    pub fn validate(&self, reference: &Reference) -> Result<(), FgmigError> {
        let invalid = |reason: String| FgmigError::InvalidMutation { code: self.to_string(), reason };
        let Some(reference_base) = reference.base(self.position) else {
            return Err(invalid(format!(
                "position is outside reference '{}' of length {}",
                reference.name(),
                reference.len()
            )));
        };
        match self.kind {
            MutationKind::Substitution(base) if base == reference_base => {
                Err(invalid("substitution to the reference base".to_string()))
            }
            MutationKind::Substitution(base) | MutationKind::Insertion(base)
                if base_index(base).is_none() =>
            {
                Err(invalid(format!("'{}' is not a DNA base", char::from(base))))
            }
            _ => Ok(()),
        }
    }

    /// The edit that restores the reference at this mutation's position.
    ///
    /// Every reversion is expressed as a substitution to the reference base, i.e. "this position
    /// matches the reference".
    ///
    /// # Errors
    ///
    /// Returns [`FgmigError::InvalidMutation`] when the position is outside `reference`.
    pub fn revert(&self, reference: &Reference) -> Result<Mutation, FgmigError> {
        reference.base(self.position).map(|base| Mutation::substitution(self.position, base)).ok_or_else(
            || FgmigError::InvalidMutation {
                code: self.to_string(),
                reason: format!("cannot revert outside reference '{}'", reference.name()),
            },
        )
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MutationKind::Substitution(base) => write!(f, "S{}:{}", self.position, char::from(base)),
            MutationKind::Insertion(base) => write!(f, "I{}:{}", self.position, char::from(base)),
            MutationKind::Deletion => write!(f, "D{}", self.position),
        }
    }
}

impl FromStr for Mutation {
    type Err = FgmigError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| FgmigError::InvalidMutation {
            code: code.to_string(),
            reason: reason.to_string(),
        };
        let mut chars = code.chars();
        let kind = chars.next().ok_or_else(|| invalid("empty mutation code"))?;
        let rest = chars.as_str();

        let parse_position = |s: &str| s.parse::<usize>().map_err(|_| invalid("invalid position"));
        let parse_base = |s: &str| match s.as_bytes() {
            [base] if base_index(*base).is_some() => Ok(base.to_ascii_uppercase()),
            _ => Err(invalid("expected a single A, C, G or T base")),
        };

        match kind {
            'S' | 'I' => {
                let (position, base) =
                    rest.split_once(':').ok_or_else(|| invalid("expected <position>:<base>"))?;
                let position = parse_position(position)?;
                let base = parse_base(base)?;
                Ok(if kind == 'S' {
                    Mutation::substitution(position, base)
                } else {
                    Mutation::insertion(position, base)
                })
            }
            'D' => Ok(Mutation::deletion(parse_position(rest)?)),
            _ => Err(invalid("unknown mutation type")),
        }
    }
}

/// Formats a mutation signature as comma-separated codes.
pub fn format_signature<'a>(mutations: impl IntoIterator<Item = &'a Mutation>) -> String {
    mutations.into_iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

/// Filtering state of a candidate mutation. Leaves `Candidate` at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationStatus {
    Candidate,
    Kept,
    Filtered,
}

/// A provisional ("major") mutation called in a consensus, awaiting correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateMutation {
    mutation: Mutation,
    status: MutationStatus,
}

impl CandidateMutation {
    #[must_use]
    pub fn new(mutation: Mutation) -> Self {
        Self { mutation, status: MutationStatus::Candidate }
    }

    #[must_use]
    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    #[must_use]
    pub fn status(&self) -> MutationStatus {
        self.status
    }

    /// Marks the mutation as kept. Returns `false` if its status was already decided.
    pub fn keep(&mut self) -> bool {
        self.decide(MutationStatus::Kept)
    }

    /// Marks the mutation as filtered. Returns `false` if its status was already decided.
    pub fn filter(&mut self) -> bool {
        self.decide(MutationStatus::Filtered)
    }

    #[must_use]
    pub fn is_filtered(&self) -> bool {
        self.status == MutationStatus::Filtered
    }

    fn decide(&mut self, status: MutationStatus) -> bool {
        if self.status == MutationStatus::Candidate {
            self.status = status;
            true
        } else {
            false
        }
    }
}

impl From<Mutation> for CandidateMutation {
    fn from(mutation: Mutation) -> Self {
        Self::new(mutation)
    }
}
