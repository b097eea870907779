//! Reasons why reads or whole groups were dropped during assembly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a read, or an entire molecular identifier group, did not contribute to a consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// Read was much shorter than the longest read of its group
    ShortRead,
    /// Read start did not match the group anchor at any tested offset
    AnchorMismatch,
    /// Read disagreed with the consensus at too many positions
    ExcessiveMismatches,
    /// Too few reads survived to call a consensus
    InsufficientReads,
    /// Only one mate of a paired group produced a consensus
    OrphanMate,
}

impl DropReason {
    /// Returns a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::ShortRead => "Read shorter than the group length threshold",
            Self::AnchorMismatch => "Read start did not match the group anchor",
            Self::ExcessiveMismatches => "Read had too many mismatches to the consensus",
            Self::InsufficientReads => "Too few reads to generate a consensus",
            Self::OrphanMate => "Only one of R1 or R2 consensus generated",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Formats a count with thousands separators.
///
/// # Examples
///
/// ```
/// use fgmig_metrics::rejection::format_count;
///
/// assert_eq!(format_count(1234567), "1,234,567");
/// assert_eq!(format_count(123), "123");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i).is_multiple_of(3) {
            out.push(',');
        }
        out.push(c);
    }
    out
}
