//! # Per-column consensus calling
//!
//! [`ConsensusBaseBuilder`] collects the (base, quality) observations that the reads of one
//! molecular identifier group contribute to a single consensus column and calls the most
//! likely base together with a Phred-scaled quality.
//!
//! For every candidate base `B` the builder accumulates
//!
//! ```text
//! ln L(B) = sum_i ln P(obs_i | B)
//! P(obs | B) = 1 - e        if obs == B
//!            = e / 3        otherwise
//! ```
//!
//! where `e` combines the read's base quality with the post-UMI error prior (errors introduced
//! after the molecule was tagged, e.g. by PCR). The winning base's posterior error is then
//! combined with the pre-UMI error prior, which caps the achievable consensus quality.
//!
//! With equal qualities this reduces to a majority vote; low-quality observations simply count
//! for less. Ties produce a no-call.
//!
//! The builder also keeps raw per-base counts restricted to observations at or above a minimum
//! quality, which is what the minor-variant caller inspects after the column is called.

use crate::phred::{
    LN_ONE, LogProbability, MAX_PHRED, MIN_PHRED, NO_CALL_BASE, PhredScore,
    ln_error_prob_two_trials, ln_not, ln_prob_to_phred, ln_sum_exp_array, phred_to_ln_error_prob,
};
use approx::abs_diff_eq;
use std::cmp::Ordering;
use wide::f64x4;

/// The four DNA bases, in index order.
pub const DNA_BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Marks bytes that are not an A, C, G or T (in either case).
const NOT_A_BASE: u8 = u8::MAX;

const BASE_TO_INDEX: [u8; 256] = {
    let mut table = [NOT_A_BASE; 256];
    table[b'A' as usize] = 0;
    table[b'a' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'c' as usize] = 1;
    table[b'G' as usize] = 2;
    table[b'g' as usize] = 2;
    table[b'T' as usize] = 3;
    table[b't' as usize] = 3;
    table
};

/// Index (0..4) of an A/C/G/T base, or `None` for anything else.
#[inline]
#[must_use]
pub fn base_index(base: u8) -> Option<usize> {
    match BASE_TO_INDEX[base as usize] {
        NOT_A_BASE => None,
        idx => Some(idx as usize),
    }
}

/// The outcome of calling one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnCall {
    /// Called base, or `N` when the column is empty or tied
    pub base: u8,
    /// Phred-scaled consensus quality
    pub quality: PhredScore,
    /// Number of A/C/G/T observations that contributed
    pub depth: u32,
}

/// Accumulates observations for a single consensus column.
///
/// Log-likelihoods of all four bases are updated together in one `f64x4` lane with Kahan
/// compensation, so deep groups of near-identical reads do not drift.
pub struct ConsensusBaseBuilder {
    likelihoods: f64x4,
    compensations: f64x4,
    observations: [u32; 4],
    /// Observations at or above `min_count_quality`, used for minor-variant calling
    confident_observations: [u32; 4],
    min_count_quality: PhredScore,
    /// ln(1 - e) indexed by base quality
    adjusted_correct: Vec<LogProbability>,
    /// ln(e / 3) indexed by base quality
    adjusted_error_per_alt: Vec<LogProbability>,
    ln_error_pre_umi: LogProbability,
}

impl ConsensusBaseBuilder {
    /// Creates a builder for the given pre- and post-UMI error priors (both Phred-scaled).
    #[must_use]
    pub fn new(error_rate_pre_umi: PhredScore, error_rate_post_umi: PhredScore) -> Self {
        let ln_error_post = phred_to_ln_error_prob(error_rate_post_umi);
        let (adjusted_correct, adjusted_error_per_alt) = (0..=MAX_PHRED)
            .map(|q| {
                let adjusted = ln_error_prob_two_trials(ln_error_post, phred_to_ln_error_prob(q));
                (ln_not(adjusted), adjusted - 3.0_f64.ln())
            })
            .unzip();

        Self {
            likelihoods: f64x4::splat(LN_ONE),
            compensations: f64x4::splat(0.0),
            observations: [0; 4],
            confident_observations: [0; 4],
            min_count_quality: 0,
            adjusted_correct,
            adjusted_error_per_alt,
            ln_error_pre_umi: phred_to_ln_error_prob(error_rate_pre_umi),
        }
    }

    /// Only observations with at least this quality are counted by
    /// [`confident_observations`](Self::confident_observations).
    #[must_use]
    pub fn with_min_count_quality(mut self, quality: PhredScore) -> Self {
        self.min_count_quality = quality;
        self
    }

    /// Clears all observations so the builder can be reused for the next column.
    pub fn reset(&mut self) {
        self.likelihoods = f64x4::splat(LN_ONE);
        self.compensations = f64x4::splat(0.0);
        self.observations = [0; 4];
        self.confident_observations = [0; 4];
    }

    /// Adds one observation. Anything other than A/C/G/T is ignored.
    pub fn add(&mut self, base: u8, qual: PhredScore) {
        let Some(idx) = base_index(base) else {
            return;
        };
        let q = qual.min(MAX_PHRED) as usize;

        let mut values = [self.adjusted_error_per_alt[q]; 4];
        values[idx] = self.adjusted_correct[q];
        let y = f64x4::from(values) - self.compensations;
        let t = self.likelihoods + y;
        self.compensations = (t - self.likelihoods) - y;
        self.likelihoods = t;

        self.observations[idx] += 1;
        if qual >= self.min_count_quality {
            self.confident_observations[idx] += 1;
        }
    }

    /// Calls the column. Empty or tied columns yield `(N, MIN_PHRED)`.
    #[must_use]
    pub fn call(&self) -> ColumnCall {
        let depth = self.contributions();
        let no_call = ColumnCall { base: NO_CALL_BASE, quality: MIN_PHRED, depth };
        if depth == 0 {
            return no_call;
        }

        let likelihoods = self.likelihoods.as_array_ref();
        let mut best: Option<usize> = None;
        let mut tie = false;
        for (i, &ll) in likelihoods.iter().enumerate() {
            let Some(b) = best else {
                best = Some(i);
                continue;
            };
            match ll.partial_cmp(&likelihoods[b]) {
                Some(Ordering::Greater) if !abs_diff_eq!(ll, likelihoods[b], epsilon = f64::EPSILON) => {
                    best = Some(i);
                    tie = false;
                }
                Some(Ordering::Greater | Ordering::Equal) => tie = true,
                Some(Ordering::Less) if abs_diff_eq!(ll, likelihoods[b], epsilon = f64::EPSILON) => {
                    tie = true;
                }
                _ => {}
            }
        }
        let Some(best) = best else {
            return no_call;
        };
        if tie {
            return no_call;
        }

        let ln_posterior = likelihoods[best] - ln_sum_exp_array(likelihoods);
        let ln_final_error = ln_error_prob_two_trials(self.ln_error_pre_umi, ln_not(ln_posterior));
        ColumnCall { base: DNA_BASES[best], quality: ln_prob_to_phred(ln_final_error), depth }
    }

    /// Total A/C/G/T observations in the column.
    #[must_use]
    pub fn contributions(&self) -> u32 {
        self.observations.iter().sum()
    }

    /// Observations of one base (0 for non-ACGT input).
    #[must_use]
    pub fn observations_for_base(&self, base: u8) -> u32 {
        base_index(base).map_or(0, |idx| self.observations[idx])
    }

    /// Observations at or above the minimum count quality, as `[A, C, G, T]`.
    #[must_use]
    pub fn confident_observations(&self) -> [u32; 4] {
        self.confident_observations
    }
}
