//! Phred scores and log-space probability arithmetic.
//!
//! Every probability handled by the consensus builder lives in natural-log space so that
//! products over deep read groups never underflow. The numerically careful pieces
//! (`ln(1 - e^x)` and `ln(e^a + e^b)`) follow equations (7) and (10) of
//! <https://cran.r-project.org/web/packages/Rmpfr/vignettes/log1mexp-note.pdf>.

use std::f64::consts::{LN_2, LN_10};

/// ln(4/3), the correction for two errors landing on the same wrong base.
const LN_FOUR_THIRDS: f64 = 0.287_682_072_451_780_9;

/// Offset applied before flooring when converting to an integer Phred score.
const PHRED_PRECISION: f64 = 0.001;

/// ln(1.0).
pub const LN_ONE: f64 = 0.0;

/// Lowest quality ever emitted for a consensus base.
pub const MIN_PHRED: u8 = 2;

/// Highest quality ever emitted for a consensus base.
pub const MAX_PHRED: u8 = 93;

/// Base emitted when a column cannot be called.
pub const NO_CALL_BASE: u8 = b'N';

/// Phred score type
pub type PhredScore = u8;

/// Natural-log probability
pub type LogProbability = f64;

/// Converts a Phred score to the natural log of its error probability.
///
/// ```
/// use fgmig_consensus::phred::phred_to_ln_error_prob;
///
/// assert!((phred_to_ln_error_prob(20) - 0.01_f64.ln()).abs() < 1e-10);
/// ```
#[inline]
#[must_use]
pub fn phred_to_ln_error_prob(phred: PhredScore) -> LogProbability {
    -f64::from(phred) * LN_10 / 10.0
}

/// Converts a log error probability to a Phred score clamped to `[MIN_PHRED, MAX_PHRED]`.
///
/// ```
/// use fgmig_consensus::phred::ln_prob_to_phred;
///
/// assert_eq!(ln_prob_to_phred(0.001_f64.ln()), 30);
/// assert_eq!(ln_prob_to_phred(1e-20_f64.ln()), 93);
/// ```
#[inline]
#[must_use]
pub fn ln_prob_to_phred(ln_prob: LogProbability) -> PhredScore {
    if ln_prob < phred_to_ln_error_prob(MAX_PHRED) {
        return MAX_PHRED;
    }
    let phred = (-10.0 * ln_prob / LN_10 + PHRED_PRECISION).floor();
    phred.clamp(f64::from(MIN_PHRED), f64::from(MAX_PHRED)) as PhredScore
}

/// ln(1 + e^x) without overflow or loss of precision for tiny x.
#[inline]
fn log1pexp(x: f64) -> f64 {
    if x <= -37.0 {
        x.exp()
    } else if x <= 18.0 {
        x.exp().ln_1p()
    } else if x <= 33.3 {
        x + (-x).exp()
    } else {
        x
    }
}

/// ln(1 - e^x) for x <= 0. Returns negative infinity at x >= 0.
#[inline]
#[must_use]
pub fn ln_not(x: LogProbability) -> LogProbability {
    if x >= 0.0 {
        f64::NEG_INFINITY
    } else if x >= -LN_2 {
        (-x.exp_m1()).ln()
    } else {
        (-x.exp()).ln_1p()
    }
}

/// ln(e^a - e^b) for a >= b.
#[inline]
fn ln_a_minus_b(a: f64, b: f64) -> f64 {
    if b == f64::NEG_INFINITY {
        a
    } else if (a - b).abs() < f64::EPSILON {
        f64::NEG_INFINITY
    } else {
        a + ln_not(b - a)
    }
}

/// ln(e^a + e^b).
///
/// ```
/// use fgmig_consensus::phred::ln_sum_exp;
///
/// let result = ln_sum_exp(0.1_f64.ln(), 0.2_f64.ln());
/// assert!((result - 0.3_f64.ln()).abs() < 1e-10);
/// ```
#[must_use]
pub fn ln_sum_exp(ln_a: LogProbability, ln_b: LogProbability) -> LogProbability {
    if ln_a == f64::NEG_INFINITY {
        return ln_b;
    }
    if ln_b == f64::NEG_INFINITY {
        return ln_a;
    }
    let (low, high) = if ln_b < ln_a { (ln_b, ln_a) } else { (ln_a, ln_b) };
    low + log1pexp(high - low)
}

/// ln of the sum of the exponentiated values; negative infinity for an empty slice.
#[must_use]
pub fn ln_sum_exp_array(values: &[LogProbability]) -> LogProbability {
    let Some((min_index, &min_value)) =
        values.iter().enumerate().min_by(|a, b| a.1.total_cmp(b.1))
    else {
        return f64::NEG_INFINITY;
    };
    if min_value.is_infinite() {
        return min_value;
    }
    values
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != min_index)
        .fold(min_value, |sum, (_, value)| ln_sum_exp(sum, *value))
}

/// Error probability across two independent error processes: `p1 + p2 - 4/3 * p1 * p2`.
///
/// When the two differ by more than ~400x the larger one is returned unchanged.
#[must_use]
pub fn ln_error_prob_two_trials(ln_p1: LogProbability, ln_p2: LogProbability) -> LogProbability {
    let (ln_p1, ln_p2) = if ln_p1 < ln_p2 { (ln_p2, ln_p1) } else { (ln_p1, ln_p2) };
    if ln_p1 - ln_p2 >= 6.0 {
        return ln_p1;
    }
    let either = ln_sum_exp(ln_p1, ln_p2);
    let both = LN_FOUR_THIRDS + ln_p1 + ln_p2;
    ln_a_minus_b(either, both)
}
