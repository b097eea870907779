//! Metrics for positional mutation correction.

use serde::{Deserialize, Serialize};

use crate::{Metric, ProcessingMetrics};

/// One row per populated reference position of the corrector report.
///
/// Per-base columns are in `A, C, G, T` order: the major count, `1 - p` where `p` is the
/// probability that the substitution is background noise, and whether it passed the filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectorPositionMetric {
    pub reference: String,
    /// 0-based position on the reference
    pub pos: usize,
    #[serde(rename = "has.reference")]
    pub has_reference: bool,
    #[serde(rename = "good.coverage")]
    pub good_coverage: bool,
    #[serde(rename = "good.quality")]
    pub good_quality: bool,
    #[serde(rename = "A")]
    pub count_a: u64,
    #[serde(rename = "C")]
    pub count_c: u64,
    #[serde(rename = "G")]
    pub count_g: u64,
    #[serde(rename = "T")]
    pub count_t: u64,
    #[serde(rename = "A.prob")]
    pub prob_a: f64,
    #[serde(rename = "C.prob")]
    pub prob_c: f64,
    #[serde(rename = "G.prob")]
    pub prob_g: f64,
    #[serde(rename = "T.prob")]
    pub prob_t: f64,
    #[serde(rename = "A.variant.pass")]
    pub pass_a: bool,
    #[serde(rename = "C.variant.pass")]
    pub pass_c: bool,
    #[serde(rename = "G.variant.pass")]
    pub pass_g: bool,
    #[serde(rename = "T.variant.pass")]
    pub pass_t: bool,
}

impl CorrectorPositionMetric {
    /// Sets the per-base columns from `[A, C, G, T]` arrays.
    #[must_use]
    pub fn with_bases(mut self, counts: [u64; 4], probs: [f64; 4], passes: [bool; 4]) -> Self {
        [self.count_a, self.count_c, self.count_g, self.count_t] = counts;
        [self.prob_a, self.prob_c, self.prob_g, self.prob_t] = probs;
        [self.pass_a, self.pass_c, self.pass_g, self.pass_t] = passes;
        self
    }
}

impl Metric for CorrectorPositionMetric {
    fn metric_name() -> &'static str {
        "corrector"
    }
}

/// Totals of one correction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectorMetrics {
    /// Consensuses submitted for correction
    pub consensuses_total: u64,
    /// Consensuses whose reference had enough data to be corrected
    pub consensuses_good: u64,
}

impl Metric for CorrectorMetrics {
    fn metric_name() -> &'static str {
        "corrector summary"
    }
}

impl ProcessingMetrics for CorrectorMetrics {
    fn total_input(&self) -> u64 {
        self.consensuses_total
    }

    fn total_output(&self) -> u64 {
        self.consensuses_good
    }
}
