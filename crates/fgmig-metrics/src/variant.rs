//! Metrics for the variant table.

use serde::{Deserialize, Serialize};

use crate::Metric;

/// One row per reference mutation observed as a major mutation in at least one consensus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantMetric {
    pub reference: String,
    /// 0-based position on the reference
    pub pos: usize,
    /// Mutation code, e.g. `S3:G`
    pub mutation: String,
    /// Consensuses carrying the mutation
    pub count: u64,
    /// Consensuses covering the position
    pub depth: u64,
    /// `count / depth`
    pub frequency: f64,
    /// Probability that the mutation is background noise
    pub p_value: f64,
    /// `PASS`, or the ids of every failed filter joined by `;`
    pub filter: String,
}

impl Metric for VariantMetric {
    fn metric_name() -> &'static str {
        "variant"
    }
}
