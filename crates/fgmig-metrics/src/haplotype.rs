//! Metrics for the haplotype table.

use serde::{Deserialize, Serialize};

use crate::Metric;

/// One row per reported haplotype.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HaplotypeMetric {
    /// Haplotype sequence; positions that were never trusted are rendered as `N`
    #[serde(rename = "Sequence")]
    pub sequence: String,
    #[serde(rename = "References")]
    pub reference: String,
    /// Comma-separated mutation signature, e.g. `S3:G,D7`
    #[serde(rename = "Mutations")]
    pub mutations: String,
    #[serde(rename = "MigCount")]
    pub mig_count: u64,
    #[serde(rename = "ReadCount")]
    pub read_count: u64,
    #[serde(rename = "P-value")]
    pub p_value: f64,
}

impl Metric for HaplotypeMetric {
    fn metric_name() -> &'static str {
        "haplotype"
    }
}
