#![deny(unsafe_code)]

//! Structured metric rows and TSV writer for fgmig.
//!
//! This crate provides:
//! - [`Metric`] and [`ProcessingMetrics`] traits shared by every report
//! - Row types for the assembler, corrector, variant and haplotype reports
//! - [`rejection`] for tracking why reads and groups were dropped
//! - [`writer`] for TSV file output

pub mod assemble;
pub mod correct;
pub mod haplotype;
pub mod rejection;
pub mod variant;
pub mod writer;

use serde::{Deserialize, Serialize};

/// Number of decimal places used for float metrics.
pub const FLOAT_PRECISION: usize = 6;

/// Formats a float value with the standard precision for metrics.
///
/// # Example
/// ```
/// use fgmig_metrics::format_float;
/// assert_eq!(format_float(0.9), "0.900000");
/// assert_eq!(format_float(0.0), "0.000000");
/// ```
#[must_use]
pub fn format_float(value: f64) -> String {
    format!("{value:.FLOAT_PRECISION$}")
}

/// A metric type that can be serialized to TSV files.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name for this metric type, used in error messages.
    fn metric_name() -> &'static str;
}

/// Common interface for metrics that track processing pipeline counts.
pub trait ProcessingMetrics {
    /// Total number of input items processed.
    fn total_input(&self) -> u64;

    /// Total number of output items produced.
    fn total_output(&self) -> u64;

    /// Total number of items filtered out or rejected.
    fn total_filtered(&self) -> u64 {
        self.total_input().saturating_sub(self.total_output())
    }

    /// Processing efficiency as a percentage (output / input * 100).
    fn efficiency(&self) -> f64 {
        if self.total_input() == 0 {
            0.0
        } else {
            #[expect(clippy::cast_precision_loss, reason = "read counts never exceed 2^53")]
            let result = self.total_output() as f64 / self.total_input() as f64 * 100.0;
            result
        }
    }
}

pub use assemble::{AssembledMigMetric, AssemblerMetrics};
pub use correct::{CorrectorMetrics, CorrectorPositionMetric};
pub use haplotype::HaplotypeMetric;
pub use rejection::{DropReason, format_count};
pub use variant::VariantMetric;
pub use writer::{write_metrics, write_metrics_auto};
