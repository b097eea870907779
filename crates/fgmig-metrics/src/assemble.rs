//! Metrics for consensus assembly.

use serde::{Deserialize, Serialize};

use crate::{Metric, ProcessingMetrics};

/// One row per assembled molecular identifier group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledMigMetric {
    /// UMI sequence of the group
    pub umi: String,
    /// Reads that contributed to the consensus
    #[serde(rename = "reads.assembled")]
    pub reads_assembled: u64,
    /// Reads in the group
    #[serde(rename = "reads.total")]
    pub reads_total: u64,
}

impl Metric for AssembledMigMetric {
    fn metric_name() -> &'static str {
        "assembled MIG"
    }
}

/// Summary counters of one assembly run.
///
/// Read-level drop and rescue counters are kept separately for each mate; single-end runs
/// leave the R2 columns at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerMetrics {
    /// Groups submitted for assembly
    pub migs_total: u64,
    /// Groups that produced a consensus
    pub migs_assembled: u64,
    /// Reads (or read pairs) submitted for assembly
    pub reads_total: u64,
    /// Reads (or read pairs) that contributed to a consensus
    pub reads_assembled: u64,
    /// R1 reads realigned by an anchor offset
    pub reads_rescued_r1: u64,
    /// R2 reads realigned by an anchor offset
    pub reads_rescued_r2: u64,
    /// R1 reads dropped for being too short
    pub reads_dropped_short_r1: u64,
    /// R2 reads dropped for being too short
    pub reads_dropped_short_r2: u64,
    /// R1 reads dropped for anchor or consensus mismatches
    pub reads_dropped_error_r1: u64,
    /// R2 reads dropped for anchor or consensus mismatches
    pub reads_dropped_error_r2: u64,
    /// Groups with too few reads left to call a consensus
    pub migs_dropped_insufficient_reads: u64,
    /// Paired groups where only one mate produced a consensus
    pub migs_dropped_orphan: u64,
}

impl Metric for AssemblerMetrics {
    fn metric_name() -> &'static str {
        "assembler"
    }
}

impl ProcessingMetrics for AssemblerMetrics {
    fn total_input(&self) -> u64 {
        self.reads_total
    }

    fn total_output(&self) -> u64 {
        self.reads_assembled
    }
}
