//! Human-readable formatting and the end-of-stage summaries logged by the commands.

use std::time::{Duration, Instant};

use crate::metrics::{
    AssemblerMetrics, CorrectorMetrics, HaplotypeMetric, ProcessingMetrics, format_count,
};

/// `value` as a percentage, e.g. `format_percent(0.9543, 2) == "95.43%"`.
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0)
}

/// Largest whole units of a duration: `45s`, `2m 15s`, `1h 30m`.
///
/// ```
/// use fgmig_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// assert_eq!(format_duration(Duration::from_secs(5400)), "1h 30m");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (major, minor, units) = match secs {
        0..60 => return format!("{secs}s"),
        60..3600 => (secs / 60, secs % 60, ("m", "s")),
        _ => (secs / 3600, (secs % 3600) / 60, ("h", "m")),
    };
    if minor == 0 { format!("{major}{}", units.0) } else { format!("{major}{} {minor}{}", units.0, units.1) }
}

/// Throughput of `count` items over `duration`, per second, or per minute when slower than one
/// item per second.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} items/s", format_count(count));
    }
    let per_second = count as f64 / secs;
    if per_second >= 1.0 {
        format!("{} items/s", format_count(per_second as u64))
    } else {
        format!("{:.1} items/min", per_second * 60.0)
    }
}

/// Logs a formatted summary of an assembly run.
///
/// Outputs group and read totals, the assembly rate, and the per-mate drop and rescue
/// breakdown.
///
/// # Examples
///
/// ```no_run
/// use fgmig_lib::logging::log_assembler_summary;
/// use fgmig_lib::metrics::AssemblerMetrics;
///
/// let metrics = AssemblerMetrics { migs_total: 1_000, migs_assembled: 950, ..Default::default() };
/// log_assembler_summary(&metrics);
/// ```
pub fn log_assembler_summary(metrics: &AssemblerMetrics) {
    log::info!("Assembly Summary:");
    log::info!("  Input groups: {}", format_count(metrics.migs_total));
    log::info!("  Assembled groups: {}", format_count(metrics.migs_assembled));
    if metrics.total_input() > 0 {
        log::info!("  Assembly rate: {}", format_percent(metrics.efficiency() / 100.0, 2));
    }
    log::info!(
        "  Reads assembled: {} of {}",
        format_count(metrics.reads_assembled),
        format_count(metrics.reads_total)
    );

    let mates = [
        ("R1", metrics.reads_rescued_r1, metrics.reads_dropped_short_r1, metrics.reads_dropped_error_r1),
        ("R2", metrics.reads_rescued_r2, metrics.reads_dropped_short_r2, metrics.reads_dropped_error_r2),
    ];
    for (mate, rescued, short, error) in mates {
        if rescued + short + error > 0 {
            log::info!(
                "  {mate}: {} rescued, {} dropped as short, {} dropped for mismatches",
                format_count(rescued),
                format_count(short),
                format_count(error)
            );
        }
    }

    if metrics.migs_dropped_insufficient_reads > 0 {
        log::info!(
            "Dropped {} groups with too few usable reads.",
            format_count(metrics.migs_dropped_insufficient_reads)
        );
    }
    if metrics.migs_dropped_orphan > 0 {
        log::info!(
            "Dropped {} paired groups where only one mate assembled.",
            format_count(metrics.migs_dropped_orphan)
        );
    }
}

/// Logs a formatted summary of a correction run.
pub fn log_corrector_summary(metrics: &CorrectorMetrics) {
    log::info!("Correction Summary:");
    log::info!("  Input consensuses: {}", format_count(metrics.consensuses_total));
    log::info!("  Corrected consensuses: {}", format_count(metrics.consensuses_good));
    if metrics.total_filtered() > 0 {
        log::info!(
            "Skipped {} consensuses whose reference had too little data.",
            format_count(metrics.total_filtered())
        );
    }
}

/// Logs a formatted summary of haplotype calling.
///
/// # Arguments
///
/// * `distinct` - Number of distinct haplotypes observed
/// * `reported` - Haplotypes passing the significance threshold
pub fn log_haplotype_summary(distinct: usize, reported: &[HaplotypeMetric]) {
    log::info!("Haplotype Summary:");
    log::info!("  Distinct haplotypes: {}", format_count(distinct as u64));
    log::info!("  Reported haplotypes: {}", format_count(reported.len() as u64));

    let migs: u64 = reported.iter().map(|h| h.mig_count).sum();
    let reads: u64 = reported.iter().map(|h| h.read_count).sum();
    if !reported.is_empty() {
        log::info!("  Consensuses in reported haplotypes: {}", format_count(migs));
        log::info!("  Reads in reported haplotypes: {}", format_count(reads));
    }
}

/// Logs the start of a command stage and, on completion, its duration and throughput.
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
