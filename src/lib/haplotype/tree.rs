//! Parent/child significance scoring of haplotypes.
//!
//! Haplotypes are partitioned by reference. Within a partition every haplotype (the child) is
//! compared with every more abundant haplotype (the parent): the child's p-value is the
//! probability that it is a background-error descendant of the parent. The p-value of a parent
//! path is the product of the explanatory p-values of the mutations separating the two, and is
//! forced to zero when the child is too abundant relative to a mutation's total count or when the
//! two are separated by more mutations than the search depth. A child keeps the largest p-value
//! over all of its qualifying parents, or 1 when it has none.

use super::{Haplotype, HaplotypeCounters, mutation_differences};
use crate::corrector::CorrectedConsensus;
use crate::error_model::{ErrorModel, ErrorModelLibrary};
use crate::errors::{FgmigError, Result};
use crate::validation::validate_probability;
use ahash::AHashMap;
use anyhow::Context;
use fgmig_metrics::HaplotypeMetric;
use log::{debug, info};
use noodles::fasta;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Options for haplotype significance scoring.
#[derive(Debug, Clone)]
pub struct HaplotypeTreeOptions {
    /// Haplotypes with a p-value above this are not reported
    pub p_value_threshold: f64,
    /// A parent cannot explain a child whose count exceeds this fraction of a differing
    /// mutation's total count
    pub child_major_ratio: f64,
    /// Maximum number of differing mutations a parent can explain
    pub depth: usize,
    /// Ignore haplotypes seen in a single consensus
    pub filter_singletons: bool,
}

impl Default for HaplotypeTreeOptions {
    fn default() -> Self {
        Self { p_value_threshold: 0.05, child_major_ratio: 0.5, depth: 2, filter_singletons: true }
    }
}

impl HaplotypeTreeOptions {
    /// # Errors
    ///
    /// Returns an error if a probability is outside `[0, 1]` or the depth is zero.
    pub fn validate(&self) -> Result<()> {
        validate_probability(self.p_value_threshold)?;
        validate_probability(self.child_major_ratio)?;
        if self.depth == 0 {
            return Err(FgmigError::InvalidParameter {
                parameter: "depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// A haplotype with a snapshot of its counters.
#[derive(Debug, Clone, PartialEq)]
pub struct HaplotypeEntry {
    pub haplotype: Haplotype,
    pub counters: HaplotypeCounters,
}

impl HaplotypeEntry {
    /// The p-value, or 1 when none has been calculated.
    #[must_use]
    pub fn p_value(&self) -> f64 {
        self.counters.p_value.unwrap_or(1.0)
    }

    #[must_use]
    pub fn sequence(&self) -> String {
        self.haplotype.masked_sequence(&self.counters.mask)
    }
}

/// Most abundant first, ties broken by reads and then signature.
fn abundance_order(a: &HaplotypeEntry, b: &HaplotypeEntry) -> Ordering {
    b.counters
        .count
        .cmp(&a.counters.count)
        .then_with(|| b.counters.read_count.cmp(&a.counters.read_count))
        .then_with(|| a.haplotype.mutations().cmp(b.haplotype.mutations()))
}

type Partition = AHashMap<Haplotype, HaplotypeCounters>;

/// Accumulates corrected consensuses into haplotypes and scores them.
pub struct HaplotypeTree {
    library: Arc<ErrorModelLibrary>,
    options: HaplotypeTreeOptions,
    partitions: Mutex<AHashMap<usize, Partition>>,
}

impl HaplotypeTree {
    #[must_use]
    pub fn new(library: Arc<ErrorModelLibrary>, options: HaplotypeTreeOptions) -> Self {
        Self { library, options, partitions: Mutex::new(AHashMap::new()) }
    }

    #[must_use]
    pub fn options(&self) -> &HaplotypeTreeOptions {
        &self.options
    }

    /// Adds one corrected consensus to the count of its haplotype.
    pub fn add(&self, consensus: &CorrectedConsensus) {
        let haplotype = consensus.haplotype();
        let reference = haplotype.reference().index();
        let mut partitions = self.partitions.lock();
        let counters = partitions.entry(reference).or_default().entry(haplotype).or_default();
        counters.count += 1;
        counters.read_count += consensus.mig_size() as u64;
        counters.mask.extend(consensus.coverage_mask().iter().copied());
    }

    /// Distinct haplotypes added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.lock().values().map(|partition| partition.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scores every haplotype against its more abundant relatives. Call after all adds.
    ///
    /// # Errors
    ///
    /// Returns [`FgmigError::IndistinguishableHaplotypes`] if two distinct haplotypes have no
    /// differing mutations, and [`FgmigError::ReferenceNotFound`] if a haplotype's reference has
    /// no error model.
    pub fn calculate_p_values(&mut self) -> Result<()> {
        let library = Arc::clone(&self.library);
        let options = self.options.clone();

        for partition in self.partitions.get_mut().values_mut() {
            let mut entries: Vec<HaplotypeEntry> = partition
                .iter()
                .map(|(haplotype, counters)| HaplotypeEntry {
                    haplotype: haplotype.clone(),
                    counters: counters.clone(),
                })
                .collect();
            entries.sort_by(abundance_order);

            let Some(first) = entries.first() else { continue };
            let reference = Arc::clone(first.haplotype.reference());
            let model = library
                .model(&reference)
                .ok_or_else(|| FgmigError::ReferenceNotFound { ref_name: reference.name().to_string() })?;

            let p_values: Vec<f64> = entries
                .par_iter()
                .map(|child| child_p_value(model, &options, &entries, child))
                .collect::<Result<_>>()?;

            for (entry, p_value) in entries.iter().zip(p_values) {
                if let Some(counters) = partition.get_mut(&entry.haplotype) {
                    counters.p_value = Some(p_value);
                }
            }
            debug!("Scored {} haplotypes of reference '{}'", entries.len(), reference.name());
        }
        Ok(())
    }

    /// Haplotypes with a p-value at or below `threshold`, most abundant first within each
    /// reference. Haplotypes not yet scored are never returned.
    #[must_use]
    pub fn get_haplotypes(&self, threshold: f64) -> Vec<HaplotypeEntry> {
        let partitions = self.partitions.lock();
        let mut references: Vec<&usize> = partitions.keys().collect();
        references.sort_unstable();

        let mut selected = Vec::new();
        for reference in references {
            let mut entries: Vec<HaplotypeEntry> = partitions[reference]
                .iter()
                .filter(|(_, counters)| {
                    counters.p_value.is_some_and(|p| p <= threshold)
                        && (!self.options.filter_singletons || counters.count > 1)
                })
                .map(|(haplotype, counters)| HaplotypeEntry {
                    haplotype: haplotype.clone(),
                    counters: counters.clone(),
                })
                .collect();
            entries.sort_by(abundance_order);
            selected.extend(entries);
        }
        selected
    }

    /// One row per haplotype passing the configured p-value threshold.
    #[must_use]
    pub fn report(&self) -> Vec<HaplotypeMetric> {
        self.get_haplotypes(self.options.p_value_threshold)
            .into_iter()
            .map(|entry| HaplotypeMetric {
                sequence: entry.sequence(),
                reference: entry.haplotype.reference().name().to_string(),
                mutations: entry.haplotype.signature(),
                mig_count: entry.counters.count,
                read_count: entry.counters.read_count,
                p_value: entry.p_value(),
            })
            .collect()
    }

    /// FASTA records of the reported haplotypes, named
    /// `HaplotypeN|REF=..|MUT=..|MIG_COUNT=..|READ_COUNT=..|P=..`.
    #[must_use]
    pub fn fasta_records(&self) -> Vec<fasta::Record> {
        self.get_haplotypes(self.options.p_value_threshold)
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let name = format!(
                    "Haplotype{}|REF={}|MUT={}|MIG_COUNT={}|READ_COUNT={}|P={}",
                    i + 1,
                    entry.haplotype.reference().name(),
                    entry.haplotype.signature(),
                    entry.counters.count,
                    entry.counters.read_count,
                    entry.p_value()
                );
                fasta::Record::new(
                    fasta::record::Definition::new(name, None),
                    fasta::record::Sequence::from(entry.sequence().into_bytes()),
                )
            })
            .collect()
    }

    /// Writes [`Self::fasta_records`] to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_fasta<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("Failed to create FASTA: {}", path.display()))?;
        let mut output = BufWriter::new(file);
        let records = self.fasta_records();
        {
            let mut writer = fasta::io::Writer::new(&mut output);
            for record in &records {
                writer
                    .write_record(record)
                    .with_context(|| format!("Failed to write FASTA: {}", path.display()))?;
            }
        }
        output.flush()?;
        info!("Wrote {} haplotypes to {}", records.len(), path.display());
        Ok(())
    }
}

/// Largest p-value over every parent able to explain `child`, or 1 when no parent qualifies.
fn child_p_value(
    model: &ErrorModel,
    options: &HaplotypeTreeOptions,
    entries: &[HaplotypeEntry],
    child: &HaplotypeEntry,
) -> Result<f64> {
    let mut best: Option<f64> = None;
    for parent in entries {
        if parent.haplotype == child.haplotype
            || (options.filter_singletons && child.counters.count <= 1)
            || parent.counters.count < child.counters.count
        {
            continue;
        }
        let p_value = parent_p_value(model, options, parent, child)?;
        best = Some(best.map_or(p_value, |b| b.max(p_value)));
    }
    Ok(best.unwrap_or(1.0))
}

/// Probability that `child` arose from `parent` through background errors.
fn parent_p_value(
    model: &ErrorModel,
    options: &HaplotypeTreeOptions,
    parent: &HaplotypeEntry,
    child: &HaplotypeEntry,
) -> Result<f64> {
    let differences = mutation_differences(&parent.haplotype, &child.haplotype)?;
    if differences.is_empty() {
        return Err(FgmigError::IndistinguishableHaplotypes {
            reference: parent.haplotype.reference().name().to_string(),
            parent: parent.haplotype.signature(),
            child: child.haplotype.signature(),
        });
    }

    let mut p_value = 1.0;
    for (depth, mutation) in differences.iter().enumerate() {
        let total = model.total_count(mutation);
        let explainable =
            total > 0 && child.counters.count as f64 / total as f64 <= options.child_major_ratio;
        if !explainable {
            return Ok(0.0);
        }
        p_value *= model.explanatory_p_value(mutation, parent.counters.read_count, child.counters.read_count);
        if depth + 1 > options.depth {
            return Ok(0.0);
        }
    }
    Ok(p_value)
}
