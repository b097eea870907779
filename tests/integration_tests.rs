//! Integration tests for fgmig.
//!
//! Run with: `cargo test --test integration_tests`
//!
//! These tests validate end-to-end workflows spanning multiple modules: assembly feeding the
//! error model, correction feeding the haplotype tree, and variant calling on the same models.

#![allow(clippy::cast_precision_loss)]

use fgmig_lib::aligned::{AlignedBlock, AlignedConsensus, MinorMutation};
use fgmig_lib::consensus::{Assembler, AssemblerOptions, Mig, Read};
use fgmig_lib::corrector::Corrector;
use fgmig_lib::error_model::{ErrorModelLibrary, ErrorModelOptions, MutationStatistics};
use fgmig_lib::haplotype::{HaplotypeTree, HaplotypeTreeOptions};
use fgmig_lib::logging::{format_duration, format_percent, format_rate};
use fgmig_lib::mutation::Mutation;
use fgmig_lib::reference::ReferenceLibrary;
use fgmig_lib::variant::{PASS, VariantCaller, VariantFilterOptions, VariantFilterSet};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const REFERENCE: &str = "ACGTACGTACGTACGTACGT";

fn references() -> ReferenceLibrary {
    ReferenceLibrary::new([("r", REFERENCE)]).unwrap()
}

/// `copies` consensuses of `r` covering it end to end at Q31.
fn consensuses(
    library: &ReferenceLibrary,
    copies: usize,
    majors: &[&str],
    minors: &[(&str, u64)],
) -> Vec<AlignedConsensus> {
    let reference = library.get("r").unwrap();
    (0..copies)
        .map(|i| {
            AlignedConsensus::new(
                Arc::clone(reference),
                format!("UMI{i}"),
                10,
                vec![AlignedBlock::new(0, vec![31; REFERENCE.len()])],
                majors.iter().map(|m| m.parse().unwrap()).collect(),
                minors
                    .iter()
                    .map(|(m, count)| MinorMutation { mutation: m.parse().unwrap(), count: *count })
                    .collect(),
            )
            .unwrap()
        })
        .collect()
}

/// 140 reference consensuses (100 with a background `S5:A` minor), 60 `S3:G` consensuses and
/// 2 consensuses whose `S5:A` cannot be told apart from the background.
fn sample(library: &ReferenceLibrary) -> Vec<AlignedConsensus> {
    let mut all = consensuses(library, 100, &[], &[("S5:A", 1)]);
    all.extend(consensuses(library, 40, &[], &[]));
    all.extend(consensuses(library, 60, &["S3:G"], &[]));
    all.extend(consensuses(library, 2, &["S5:A"], &[]));
    all
}

fn models(consensuses: &[AlignedConsensus], library: &ReferenceLibrary) -> Arc<ErrorModelLibrary> {
    let stats = MutationStatistics::new(library);
    consensuses.par_iter().try_for_each(|c| stats.observe(c)).unwrap();
    Arc::new(stats.finalize(&ErrorModelOptions::default()))
}

#[test]
fn test_correction_and_haplotype_calling() {
    let library = references();
    let sample = sample(&library);
    let models = models(&sample, &library);

    let corrector = Corrector::new(Arc::clone(&models));
    let mut tree = HaplotypeTree::new(Arc::clone(&models), HaplotypeTreeOptions::default());
    sample.into_par_iter().for_each(|consensus| {
        if let Some(corrected) = corrector.correct(consensus) {
            tree.add(&corrected);
        }
    });

    let metrics = corrector.metrics();
    assert_eq!(metrics.consensuses_total, 202);
    assert_eq!(metrics.consensuses_good, 202);
    assert_eq!(tree.len(), 2, "the background S5:A calls are corrected back to the reference");

    tree.calculate_p_values().unwrap();
    let haplotypes = tree.get_haplotypes(0.05);
    assert_eq!(haplotypes.len(), 1);
    let haplotype = &haplotypes[0];
    assert_eq!(haplotype.haplotype.signature(), "S3:G");
    assert_eq!(haplotype.counters.count, 60);
    assert_eq!(haplotype.counters.read_count, 600);
    assert_eq!(haplotype.sequence(), "ACGGACGTACGTACGTACGT");

    let everything = tree.get_haplotypes(1.0);
    assert_eq!(everything.len(), 2);
    assert_eq!(everything[0].counters.count, 142);
    assert!((everything[0].p_value() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_parallel_and_serial_statistics_agree() {
    let library = references();
    let sample = sample(&library);

    let serial = MutationStatistics::new(&library);
    for consensus in &sample {
        serial.observe(consensus).unwrap();
    }
    let serial = Arc::new(serial.finalize(&ErrorModelOptions::default()));
    let parallel = models(&sample, &library);

    let serial_report = Corrector::new(serial).report();
    let parallel_report = Corrector::new(parallel).report();
    assert_eq!(serial_report.len(), REFERENCE.len());
    assert_eq!(serial_report, parallel_report);
}

#[test]
fn test_variants_from_shared_models() {
    let library = references();
    let models = models(&sample(&library), &library);
    let caller = VariantCaller::new(VariantFilterSet::from(&VariantFilterOptions::default()));
    let rows = caller.report(&models);

    let codes: Vec<&str> = rows.iter().map(|r| r.mutation.as_str()).collect();
    assert_eq!(codes, vec!["S3:G", "S5:A"]);
    assert_eq!(rows[0].filter, PASS);
    assert_eq!((rows[0].count, rows[0].depth), (60, 202));
    assert!(rows[0].p_value < rows[1].p_value);
}

#[test]
fn test_assembly_feeds_alignment() {
    let sequence = b"ACGTACGTACGTACGTACGT";
    let reads: Vec<Read> = (0..4).map(|_| Read::from_phred33(sequence, &[b'I'; 20])).collect();
    let mut variant = sequence.to_vec();
    variant[3] = b'G';
    let variant_reads: Vec<Read> = (0..4).map(|_| Read::from_phred33(&variant, &[b'I'; 20])).collect();

    let assembler = Assembler::new(AssemblerOptions::default());
    let migs = [Mig::single("AAAA", reads), Mig::single("CCCC", variant_reads)];
    let assembled: Vec<_> = migs.iter().filter_map(|mig| assembler.assemble(mig)).collect();
    assert_eq!(assembled.len(), 2);

    let library = references();
    let reference = library.get("r").unwrap();
    for consensus in &assembled {
        let majors: Vec<Mutation> = consensus
            .r1
            .sequence
            .iter()
            .enumerate()
            .filter(|&(i, base)| reference.base(i) != Some(*base))
            .map(|(i, base)| Mutation::substitution(i, *base))
            .collect();
        let aligned = AlignedConsensus::new(
            Arc::clone(reference),
            consensus.umi.as_str(),
            consensus.assembled_size,
            vec![AlignedBlock::new(0, consensus.r1.qualities.clone())],
            majors,
            vec![],
        )
        .unwrap();
        assert_eq!(aligned.mig_size(), 4);
        assert_eq!(aligned.base_at(3), Some(consensus.r1.sequence[3]));
    }
}

#[test]
fn test_logging_formatters() {
    assert_eq!(format_percent(0.5, 2), "50.00%");
    assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    assert!(format_rate(1000, Duration::from_secs(1)).contains("1,000"));
}
