//! End-to-end CLI tests for the haplotypes command.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::helpers::{
    ALIGNED_HEADER, REFERENCE, aligned_rows, output_file, read_header_of, read_rows_of, run_fgmig,
    write_fasta, write_tsv,
};

/// 140 reference consensuses, 60 carrying `S3:G`, and 2 carrying an `S5:A` that is buried in
/// background minor calls.
fn write_inputs(dir: &TempDir) -> (PathBuf, PathBuf) {
    let reference = dir.path().join("ref.fa");
    write_fasta(&reference, "r", REFERENCE);

    let input = dir.path().join("aligned.tsv");
    let mut rows = aligned_rows(100, 10, "", "S5:A:1");
    rows.extend(aligned_rows(40, 10, "", ""));
    rows.extend(aligned_rows(60, 10, "S3:G", ""));
    rows.extend(aligned_rows(2, 10, "S5:A", ""));
    write_tsv(&input, ALIGNED_HEADER, &rows);
    (reference, input)
}

#[test]
fn test_haplotypes_command() {
    let dir = TempDir::new().unwrap();
    let (reference, input) = write_inputs(&dir);
    let prefix = dir.path().join("sample");

    let output = run_fgmig(&[
        "haplotypes",
        "-r",
        reference.to_str().unwrap(),
        "-i",
        input.to_str().unwrap(),
        "-o",
        prefix.to_str().unwrap(),
        "--threads",
        "2",
    ]);
    assert!(output.status.success(), "haplotypes failed: {}", String::from_utf8_lossy(&output.stderr));

    let haplotypes = read_rows_of(&output_file(&prefix, "haplotypes.txt"));
    assert_eq!(haplotypes.len(), 1, "only the S3:G haplotype is significant");
    let header = read_header_of(&output_file(&prefix, "haplotypes.txt"));
    let column = |name: &str| header.iter().position(|h| h == name).unwrap();
    assert_eq!(haplotypes[0][column("Mutations")], "S3:G");
    assert_eq!(haplotypes[0][column("Sequence")], "ACGGACGTACGTACGTACGT");

    let fasta = fs::read_to_string(output_file(&prefix, "haplotypes.fa")).unwrap();
    let lines: Vec<&str> = fasta.lines().collect();
    assert_eq!(lines[0], ">Haplotype1|REF=r|MUT=S3:G|MIG_COUNT=60|READ_COUNT=600|P=0");
    assert_eq!(lines[1], "ACGGACGTACGTACGTACGT");

    let variants = read_rows_of(&output_file(&prefix, "variants.txt"));
    let variant_header = read_header_of(&output_file(&prefix, "variants.txt"));
    let mutation = variant_header.iter().position(|h| h == "mutation").unwrap();
    let filter = variant_header.iter().position(|h| h == "filter").unwrap();
    let s3g = variants.iter().find(|v| v[mutation] == "S3:G").expect("S3:G variant");
    assert_eq!(s3g[filter], "PASS");
    assert!(variants.iter().any(|v| v[mutation] == "S5:A"));

    let corrector = read_rows_of(&output_file(&prefix, "corrector.txt"));
    assert_eq!(corrector.len(), REFERENCE.len());
    let summary = read_rows_of(&output_file(&prefix, "corrector_summary.txt"));
    assert_eq!(summary[0][0], "202");
    assert_eq!(summary[0][1], "202");
}

#[test]
fn test_haplotypes_command_keeps_nothing_below_reference_minimum() {
    let dir = TempDir::new().unwrap();
    let reference = dir.path().join("ref.fa");
    write_fasta(&reference, "r", REFERENCE);
    let input = dir.path().join("aligned.tsv");
    write_tsv(&input, ALIGNED_HEADER, &aligned_rows(5, 10, "S3:G", ""));
    let prefix = dir.path().join("sparse");

    let output = run_fgmig(&[
        "haplotypes",
        "-r",
        reference.to_str().unwrap(),
        "-i",
        input.to_str().unwrap(),
        "-o",
        prefix.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "haplotypes failed: {}", String::from_utf8_lossy(&output.stderr));

    assert!(read_rows_of(&output_file(&prefix, "haplotypes.txt")).is_empty());
    assert!(fs::read_to_string(output_file(&prefix, "haplotypes.fa")).unwrap().is_empty());
    let summary = read_rows_of(&output_file(&prefix, "corrector_summary.txt"));
    assert_eq!(summary[0][0], "5");
    assert_eq!(summary[0][1], "0");
}
