//! Error path integration tests.
//!
//! These tests verify that invalid inputs and options make the commands fail with a useful
//! message instead of producing partial output.

use tempfile::TempDir;

use crate::helpers::{
    ALIGNED_HEADER, READS_HEADER, REFERENCE, aligned_rows, output_file, read_rows, run_fgmig, write_fasta,
    write_tsv,
};

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_assemble_missing_input() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("out");
    let output = run_fgmig(&[
        "assemble",
        "-i",
        dir.path().join("missing.tsv").to_str().unwrap(),
        "-o",
        prefix.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("does not exist"), "{}", stderr_of(&output));
    assert!(!output_file(&prefix, "consensus.txt").exists());
}

#[test]
fn test_assemble_non_consecutive_umis() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reads.tsv");
    let mut rows = read_rows("AAAA", "ACGTACGTACGT", 2);
    rows.extend(read_rows("CCCC", "ACGTACGTACGT", 2));
    rows.extend(read_rows("AAAA", "ACGTACGTACGT", 1));
    write_tsv(&input, READS_HEADER, &rows);

    let output = run_fgmig(&[
        "assemble",
        "-i",
        input.to_str().unwrap(),
        "-o",
        dir.path().join("out").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("not consecutive"), "{}", stderr_of(&output));
}

#[test]
fn test_assemble_header_without_r2_columns() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reads.tsv");
    let rows: Vec<Vec<String>> =
        read_rows("AAAA", "ACGTACGTACGT", 2).into_iter().map(|row| row[..3].to_vec()).collect();
    write_tsv(&input, &READS_HEADER[..3], &rows);

    let output = run_fgmig(&[
        "assemble",
        "-i",
        input.to_str().unwrap(),
        "-o",
        dir.path().join("out").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Failed to read reads TSV"), "{}", stderr_of(&output));
}

#[test]
fn test_assemble_invalid_options() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reads.tsv");
    write_tsv(&input, READS_HEADER, &read_rows("AAAA", "ACGT", 2));

    let output = run_fgmig(&[
        "assemble",
        "-i",
        input.to_str().unwrap(),
        "-o",
        dir.path().join("out").to_str().unwrap(),
        "--min-read-length-ratio",
        "1.5",
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_haplotypes_unknown_reference() {
    let dir = TempDir::new().unwrap();
    let reference = dir.path().join("ref.fa");
    write_fasta(&reference, "other", REFERENCE);
    let input = dir.path().join("aligned.tsv");
    write_tsv(&input, ALIGNED_HEADER, &aligned_rows(3, 5, "", ""));

    let output = run_fgmig(&[
        "haplotypes",
        "-r",
        reference.to_str().unwrap(),
        "-i",
        input.to_str().unwrap(),
        "-o",
        dir.path().join("out").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("not found"), "{}", stderr_of(&output));
}

#[test]
fn test_haplotypes_invalid_mutation_code() {
    let dir = TempDir::new().unwrap();
    let reference = dir.path().join("ref.fa");
    write_fasta(&reference, "r", REFERENCE);
    let input = dir.path().join("aligned.tsv");
    write_tsv(&input, ALIGNED_HEADER, &aligned_rows(3, 5, "X3:G", ""));

    let output = run_fgmig(&[
        "haplotypes",
        "-r",
        reference.to_str().unwrap(),
        "-i",
        input.to_str().unwrap(),
        "-o",
        dir.path().join("out").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("line 2"), "{}", stderr_of(&output));
}

#[test]
fn test_haplotypes_invalid_p_value_threshold() {
    let dir = TempDir::new().unwrap();
    let reference = dir.path().join("ref.fa");
    write_fasta(&reference, "r", REFERENCE);
    let input = dir.path().join("aligned.tsv");
    write_tsv(&input, ALIGNED_HEADER, &aligned_rows(3, 5, "", ""));

    let output = run_fgmig(&[
        "haplotypes",
        "-r",
        reference.to_str().unwrap(),
        "-i",
        input.to_str().unwrap(),
        "-o",
        dir.path().join("out").to_str().unwrap(),
        "--p-value-threshold",
        "2",
    ]);
    assert!(!output.status.success());
}
