//! Builders for the TSV and FASTA inputs of the fgmig commands.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Reference used by the haplotype tests.
pub const REFERENCE: &str = "ACGTACGTACGTACGTACGT";

/// Writes a tab-separated file with a header row.
pub fn write_tsv(path: &Path, header: &[&str], rows: &[Vec<String>]) {
    let mut text = header.join("\t");
    text.push('\n');
    for row in rows {
        text.push_str(&row.join("\t"));
        text.push('\n');
    }
    fs::write(path, text).expect("Failed to write TSV");
}

/// Writes a single-record FASTA.
pub fn write_fasta(path: &Path, name: &str, sequence: &str) {
    fs::write(path, format!(">{name}\n{sequence}\n")).expect("Failed to write FASTA");
}

/// Header of the raw reads TSV.
pub const READS_HEADER: &[&str] = &["umi", "r1_sequence", "r1_quality", "r2_sequence", "r2_quality"];

/// One single-end read row, with the `r2` fields left empty.
pub fn single_end_row(umi: &str, sequence: &str) -> Vec<String> {
    vec![umi.to_string(), sequence.to_string(), "I".repeat(sequence.len()), String::new(), String::new()]
}

/// `count` single-end reads of one UMI, all with the same sequence and quality `I`.
pub fn read_rows(umi: &str, sequence: &str, count: usize) -> Vec<Vec<String>> {
    (0..count).map(|_| single_end_row(umi, sequence)).collect()
}

/// `count` aligned consensuses of [`REFERENCE`] covering it end to end.
pub fn aligned_rows(count: usize, mig_size: usize, majors: &str, minors: &str) -> Vec<Vec<String>> {
    (0..count)
        .map(|i| {
            vec![
                "r".to_string(),
                format!("UMI{i:05}"),
                mig_size.to_string(),
                "0".to_string(),
                "@".repeat(REFERENCE.len()),
                majors.to_string(),
                minors.to_string(),
            ]
        })
        .collect()
}

/// Header of the aligned consensus TSV.
pub const ALIGNED_HEADER: &[&str] =
    &["reference", "umi", "mig_size", "start", "qualities", "majors", "minors"];

/// Runs the fgmig binary with `args`.
pub fn run_fgmig(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fgmig")).args(args).output().expect("Failed to run fgmig")
}

/// `<prefix>.<suffix>`
pub fn output_file(prefix: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{suffix}", prefix.display()))
}

/// Data rows of a TSV output, split into columns, header excluded.
pub fn read_rows_of(path: &Path) -> Vec<Vec<String>> {
    let text = fs::read_to_string(path).expect("Failed to read output");
    text.lines().skip(1).map(|line| line.split('\t').map(str::to_string).collect()).collect()
}

/// Header columns of a TSV output.
pub fn read_header_of(path: &Path) -> Vec<String> {
    let text = fs::read_to_string(path).expect("Failed to read output");
    text.lines().next().unwrap_or_default().split('\t').map(str::to_string).collect()
}
